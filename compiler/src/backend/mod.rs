// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Per-architecture instruction emitters. Each one writes into an
//! [`ObjectDataBuilder`] and implements the helper dispatch of
//! [`ReadyToRunHelperEmitter`].

pub mod aarch64;
pub mod amd64;
pub mod x86;

use crate::{
    Architecture,
    CodeGenResult,
    NodeFactory,
    NodeId,
    ObjectData,
    ObjectDataBuilder,
    Platform,
    ReadyToRunHelperEmitter,
};

/// The registers of the calling convention, resolved per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRegister {
    Arg0,
    Arg1,
    Arg2,
    Arg3,
    Result,

    /// Callee-saved, keeps the generic dictionary of shared code alive
    /// across calls.
    GenericContext,
}

/// The architecture-neutral part of an emitter, enough for method bodies and
/// the throwing substitute.
pub trait TargetEmitter {
    fn architecture(&self) -> Architecture;

    fn builder(&mut self) -> &mut ObjectDataBuilder;

    /// Jumps to `target`, through the cell when it represents an indirection
    /// cell.
    fn emit_jmp(&mut self, factory: &NodeFactory, target: NodeId) -> CodeGenResult<()>;

    fn emit_call(&mut self, factory: &NodeFactory, target: NodeId) -> CodeGenResult<()>;

    /// `register = &target`
    fn emit_load_address(&mut self, register: TargetRegister, target: NodeId) -> CodeGenResult<()>;

    /// `register = *register`
    fn emit_load_indirect(&mut self, register: TargetRegister) -> CodeGenResult<()>;

    fn emit_move_register(&mut self, dst: TargetRegister, src: TargetRegister) -> CodeGenResult<()>;

    /// `dst = imm`
    fn emit_mov_imm(&mut self, dst: TargetRegister, imm: i64) -> CodeGenResult<()>;

    /// `dst = *(base + offset)`, pointer sized.
    fn emit_load(&mut self, dst: TargetRegister, base: TargetRegister, offset: i32) -> CodeGenResult<()>;

    /// `dst = base + offset`
    fn emit_lea(&mut self, dst: TargetRegister, base: TargetRegister, offset: i32) -> CodeGenResult<()>;

    /// `dst += imm`
    fn emit_add(&mut self, dst: TargetRegister, imm: i32) -> CodeGenResult<()>;

    /// Sets the flags from the 32-bit value at `base + offset` compared with
    /// `imm`. May clobber the architecture's scratch register.
    fn emit_cmp(&mut self, base: TargetRegister, offset: i32, imm: i32) -> CodeGenResult<()>;

    /// Sets up the frame of a body that calls out or keeps `saved` alive. The
    /// caller's value of `saved` is restored by [`Self::emit_epilogue`].
    fn emit_prologue(&mut self, saved: Option<TargetRegister>) -> CodeGenResult<()>;

    /// Tears the frame down again, right before a return.
    fn emit_epilogue(&mut self, saved: Option<TargetRegister>) -> CodeGenResult<()>;

    fn emit_ret(&mut self) -> CodeGenResult<()>;

    /// Traps. Placed where control never arrives.
    fn emit_int3(&mut self) -> CodeGenResult<()>;

    fn finish(self: Box<Self>) -> ObjectData;
}

pub trait CodeEmitter: TargetEmitter + ReadyToRunHelperEmitter {}

impl<T: TargetEmitter + ReadyToRunHelperEmitter> CodeEmitter for T {}

/// Creates the emitter for `platform`, already aligned for code.
#[must_use]
pub fn create_emitter(platform: Platform) -> Box<dyn CodeEmitter> {
    let mut emitter: Box<dyn CodeEmitter> = match platform.architecture() {
        Architecture::X86 => Box::new(x86::X86Emitter::new(platform)),
        Architecture::X64 => Box::new(amd64::X64Emitter::new(platform)),
        Architecture::AArch64 => Box::new(aarch64::Arm64Emitter::new(platform)),
    };

    emitter.builder().require_alignment(platform.architecture().minimum_function_alignment());
    emitter
}
