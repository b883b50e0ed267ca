// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Debug;

use log::trace;

use crate::{
    backend::{TargetEmitter, TargetRegister},
    Architecture,
    CodeGenError,
    CodeGenResult,
    NodeFactory,
    NodeId,
    ObjectData,
    ObjectDataBuilder,
    OperatingSystem,
    Platform,
};

use super::{AddrMode, AddrModeSize, Amd64ConditionCode, Amd64Instruction, Amd64Register, CodeMode, ModRmRegister};

/// A register file of the x86 family.
pub trait X86FamilyRegister: ModRmRegister + Debug + 'static {
    const MODE: CodeMode;

    /// `None` when the calling convention passes the value on the stack.
    fn for_target(os: OperatingSystem, register: TargetRegister) -> Option<Self>;
}

impl X86FamilyRegister for Amd64Register {
    const MODE: CodeMode = CodeMode::Long64;

    fn for_target(os: OperatingSystem, register: TargetRegister) -> Option<Self> {
        Some(Amd64Register::for_target(os, register))
    }
}

/// Emitter shared by x86 and x64, parameterized over the register file.
#[derive(Debug)]
pub struct X86FamilyEmitter<Reg> {
    builder: ObjectDataBuilder,
    os: OperatingSystem,
    instructions: Vec<Amd64Instruction<Reg>>,
}

pub type X64Emitter = X86FamilyEmitter<Amd64Register>;

impl<Reg: X86FamilyRegister> X86FamilyEmitter<Reg> {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            builder: ObjectDataBuilder::new(platform.pointer_size()),
            os: platform.operating_system(),
            instructions: Vec::new(),
        }
    }

    #[must_use]
    pub fn instructions(&self) -> &[Amd64Instruction<Reg>] {
        &self.instructions
    }

    #[must_use]
    pub const fn native_size(&self) -> AddrModeSize {
        match Reg::MODE {
            CodeMode::Protected32 => AddrModeSize::Int32,
            CodeMode::Long64 => AddrModeSize::Int64,
        }
    }

    pub fn register(&self, register: TargetRegister) -> CodeGenResult<Reg> {
        Reg::for_target(self.os, register).ok_or_else(|| CodeGenError::NotImplemented {
            architecture: Reg::MODE.architecture(),
            operation: format!("passing {register:?} in a register"),
        })
    }

    pub fn emit(&mut self, instruction: Amd64Instruction<Reg>) -> CodeGenResult<()> {
        trace!("    {instruction}");
        instruction.encode(&mut self.builder, Reg::MODE)?;
        self.instructions.push(instruction);
        Ok(())
    }

    pub fn emit_mov(&mut self, dst: Reg, src: &AddrMode<Reg>) -> CodeGenResult<()> {
        self.emit(Amd64Instruction::Mov { dst, src: *src })
    }

    pub fn emit_mov_reg(&mut self, dst: Reg, src: Reg) -> CodeGenResult<()> {
        let src = AddrMode::direct(src).with_size(self.native_size());
        self.emit(Amd64Instruction::Mov { dst, src })
    }

    pub fn emit_lea_symbol(&mut self, dst: Reg, symbol: NodeId, delta: i32) -> CodeGenResult<()> {
        self.emit(Amd64Instruction::LeaSymbol { dst, symbol, delta })
    }

    pub fn emit_jmp_indirect(&mut self, target: &AddrMode<Reg>) -> CodeGenResult<()> {
        self.emit(Amd64Instruction::JmpIndirect { target: *target })
    }

    /// Skips over the `ret` unless the flags say equal.
    pub fn emit_ret_if_equal(&mut self) -> CodeGenResult<()> {
        self.emit(Amd64Instruction::JccShort { condition: Amd64ConditionCode::Equal.invert(), displacement: 1 })?;
        self.emit(Amd64Instruction::Ret)
    }
}

impl<Reg: X86FamilyRegister> TargetEmitter for X86FamilyEmitter<Reg> {
    fn architecture(&self) -> Architecture {
        Reg::MODE.architecture()
    }

    fn builder(&mut self) -> &mut ObjectDataBuilder {
        &mut self.builder
    }

    fn emit_jmp(&mut self, factory: &NodeFactory, target: NodeId) -> CodeGenResult<()> {
        if factory.represents_indirection_cell(target) {
            self.emit(Amd64Instruction::JmpSymbolIndirect { symbol: target })
        } else {
            self.emit(Amd64Instruction::Jmp { symbol: target })
        }
    }

    fn emit_call(&mut self, factory: &NodeFactory, target: NodeId) -> CodeGenResult<()> {
        if factory.represents_indirection_cell(target) {
            self.emit(Amd64Instruction::CallSymbolIndirect { symbol: target })
        } else {
            self.emit(Amd64Instruction::Call { symbol: target })
        }
    }

    fn emit_load_address(&mut self, register: TargetRegister, target: NodeId) -> CodeGenResult<()> {
        let register = self.register(register)?;
        self.emit_lea_symbol(register, target, 0)
    }

    fn emit_load_indirect(&mut self, register: TargetRegister) -> CodeGenResult<()> {
        let register = self.register(register)?;
        let src = AddrMode::new(register).with_size(self.native_size());
        self.emit_mov(register, &src)
    }

    fn emit_move_register(&mut self, dst: TargetRegister, src: TargetRegister) -> CodeGenResult<()> {
        let dst = self.register(dst)?;
        let src = self.register(src)?;
        if dst == src {
            return Ok(());
        }
        self.emit_mov_reg(dst, src)
    }

    fn emit_mov_imm(&mut self, dst: TargetRegister, imm: i64) -> CodeGenResult<()> {
        let dst = self.register(dst)?;
        self.emit(Amd64Instruction::MovImm { dst, imm })
    }

    fn emit_load(&mut self, dst: TargetRegister, base: TargetRegister, offset: i32) -> CodeGenResult<()> {
        let dst = self.register(dst)?;
        let base = self.register(base)?;
        let src = AddrMode::new(base).with_offset(offset).with_size(self.native_size());
        self.emit_mov(dst, &src)
    }

    fn emit_lea(&mut self, dst: TargetRegister, base: TargetRegister, offset: i32) -> CodeGenResult<()> {
        if offset == 0 {
            return self.emit_move_register(dst, base);
        }

        let dst = self.register(dst)?;
        let base = self.register(base)?;
        self.emit(Amd64Instruction::Lea { dst, src: AddrMode::new(base).with_offset(offset) })
    }

    fn emit_add(&mut self, dst: TargetRegister, imm: i32) -> CodeGenResult<()> {
        let dst = AddrMode::direct(self.register(dst)?).with_size(self.native_size());
        self.emit(Amd64Instruction::AddImm { dst, imm })
    }

    fn emit_cmp(&mut self, base: TargetRegister, offset: i32, imm: i32) -> CodeGenResult<()> {
        let base = self.register(base)?;
        let lhs = AddrMode::new(base).with_offset(offset).with_size(AddrModeSize::Int32);
        self.emit(Amd64Instruction::CmpImm { lhs, imm })
    }

    /// The return address is already on the stack, so only `saved` needs a
    /// slot. Pushing it also realigns the stack for calls.
    fn emit_prologue(&mut self, saved: Option<TargetRegister>) -> CodeGenResult<()> {
        match saved {
            Some(register) => {
                let register = self.register(register)?;
                self.emit(Amd64Instruction::Push { register })
            }
            None => Ok(()),
        }
    }

    fn emit_epilogue(&mut self, saved: Option<TargetRegister>) -> CodeGenResult<()> {
        match saved {
            Some(register) => {
                let register = self.register(register)?;
                self.emit(Amd64Instruction::Pop { register })
            }
            None => Ok(()),
        }
    }

    fn emit_ret(&mut self) -> CodeGenResult<()> {
        self.emit(Amd64Instruction::Ret)
    }

    fn emit_int3(&mut self) -> CodeGenResult<()> {
        self.emit(Amd64Instruction::Int3)
    }

    fn finish(self: Box<Self>) -> ObjectData {
        self.builder.to_object_data()
    }
}
