// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

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
    Platform,
};

use super::{ArmBranchLocation, ArmConditionCode, ArmInstruction, ArmRegister};

#[derive(Debug)]
pub struct Arm64Emitter {
    builder: ObjectDataBuilder,
    instructions: Vec<ArmInstruction>,
}

impl Arm64Emitter {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            builder: ObjectDataBuilder::new(platform.pointer_size()),
            instructions: Vec::new(),
        }
    }

    #[must_use]
    pub fn instructions(&self) -> &[ArmInstruction] {
        &self.instructions
    }

    pub fn emit(&mut self, instruction: ArmInstruction) -> CodeGenResult<()> {
        trace!("    {instruction}");
        let word = instruction.encode()?;

        if let Some((target, kind)) = instruction.relocation() {
            self.builder.add_reloc(target, kind);
        }
        self.builder.emit_uint(word);

        self.instructions.push(instruction);
        Ok(())
    }

    /// `adrp` and `add` of the page offset.
    pub fn emit_lea_symbol(&mut self, dst: ArmRegister, symbol: NodeId) -> CodeGenResult<()> {
        self.emit(ArmInstruction::Adrp { dst, symbol })?;
        self.emit(ArmInstruction::AddPageOffset { dst, src: dst, symbol })
    }

    /// Loads the pointer stored at `symbol` into `dst`.
    pub fn emit_load_symbol(&mut self, dst: ArmRegister, symbol: NodeId) -> CodeGenResult<()> {
        self.emit(ArmInstruction::Adrp { dst, symbol })?;
        self.emit(ArmInstruction::LdrPageOffset { dst, src: dst, symbol })
    }

    pub fn emit_ldr(&mut self, dst: ArmRegister, base: ArmRegister, offset: u32) -> CodeGenResult<()> {
        self.emit(ArmInstruction::LdrImmediate { dst, base, offset })
    }

    pub fn emit_mov(&mut self, dst: ArmRegister, src: ArmRegister) -> CodeGenResult<()> {
        if dst == src {
            return Ok(());
        }
        self.emit(ArmInstruction::MovRegister64 { dst, src })
    }

    pub fn emit_br(&mut self, register: ArmRegister) -> CodeGenResult<()> {
        self.emit(ArmInstruction::Br { register })
    }

    /// Skips over the `ret` unless the flags say equal.
    pub fn emit_ret_if_equal(&mut self) -> CodeGenResult<()> {
        self.emit(ArmInstruction::BCond { cond: ArmConditionCode::EQ.invert(), offset: 8 })?;
        self.emit(ArmInstruction::Ret)
    }
}

impl TargetEmitter for Arm64Emitter {
    fn architecture(&self) -> Architecture {
        Architecture::AArch64
    }

    fn builder(&mut self) -> &mut ObjectDataBuilder {
        &mut self.builder
    }

    fn emit_jmp(&mut self, factory: &NodeFactory, target: NodeId) -> CodeGenResult<()> {
        if factory.represents_indirection_cell(target) {
            self.emit_load_symbol(ArmRegister::IP0, target)?;
            self.emit_br(ArmRegister::IP0)
        } else {
            self.emit(ArmInstruction::B { location: ArmBranchLocation::Symbol(target) })
        }
    }

    fn emit_call(&mut self, factory: &NodeFactory, target: NodeId) -> CodeGenResult<()> {
        if factory.represents_indirection_cell(target) {
            self.emit_load_symbol(ArmRegister::IP0, target)?;
            self.emit(ArmInstruction::Blr { register: ArmRegister::IP0 })
        } else {
            self.emit(ArmInstruction::Bl { symbol: target })
        }
    }

    fn emit_load_address(&mut self, register: TargetRegister, target: NodeId) -> CodeGenResult<()> {
        self.emit_lea_symbol(ArmRegister::for_target(register), target)
    }

    fn emit_load_indirect(&mut self, register: TargetRegister) -> CodeGenResult<()> {
        let register = ArmRegister::for_target(register);
        self.emit_ldr(register, register, 0)
    }

    fn emit_move_register(&mut self, dst: TargetRegister, src: TargetRegister) -> CodeGenResult<()> {
        self.emit_mov(ArmRegister::for_target(dst), ArmRegister::for_target(src))
    }

    /// One `movz` and a `movk` for every further non-zero chunk.
    fn emit_mov_imm(&mut self, dst: TargetRegister, imm: i64) -> CodeGenResult<()> {
        let dst = ArmRegister::for_target(dst);
        let value = imm as u64;
        let chunks: Vec<(u8, u16)> = [0, 16, 32, 48].into_iter()
            .map(|shift| (shift, (value >> shift) as u16))
            .filter(|(_, imm16)| *imm16 != 0)
            .collect();

        if chunks.is_empty() {
            return self.emit(ArmInstruction::MovWide { dst, imm16: 0, shift: 0, keep: false });
        }

        for (index, (shift, imm16)) in chunks.into_iter().enumerate() {
            self.emit(ArmInstruction::MovWide { dst, imm16, shift, keep: index != 0 })?;
        }
        Ok(())
    }

    fn emit_load(&mut self, dst: TargetRegister, base: TargetRegister, offset: i32) -> CodeGenResult<()> {
        let offset = u32::try_from(offset)
            .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "ldr", value: offset as i64 })?;
        self.emit_ldr(ArmRegister::for_target(dst), ArmRegister::for_target(base), offset)
    }

    fn emit_lea(&mut self, dst: TargetRegister, base: TargetRegister, offset: i32) -> CodeGenResult<()> {
        let dst = ArmRegister::for_target(dst);
        let src = ArmRegister::for_target(base);
        let imm12 = u16::try_from(offset.unsigned_abs())
            .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "add", value: offset as i64 })?;

        if offset == 0 {
            self.emit_mov(dst, src)
        } else if offset < 0 {
            self.emit(ArmInstruction::SubImmediate { dst, src, imm12 })
        } else {
            self.emit(ArmInstruction::AddImmediate { dst, src, imm12, shift: false })
        }
    }

    fn emit_add(&mut self, dst: TargetRegister, imm: i32) -> CodeGenResult<()> {
        self.emit_lea(dst, dst, imm)
    }

    /// Loads the value into the scratch register first, there is no compare
    /// with a memory operand.
    fn emit_cmp(&mut self, base: TargetRegister, offset: i32, imm: i32) -> CodeGenResult<()> {
        let offset = u32::try_from(offset)
            .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "ldr", value: offset as i64 })?;
        let value = u16::try_from(imm)
            .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "cmp", value: imm as i64 })?;

        let base = ArmRegister::for_target(base);
        self.emit(ArmInstruction::LdrImmediate32 { dst: ArmRegister::IP0, base, offset })?;
        self.emit(ArmInstruction::CmpImmediate { register: ArmRegister::IP0, value, is_64_bit: false })
    }

    /// `bl` overwrites the link register, so it is always saved. `saved`
    /// takes the other half of the pair, the frame pointer otherwise.
    fn emit_prologue(&mut self, saved: Option<TargetRegister>) -> CodeGenResult<()> {
        let first = saved.map_or(ArmRegister::FP, ArmRegister::for_target);
        self.emit(ArmInstruction::StpPreIndex { first, second: ArmRegister::LR, offset: -16 })
    }

    fn emit_epilogue(&mut self, saved: Option<TargetRegister>) -> CodeGenResult<()> {
        let first = saved.map_or(ArmRegister::FP, ArmRegister::for_target);
        self.emit(ArmInstruction::LdpPostIndex { first, second: ArmRegister::LR, offset: 16 })
    }

    fn emit_ret(&mut self) -> CodeGenResult<()> {
        self.emit(ArmInstruction::Ret)
    }

    fn emit_int3(&mut self) -> CodeGenResult<()> {
        self.emit(ArmInstruction::Brk { imm16: 0 })
    }

    fn finish(self: Box<Self>) -> ObjectData {
        self.builder.to_object_data()
    }
}
