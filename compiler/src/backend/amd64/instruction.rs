// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use crate::{Architecture, CodeGenError, CodeGenResult, NodeId, ObjectDataBuilder, RelocType};

use super::{AddrMode, AddrModeSize, Amd64ConditionCode, ModRmRegister};

/// Legacy 32-bit mode and 64-bit long mode share one encoder; they only
/// differ in REX availability and in what `[disp32]` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMode {
    Protected32,
    Long64,
}

impl CodeMode {
    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        match self {
            Self::Protected32 => Architecture::X86,
            Self::Long64 => Architecture::X64,
        }
    }

    /// How a symbol operand is relocated: RIP-relative in long mode, an
    /// absolute address otherwise.
    #[must_use]
    pub const fn symbol_reloc(&self) -> RelocType {
        match self {
            Self::Protected32 => RelocType::HighLow,
            Self::Long64 => RelocType::Rel32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amd64Instruction<Reg> {
    /// `mov dst, src`, a direct `src` makes this a register move.
    Mov { dst: Reg, src: AddrMode<Reg> },
    MovToMemory { dst: AddrMode<Reg>, src: Reg },
    MovImm { dst: Reg, imm: i64 },
    Lea { dst: Reg, src: AddrMode<Reg> },
    LeaSymbol { dst: Reg, symbol: NodeId, delta: i32 },
    AddImm { dst: AddrMode<Reg>, imm: i32 },
    CmpImm { lhs: AddrMode<Reg>, imm: i32 },
    Jmp { symbol: NodeId },
    JmpSymbolIndirect { symbol: NodeId },
    JmpIndirect { target: AddrMode<Reg> },
    Call { symbol: NodeId },
    CallSymbolIndirect { symbol: NodeId },
    CallIndirect { target: AddrMode<Reg> },
    JccShort { condition: Amd64ConditionCode, displacement: i8 },
    Push { register: Reg },
    Pop { register: Reg },
    Ret,
    Int3,
}

impl<Reg: ModRmRegister> Amd64Instruction<Reg> {
    pub fn encode(&self, builder: &mut ObjectDataBuilder, mode: CodeMode) -> CodeGenResult<()> {
        match self {
            Self::Mov { dst, src } => {
                emit_prefixes(builder, mode, src.size(), Some(*dst), Some(src))?;
                builder.emit_byte(if src.size() == AddrModeSize::Int8 { 0x8A } else { 0x8B });
                src.encode(builder, dst.mod_rm_bits());
            }

            Self::MovToMemory { dst, src } => {
                emit_prefixes(builder, mode, dst.size(), Some(*src), Some(dst))?;
                builder.emit_byte(if dst.size() == AddrModeSize::Int8 { 0x88 } else { 0x89 });
                dst.encode(builder, src.mod_rm_bits());
            }

            Self::MovImm { dst, imm } => {
                let imm = *imm;
                let operand = AddrMode::direct(*dst);

                if let Ok(value) = u32::try_from(imm) {
                    // Writing the 32-bit register zero-extends in long mode.
                    emit_prefixes(builder, mode, AddrModeSize::Int32, None, Some(&operand))?;
                    builder.emit_byte(0xB8 + dst.mod_rm_bits());
                    builder.emit_uint(value);
                } else if let Ok(value) = i32::try_from(imm) {
                    if mode == CodeMode::Protected32 {
                        builder.emit_byte(0xB8 + dst.mod_rm_bits());
                    } else {
                        emit_prefixes(builder, mode, AddrModeSize::Int64, None, Some(&operand))?;
                        builder.emit_byte(0xC7);
                        operand.encode(builder, 0);
                    }
                    builder.emit_int(value);
                } else if mode == CodeMode::Long64 {
                    emit_prefixes(builder, mode, AddrModeSize::Int64, None, Some(&operand))?;
                    builder.emit_byte(0xB8 + dst.mod_rm_bits());
                    builder.emit_long(imm);
                } else {
                    return Err(CodeGenError::ImmediateOutOfRange { operation: "mov", value: imm });
                }
            }

            Self::Lea { dst, src } => {
                debug_assert!(!src.is_direct(), "lea needs a memory operand");
                emit_prefixes(builder, mode, native_size(mode), Some(*dst), Some(src))?;
                builder.emit_byte(0x8D);
                src.encode(builder, dst.mod_rm_bits());
            }

            Self::LeaSymbol { dst, symbol, delta } => {
                emit_prefixes(builder, mode, native_size(mode), Some(*dst), None)?;
                builder.emit_byte(0x8D);
                emit_symbol_operand(builder, mode, dst.mod_rm_bits(), *symbol, *delta);
            }

            Self::AddImm { dst, imm } => emit_group1(builder, mode, 0, dst, *imm)?,
            Self::CmpImm { lhs, imm } => emit_group1(builder, mode, 7, lhs, *imm)?,

            Self::Jmp { symbol } => {
                builder.emit_byte(0xE9);
                builder.emit_reloc(*symbol, RelocType::Rel32, 0);
            }

            Self::JmpSymbolIndirect { symbol } => {
                builder.emit_byte(0xFF);
                emit_symbol_operand(builder, mode, 4, *symbol, 0);
            }

            Self::JmpIndirect { target } => {
                // The operand size of near branches is the native width.
                emit_prefixes(builder, mode, AddrModeSize::Int32, None, Some(target))?;
                builder.emit_byte(0xFF);
                target.encode(builder, 4);
            }

            Self::Call { symbol } => {
                builder.emit_byte(0xE8);
                builder.emit_reloc(*symbol, RelocType::Rel32, 0);
            }

            Self::CallSymbolIndirect { symbol } => {
                builder.emit_byte(0xFF);
                emit_symbol_operand(builder, mode, 2, *symbol, 0);
            }

            Self::CallIndirect { target } => {
                emit_prefixes(builder, mode, AddrModeSize::Int32, None, Some(target))?;
                builder.emit_byte(0xFF);
                target.encode(builder, 2);
            }

            Self::JccShort { condition, displacement } => {
                builder.emit_byte(condition.jcc_short_code());
                builder.emit_byte(*displacement as u8);
            }

            Self::Push { register } => {
                // Always the native width, so only REX.B is ever needed.
                emit_prefixes(builder, mode, AddrModeSize::Int32, None, Some(&AddrMode::direct(*register)))?;
                builder.emit_byte(0x50 + register.mod_rm_bits());
            }

            Self::Pop { register } => {
                emit_prefixes(builder, mode, AddrModeSize::Int32, None, Some(&AddrMode::direct(*register)))?;
                builder.emit_byte(0x58 + register.mod_rm_bits());
            }

            Self::Ret => builder.emit_byte(0xC3),
            Self::Int3 => builder.emit_byte(0xCC),
        }

        Ok(())
    }
}

const fn native_size(mode: CodeMode) -> AddrModeSize {
    match mode {
        CodeMode::Protected32 => AddrModeSize::Int32,
        CodeMode::Long64 => AddrModeSize::Int64,
    }
}

#[must_use]
const fn register_extension(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0b0100_0000
        | ((w as u8) << 3)
        | ((r as u8) << 2)
        | ((x as u8) << 1)
        | (b as u8)
}

/// Emits the operand-size prefix and the REX prefix, when needed.
fn emit_prefixes<Reg: ModRmRegister>(
    builder: &mut ObjectDataBuilder,
    mode: CodeMode,
    size: AddrModeSize,
    reg: Option<Reg>,
    operand: Option<&AddrMode<Reg>>,
) -> CodeGenResult<()> {
    if size == AddrModeSize::Int16 {
        builder.emit_byte(0x66);
    }

    let w = size == AddrModeSize::Int64;
    let r = reg.is_some_and(|x| x.is_extended());
    let (x, b) = operand.map_or((false, false), |x| x.rex_index_and_base());

    if !(w || r || x || b) {
        return Ok(());
    }

    if mode == CodeMode::Protected32 {
        return Err(CodeGenError::NotImplemented {
            architecture: mode.architecture(),
            operation: "64-bit operands".into(),
        });
    }

    builder.emit_byte(register_extension(w, r, x, b));
    Ok(())
}

/// `[rip + symbol]` in long mode, `[symbol]` in 32-bit mode.
fn emit_symbol_operand(builder: &mut ObjectDataBuilder, mode: CodeMode, reg_field: u8, symbol: NodeId, delta: i32) {
    builder.emit_byte(((reg_field & 0b111) << 3) | 0b101);
    builder.emit_reloc(symbol, mode.symbol_reloc(), delta);
}

/// ADD, CMP and friends with an immediate: `80 /n ib`, `83 /n ib` or `81 /n id`.
fn emit_group1<Reg: ModRmRegister>(
    builder: &mut ObjectDataBuilder,
    mode: CodeMode,
    extension: u8,
    operand: &AddrMode<Reg>,
    imm: i32,
) -> CodeGenResult<()> {
    emit_prefixes(builder, mode, operand.size(), None, Some(operand))?;

    if operand.size() == AddrModeSize::Int8 {
        let imm = i8::try_from(imm)
            .or_else(|_| u8::try_from(imm).map(|x| x as i8))
            .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "8-bit arithmetic", value: imm as i64 })?;

        builder.emit_byte(0x80);
        operand.encode(builder, extension);
        builder.emit_byte(imm as u8);
    } else if let Ok(imm) = i8::try_from(imm) {
        builder.emit_byte(0x83);
        operand.encode(builder, extension);
        builder.emit_byte(imm as u8);
    } else {
        builder.emit_byte(0x81);
        operand.encode(builder, extension);
        if operand.size() == AddrModeSize::Int16 {
            let imm = i16::try_from(imm)
                .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "16-bit arithmetic", value: imm as i64 })?;
            builder.emit_short(imm as u16);
        } else {
            builder.emit_int(imm);
        }
    }

    Ok(())
}

impl<Reg: ModRmRegister> Display for Amd64Instruction<Reg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mov { dst, src } => write!(f, "mov {}, {src}", dst.sized_name(src.size())),
            Self::MovToMemory { dst, src } => write!(f, "mov {dst}, {}", src.sized_name(dst.size())),
            Self::MovImm { dst, imm } => write!(f, "mov {dst}, {imm:#x}"),
            Self::Lea { dst, src } => write!(f, "lea {dst}, {src}"),
            Self::LeaSymbol { dst, symbol, delta: 0 } => write!(f, "lea {dst}, [{symbol}]"),
            Self::LeaSymbol { dst, symbol, delta } => write!(f, "lea {dst}, [{symbol} + {delta}]"),
            Self::AddImm { dst, imm } => write!(f, "add {dst}, {imm}"),
            Self::CmpImm { lhs, imm } => write!(f, "cmp {lhs}, {imm}"),
            Self::Jmp { symbol } => write!(f, "jmp {symbol}"),
            Self::JmpSymbolIndirect { symbol } => write!(f, "jmp [{symbol}]"),
            Self::JmpIndirect { target } => write!(f, "jmp {target}"),
            Self::Call { symbol } => write!(f, "call {symbol}"),
            Self::CallSymbolIndirect { symbol } => write!(f, "call [{symbol}]"),
            Self::CallIndirect { target } => write!(f, "call {target}"),
            Self::JccShort { condition, displacement } => write!(f, "j{condition} {displacement:+}"),
            Self::Push { register } => write!(f, "push {register}"),
            Self::Pop { register } => write!(f, "pop {register}"),
            Self::Ret => f.write_str("ret"),
            Self::Int3 => f.write_str("int3"),
        }
    }
}
