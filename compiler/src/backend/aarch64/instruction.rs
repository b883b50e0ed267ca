// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use crate::{
    relocation::{fits_signed, take_bits},
    CodeGenError,
    CodeGenResult,
    NodeId,
    RelocType,
};

use super::{
    ArmBranchLocation,
    ArmConditionCode,
    ArmRegister,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmInstruction {
    /// It can be in place if src == dst, but it doesn't have to be
    AddImmediate {
        dst: ArmRegister,
        src: ArmRegister,
        imm12: u16,
        shift: bool,
    },

    /// `add dst, src, :lo12:symbol`
    AddPageOffset {
        dst: ArmRegister,
        src: ArmRegister,
        symbol: NodeId,
    },

    /// `adrp dst, symbol`
    Adrp {
        dst: ArmRegister,
        symbol: NodeId,
    },

    B {
        location: ArmBranchLocation,
    },

    BCond {
        cond: ArmConditionCode,

        /// In bytes, relative to this instruction.
        offset: i32,
    },

    Bl {
        symbol: NodeId,
    },

    Blr {
        register: ArmRegister,
    },

    Br {
        register: ArmRegister,
    },

    Brk {
        imm16: u16,
    },

    CmpImmediate {
        register: ArmRegister,
        value: u16,
        is_64_bit: bool,
    },

    /// `ldp first, second, [sp], #offset`
    LdpPostIndex {
        first: ArmRegister,
        second: ArmRegister,
        offset: i16,
    },

    /// `ldr dst, [base, #offset]`, with the offset scaled by eight.
    LdrImmediate {
        dst: ArmRegister,
        base: ArmRegister,
        offset: u32,
    },

    /// `ldr wN, [base, #offset]`, with the offset scaled by four.
    LdrImmediate32 {
        dst: ArmRegister,
        base: ArmRegister,
        offset: u32,
    },

    /// `ldr dst, [src, :lo12:symbol]`
    LdrPageOffset {
        dst: ArmRegister,
        src: ArmRegister,
        symbol: NodeId,
    },

    MovRegister64 { dst: ArmRegister, src: ArmRegister },

    /// `movz` or, when `keep` is set, `movk` of one 16-bit chunk.
    MovWide {
        dst: ArmRegister,
        imm16: u16,
        shift: u8,
        keep: bool,
    },

    Ret,

    /// `stp first, second, [sp, #offset]!`
    StpPreIndex {
        first: ArmRegister,
        second: ArmRegister,
        offset: i16,
    },

    SubImmediate {
        dst: ArmRegister,
        src: ArmRegister,
        imm12: u16,
    },
}

impl ArmInstruction {
    /// Encodes the tagged union into a plain 32-bits integer. All
    /// instructions in ARM-land are 32-bits. Symbol operands are encoded as
    /// zero and filled in through [`Self::relocation`].
    pub fn encode(&self) -> CodeGenResult<u32> {
        Ok(match *self {
            Self::AddImmediate { dst, src, imm12, shift } => {
                check_imm12("add", imm12 as u32)?;

                let mut instruction = 0x91000000;
                instruction |= (shift as u32) << 22;
                instruction |= (imm12 as u32) << 10;
                instruction |= src.encoding() << 5;
                instruction |= dst.encoding();
                instruction
            }

            Self::AddPageOffset { dst, src, .. } => {
                0x91000000 | (src.encoding() << 5) | dst.encoding()
            }

            Self::Adrp { dst, .. } => {
                0x90000000 | dst.encoding()
            }

            Self::B { location } => {
                let words = match location {
                    ArmBranchLocation::Symbol(..) => 0,
                    ArmBranchLocation::PcRelativeOffset(offset) => branch_words(offset, 26)?,
                };

                0x14000000 | take_bits(words as u32, 26)
            }

            Self::BCond { cond, offset } => {
                let words = branch_words(offset, 19)?;

                let mut instruction = 0x54000000;
                instruction |= cond as u8 as u32;
                instruction |= take_bits(words as u32, 19) << 5;
                instruction
            }

            Self::Bl { .. } => 0x94000000,

            Self::Blr { register } => 0xD63F0000 | (register.encoding() << 5),
            Self::Br { register } => 0xD61F0000 | (register.encoding() << 5),

            Self::Brk { imm16 } => 0xD4200000 | ((imm16 as u32) << 5),

            Self::CmpImmediate { register, value, is_64_bit } => {
                check_imm12("cmp", value as u32)?;

                let mut instruction = if is_64_bit { 0xF100001F } else { 0x7100001F };
                instruction |= register.encoding() << 5;
                instruction |= (value as u32) << 10;
                instruction
            }

            Self::LdpPostIndex { first, second, offset } => {
                0xA8C00000 | pair_offset("ldp", offset)? | pair_registers(first, second)
            }

            Self::LdrImmediate { dst, base, offset } => {
                let imm12 = scaled_offset("ldr", offset, 8)?;
                0xF9400000 | (imm12 << 10) | (base.encoding() << 5) | dst.encoding()
            }

            Self::LdrImmediate32 { dst, base, offset } => {
                let imm12 = scaled_offset("ldr", offset, 4)?;
                0xB9400000 | (imm12 << 10) | (base.encoding() << 5) | dst.encoding()
            }

            Self::LdrPageOffset { dst, src, .. } => {
                0xF9400000 | (src.encoding() << 5) | dst.encoding()
            }

            Self::MovRegister64 { dst, src } => {
                0xAA0003E0 | (src.encoding() << 16) | dst.encoding()
            }

            Self::MovWide { dst, imm16, shift, keep } => {
                if shift % 16 != 0 || shift > 48 {
                    return Err(CodeGenError::ImmediateOutOfRange { operation: "mov", value: shift as i64 });
                }

                let opcode = if keep { 0xF2800000 } else { 0xD2800000 };
                opcode | ((shift as u32 / 16) << 21) | ((imm16 as u32) << 5) | dst.encoding()
            }

            Self::Ret => {
                let rn = ArmRegister::LR;
                0xD65F0000 | (rn.encoding() << 5)
            }

            Self::StpPreIndex { first, second, offset } => {
                0xA9800000 | pair_offset("stp", offset)? | pair_registers(first, second)
            }

            Self::SubImmediate { dst, src, imm12 } => {
                check_imm12("sub", imm12 as u32)?;
                0xD1000000 | ((imm12 as u32) << 10) | (src.encoding() << 5) | dst.encoding()
            }
        })
    }

    /// The relocation that completes the encoded instruction, if any.
    #[must_use]
    pub const fn relocation(&self) -> Option<(NodeId, RelocType)> {
        match *self {
            Self::Adrp { symbol, .. } => Some((symbol, RelocType::Arm64PageBaseRel21)),
            Self::AddPageOffset { symbol, .. } => Some((symbol, RelocType::Arm64PageOffset12A)),
            Self::LdrPageOffset { symbol, .. } => Some((symbol, RelocType::Arm64PageOffset12L)),
            Self::B { location: ArmBranchLocation::Symbol(symbol) } => Some((symbol, RelocType::Arm64Branch26)),
            Self::Bl { symbol } => Some((symbol, RelocType::Arm64Branch26)),
            _ => None,
        }
    }
}

fn check_imm12(operation: &'static str, value: u32) -> CodeGenResult<()> {
    if value >= (1 << 12) {
        return Err(CodeGenError::ImmediateOutOfRange { operation, value: value as i64 });
    }
    Ok(())
}

fn scaled_offset(operation: &'static str, offset: u32, scale: u32) -> CodeGenResult<u32> {
    if offset % scale != 0 {
        return Err(CodeGenError::ImmediateOutOfRange { operation, value: offset as i64 });
    }

    let imm12 = offset / scale;
    check_imm12(operation, imm12).map_err(|_| CodeGenError::ImmediateOutOfRange { operation, value: offset as i64 })?;
    Ok(imm12)
}

/// The scaled, signed 7-bit offset of a 64-bit register pair.
fn pair_offset(operation: &'static str, offset: i16) -> CodeGenResult<u32> {
    if offset % 8 != 0 || !fits_signed((offset / 8) as i64, 7) {
        return Err(CodeGenError::ImmediateOutOfRange { operation, value: offset as i64 });
    }
    Ok(take_bits((offset / 8) as u32, 7) << 15)
}

/// Register pairs always address the stack pointer.
const fn pair_registers(first: ArmRegister, second: ArmRegister) -> u32 {
    (second.encoding() << 10) | (ArmRegister::SP.encoding() << 5) | first.encoding()
}

fn branch_words(offset: i32, bits: u32) -> CodeGenResult<i32> {
    if offset % 4 != 0 || !fits_signed((offset / 4) as i64, bits) {
        return Err(CodeGenError::BranchOutOfRange { displacement: offset as i64, bits });
    }
    Ok(offset / 4)
}

impl Display for ArmInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddImmediate { dst, src, imm12, shift } => {
                write!(f, "add {dst}, {src}, #{imm12}")?;

                if *shift {
                    f.write_str(", lsl 12")?;
                }

                Ok(())
            }

            Self::AddPageOffset { dst, src, symbol } => write!(f, "add {dst}, {src}, :lo12:{symbol}"),
            Self::Adrp { dst, symbol } => write!(f, "adrp {dst}, {symbol}"),
            Self::B { location } => write!(f, "b {location}"),
            Self::BCond { cond, offset } => write!(f, "b.{cond} {offset:+}"),
            Self::Bl { symbol } => write!(f, "bl {symbol}"),
            Self::Blr { register } => write!(f, "blr {register}"),
            Self::Br { register } => write!(f, "br {register}"),
            Self::Brk { imm16 } => write!(f, "brk #{imm16}"),

            Self::CmpImmediate { register, value, is_64_bit: true } => write!(f, "cmp {register}, #{value}"),
            Self::CmpImmediate { register, value, is_64_bit: false } => write!(f, "cmp w{}, #{value}", register.number()),

            Self::LdpPostIndex { first, second, offset } => write!(f, "ldp {first}, {second}, [sp], #{offset}"),
            Self::LdrImmediate { dst, base, offset } => write!(f, "ldr {dst}, [{base}, #{offset}]"),
            Self::LdrImmediate32 { dst, base, offset } => write!(f, "ldr w{}, [{base}, #{offset}]", dst.number()),
            Self::LdrPageOffset { dst, src, symbol } => write!(f, "ldr {dst}, [{src}, :lo12:{symbol}]"),

            Self::MovRegister64 { dst, src } => write!(f, "mov {dst}, {src}"),
            Self::MovWide { dst, imm16, shift, keep } => {
                write!(f, "{} {dst}, #{imm16:#x}", if *keep { "movk" } else { "movz" })?;
                if *shift != 0 {
                    write!(f, ", lsl #{shift}")?;
                }
                Ok(())
            }
            Self::Ret => f.write_str("ret"),
            Self::StpPreIndex { first, second, offset } => write!(f, "stp {first}, {second}, [sp, #{offset}]!"),
            Self::SubImmediate { dst, src, imm12 } => write!(f, "sub {dst}, {src}, #{imm12}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ArmInstruction::Ret, 0xD65F03C0)]
    #[case(ArmInstruction::Br { register: ArmRegister::IP0 }, 0xD61F0200)]
    #[case(ArmInstruction::Blr { register: ArmRegister::IP0 }, 0xD63F0200)]
    #[case(ArmInstruction::Brk { imm16: 0 }, 0xD4200000)]
    #[case(ArmInstruction::MovRegister64 { dst: ArmRegister::X1, src: ArmRegister::X0 }, 0xAA0003E1)]
    #[case(ArmInstruction::LdrImmediate { dst: ArmRegister::IP0, base: ArmRegister::X0, offset: 0 }, 0xF9400010)]
    #[case(ArmInstruction::LdrImmediate { dst: ArmRegister::IP0, base: ArmRegister::IP0, offset: 24 }, 0xF9400E10)]
    #[case(ArmInstruction::LdrImmediate32 { dst: ArmRegister::X3, base: ArmRegister::X2, offset: 8 }, 0xB9400843)]
    #[case(ArmInstruction::CmpImmediate { register: ArmRegister::X3, value: 1, is_64_bit: false }, 0x7100047F)]
    #[case(ArmInstruction::CmpImmediate { register: ArmRegister::X3, value: 1, is_64_bit: true }, 0xF100047F)]
    #[case(ArmInstruction::SubImmediate { dst: ArmRegister::X2, src: ArmRegister::X0, imm12: 16 }, 0xD1004002)]
    #[case(ArmInstruction::AddImmediate { dst: ArmRegister::X0, src: ArmRegister::X0, imm12: 1, shift: false }, 0x91000400)]
    #[case(ArmInstruction::BCond { cond: ArmConditionCode::NE, offset: 8 }, 0x54000041)]
    #[case(ArmInstruction::BCond { cond: ArmConditionCode::EQ, offset: -4 }, 0x54FFFFE0)]
    #[case(ArmInstruction::B { location: ArmBranchLocation::PcRelativeOffset(-8) }, 0x17FFFFFE)]
    #[case(ArmInstruction::MovWide { dst: ArmRegister::X0, imm16: 1, shift: 0, keep: false }, 0xD2800020)]
    #[case(ArmInstruction::MovWide { dst: ArmRegister::X0, imm16: 0x1234, shift: 16, keep: true }, 0xF2A24680)]
    #[case(ArmInstruction::StpPreIndex { first: ArmRegister::FP, second: ArmRegister::LR, offset: -16 }, 0xA9BF7BFD)]
    #[case(ArmInstruction::StpPreIndex { first: ArmRegister::X19, second: ArmRegister::LR, offset: -16 }, 0xA9BF7BF3)]
    #[case(ArmInstruction::LdpPostIndex { first: ArmRegister::FP, second: ArmRegister::LR, offset: 16 }, 0xA8C17BFD)]
    #[case(ArmInstruction::LdpPostIndex { first: ArmRegister::X19, second: ArmRegister::LR, offset: 16 }, 0xA8C17BF3)]
    fn check_encoding(#[case] input: ArmInstruction, #[case] expected: u32) {
        let actual = input.encode().unwrap();
        assert_eq!(actual, expected, "actual {actual:#010x} wasn't the expected {expected:#010x}! Instruction was: {input}");
        assert_eq!(input.relocation(), None);
    }

    #[rstest]
    #[case(ArmInstruction::Adrp { dst: ArmRegister::X0, symbol: NodeId::new(3) }, 0x90000000, RelocType::Arm64PageBaseRel21)]
    #[case(ArmInstruction::AddPageOffset { dst: ArmRegister::X0, src: ArmRegister::X0, symbol: NodeId::new(3) }, 0x91000000, RelocType::Arm64PageOffset12A)]
    #[case(ArmInstruction::LdrPageOffset { dst: ArmRegister::IP0, src: ArmRegister::IP0, symbol: NodeId::new(3) }, 0xF9400210, RelocType::Arm64PageOffset12L)]
    #[case(ArmInstruction::B { location: ArmBranchLocation::Symbol(NodeId::new(3)) }, 0x14000000, RelocType::Arm64Branch26)]
    #[case(ArmInstruction::Bl { symbol: NodeId::new(3) }, 0x94000000, RelocType::Arm64Branch26)]
    fn symbol_operands_are_relocated(#[case] input: ArmInstruction, #[case] expected: u32, #[case] kind: RelocType) {
        assert_eq!(input.encode().unwrap(), expected);
        assert_eq!(input.relocation(), Some((NodeId::new(3), kind)));
    }

    #[rstest]
    #[case(ArmInstruction::LdrImmediate { dst: ArmRegister::X0, base: ArmRegister::X0, offset: 12 })]
    #[case(ArmInstruction::LdrImmediate { dst: ArmRegister::X0, base: ArmRegister::X0, offset: 8 * 4096 })]
    #[case(ArmInstruction::SubImmediate { dst: ArmRegister::X0, src: ArmRegister::X0, imm12: 4096 })]
    #[case(ArmInstruction::MovWide { dst: ArmRegister::X0, imm16: 1, shift: 8, keep: false })]
    #[case(ArmInstruction::StpPreIndex { first: ArmRegister::X19, second: ArmRegister::LR, offset: -12 })]
    #[case(ArmInstruction::LdpPostIndex { first: ArmRegister::X19, second: ArmRegister::LR, offset: 512 })]
    fn unencodable_immediates(#[case] input: ArmInstruction) {
        assert!(matches!(input.encode(), Err(CodeGenError::ImmediateOutOfRange { .. })));
    }

    #[test]
    fn unaligned_branch() {
        let result = ArmInstruction::BCond { cond: ArmConditionCode::NE, offset: 6 }.encode();
        assert_eq!(result, Err(CodeGenError::BranchOutOfRange { displacement: 6, bits: 19 }));
    }
}
