// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::{Display, Write};

use crate::ObjectDataBuilder;

/// A general-purpose register that can appear in a ModRM or SIB byte. Shared
/// by the 32-bit and 64-bit register files.
pub trait ModRmRegister: Copy + PartialEq + Display {
    /// The low three bits of the register number.
    fn mod_rm_bits(&self) -> u8;

    /// Whether REX.R/X/B is needed to reach the register.
    fn is_extended(&self) -> bool;

    fn sized_name(&self, size: AddrModeSize) -> &'static str;
}

/// ModRM low bits that mean "SIB follows" instead of the register.
const RM_SIB: u8 = 0b100;

/// ModRM low bits that need a displacement even when the offset is zero.
const RM_DISP_ONLY: u8 = 0b101;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AddrModeSize {
    Int8,
    Int16,
    Int32,
    #[default]
    Int64,
}

impl AddrModeSize {
    #[must_use]
    pub const fn ptr_name(&self) -> &'static str {
        match self {
            Self::Int8 => "byte ptr",
            Self::Int16 => "word ptr",
            Self::Int32 => "dword ptr",
            Self::Int64 => "qword ptr",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SibScale {
    #[default]
    Scale1,
    Scale2,
    Scale4,
    Scale8,
}

impl SibScale {
    #[must_use]
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Scale1 => 0b00,
            Self::Scale2 => 0b01,
            Self::Scale4 => 0b10,
            Self::Scale8 => 0b11,
        }
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Scale1,
            0b01 => Self::Scale2,
            0b10 => Self::Scale4,
            _ => Self::Scale8,
        }
    }
}

impl Display for SibScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factor = 1 << self.bits();
        factor.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrBase<Reg> {
    /// `[reg + ...]`
    Register(Reg),

    /// The register itself, not memory.
    Direct(Reg),

    /// `[index * scale + offset]` or just `[offset]`.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrMode<Reg> {
    base: AddrBase<Reg>,
    index: Option<Reg>,
    scale: SibScale,
    offset: i32,
    size: AddrModeSize,
}

impl<Reg: ModRmRegister> AddrMode<Reg> {
    #[must_use]
    pub fn new(base: Reg) -> Self {
        Self {
            base: AddrBase::Register(base),
            index: None,
            scale: SibScale::Scale1,
            offset: 0,
            size: AddrModeSize::default(),
        }
    }

    #[must_use]
    pub fn direct(register: Reg) -> Self {
        Self {
            base: AddrBase::Direct(register),
            ..Self::new(register)
        }
    }

    #[must_use]
    pub fn absolute(offset: i32) -> Self {
        Self {
            base: AddrBase::None,
            index: None,
            scale: SibScale::Scale1,
            offset,
            size: AddrModeSize::default(),
        }
    }

    #[must_use]
    pub fn with_index(self, index: Reg, scale: SibScale) -> Self {
        Self {
            index: Some(index),
            scale,
            ..self
        }
    }

    #[must_use]
    pub fn with_offset(self, offset: i32) -> Self {
        Self { offset, ..self }
    }

    #[must_use]
    pub fn with_size(self, size: AddrModeSize) -> Self {
        Self { size, ..self }
    }

    #[must_use]
    pub const fn base(&self) -> AddrBase<Reg> {
        self.base
    }

    #[must_use]
    pub const fn index(&self) -> Option<Reg> {
        self.index
    }

    #[must_use]
    pub const fn scale(&self) -> SibScale {
        self.scale
    }

    #[must_use]
    pub const fn offset(&self) -> i32 {
        self.offset
    }

    #[must_use]
    pub const fn size(&self) -> AddrModeSize {
        self.size
    }

    #[must_use]
    pub const fn is_direct(&self) -> bool {
        matches!(self.base, AddrBase::Direct(..))
    }

    /// REX.X and REX.B for this operand.
    #[must_use]
    pub fn rex_index_and_base(&self) -> (bool, bool) {
        let x = self.index.is_some_and(|x| x.is_extended());
        let b = match self.base {
            AddrBase::Register(reg) | AddrBase::Direct(reg) => reg.is_extended(),
            AddrBase::None => false,
        };
        (x, b)
    }

    /// Emits the ModRM byte, the SIB byte when needed and the displacement.
    /// `reg_field` is either a register number or an opcode extension.
    pub fn encode(&self, builder: &mut ObjectDataBuilder, reg_field: u8) {
        let reg_field = (reg_field & 0b111) << 3;

        let base = match self.base {
            AddrBase::Direct(reg) => {
                builder.emit_byte(0b11_000_000 | reg_field | reg.mod_rm_bits());
                return;
            }
            AddrBase::Register(reg) => Some(reg.mod_rm_bits()),
            AddrBase::None => None,
        };

        if let Some(index) = self.index {
            debug_assert!(index.mod_rm_bits() != RM_SIB || index.is_extended(), "{index} cannot be an index register");
        }

        let needs_sib = self.index.is_some() || base.is_none() || base == Some(RM_SIB);

        let displacement = match base {
            None => Displacement::Disp32,
            Some(bits) if self.offset == 0 && bits != RM_DISP_ONLY => Displacement::None,
            Some(..) if i8::try_from(self.offset).is_ok() => Displacement::Disp8,
            Some(..) => Displacement::Disp32,
        };

        let mode = match (base, displacement) {
            (None, _) | (_, Displacement::None) => 0b00_000_000,
            (_, Displacement::Disp8) => 0b01_000_000,
            (_, Displacement::Disp32) => 0b10_000_000,
        };

        if needs_sib {
            builder.emit_byte(mode | reg_field | RM_SIB);

            let index_bits = self.index.map_or(RM_SIB, |x| x.mod_rm_bits());
            let base_bits = base.unwrap_or(RM_DISP_ONLY);
            builder.emit_byte((self.scale.bits() << 6) | (index_bits << 3) | base_bits);
        } else {
            builder.emit_byte(mode | reg_field | base.unwrap_or(RM_DISP_ONLY));
        }

        match displacement {
            Displacement::None => (),
            Displacement::Disp8 => builder.emit_byte(self.offset as i8 as u8),
            Displacement::Disp32 => builder.emit_int(self.offset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Displacement {
    None,
    Disp8,
    Disp32,
}

impl<Reg: ModRmRegister> Display for AddrMode<Reg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let base = match self.base {
            AddrBase::Direct(reg) => return f.write_str(reg.sized_name(self.size)),
            AddrBase::Register(reg) => Some(reg),
            AddrBase::None => None,
        };

        f.write_str(self.size.ptr_name())?;
        f.write_str(" [")?;

        let mut first = true;
        if let Some(base) = base {
            f.write_str(&base.to_string())?;
            first = false;
        }

        if let Some(index) = self.index {
            if !first {
                f.write_str(" + ")?;
            }
            index.fmt(f)?;
            first = false;

            if self.scale != SibScale::Scale1 {
                f.write_str(" * ")?;
                self.scale.fmt(f)?;
            }
        }

        if first {
            write!(f, "{:#x}", self.offset)?;
        } else if self.offset > 0 {
            write!(f, " + {}", self.offset)?;
        } else if self.offset < 0 {
            write!(f, " - {}", (self.offset as i64).abs())?;
        }

        f.write_char(']')
    }
}
