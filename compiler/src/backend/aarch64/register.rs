// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use crate::backend::TargetRegister;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmRegister {
    pub(super) number: u8,
}

impl ArmRegister {
    pub const X0: Self = Self { number: 0 };
    pub const X1: Self = Self { number: 1 };
    pub const X2: Self = Self { number: 2 };
    pub const X3: Self = Self { number: 3 };

    /// Intra-procedure-call scratch register, free to clobber in stubs.
    pub const IP0: Self = Self { number: 16 };

    /// The first callee-saved register.
    pub const X19: Self = Self { number: 19 };

    /// Frame Pointer
    pub const FP: Self = Self { number: 29 };

    /// Link Register
    pub const LR: Self = Self { number: 30 };

    /// Stack Pointer, or the zero register depending on the instruction.
    pub const SP: Self = Self { number: 31 };

    #[must_use]
    pub const fn number(&self) -> u8 {
        self.number
    }

    /// AAPCS64: arguments in x0 to x7, the result in x0.
    #[must_use]
    pub const fn for_target(register: TargetRegister) -> Self {
        match register {
            TargetRegister::Arg0 | TargetRegister::Result => Self::X0,
            TargetRegister::Arg1 => Self::X1,
            TargetRegister::Arg2 => Self::X2,
            TargetRegister::Arg3 => Self::X3,
            TargetRegister::GenericContext => Self::X19,
        }
    }

    #[must_use]
    pub const fn encoding(&self) -> u32 {
        self.number as u32
    }
}

impl Display for ArmRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::FP => f.write_str("fp"),
            Self::LR => f.write_str("lr"),
            Self::SP => f.write_str("sp"),

            _ => {
                f.write_str("x")?;
                self.number.fmt(f)
            }
        }
    }
}
