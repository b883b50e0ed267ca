// Copyright (C) 2024 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amd64ConditionCode {
    Equal,
    NotEqual,
    Less,
    GreaterOrEqual,
}

impl Amd64ConditionCode {
    /// The `Jcc rel8` opcode.
    #[must_use]
    pub const fn jcc_short_code(&self) -> u8 {
        match self {
            Self::Equal => 0x74,
            Self::NotEqual => 0x75,
            Self::Less => 0x7c,
            Self::GreaterOrEqual => 0x7d,
        }
    }

    #[must_use]
    pub const fn invert(&self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::Less => Self::GreaterOrEqual,
            Self::GreaterOrEqual => Self::Less,
        }
    }
}

impl Display for Amd64ConditionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => f.write_str("e"),
            Self::NotEqual => f.write_str("ne"),
            Self::Less => f.write_str("l"),
            Self::GreaterOrEqual => f.write_str("ge"),
        }
    }
}
