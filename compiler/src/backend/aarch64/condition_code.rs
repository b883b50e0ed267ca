// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

/// **Reference:** [Arm® Architecture Reference Manual for A-profile architecture](arm) \
/// **Section:** C1.2.4 Condition code \
///
/// [arm]: https://developer.arm.com/documentation/ddi0487/latest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArmConditionCode {
    /// Z == 1
    EQ = 0b0000,

    /// Z == 0
    NE = 0b0001,

    /// N == V
    GE = 0b1010,

    /// N != V
    LT = 0b1011,
}

impl ArmConditionCode {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EQ => "eq",
            Self::NE => "ne",
            Self::GE => "ge",
            Self::LT => "lt",
        }
    }

    /// Conditions come in pairs that only differ in the lowest bit.
    #[must_use]
    pub const fn invert(&self) -> Self {
        match self {
            Self::EQ => Self::NE,
            Self::NE => Self::EQ,
            Self::GE => Self::LT,
            Self::LT => Self::GE,
        }
    }
}

impl Display for ArmConditionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ArmConditionCode::EQ)]
    #[case(ArmConditionCode::NE)]
    #[case(ArmConditionCode::GE)]
    #[case(ArmConditionCode::LT)]
    fn inverting_flips_the_lowest_bit(#[case] cond: ArmConditionCode) {
        assert_eq!(cond.invert() as u8, cond as u8 ^ 1);
        assert_eq!(cond.invert().invert(), cond);
    }
}
