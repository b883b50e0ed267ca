// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use crate::{backend::{amd64::{AddrModeSize, CodeMode, ModRmRegister, X86FamilyRegister}, TargetRegister}, OperatingSystem};

/// The eight general purpose registers of 32-bit x86, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum X86Register {
    Eax,
    Ecx,
    Edx,
    Ebx,
    Esp,
    Ebp,
    Esi,
    Edi,
}

impl X86Register {
    pub const ALL: [Self; 8] = [
        Self::Eax, Self::Ecx, Self::Edx, Self::Ebx, Self::Esp, Self::Ebp, Self::Esi, Self::Edi,
    ];

    #[must_use]
    pub const fn name(&self, size: AddrModeSize) -> &'static str {
        const NAMES: [[&str; 3]; 8] = [
            ["eax", "ax", "al"],
            ["ecx", "cx", "cl"],
            ["edx", "dx", "dl"],
            ["ebx", "bx", "bl"],
            ["esp", "sp", "ah"],
            ["ebp", "bp", "ch"],
            ["esi", "si", "dh"],
            ["edi", "di", "bh"],
        ];

        let column = match size {
            AddrModeSize::Int8 => 2,
            AddrModeSize::Int16 => 1,
            AddrModeSize::Int32 | AddrModeSize::Int64 => 0,
        };

        NAMES[*self as usize][column]
    }
}

impl ModRmRegister for X86Register {
    fn mod_rm_bits(&self) -> u8 {
        *self as u8
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn sized_name(&self, size: AddrModeSize) -> &'static str {
        self.name(size)
    }
}

impl X86FamilyRegister for X86Register {
    const MODE: CodeMode = CodeMode::Protected32;

    /// Helpers use the fastcall registers. Everything past the second
    /// argument lives on the stack.
    fn for_target(_: OperatingSystem, register: TargetRegister) -> Option<Self> {
        match register {
            TargetRegister::Arg0 => Some(Self::Ecx),
            TargetRegister::Arg1 => Some(Self::Edx),
            TargetRegister::Result => Some(Self::Eax),
            TargetRegister::GenericContext => Some(Self::Ebx),
            TargetRegister::Arg2 | TargetRegister::Arg3 => None,
        }
    }
}

impl Display for X86Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name(AddrModeSize::Int32))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(X86Register::Eax, 0)]
    #[case(X86Register::Esp, 4)]
    #[case(X86Register::Edi, 7)]
    fn encoding_order(#[case] register: X86Register, #[case] bits: u8) {
        assert_eq!(register.mod_rm_bits(), bits);
    }

    #[test]
    fn stack_passed_arguments_have_no_register() {
        assert_eq!(X86Register::for_target(OperatingSystem::Windows, TargetRegister::Arg2), None);
        assert_eq!(X86Register::for_target(OperatingSystem::Linux, TargetRegister::Arg1), Some(X86Register::Edx));
    }
}
