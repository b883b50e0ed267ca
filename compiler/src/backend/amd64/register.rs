// Copyright (C) 2024 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use crate::{backend::TargetRegister, OperatingSystem};

use super::{AddrModeSize, ModRmRegister};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Amd64Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Amd64Register {
    pub const ALL: [Self; 16] = [
        Self::Rax, Self::Rbx, Self::Rcx, Self::Rdx, Self::Rsi, Self::Rdi, Self::Rbp, Self::Rsp,
        Self::R8, Self::R9, Self::R10, Self::R11, Self::R12, Self::R13, Self::R14, Self::R15,
    ];

    #[must_use]
    pub const fn name64(&self) -> &'static str {
        self.name(Amd64RegisterNameMode::Quad)
    }

    #[must_use]
    pub const fn name32(&self) -> &'static str {
        self.name(Amd64RegisterNameMode::Long)
    }

    #[must_use]
    pub const fn is_64_extended_register(&self) -> bool {
        matches!(self, Self::R8 | Self::R9 | Self::R10 | Self::R11 | Self::R12 | Self::R13 | Self::R14 | Self::R15)
    }

    #[must_use]
    pub const fn mod_rm_bits(&self) -> u8 {
        match self {
            Self::Rax | Self::R8 => 0b000,
            Self::Rcx | Self::R9 => 0b001,
            Self::Rdx | Self::R10 => 0b010,
            Self::Rbx | Self::R11 => 0b011,
            Self::Rsp | Self::R12 => 0b100,
            Self::Rbp | Self::R13 => 0b101,
            Self::Rsi | Self::R14 => 0b110,
            Self::Rdi | Self::R15 => 0b111,
        }
    }

    /// The calling convention registers: Microsoft x64 on Windows, System V
    /// everywhere else.
    #[must_use]
    pub const fn for_target(os: OperatingSystem, register: TargetRegister) -> Self {
        match (os, register) {
            (_, TargetRegister::Result) => Self::Rax,
            (_, TargetRegister::GenericContext) => Self::Rbx,

            (OperatingSystem::Windows, TargetRegister::Arg0) => Self::Rcx,
            (OperatingSystem::Windows, TargetRegister::Arg1) => Self::Rdx,
            (OperatingSystem::Windows, TargetRegister::Arg2) => Self::R8,
            (OperatingSystem::Windows, TargetRegister::Arg3) => Self::R9,

            (_, TargetRegister::Arg0) => Self::Rdi,
            (_, TargetRegister::Arg1) => Self::Rsi,
            (_, TargetRegister::Arg2) => Self::Rdx,
            (_, TargetRegister::Arg3) => Self::Rcx,
        }
    }

    #[must_use]
    pub const fn name(&self, mode: Amd64RegisterNameMode) -> &'static str {
        const NAMES: [[&str; 4]; 16] = [
            ["rax", "eax", "ax", "al"],
            ["rbx", "ebx", "bx", "bl"],
            ["rcx", "ecx", "cx", "cl"],
            ["rdx", "edx", "dx", "dl"],
            ["rsi", "esi", "si", "sil"],
            ["rdi", "edi", "di", "dil"],
            ["rbp", "ebp", "bp", "bpl"],
            ["rsp", "esp", "sp", "spl"],
            ["r8", "r8d", "r8w", "r8b"],
            ["r9", "r9d", "r9w", "r9b"],
            ["r10", "r10d", "r10w", "r10b"],
            ["r11", "r11d", "r11w", "r11b"],
            ["r12", "r12d", "r12w", "r12b"],
            ["r13", "r13d", "r13w", "r13b"],
            ["r14", "r14d", "r14w", "r14b"],
            ["r15", "r15d", "r15w", "r15b"],
        ];

        let column = match mode {
            Amd64RegisterNameMode::Quad => 0,
            Amd64RegisterNameMode::Long => 1,
            Amd64RegisterNameMode::Word => 2,
            Amd64RegisterNameMode::Byte => 3,
        };

        NAMES[*self as usize][column]
    }
}

impl ModRmRegister for Amd64Register {
    fn mod_rm_bits(&self) -> u8 {
        Amd64Register::mod_rm_bits(self)
    }

    fn is_extended(&self) -> bool {
        self.is_64_extended_register()
    }

    fn sized_name(&self, size: AddrModeSize) -> &'static str {
        self.name(size.into())
    }
}

impl Display for Amd64Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name(Amd64RegisterNameMode::Quad))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amd64RegisterNameMode {
    Quad,
    Long,
    Word,
    Byte,
}

impl From<AddrModeSize> for Amd64RegisterNameMode {
    fn from(value: AddrModeSize) -> Self {
        match value {
            AddrModeSize::Int8 => Self::Byte,
            AddrModeSize::Int16 => Self::Word,
            AddrModeSize::Int32 => Self::Long,
            AddrModeSize::Int64 => Self::Quad,
        }
    }
}
