// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod address;
mod condition_code;
mod emitter;
mod helpers;
mod instruction;
mod register;

pub use self::{
    address::{
        AddrBase,
        AddrMode,
        AddrModeSize,
        ModRmRegister,
        SibScale,
    },
    condition_code::Amd64ConditionCode,
    emitter::{
        X64Emitter,
        X86FamilyEmitter,
        X86FamilyRegister,
    },
    instruction::{
        Amd64Instruction,
        CodeMode,
    },
    register::{
        Amd64Register,
        Amd64RegisterNameMode,
    },
};
