// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod branch_location;
mod condition_code;
mod emitter;
mod helpers;
mod instruction;
mod register;

pub use self::{
    branch_location::ArmBranchLocation,
    condition_code::ArmConditionCode,
    emitter::Arm64Emitter,
    instruction::ArmInstruction,
    register::ArmRegister,
};
