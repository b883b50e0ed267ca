// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmBranchLocation {
    /// Resolved by the linker through a `BRANCH26` relocation.
    Symbol(NodeId),

    /// Byte offset from the branch instruction itself.
    PcRelativeOffset(i32),
}

impl Display for ArmBranchLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symbol(symbol) => symbol.fmt(f),
            Self::PcRelativeOffset(value) => write!(f, "{value:+}"),
        }
    }
}
