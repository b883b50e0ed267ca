// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! 32-bit x86 shares the encoder and helper sequences of x64, with its own
//! register file.

mod helpers;
mod register;

pub use self::register::X86Register;

use super::amd64::X86FamilyEmitter;

pub type X86Emitter = X86FamilyEmitter<X86Register>;
