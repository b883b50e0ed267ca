// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::path::PathBuf;

use thiserror::Error;

use crate::{type_system::ManifestError, Architecture, RelocType};

type IoError = std::io::Error;

pub type TypeSystemResult<T> = core::result::Result<T, TypeSystemError>;
pub type CodeGenResult<T> = core::result::Result<T, CodeGenError>;
pub type LinkResult<T> = core::result::Result<T, LinkError>;
pub type CompilationResult<T> = core::result::Result<T, CompilationError>;

/// Failures of the type system collaborator. These stay local to the method
/// that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeSystemError {
    #[error("failed to load type `{name}`")]
    MissingType { name: String },

    #[error("type `{owner}` has no method `{name}`")]
    MissingMethod { owner: String, name: String },

    #[error("type `{owner}` has no field `{name}`")]
    MissingField { owner: String, name: String },

    #[error("generic method parameter !!{index} is out of range for `{method}`")]
    GenericParameterOutOfRange { method: String, index: usize },

    #[error("`{method}` expects {expected} generic arguments, got {actual}")]
    InstantiationArity { method: String, expected: usize, actual: usize },

    #[error("unable to resolve native library `{library}` for `{method}`")]
    MissingNativeLibrary { method: String, library: String },

    #[error("native library `{library}` does not export `{entry_point}`")]
    MissingNativeExport { library: String, entry_point: String },

    #[error("`{method}` is abstract and has no body")]
    AbstractMethod { method: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeGenError {
    #[error("{operation} is not implemented for {}", architecture.name())]
    NotImplemented { architecture: Architecture, operation: String },

    #[error("branch displacement {displacement} does not fit in {bits} bits")]
    BranchOutOfRange { displacement: i64, bits: u32 },

    #[error("immediate {value} cannot be encoded in {operation}")]
    ImmediateOutOfRange { operation: &'static str, value: i64 },

    #[error(transparent)]
    TypeSystem(#[from] TypeSystemError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelocationError {
    #[error("relocation {kind:?} cannot encode value {value:#x}")]
    OutOfRange { kind: RelocType, value: i64 },

    #[error("relocation {kind:?} is not supported for in-place patching")]
    Unsupported { kind: RelocType },

    #[error("relocation {kind:?} at offset {offset} runs past the end of a {length} byte blob")]
    OutOfBounds { kind: RelocType, offset: usize, length: usize },
}

/// Failures while handing the marked graph to the object writer. Every one of
/// these is fatal for the build.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("`{source_node}` references `{target}`, which was never marked")]
    UnmarkedTarget { source_node: String, target: String },

    #[error("`{node}` has no object data although it was marked")]
    MissingObjectData { node: String },

    #[error("failed to emit `{node}`: {error}")]
    Emission { node: String, error: CodeGenError },

    #[error("symbol `{symbol}` is defined more than once")]
    DuplicateSymbol { symbol: String },

    #[error("failed to apply relocation in `{node}`: {error}")]
    Relocation { node: String, error: RelocationError },

    #[error("object file error: {0}")]
    Object(object::write::Error),

    #[error("I/O error for \"{}\": {error}", path.display())]
    Io { path: PathBuf, error: IoError },
}

impl From<object::write::Error> for LinkError {
    fn from(value: object::write::Error) -> Self {
        Self::Object(value)
    }
}

#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("no entry point `{name}` found")]
    MissingEntryPoint { name: String },

    #[error("invalid root `{name}`: {error}")]
    InvalidRoot { name: String, error: TypeSystemError },

    #[error("code generation for `{node}` failed: {error}")]
    CodeGen { node: String, error: CodeGenError },

    #[error("a compilation worker stopped unexpectedly")]
    WorkerPanicked,

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("I/O error for \"{}\": {error}", path.display())]
    Io { path: PathBuf, error: IoError },
}
