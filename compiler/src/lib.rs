// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

pub mod backend;
pub mod codegen;
mod compilation;
mod dump;
mod error;
mod factory;
pub mod graph;
mod name_mangler;
pub mod node;
mod object_data;
mod object_writer;
mod ready_to_run;
mod relocation;
pub mod type_system;
mod types;

pub use self::{
    compilation::{
        Compilation,
        CompilationOptions,
        CompiledModule,
    },
    dump::{
        MapDumper,
        XmlDumper,
    },
    error::{
        CodeGenError,
        CodeGenResult,
        CompilationError,
        CompilationResult,
        LinkError,
        LinkResult,
        RelocationError,
        TypeSystemError,
        TypeSystemResult,
    },
    factory::NodeFactory,
    name_mangler::sanitize,
    node::{
        Node,
        NodeId,
        NodeKey,
    },
    object_data::{
        DefinedSymbol,
        ObjectData,
        ObjectDataBuilder,
    },
    object_writer::{
        ObjectWriter,
        MANAGED_ENTRY_POINT,
    },
    ready_to_run::{
        GenericHelperId,
        HelperEntrypoint,
        HelperTarget,
        ReadyToRunHelperEmitter,
        ReadyToRunHelperId,
    },
    relocation::{
        RelocType,
        Relocation,
    },
    types::{
        Architecture,
        Endianness,
        OperatingSystem,
        Platform,
    },
};
