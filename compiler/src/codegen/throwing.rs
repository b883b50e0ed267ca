// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use crate::{
    backend::{create_emitter, TargetRegister},
    node::{CompiledMethod, ObjectNodeSection},
    CodeGenResult,
    HelperEntrypoint,
    NodeFactory,
    NodeId,
};

use super::gc_info::encode_gc_info;

/// The body of a method that failed to compile: hands the method name and
/// the failure message to the runtime, which throws.
pub(super) fn compile_throwing_method(factory: &NodeFactory, node: NodeId, method_name: &str, message: &str) -> CodeGenResult<CompiledMethod> {
    let mut emitter = create_emitter(factory.platform());
    emitter.builder().add_symbol(node);

    emitter.emit_load_address(TargetRegister::Arg0, factory.string_indirection(method_name.to_string()))?;
    emitter.emit_load_indirect(TargetRegister::Arg0)?;
    emitter.emit_load_address(TargetRegister::Arg1, factory.string_indirection(message.to_string()))?;
    emitter.emit_load_indirect(TargetRegister::Arg1)?;
    emitter.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::CompilationFailure))?;

    let data = emitter.finish();
    Ok(CompiledMethod {
        gc_info: encode_gc_info(data.len(), &[]),
        data,
        eh_info: None,
        extra_dependencies: Vec::new(),
        section: ObjectNodeSection::FoldableManagedCode,
    })
}
