// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Lowers method bodies to machine code with the emitter of the target. A
//! method that cannot be compiled gets a body that throws at runtime instead,
//! so a single bad method never fails the build.

mod gc_info;
mod throwing;

use std::{ops::AddAssign, sync::Arc};

use log::{trace, warn};

pub use self::gc_info::{encode_eh_info, encode_gc_info};

use crate::{
    backend::{create_emitter, CodeEmitter, TargetRegister},
    graph::DependencyListEntry,
    node::{CompiledMethod, NodeKey, ObjectNodeSection},
    type_system::{GenericLookup, MethodBody, MethodDesc, MethodId, Operation, TypeId, TypeSystemContext},
    Architecture,
    CodeGenError,
    CodeGenResult,
    CompilationError,
    CompilationResult,
    GenericHelperId,
    HelperEntrypoint,
    HelperTarget,
    NodeFactory,
    NodeId,
    Platform,
    ReadyToRunHelperId,
    TypeSystemError,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodegenStatistics {
    pub methods_compiled: usize,
    pub methods_failed: usize,
    pub bytes_emitted: usize,
}

impl AddAssign for CodegenStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.methods_compiled += rhs.methods_compiled;
        self.methods_failed += rhs.methods_failed;
        self.bytes_emitted += rhs.bytes_emitted;
    }
}

/// State a worker keeps across the methods it compiles.
#[derive(Debug)]
pub struct CodegenContext {
    platform: Platform,
    statistics: CodegenStatistics,
}

impl CodegenContext {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            statistics: CodegenStatistics::default(),
        }
    }

    #[must_use]
    pub const fn statistics(&self) -> CodegenStatistics {
        self.statistics
    }

    /// Compiles a `MethodCode` node. Type system failures and operations the
    /// target cannot do yet produce the throwing substitute; only failures of
    /// the substitute itself are returned.
    pub fn compile_method(&mut self, factory: &NodeFactory, node: NodeId) -> CompilationResult<CompiledMethod> {
        debug_assert_eq!(factory.platform(), self.platform);

        let NodeKey::MethodCode(method) = factory.key(node) else {
            return Err(CompilationError::CodeGen {
                node: factory.display_name(node),
                error: CodeGenError::NotImplemented {
                    architecture: self.platform.architecture(),
                    operation: "compiling a node without a method body".to_string(),
                },
            });
        };

        let result = match MethodCodegen::new(factory, node, method).compile() {
            Ok(code) => Ok(code),

            Err(error @ (CodeGenError::TypeSystem(..) | CodeGenError::NotImplemented { .. })) => {
                let name = factory.type_system().method_display_name(method);
                warn!("*** {error} ({name})");
                self.statistics.methods_failed += 1;

                throwing::compile_throwing_method(factory, node, &name, &error.to_string())
            }

            Err(error) => Err(error),
        };

        let code = result.map_err(|error| CompilationError::CodeGen { node: factory.display_name(node), error })?;
        self.statistics.methods_compiled += 1;
        self.statistics.bytes_emitted += code.data.len();
        Ok(code)
    }
}

struct MethodCodegen<'f> {
    factory: &'f NodeFactory,
    method: MethodId,
    desc: Arc<MethodDesc>,
    emitter: Box<dyn CodeEmitter>,
    dictionary_layout: Vec<GenericLookup>,

    /// Where the generic dictionary is kept across calls.
    generic_context: Option<TargetRegister>,
    has_frame: bool,
    call_sites: Vec<usize>,
    throw_sites: Vec<usize>,
    extra_dependencies: Vec<DependencyListEntry>,
}

impl<'f> MethodCodegen<'f> {
    fn new(factory: &'f NodeFactory, node: NodeId, method: MethodId) -> Self {
        let mut emitter = create_emitter(factory.platform());
        emitter.builder().add_symbol(node);

        Self {
            factory,
            method,
            desc: factory.type_system().method_desc(method),
            emitter,
            dictionary_layout: Vec::new(),
            generic_context: None,
            has_frame: false,
            call_sites: Vec::new(),
            throw_sites: Vec::new(),
            extra_dependencies: Vec::new(),
        }
    }

    fn ctx(&self) -> &'f TypeSystemContext {
        self.factory.type_system()
    }

    fn compile(mut self) -> CodeGenResult<CompiledMethod> {
        let ctx = self.ctx();
        trace!("Compiling {}", ctx.method_display_name(self.method));

        if self.desc.is_abstract() {
            return Err(TypeSystemError::AbstractMethod { method: ctx.method_display_name(self.method) }.into());
        }

        if let Some(import) = ctx.resolve_pinvoke(self.method)? {
            let cell = self.factory.pinvoke_import_cell(import);
            self.emitter.emit_jmp(self.factory, cell)?;
            return Ok(self.finish(false));
        }

        let Some(body) = self.desc.body().cloned() else {
            return Err(TypeSystemError::AbstractMethod { method: ctx.method_display_name(self.method) }.into());
        };

        if ctx.is_shared_canonical(self.method) {
            if self.emitter.architecture() == Architecture::X86 {
                return Err(self.not_implemented("shared generic code"));
            }
            self.dictionary_layout = GenericLookup::layout_of(&body);
        }

        if !self.dictionary_layout.is_empty() {
            self.generic_context = Some(TargetRegister::GenericContext);
        }

        self.has_frame = self.generic_context.is_some() || body.calls_out();
        if self.has_frame {
            self.emitter.emit_prologue(self.generic_context)?;
        }

        if let Some(context) = self.generic_context {
            self.emitter.emit_move_register(context, TargetRegister::Arg0)?;
        }

        self.lower_body(&body)?;
        Ok(self.finish(body.throws()))
    }

    fn lower_body(&mut self, body: &MethodBody) -> CodeGenResult<()> {
        for operation in &body.operations {
            self.lower(operation)?;
        }

        if !body.operations.last().is_some_and(Operation::is_terminator) {
            self.emit_return()?;
        }

        Ok(())
    }

    fn emit_return(&mut self) -> CodeGenResult<()> {
        if self.has_frame {
            self.emitter.emit_epilogue(self.generic_context)?;
        }
        self.emitter.emit_ret()
    }

    fn finish(self, throws: bool) -> CompiledMethod {
        let data = self.emitter.finish();
        CompiledMethod {
            gc_info: encode_gc_info(data.len(), &self.call_sites),
            eh_info: throws.then(|| encode_eh_info(&self.throw_sites)),
            data,
            extra_dependencies: self.extra_dependencies,
            section: ObjectNodeSection::ManagedCode,
        }
    }

    fn instantiation(&self) -> &[TypeId] {
        self.desc.instantiation()
    }

    fn not_implemented(&self, operation: &str) -> CodeGenError {
        CodeGenError::NotImplemented {
            architecture: self.emitter.architecture(),
            operation: operation.to_string(),
        }
    }

    fn resolve_type(&self, template: &str) -> CodeGenResult<TypeId> {
        Ok(self.ctx().resolve_type(template, self.instantiation())?)
    }

    /// The dictionary slot an operation reads, when its types are only known
    /// at runtime.
    fn runtime_lookup(&self, operation: &Operation) -> CodeGenResult<Option<usize>> {
        if self.dictionary_layout.is_empty() {
            return Ok(None);
        }

        let Some(lookup) = GenericLookup::for_operation(operation) else {
            return Ok(None);
        };

        let ctx = self.ctx();
        let needed = match &lookup {
            GenericLookup::TypeHandle { template } | GenericLookup::ConstructedTypeHandle { template } => {
                ctx.needs_runtime_lookup(template, self.instantiation())?
            }

            GenericLookup::MethodDictionary { instantiation, .. } => {
                let mut needed = false;
                for template in instantiation {
                    needed |= ctx.needs_runtime_lookup(template, self.instantiation())?;
                }
                needed
            }
        };

        if !needed {
            return Ok(None);
        }

        Ok(self.dictionary_layout.iter().position(|x| *x == lookup))
    }

    fn call(&mut self, target: NodeId) -> CodeGenResult<()> {
        self.emitter.emit_call(self.factory, target)?;
        self.call_sites.push(self.emitter.builder().count_bytes());
        Ok(())
    }

    fn call_helper(&mut self, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenResult<()> {
        let helper = self.factory.ready_to_run_helper(id, target);
        self.call(helper)
    }

    /// Loads a dictionary slot of this method into the result register. The
    /// argument register does not survive calls, so the dictionary is passed
    /// again from where the prologue put it.
    fn call_lookup(&mut self, id: GenericHelperId, slot: usize) -> CodeGenResult<()> {
        if let Some(context) = self.generic_context {
            self.emitter.emit_move_register(TargetRegister::Arg0, context)?;
        }

        let helper = self.factory.generic_lookup_helper(id, self.method, slot);
        self.call(helper)
    }

    /// A call that does not go through a vtable.
    fn call_exact(&mut self, callee: MethodId) -> CodeGenResult<()> {
        let ctx = self.ctx();
        let canonical = ctx.canonical_method(callee);

        if ctx.requires_dictionary(callee) {
            self.emitter.emit_load_address(TargetRegister::Arg0, self.factory.method_dictionary(callee))?;
        }

        self.call(self.factory.method_code(canonical))
    }

    fn lower(&mut self, operation: &Operation) -> CodeGenResult<()> {
        let ctx = self.ctx();
        let lookup = self.runtime_lookup(operation)?;

        match operation {
            Operation::Call { owner, method, instantiation } => {
                let callee = ctx.resolve_method_instantiation(owner, method, instantiation, self.instantiation())?;

                if let Some(slot) = lookup {
                    self.call_lookup(GenericHelperId::DictionaryLookup, slot)?;
                    self.emitter.emit_move_register(TargetRegister::Arg0, TargetRegister::Result)?;
                    self.call(self.factory.method_code(ctx.canonical_method(callee)))
                } else {
                    self.call_exact(callee)
                }
            }

            Operation::CallVirt { owner, method, instantiation } => {
                let callee = ctx.resolve_method_instantiation(owner, method, instantiation, self.instantiation())?;
                let callee_desc = ctx.method_desc(callee);

                if callee_desc.is_generic_virtual() {
                    if lookup.is_some() {
                        return Err(self.not_implemented("generic virtual call from shared code"));
                    }

                    self.extra_dependencies.push(DependencyListEntry::new(self.factory.gvm_dependencies(callee), "generic virtual call"));
                    return self.call(self.factory.helper_entrypoint(HelperEntrypoint::ResolveGenericVirtual));
                }

                if !callee_desc.is_virtual() {
                    return self.call_exact(callee);
                }

                self.call_helper(ReadyToRunHelperId::VirtualCall, HelperTarget::Method(ctx.slot_declaration(callee)))
            }

            Operation::NewObj { ty } => match lookup {
                Some(slot) => self.call_lookup(GenericHelperId::NewObject, slot),
                None => {
                    let ty = self.resolve_type(ty)?;
                    self.call_helper(ReadyToRunHelperId::NewHelper, HelperTarget::Type(ty))
                }
            },

            Operation::NewArr { element } => match lookup {
                Some(slot) => {
                    self.call_lookup(GenericHelperId::DictionaryLookup, slot)?;
                    self.emitter.emit_move_register(TargetRegister::Arg1, TargetRegister::Result)?;
                    self.call(self.factory.helper_entrypoint(HelperEntrypoint::AllocateArray))
                }
                None => {
                    let array = ctx.array_type(self.resolve_type(element)?);
                    self.call_helper(ReadyToRunHelperId::NewArr1, HelperTarget::Type(array))
                }
            },

            Operation::CastClass { ty } | Operation::IsInst { ty } => {
                let is_cast = matches!(operation, Operation::CastClass { .. });
                match lookup {
                    Some(slot) => {
                        self.call_lookup(GenericHelperId::DictionaryLookup, slot)?;
                        self.emitter.emit_move_register(TargetRegister::Arg1, TargetRegister::Result)?;
                        let entrypoint = if is_cast { HelperEntrypoint::CastClass } else { HelperEntrypoint::IsInstanceOfClass };
                        self.call(self.factory.helper_entrypoint(entrypoint))
                    }
                    None => {
                        let ty = self.resolve_type(ty)?;
                        let id = if is_cast { ReadyToRunHelperId::CastClass } else { ReadyToRunHelperId::IsInstanceOf };
                        self.call_helper(id, HelperTarget::Type(ty))
                    }
                }
            }

            Operation::LoadStatic { owner, field } => {
                if crate::type_system::is_generic_template(owner) {
                    return Err(self.not_implemented("static base lookup from shared code"));
                }

                let owner = self.resolve_type(owner)?;
                let desc = ctx.type_desc(owner);
                let Some(field) = desc.static_fields().find(|f| f.name() == field) else {
                    return Err(TypeSystemError::MissingField { owner: ctx.type_name(owner), name: field.clone() }.into());
                };

                let id = if ctx.type_desc(field.field_type()).is_gc_reference() {
                    ReadyToRunHelperId::GetGCStaticBase
                } else {
                    ReadyToRunHelperId::GetNonGCStaticBase
                };
                self.call_helper(id, HelperTarget::Type(owner))
            }

            Operation::LoadString { value } => {
                let cell = self.factory.string_indirection(value.clone());
                self.emitter.emit_load_address(TargetRegister::Result, cell)?;
                self.emitter.emit_load_indirect(TargetRegister::Result)
            }

            Operation::LoadInt { value } => self.emitter.emit_mov_imm(TargetRegister::Result, *value),
            Operation::AddInt { value } => self.emitter.emit_add(TargetRegister::Result, *value),

            Operation::NewDelegate { owner, method } => {
                let target = ctx.resolve_method_instantiation(owner, method, &[], self.instantiation())?;
                if ctx.requires_dictionary(target) || ctx.is_shared_canonical(target) {
                    return Err(self.not_implemented("delegate to a shared generic method"));
                }

                self.call_helper(ReadyToRunHelperId::DelegateCtor, HelperTarget::Method(target))
            }

            Operation::Throw => {
                self.throw_sites.push(self.emitter.builder().count_bytes());
                self.call(self.factory.helper_entrypoint(HelperEntrypoint::ThrowException))?;

                // The runtime unwinds, the call never returns.
                self.emitter.emit_int3()
            }

            Operation::Ret => self.emit_return(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        type_system::ModuleManifest,
        Architecture,
        OperatingSystem,
    };

    const MODULE: &str = r#"
        [[native_libraries]]
        name = "libc"
        exports = ["puts"]

        [[types]]
        name = "Native"
        [[types.methods]]
        name = "Puts"
        static = true
        pinvoke = { library = "libc", entry_point = "puts" }
        [[types.methods]]
        name = "Missing"
        static = true
        pinvoke = { library = "libmissing", entry_point = "nothing" }

        [[types]]
        name = "Program"
        [[types.fields]]
        name = "count"
        type = "System.Int32"
        static = true
        [[types.methods]]
        name = "Main"
        static = true
        body = [
            { op = "load_string", value = "hi" },
            { op = "call", type = "Native", method = "Puts" },
            { op = "load_static", type = "Program", field = "count" },
        ]
        [[types.methods]]
        name = "Fail"
        static = true
        body = [{ op = "throw" }]
        [[types.methods]]
        name = "Broken"
        static = true
        body = [{ op = "new_obj", type = "DoesNotExist" }, { op = "ret" }]
        [[types.methods]]
        name = "Make"
        static = true
        generic_params = 1
        body = [{ op = "new_obj", type = "!!0" }, { op = "ret" }]
        [[types.methods]]
        name = "Fill"
        static = true
        generic_params = 1
        body = [{ op = "new_obj", type = "!!0" }, { op = "new_arr", element = "!!0" }, { op = "ret" }]
        [[types.methods]]
        name = "Answer"
        static = true
        body = [{ op = "load_int", value = 40 }, { op = "add_int", value = 2 }]
    "#;

    fn factory(os: OperatingSystem) -> NodeFactory {
        factory_for(Platform::new(Architecture::X64, os))
    }

    fn factory_for(platform: Platform) -> NodeFactory {
        let manifest = ModuleManifest::from_toml(MODULE).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 8).unwrap();
        NodeFactory::new(ctx, platform)
    }

    fn shared_fill(factory: &NodeFactory) -> MethodId {
        let ctx = factory.type_system();
        let fill = ctx.resolve_method_reference("Program::Fill").unwrap();
        ctx.instantiate_method(fill, vec![ctx.well_known().canon]).unwrap()
    }

    fn words(code: &CompiledMethod) -> Vec<u32> {
        code.data.data().chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn compile(factory: &NodeFactory, method: MethodId) -> CompiledMethod {
        let mut context = CodegenContext::new(factory.platform());
        context.compile_method(factory, factory.method_code(method)).unwrap()
    }

    fn reloc_targets(factory: &NodeFactory, code: &CompiledMethod) -> Vec<NodeKey> {
        code.data.relocs().iter().map(|r| factory.key(r.target())).collect()
    }

    #[test]
    fn main_body() {
        let factory = factory(OperatingSystem::Linux);
        let ctx = factory.type_system();
        let main = ctx.resolve_method_reference("Program::Main").unwrap();
        let puts = ctx.resolve_method_reference("Native::Puts").unwrap();
        let program = ctx.lookup_type("Program").unwrap();

        let code = compile(&factory, main);
        assert_eq!(code.data.data(), &[
            0x48, 0x8D, 0x05, 0, 0, 0, 0, // lea rax, [string]
            0x48, 0x8B, 0x00,             // mov rax, [rax]
            0xE8, 0, 0, 0, 0,             // call Native.Puts
            0xE8, 0, 0, 0, 0,             // call static base helper
            0xC3,
        ]);

        assert_eq!(reloc_targets(&factory, &code), vec![
            NodeKey::StringIndirection("hi".into()),
            NodeKey::MethodCode(puts),
            NodeKey::ReadyToRunHelper { id: ReadyToRunHelperId::GetNonGCStaticBase, target: HelperTarget::Type(program) },
        ]);

        assert_eq!(code.gc_info, vec![21, 2, 15, 5]);
        assert_eq!(code.eh_info, None);
        assert_eq!(code.section, ObjectNodeSection::ManagedCode);
    }

    #[test]
    fn pinvoke_jumps_through_the_import_cell() {
        let factory = factory(OperatingSystem::Linux);
        let puts = factory.type_system().resolve_method_reference("Native::Puts").unwrap();

        let code = compile(&factory, puts);
        assert_eq!(code.data.data(), &[0xFF, 0x25, 0, 0, 0, 0]);
        assert_eq!(reloc_targets(&factory, &code), vec![
            NodeKey::PInvokeImportCell(crate::type_system::PInvokeImport { library: "libc".into(), entry_point: "puts".into() }),
        ]);
    }

    #[test]
    fn throwing_body_has_eh_info() {
        let factory = factory(OperatingSystem::Linux);
        let fail = factory.type_system().resolve_method_reference("Program::Fail").unwrap();

        let code = compile(&factory, fail);
        assert_eq!(code.data.data(), &[0xE8, 0, 0, 0, 0, 0xCC]);
        assert_eq!(code.eh_info, Some(vec![1, 0]));
    }

    #[test]
    fn integer_constants_stay_in_the_result_register() {
        let factory = factory(OperatingSystem::Linux);
        let answer = factory.type_system().resolve_method_reference("Program::Answer").unwrap();

        let code = compile(&factory, answer);
        assert_eq!(code.data.data(), &[
            0xB8, 0x28, 0x00, 0x00, 0x00, // mov eax, 40
            0x48, 0x83, 0xC0, 0x02,       // add rax, 2
            0xC3,
        ]);
        assert!(code.data.relocs().is_empty());
    }

    #[test]
    fn shared_code_passes_its_dictionary_to_every_lookup() {
        let factory = factory(OperatingSystem::Linux);
        let shared = shared_fill(&factory);

        let code = compile(&factory, shared);
        assert_eq!(code.data.data(), &[
            0x53,                   // push rbx
            0x48, 0x8B, 0xDF,       // mov rbx, rdi
            0x48, 0x8B, 0xFB,       // mov rdi, rbx
            0xE8, 0, 0, 0, 0,       // call new object lookup
            0x48, 0x8B, 0xFB,       // mov rdi, rbx
            0xE8, 0, 0, 0, 0,       // call array type lookup
            0x48, 0x8B, 0xF0,       // mov rsi, rax
            0xE8, 0, 0, 0, 0,       // call __allocate_array
            0x5B,                   // pop rbx
            0xC3,
        ]);

        let targets = reloc_targets(&factory, &code);
        assert_eq!(&targets[..2], &[
            NodeKey::ReadyToRunGenericHelper { id: GenericHelperId::NewObject, owner: shared, slot: 0 },
            NodeKey::ReadyToRunGenericHelper { id: GenericHelperId::DictionaryLookup, owner: shared, slot: 1 },
        ]);
    }

    #[test]
    fn arm64_shared_code_keeps_its_dictionary_in_a_callee_saved_register() {
        let factory = factory_for(Platform::new(Architecture::AArch64, OperatingSystem::Linux));
        let shared = shared_fill(&factory);

        let code = compile(&factory, shared);
        assert_eq!(words(&code), vec![
            0xA9BF7BF3, // stp x19, lr, [sp, #-16]!
            0xAA0003F3, // mov x19, x0
            0xAA1303E0, // mov x0, x19
            0x94000000, // bl new object lookup
            0xAA1303E0, // mov x0, x19
            0x94000000, // bl array type lookup
            0xAA0003E1, // mov x1, x0
            0x94000000, // bl __allocate_array
            0xA8C17BF3, // ldp x19, lr, [sp], #16
            0xD65F03C0, // ret
        ]);
    }

    #[test]
    fn arm64_leaf_bodies_have_no_frame() {
        let factory = factory_for(Platform::new(Architecture::AArch64, OperatingSystem::Linux));
        let ctx = factory.type_system();

        let answer = compile(&factory, ctx.resolve_method_reference("Program::Answer").unwrap());
        assert_eq!(words(&answer), vec![
            0xD2800500, // movz x0, #40
            0x91000800, // add x0, x0, #2
            0xD65F03C0, // ret
        ]);

        let main = compile(&factory, ctx.resolve_method_reference("Program::Main").unwrap());
        let main = words(&main);
        assert_eq!(main[0], 0xA9BF7BFD); // stp fp, lr, [sp, #-16]!
        assert_eq!(&main[main.len() - 2..], &[0xA8C17BFD, 0xD65F03C0]);
    }

    #[test]
    fn failures_become_throwing_substitutes() {
        let factory = factory(OperatingSystem::Windows);
        let ctx = factory.type_system();

        for name in ["Program::Broken", "Native::Missing"] {
            let method = ctx.resolve_method_reference(name).unwrap();
            let mut context = CodegenContext::new(factory.platform());
            let code = context.compile_method(&factory, factory.method_code(method)).unwrap();

            assert_eq!(code.section, ObjectNodeSection::FoldableManagedCode);
            assert_eq!(context.statistics().methods_failed, 1);

            let targets = reloc_targets(&factory, &code);
            assert_eq!(targets.len(), 3);
            assert_eq!(targets[0], NodeKey::StringIndirection(ctx.method_display_name(method)));
            assert_eq!(targets[2], NodeKey::ExternSymbol("__compilation_failure".into()));

            // rcx and rdx on Windows
            assert_eq!(&code.data.data()[..3], &[0x48, 0x8D, 0x0D]);
        }
    }

    #[test]
    fn shared_code_allocates_through_its_dictionary() {
        let factory = factory(OperatingSystem::Linux);
        let ctx = factory.type_system();
        let make = ctx.resolve_method_reference("Program::Make").unwrap();
        let shared = ctx.instantiate_method(make, vec![ctx.well_known().canon]).unwrap();
        let exact = ctx.instantiate_method(make, vec![ctx.well_known().int32]).unwrap();

        let code = compile(&factory, shared);
        assert_eq!(reloc_targets(&factory, &code), vec![
            NodeKey::ReadyToRunGenericHelper { id: GenericHelperId::NewObject, owner: shared, slot: 0 },
        ]);

        let code = compile(&factory, exact);
        assert_eq!(reloc_targets(&factory, &code), vec![
            NodeKey::ReadyToRunHelper { id: ReadyToRunHelperId::NewHelper, target: HelperTarget::Type(ctx.well_known().int32) },
        ]);
    }
}
