// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use ilc_compiler::{
    node::ObjectNodeSection,
    type_system::ModuleManifest,
    Architecture,
    Compilation,
    CompilationError,
    CompilationOptions,
    CompiledModule,
    HelperEntrypoint,
    NodeKey,
    OperatingSystem,
    Platform,
};

const MODULE: &str = r#"
entry_point = "Program::Main"

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
[[types.methods]]
name = "Broken"
static = true
body = [{ op = "new_obj", type = "DoesNotExist" }, { op = "ret" }]
[[types.methods]]
name = "Main"
static = true
body = [
    { op = "call", type = "Native", method = "Puts" },
    { op = "call", type = "Native", method = "Missing" },
    { op = "call", type = "Program", method = "Broken" },
    { op = "ret" },
]
"#;

fn compile(manifest: &str, options: CompilationOptions) -> Result<CompiledModule, CompilationError> {
    let manifest = ModuleManifest::from_toml(manifest).unwrap();
    Compilation::from_manifest(&manifest, options)?.compile()
}

fn options() -> CompilationOptions {
    CompilationOptions::new(Platform::new(Architecture::X64, OperatingSystem::Linux)).with_workers(2)
}

#[test]
fn failing_methods_get_throwing_bodies() {
    let module = compile(MODULE, options()).unwrap();
    let factory = module.factory();
    let ctx = factory.type_system();

    let statistics = module.statistics();
    assert_eq!(statistics.methods_failed, 2);
    assert_eq!(statistics.methods_compiled, 4);

    for name in ["Native::Missing", "Program::Broken"] {
        let method = ctx.resolve_method_reference(name).unwrap();
        let node = factory.existing(&NodeKey::MethodCode(method)).unwrap();
        assert!(module.is_marked(node));

        let code = factory.node(node).code().cloned().unwrap();
        assert_eq!(code.section, ObjectNodeSection::FoldableManagedCode);
        assert!(code.eh_info.is_none());

        // The runtime reports the method by name.
        let message = factory.existing(&NodeKey::StringIndirection(ctx.method_display_name(method))).unwrap();
        assert!(module.is_marked(message));
    }

    let failure = factory.existing(&NodeKey::ExternSymbol(HelperEntrypoint::CompilationFailure.as_ref().to_string())).unwrap();
    assert!(module.is_marked(failure));
}

#[test]
fn healthy_methods_are_unaffected() {
    let module = compile(MODULE, options()).unwrap();
    let factory = module.factory();
    let ctx = factory.type_system();

    let puts = ctx.resolve_method_reference("Native::Puts").unwrap();
    let node = factory.existing(&NodeKey::MethodCode(puts)).unwrap();
    let code = factory.node(node).code().cloned().unwrap();
    assert_eq!(code.section, ObjectNodeSection::ManagedCode);

    assert!(factory.existing(&NodeKey::ExternSymbol("puts".to_string())).is_some_and(|x| module.is_marked(x)));
    assert!(factory.existing(&NodeKey::ExternSymbol("nothing".to_string())).is_none());

    module.object_bytes().unwrap();
}

#[test]
fn missing_entry_point_is_fatal() {
    let manifest = MODULE.replace("entry_point = \"Program::Main\"", "entry_point = \"Program::Start\"");
    let result = compile(&manifest, options());
    assert!(matches!(result, Err(CompilationError::MissingEntryPoint { name }) if name == "Program::Start"));
}

#[test]
fn unknown_roots_are_fatal() {
    let result = compile(MODULE, options().with_root("Program::Nothing"));
    assert!(matches!(result, Err(CompilationError::InvalidRoot { name, .. }) if name == "Program::Nothing"));

    let result = compile(MODULE, options().with_root("Nowhere"));
    assert!(matches!(result, Err(CompilationError::InvalidRoot { name, .. }) if name == "Nowhere"));
}

#[test]
fn explicit_roots_are_compiled() {
    let manifest = MODULE.replace("entry_point = \"Program::Main\"", "");
    let module = compile(&manifest, options().with_root("Native::Puts")).unwrap();

    assert_eq!(module.entry_point(), None);
    assert_eq!(module.statistics().methods_compiled, 1);
}
