// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use ilc_compiler::{
    type_system::ModuleManifest,
    Architecture,
    Compilation,
    CompilationOptions,
    CompiledModule,
    GenericHelperId,
    NodeKey,
    OperatingSystem,
    Platform,
};

const MODULE: &str = r#"
entry_point = "Program::Main"

[[types]]
name = "Animal"

[[types]]
name = "Dog"
base = "Animal"

[[types]]
name = "Cat"
base = "Animal"

[[types]]
name = "Box"
[[types.methods]]
name = "Make"
static = true
generic_params = 1
body = [
    { op = "new_obj", type = "!!0" },
    { op = "call", type = "Box", method = "Check", instantiation = ["!!0"] },
    { op = "ret" },
]
[[types.methods]]
name = "Check"
static = true
generic_params = 1
body = [{ op = "cast_class", type = "!!0" }, { op = "ret" }]

[[types]]
name = "Program"
[[types.methods]]
name = "Main"
static = true
body = [
    { op = "call", type = "Box", method = "Make", instantiation = ["Dog"] },
    { op = "call", type = "Box", method = "Make", instantiation = ["Cat"] },
    { op = "call", type = "Box", method = "Make", instantiation = ["System.Int32"] },
    { op = "ret" },
]
"#;

fn compile() -> CompiledModule {
    let manifest = ModuleManifest::from_toml(MODULE).unwrap();
    let options = CompilationOptions::new(Platform::new(Architecture::X64, OperatingSystem::Linux)).with_workers(2);
    Compilation::from_manifest(&manifest, options).unwrap().compile().unwrap()
}

fn is_marked(module: &CompiledModule, key: NodeKey) -> bool {
    module.factory().existing(&key).is_some_and(|node| module.is_marked(node))
}

#[test]
fn reference_type_instantiations_share_one_body() {
    let module = compile();
    let ctx = module.factory().type_system();

    let make = ctx.resolve_method_reference("Box::Make").unwrap();
    let dog = ctx.lookup_type("Dog").unwrap();
    let cat = ctx.lookup_type("Cat").unwrap();

    let make_dog = ctx.instantiate_method(make, vec![dog]).unwrap();
    let make_cat = ctx.instantiate_method(make, vec![cat]).unwrap();
    let shared = ctx.canonical_method(make_dog);

    assert_eq!(shared, ctx.canonical_method(make_cat));
    assert!(is_marked(&module, NodeKey::MethodCode(shared)));
    assert!(!is_marked(&module, NodeKey::MethodCode(make_dog)));
    assert!(!is_marked(&module, NodeKey::MethodCode(make_cat)));

    assert!(is_marked(&module, NodeKey::MethodDictionary(make_dog)));
    assert!(is_marked(&module, NodeKey::MethodDictionary(make_cat)));
    assert!(is_marked(&module, NodeKey::ShadowConcreteMethod(make_dog)));
    assert!(is_marked(&module, NodeKey::ShadowConcreteMethod(make_cat)));
}

#[test]
fn dictionaries_pull_in_their_slots() {
    let module = compile();
    let ctx = module.factory().type_system();

    let make = ctx.resolve_method_reference("Box::Make").unwrap();
    let check = ctx.resolve_method_reference("Box::Check").unwrap();
    let dog = ctx.lookup_type("Dog").unwrap();

    let make_dog = ctx.instantiate_method(make, vec![dog]).unwrap();
    let check_dog = ctx.instantiate_method(check, vec![dog]).unwrap();

    // Allocation needs the full type, the nested call its own dictionary.
    assert!(is_marked(&module, NodeKey::ConstructedType(dog)));
    assert!(is_marked(&module, NodeKey::MethodDictionary(check_dog)));
    assert!(is_marked(&module, NodeKey::MethodCode(ctx.canonical_method(check_dog))));

    let shared = ctx.canonical_method(make_dog);
    assert!(is_marked(&module, NodeKey::ReadyToRunGenericHelper {
        id: GenericHelperId::NewObject,
        owner: shared,
        slot: 0,
    }));
}

#[test]
fn value_type_instantiations_get_exact_code() {
    let module = compile();
    let ctx = module.factory().type_system();

    let make = ctx.resolve_method_reference("Box::Make").unwrap();
    let make_int = ctx.instantiate_method(make, vec![ctx.well_known().int32]).unwrap();

    assert_eq!(ctx.canonical_method(make_int), make_int);
    assert!(is_marked(&module, NodeKey::MethodCode(make_int)));
    assert!(module.factory().existing(&NodeKey::MethodDictionary(make_int)).is_none());
}

#[test]
fn shared_code_is_written_once() {
    let module = compile();
    let names = module.node_names();

    let shared = names.iter().filter(|x| x.as_str() == "Box_Make__System___Canon_").count();
    assert_eq!(shared, 1);
    module.object_bytes().unwrap();
}
