// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use ilc_compiler::{
    node::EmitMode,
    type_system::ModuleManifest,
    Architecture,
    Compilation,
    CompilationOptions,
    CompiledModule,
    HelperEntrypoint,
    HelperTarget,
    NodeKey,
    OperatingSystem,
    Platform,
    ReadyToRunHelperId,
};
use object::{Object, ObjectSymbol};
use pretty_assertions::assert_eq;

const MODULE: &str = r#"
entry_point = "Program::Main"

[[types]]
name = "Plain"
[[types.fields]]
name = "count"
type = "System.Int32"
static = true

[[types]]
name = "Lazy"
[[types.fields]]
name = "count"
type = "System.Int32"
static = true
[[types.fields]]
name = "items"
type = "System.String"
static = true
[[types.methods]]
name = ".cctor"
static = true
body = [{ op = "ret" }]

[[types]]
name = "Program"
[[types.methods]]
name = "Main"
static = true
body = [
    { op = "load_static", type = "Plain", field = "count" },
    { op = "load_static", type = "Lazy", field = "count" },
    { op = "load_static", type = "Lazy", field = "items" },
    { op = "ret" },
]
"#;

fn compile() -> CompiledModule {
    let manifest = ModuleManifest::from_toml(MODULE).unwrap();
    let options = CompilationOptions::new(Platform::new(Architecture::X64, OperatingSystem::Linux)).with_workers(1);
    Compilation::from_manifest(&manifest, options).unwrap().compile().unwrap()
}

fn helper_keys(module: &CompiledModule, id: ReadyToRunHelperId, ty: &str) -> (Vec<u8>, Vec<NodeKey>) {
    let factory = module.factory();
    let ty = factory.type_system().lookup_type(ty).unwrap();
    let node = factory.existing(&NodeKey::ReadyToRunHelper { id, target: HelperTarget::Type(ty) }).unwrap();
    assert!(module.is_marked(node));

    let data = factory.object_data(node, EmitMode::RelocsOnly).unwrap().unwrap();
    let targets = data.relocs().iter().map(|r| factory.key(r.target())).collect();
    (data.data().to_vec(), targets)
}

#[test]
fn static_base_without_cctor_is_a_plain_load() {
    let module = compile();
    let plain = module.factory().type_system().lookup_type("Plain").unwrap();

    let (bytes, targets) = helper_keys(&module, ReadyToRunHelperId::GetNonGCStaticBase, "Plain");
    assert_eq!(bytes, vec![0x48, 0x8D, 0x05, 0, 0, 0, 0, 0xC3]);
    assert_eq!(targets, vec![NodeKey::NonGcStaticBase(plain)]);
}

#[test]
fn static_bases_with_cctor_go_through_the_runtime() {
    let module = compile();
    let lazy = module.factory().type_system().lookup_type("Lazy").unwrap();

    let (_, targets) = helper_keys(&module, ReadyToRunHelperId::GetNonGCStaticBase, "Lazy");
    assert_eq!(targets, vec![
        NodeKey::NonGcStaticBase(lazy),
        NodeKey::ExternSymbol(HelperEntrypoint::EnsureClassConstructorRunAndReturnNonGCStaticBase.as_ref().to_string()),
    ]);

    let (_, targets) = helper_keys(&module, ReadyToRunHelperId::GetGCStaticBase, "Lazy");
    assert_eq!(targets, vec![
        NodeKey::GcStaticBase(lazy),
        NodeKey::NonGcStaticBase(lazy),
        NodeKey::ExternSymbol(HelperEntrypoint::EnsureClassConstructorRunAndReturnGCStaticBase.as_ref().to_string()),
    ]);
}

#[test]
fn class_constructor_context_precedes_the_base() {
    let module = compile();
    let factory = module.factory();
    let ctx = factory.type_system();
    let lazy = ctx.lookup_type("Lazy").unwrap();
    let cctor = ctx.resolve_method_reference("Lazy::.cctor").unwrap();

    let node = factory.existing(&NodeKey::NonGcStaticBase(lazy)).unwrap();
    let marked = module.nodes().iter().copied().collect();
    let data = factory.object_data(node, EmitMode::Final(&marked)).unwrap().unwrap();

    assert_eq!(data.defined_symbols()[0].offset, 16);
    assert_eq!(factory.key(data.relocs()[0].target()), NodeKey::MethodCode(cctor));
    assert!(module.is_marked(data.relocs()[0].target()));
}

#[test]
fn gc_static_bases_live_between_the_region_markers() {
    let module = compile();
    let bytes = module.object_bytes().unwrap();
    let file = object::File::parse(&*bytes).unwrap();

    let symbol = |name: &str| {
        file.symbols()
            .find(|s| s.name() == Ok(name))
            .unwrap_or_else(|| panic!("no symbol {name}"))
    };

    let start = symbol("__GCStaticRegionStart");
    let base = symbol("__GCStaticBase_Lazy");
    let end = symbol("__GCStaticRegionEnd");

    assert_eq!(start.section_index(), base.section_index());
    assert_eq!(end.section_index(), base.section_index());
    assert!(start.address() <= base.address());
    assert!(base.address() < end.address());
}
