// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::cmp::Ordering;

use crate::{
    type_system::{MethodId, TypeId, TypeSystemContext},
    HelperTarget,
    NodeFactory,
    NodeId,
};

use super::NodeKey;

/// The total order nodes are emitted in. Different kinds are ordered by
/// [`KIND_ORDER`](super::KIND_ORDER), same kinds by their names, so the order
/// never depends on the order nodes were discovered in.
#[must_use]
pub fn compare_nodes(factory: &NodeFactory, a: NodeId, b: NodeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a_key = factory.key(a);
    let b_key = factory.key(b);

    let (a_kind, b_kind) = (a_key.kind(), b_key.kind());
    if a_kind != b_kind {
        return a_kind.order().cmp(&b_kind.order());
    }

    let result = compare_same_kind(factory.type_system(), &a_key, &b_key);
    debug_assert_ne!(result, Ordering::Equal, "distinct nodes {a_key:?} and {b_key:?} compare equal");
    result
}

/// Only valid for keys of the same kind.
fn compare_same_kind(ctx: &TypeSystemContext, a: &NodeKey, b: &NodeKey) -> Ordering {
    match (a, b) {
        (NodeKey::MethodCode(a), NodeKey::MethodCode(b))
        | (NodeKey::ShadowConcreteMethod(a), NodeKey::ShadowConcreteMethod(b))
        | (NodeKey::MethodDictionary(a), NodeKey::MethodDictionary(b))
        | (NodeKey::VirtualMethodUse(a), NodeKey::VirtualMethodUse(b))
        | (NodeKey::GvmDependencies(a), NodeKey::GvmDependencies(b)) => compare_methods(ctx, *a, *b),

        (NodeKey::NecessaryType(a), NodeKey::NecessaryType(b))
        | (NodeKey::ConstructedType(a), NodeKey::ConstructedType(b))
        | (NodeKey::GcStaticBase(a), NodeKey::GcStaticBase(b))
        | (NodeKey::NonGcStaticBase(a), NodeKey::NonGcStaticBase(b)) => compare_types(ctx, *a, *b),

        (NodeKey::GcStaticsRegionStart, NodeKey::GcStaticsRegionStart)
        | (NodeKey::GcStaticsRegionEnd, NodeKey::GcStaticsRegionEnd) => Ordering::Equal,

        (NodeKey::ReadyToRunHelper { id: a_id, target: a_target }, NodeKey::ReadyToRunHelper { id: b_id, target: b_target }) => {
            a_id.cmp(b_id).then_with(|| compare_helper_targets(ctx, a_target, b_target))
        }

        (
            NodeKey::ReadyToRunGenericHelper { id: a_id, owner: a_owner, slot: a_slot },
            NodeKey::ReadyToRunGenericHelper { id: b_id, owner: b_owner, slot: b_slot },
        ) => {
            a_id.cmp(b_id)
                .then_with(|| compare_methods(ctx, *a_owner, *b_owner))
                .then_with(|| a_slot.cmp(b_slot))
        }

        (NodeKey::ExternSymbol(a), NodeKey::ExternSymbol(b))
        | (NodeKey::StringIndirection(a), NodeKey::StringIndirection(b))
        | (NodeKey::FrozenString(a), NodeKey::FrozenString(b)) => a.cmp(b),

        (NodeKey::PInvokeImportCell(a), NodeKey::PInvokeImportCell(b)) => {
            a.library.cmp(&b.library).then_with(|| a.entry_point.cmp(&b.entry_point))
        }

        _ => {
            debug_assert!(false, "same-kind comparison of {a:?} and {b:?}");
            Ordering::Equal
        }
    }
}

/// By owning type, then name, then declaration position in the owner, then
/// instantiation. None of these depend on the order methods were created in.
fn compare_methods(ctx: &TypeSystemContext, a: MethodId, b: MethodId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (a_desc, b_desc) = (ctx.method_desc(a), ctx.method_desc(b));
    compare_types(ctx, a_desc.owning_type(), b_desc.owning_type())
        .then_with(|| a_desc.name().cmp(b_desc.name()))
        .then_with(|| declaration_index(ctx, a).cmp(&declaration_index(ctx, b)))
        .then_with(|| compare_type_lists(ctx, a_desc.instantiation(), b_desc.instantiation()))
}

/// Where the method (or its generic definition) is declared in its owner.
fn declaration_index(ctx: &TypeSystemContext, method: MethodId) -> Option<usize> {
    let desc = ctx.method_desc(method);
    let definition = desc.definition().unwrap_or(method);
    ctx.type_desc(desc.owning_type()).methods().iter().position(|x| *x == definition)
}

/// Type names are unique within a context. Arrays and base types still break
/// ties structurally.
fn compare_types(ctx: &TypeSystemContext, a: TypeId, b: TypeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (a_desc, b_desc) = (ctx.type_desc(a), ctx.type_desc(b));
    a_desc.name().cmp(b_desc.name())
        .then_with(|| a_desc.is_array().cmp(&b_desc.is_array()))
        .then_with(|| match (a_desc.base(), b_desc.base()) {
            (Some(a_base), Some(b_base)) => compare_types(ctx, a_base, b_base),
            (a_base, b_base) => a_base.is_some().cmp(&b_base.is_some()),
        })
}

fn compare_type_lists(ctx: &TypeSystemContext, a: &[TypeId], b: &[TypeId]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        a.iter()
            .zip(b)
            .map(|(x, y)| compare_types(ctx, *x, *y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

fn compare_helper_targets(ctx: &TypeSystemContext, a: &HelperTarget, b: &HelperTarget) -> Ordering {
    match (a, b) {
        (HelperTarget::Type(a), HelperTarget::Type(b)) => compare_types(ctx, *a, *b),
        (HelperTarget::Method(a), HelperTarget::Method(b)) => compare_methods(ctx, *a, *b),
        (HelperTarget::Type(..), HelperTarget::Method(..)) => Ordering::Less,
        (HelperTarget::Method(..), HelperTarget::Type(..)) => Ordering::Greater,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        type_system::{ModuleManifest, PInvokeImport},
        Architecture,
        OperatingSystem,
        Platform,
        ReadyToRunHelperId,
    };

    fn factory() -> NodeFactory {
        let manifest = ModuleManifest::from_toml(r#"
            [[types]]
            name = "Alpha"
            [[types.methods]]
            name = "Run"
            static = true
            body = [{ op = "ret" }]
            [[types.methods]]
            name = "Gen"
            static = true
            generic_params = 1
            body = [{ op = "ret" }]

            [[types]]
            name = "Beta"
            [[types.methods]]
            name = "Run"
            static = true
            body = [{ op = "ret" }]
        "#).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 8).unwrap();
        NodeFactory::new(ctx, Platform::new(Architecture::X64, OperatingSystem::Linux))
    }

    /// A mix of kinds, created in a scrambled order.
    fn sample_nodes(factory: &NodeFactory) -> Vec<NodeId> {
        let ctx = factory.type_system();
        let alpha = ctx.lookup_type("Alpha").unwrap();
        let beta = ctx.lookup_type("Beta").unwrap();
        let alpha_run = ctx.resolve_method_reference("Alpha::Run").unwrap();
        let beta_run = ctx.resolve_method_reference("Beta::Run").unwrap();
        let gen = ctx.resolve_method_reference("Alpha::Gen").unwrap();
        let gen_string = ctx.instantiate_method(gen, vec![ctx.well_known().string]).unwrap();
        let gen_int = ctx.instantiate_method(gen, vec![ctx.well_known().int32]).unwrap();

        vec![
            factory.method_code(beta_run),
            factory.frozen_string("b".into()),
            factory.constructed_type(beta),
            factory.gc_statics_region_end(),
            factory.method_code(alpha_run),
            factory.method_dictionary(gen_string),
            factory.ready_to_run_helper(ReadyToRunHelperId::NewHelper, HelperTarget::Type(beta)),
            factory.string_indirection("a".into()),
            factory.gc_static_base(alpha),
            factory.constructed_type(alpha),
            factory.necessary_type(alpha),
            factory.ready_to_run_helper(ReadyToRunHelperId::NewHelper, HelperTarget::Type(alpha)),
            factory.ready_to_run_helper(ReadyToRunHelperId::CastClass, HelperTarget::Type(alpha)),
            factory.gc_statics_region_start(),
            factory.method_dictionary(gen_int),
            factory.extern_symbol("puts".into()),
            factory.pinvoke_import_cell(PInvokeImport { library: "libc".into(), entry_point: "puts".into() }),
            factory.virtual_method_use(alpha_run),
            factory.shadow_concrete_method(gen_string),
            factory.non_gc_static_base(beta),
        ]
    }

    #[test]
    fn sorting_follows_kind_order_then_names() {
        let factory = factory();
        let mut nodes = sample_nodes(&factory);
        nodes.sort_by(|a, b| compare_nodes(&factory, *a, *b));

        let names: Vec<String> = nodes.iter().map(|n| format!("{:?}", factory.key(*n).kind())).collect();
        assert_eq!(names, vec![
            "ConstructedType", "ConstructedType",
            "NecessaryType",
            "MethodDictionary", "MethodDictionary",
            "FrozenString",
            "NonGcStaticBase",
            "GcStaticsRegionStart",
            "GcStaticBase",
            "GcStaticsRegionEnd",
            "StringIndirection",
            "PInvokeImportCell",
            "MethodCode", "MethodCode",
            "ReadyToRunHelper", "ReadyToRunHelper", "ReadyToRunHelper",
            "ShadowConcreteMethod",
            "VirtualMethodUse",
            "ExternSymbol",
        ]);

        let ctx = factory.type_system();
        assert_eq!(factory.key(nodes[0]), NodeKey::ConstructedType(ctx.lookup_type("Alpha").unwrap()));
        assert_eq!(factory.key(nodes[12]), NodeKey::MethodCode(ctx.resolve_method_reference("Alpha::Run").unwrap()));
    }

    #[test]
    fn comparison_is_antisymmetric_and_consistent() {
        let factory = factory();
        let nodes = sample_nodes(&factory);

        for a in &nodes {
            assert_eq!(compare_nodes(&factory, *a, *a), Ordering::Equal);
            for b in &nodes {
                if a == b {
                    continue;
                }

                let forward = compare_nodes(&factory, *a, *b);
                assert_ne!(forward, Ordering::Equal);
                assert_eq!(forward, compare_nodes(&factory, *b, *a).reverse());
            }
        }
    }

    #[test]
    fn methods_order_by_owner_then_name_then_instantiation() {
        let factory = factory();
        let ctx = factory.type_system();
        let alpha = ctx.lookup_type("Alpha").unwrap();
        let beta = ctx.lookup_type("Beta").unwrap();
        let gen = ctx.resolve_method_reference("Alpha::Gen").unwrap();

        let gen_beta = ctx.instantiate_method(gen, vec![beta]).unwrap();
        let gen_alpha_array = ctx.instantiate_method(gen, vec![ctx.array_type(alpha)]).unwrap();
        let gen_alpha = ctx.instantiate_method(gen, vec![alpha]).unwrap();
        let beta_run = ctx.resolve_method_reference("Beta::Run").unwrap();
        let alpha_run = ctx.resolve_method_reference("Alpha::Run").unwrap();

        let mut nodes: Vec<NodeId> = [beta_run, gen_beta, alpha_run, gen_alpha_array, gen_alpha]
            .into_iter()
            .map(|m| factory.method_code(m))
            .collect();
        nodes.sort_by(|a, b| compare_nodes(&factory, *a, *b));

        let keys: Vec<NodeKey> = nodes.iter().map(|n| factory.key(*n)).collect();
        assert_eq!(keys, vec![
            NodeKey::MethodCode(gen_alpha),
            NodeKey::MethodCode(gen_alpha_array),
            NodeKey::MethodCode(gen_beta),
            NodeKey::MethodCode(alpha_run),
            NodeKey::MethodCode(beta_run),
        ]);
    }

    #[test]
    fn sort_does_not_depend_on_input_order() {
        let first = factory();
        let second = factory();

        let mut a = sample_nodes(&first);
        let mut b = sample_nodes(&second);
        b.reverse();

        a.sort_by(|x, y| compare_nodes(&first, *x, *y));
        b.sort_by(|x, y| compare_nodes(&second, *x, *y));

        let a: Vec<NodeKey> = a.into_iter().map(|n| first.key(n)).collect();
        let b: Vec<NodeKey> = b.into_iter().map(|n| second.key(n)).collect();
        assert_eq!(a, b);
    }
}
