// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use log::warn;

use crate::{
    graph::{ConditionalDependency, DependencyListEntry, DependencyNodeProvider},
    ready_to_run::vtable_slots,
    type_system::{MethodId, TypeId},
    CompilationError,
    HelperTarget,
    NodeFactory,
    NodeId,
    ReadyToRunHelperId,
};

use super::{EmitMode, NodeKey, NodeState};

impl NodeFactory {
    /// Everything the relocations of a node point at.
    fn relocation_dependencies(&self, node: NodeId) -> Result<Vec<DependencyListEntry>, CompilationError> {
        let data = self.object_data(node, EmitMode::RelocsOnly)
            .map_err(|error| CompilationError::CodeGen { node: self.display_name(node), error })?;

        Ok(data.map(|data| data.reloc_targets()).unwrap_or_default()
            .into_iter()
            .filter(|target| *target != node)
            .map(|target| DependencyListEntry::new(target, "referenced"))
            .collect())
    }

    /// The concrete side of a shared method: the canonical body plus whatever
    /// its dictionary slots point at.
    fn shadow_dependencies(&self, method: MethodId) -> Vec<DependencyListEntry> {
        let ctx = self.type_system();
        let mut dependencies = vec![
            DependencyListEntry::new(self.method_code(ctx.canonical_method(method)), "canonical body"),
        ];

        for lookup in self.dictionary_layout(method) {
            let Some(target) = self.dictionary_slot_target(method, &lookup) else {
                continue;
            };

            dependencies.push(DependencyListEntry::new(target, "dictionary slot"));

            if let NodeKey::MethodDictionary(callee) = self.key(target) {
                dependencies.push(DependencyListEntry::new(self.method_code(ctx.canonical_method(callee)), "shared callee"));
            }
        }

        dependencies
    }

    fn instantiated_method_dependencies(&self, method: MethodId, reason: &'static str) -> Vec<DependencyListEntry> {
        let ctx = self.type_system();
        let mut dependencies = vec![DependencyListEntry::new(self.method_code(ctx.canonical_method(method)), reason)];

        if ctx.requires_dictionary(method) {
            dependencies.push(DependencyListEntry::new(self.method_dictionary(method), reason));
        }

        dependencies
    }
}

impl DependencyNodeProvider for NodeFactory {
    type Error = CompilationError;

    fn static_dependencies_computed(&self, node: NodeId) -> bool {
        self.node(node).state() == NodeState::StaticDependenciesComputed
    }

    fn static_dependencies(&self, node: NodeId) -> Result<Vec<DependencyListEntry>, Self::Error> {
        let ctx = self.type_system();

        match self.key(node) {
            NodeKey::ShadowConcreteMethod(method) => Ok(self.shadow_dependencies(method)),

            NodeKey::GvmDependencies(method) => {
                if ctx.method_desc(method).is_abstract() {
                    return Ok(Vec::new());
                }
                Ok(self.instantiated_method_dependencies(method, "generic virtual target"))
            }

            NodeKey::VirtualMethodUse(..) | NodeKey::ExternSymbol(..) => Ok(Vec::new()),

            NodeKey::MethodCode(..) => {
                let mut dependencies = self.relocation_dependencies(node)?;
                if let Some(code) = self.node(node).code() {
                    dependencies.extend(code.extra_dependencies.iter().cloned());
                }
                Ok(dependencies)
            }

            NodeKey::ReadyToRunHelper { id: ReadyToRunHelperId::VirtualCall, target: HelperTarget::Method(method) } => {
                let mut dependencies = self.relocation_dependencies(node)?;
                dependencies.push(DependencyListEntry::new(self.virtual_method_use(ctx.slot_declaration(method)), "virtual call"));
                Ok(dependencies)
            }

            _ => self.relocation_dependencies(node),
        }
    }

    fn conditional_dependencies(&self, node: NodeId) -> Vec<ConditionalDependency> {
        let ctx = self.type_system();

        match self.key(node) {
            NodeKey::MethodDictionary(method) => vec![ConditionalDependency {
                target: self.shadow_concrete_method(method),
                predicate: self.method_code(ctx.canonical_method(method)),
                reason: "dictionary of a compiled shared body",
            }],

            NodeKey::ConstructedType(ty) => virtual_slot_dependencies(self, ty),

            _ => Vec::new(),
        }
    }

    fn has_dynamic_dependencies(&self, node: NodeId) -> bool {
        matches!(self.key(node), NodeKey::GvmDependencies(..))
    }

    /// Generic virtual methods need an instantiation of every override in the
    /// constructed types.
    fn search_dynamic_dependencies(&self, node: NodeId, marked: &[NodeId], first: usize) -> Vec<DependencyListEntry> {
        let NodeKey::GvmDependencies(method) = self.key(node) else {
            return Vec::new();
        };

        let ctx = self.type_system();
        let declaration = ctx.slot_declaration(method);
        let instantiation = ctx.method_desc(method).instantiation().to_vec();

        let mut dependencies = Vec::new();
        for candidate in &marked[first..] {
            let NodeKey::ConstructedType(ty) = self.key(*candidate) else {
                continue;
            };

            let Some(implementation) = ctx.find_override(ty, declaration) else {
                continue;
            };

            if implementation == declaration || ctx.method_desc(implementation).is_abstract() {
                continue;
            }

            match ctx.instantiate_method(implementation, instantiation.clone()) {
                Ok(instance) => dependencies.extend(self.instantiated_method_dependencies(instance, "generic virtual override")),
                Err(error) => warn!("Override of {} in {} cannot be instantiated: {error}", ctx.method_display_name(method), ctx.type_name(ty)),
            }
        }

        dependencies
    }
}

/// Every implemented vtable slot is needed only when the slot is called.
fn virtual_slot_dependencies(factory: &NodeFactory, ty: TypeId) -> Vec<ConditionalDependency> {
    let ctx = factory.type_system();

    vtable_slots(ctx, ty).into_iter()
        .filter_map(|slot| {
            let implementation = ctx.find_override(ty, slot)?;
            if ctx.method_desc(implementation).is_abstract() {
                return None;
            }

            Some(ConditionalDependency {
                target: factory.method_code(implementation),
                predicate: factory.virtual_method_use(slot),
                reason: "virtual slot",
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        type_system::{ModuleManifest, TypeSystemContext},
        Architecture,
        OperatingSystem,
        Platform,
    };

    fn factory() -> NodeFactory {
        let manifest = ModuleManifest::from_toml(r#"
            [[types]]
            name = "Shape"
            [[types.methods]]
            name = "Area"
            virtual = true
            abstract = true
            [[types.methods]]
            name = "Describe"
            virtual = true
            body = [{ op = "ret" }]
            [[types.methods]]
            name = "Accept"
            virtual = true
            generic_params = 1
            body = [{ op = "ret" }]

            [[types]]
            name = "Circle"
            base = "Shape"
            [[types.methods]]
            name = "Area"
            override = true
            body = [{ op = "ret" }]
            [[types.methods]]
            name = "Accept"
            override = true
            generic_params = 1
            body = [{ op = "new_obj", type = "!!0" }, { op = "ret" }]

            [[types]]
            name = "Factory"
            [[types.methods]]
            name = "Create"
            static = true
            generic_params = 1
            body = [
                { op = "new_obj", type = "!!0" },
                { op = "call", type = "Factory", method = "Wrap", instantiation = ["!!0"] },
                { op = "ret" },
            ]
            [[types.methods]]
            name = "Wrap"
            static = true
            generic_params = 1
            body = [{ op = "cast_class", type = "!!0" }, { op = "ret" }]
        "#).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 8).unwrap();
        NodeFactory::new(ctx, Platform::new(Architecture::X64, OperatingSystem::Linux))
    }

    fn keys(factory: &NodeFactory, entries: &[DependencyListEntry]) -> Vec<NodeKey> {
        entries.iter().map(|x| factory.key(x.node)).collect()
    }

    #[test]
    fn shadow_method_pulls_in_dictionary_targets() {
        let factory = factory();
        let ctx = factory.type_system();
        let circle = ctx.lookup_type("Circle").unwrap();
        let create = ctx.resolve_method_reference("Factory::Create").unwrap();
        let wrap = ctx.resolve_method_reference("Factory::Wrap").unwrap();

        let create_circle = ctx.instantiate_method(create, vec![circle]).unwrap();
        let wrap_circle = ctx.instantiate_method(wrap, vec![circle]).unwrap();

        let shadow = factory.shadow_concrete_method(create_circle);
        let dependencies = factory.static_dependencies(shadow).unwrap();

        assert_eq!(keys(&factory, &dependencies), vec![
            NodeKey::MethodCode(ctx.canonical_method(create_circle)),
            NodeKey::ConstructedType(circle),
            NodeKey::MethodDictionary(wrap_circle),
            NodeKey::MethodCode(ctx.canonical_method(wrap_circle)),
        ]);
    }

    #[test]
    fn dictionary_waits_for_the_canonical_body() {
        let factory = factory();
        let ctx = factory.type_system();
        let create = ctx.resolve_method_reference("Factory::Create").unwrap();
        let create_circle = ctx.instantiate_method(create, vec![ctx.lookup_type("Circle").unwrap()]).unwrap();

        let conditionals = factory.conditional_dependencies(factory.method_dictionary(create_circle));
        assert_eq!(conditionals.len(), 1);
        assert_eq!(factory.key(conditionals[0].target), NodeKey::ShadowConcreteMethod(create_circle));
        assert_eq!(factory.key(conditionals[0].predicate), NodeKey::MethodCode(ctx.canonical_method(create_circle)));
    }

    #[test]
    fn implemented_slots_depend_on_their_use() {
        let factory = factory();
        let ctx = factory.type_system();
        let circle = ctx.lookup_type("Circle").unwrap();
        let area = ctx.resolve_method_reference("Shape::Area").unwrap();
        let describe = ctx.resolve_method_reference("Shape::Describe").unwrap();
        let circle_area = ctx.resolve_method_reference("Circle::Area").unwrap();

        let conditionals: Vec<(NodeKey, NodeKey)> = factory.conditional_dependencies(factory.constructed_type(circle))
            .into_iter()
            .map(|x| (factory.key(x.target), factory.key(x.predicate)))
            .collect();

        assert_eq!(conditionals, vec![
            (NodeKey::MethodCode(circle_area), NodeKey::VirtualMethodUse(area)),
            (NodeKey::MethodCode(describe), NodeKey::VirtualMethodUse(describe)),
        ]);

        // The abstract slot of the base type has nothing to offer.
        let shape = ctx.lookup_type("Shape").unwrap();
        assert_eq!(factory.conditional_dependencies(factory.constructed_type(shape)).len(), 1);
    }

    #[test]
    fn generic_virtual_overrides_are_found_in_constructed_types() {
        let factory = factory();
        let ctx = factory.type_system();
        let circle = ctx.lookup_type("Circle").unwrap();
        let accept = ctx.resolve_method_reference("Shape::Accept").unwrap();
        let circle_accept = ctx.resolve_method_reference("Circle::Accept").unwrap();
        let accept_int = ctx.instantiate_method(accept, vec![ctx.well_known().int32]).unwrap();

        let gvm = factory.gvm_dependencies(accept_int);
        assert!(factory.has_dynamic_dependencies(gvm));

        let marked = vec![factory.necessary_type(circle), factory.constructed_type(circle)];
        let found = factory.search_dynamic_dependencies(gvm, &marked, 0);
        let expected = ctx.instantiate_method(circle_accept, vec![ctx.well_known().int32]).unwrap();
        assert_eq!(keys(&factory, &found), vec![NodeKey::MethodCode(expected)]);

        assert!(factory.search_dynamic_dependencies(gvm, &marked, 2).is_empty());
    }
}
