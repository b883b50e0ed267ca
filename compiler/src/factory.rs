// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use log::{trace, warn};
use parking_lot::RwLock;

use crate::{
    node::{CompiledMethod, Node, NodeKey},
    type_system::{MethodId, PInvokeImport, TypeId, TypeSystemContext},
    GenericHelperId,
    HelperEntrypoint,
    HelperTarget,
    NodeId,
    Platform,
    ReadyToRunHelperId,
};

/// Owns every node of a compilation. The same key always gives the same
/// [`NodeId`], no matter which thread asks first.
#[derive(Debug)]
pub struct NodeFactory {
    type_system: TypeSystemContext,
    platform: Platform,
    ids: DashMap<NodeKey, NodeId>,
    nodes: RwLock<Vec<Arc<Node>>>,
}

impl NodeFactory {
    #[must_use]
    pub fn new(type_system: TypeSystemContext, platform: Platform) -> Self {
        debug_assert_eq!(type_system.pointer_size(), platform.pointer_size());

        Self {
            type_system,
            platform,
            ids: DashMap::new(),
            nodes: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn type_system(&self) -> &TypeSystemContext {
        &self.type_system
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Arc<Node> {
        Arc::clone(&self.nodes.read()[id.index()])
    }

    #[must_use]
    pub fn key(&self, id: NodeId) -> NodeKey {
        self.nodes.read()[id.index()].key().clone()
    }

    /// The number of nodes created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks a node up without creating it.
    #[must_use]
    pub fn existing(&self, key: &NodeKey) -> Option<NodeId> {
        self.ids.get(key).map(|id| *id)
    }

    pub fn intern(&self, key: NodeKey) -> NodeId {
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }

        match self.ids.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let mut nodes = self.nodes.write();
                let id = NodeId::new(nodes.len());
                trace!("New node {id}: {:?}", entry.key());
                nodes.push(Arc::new(Node::new(id, entry.key().clone())));
                entry.insert(id);
                id
            }
        }
    }

    pub fn method_code(&self, method: MethodId) -> NodeId {
        self.intern(NodeKey::MethodCode(method))
    }

    pub fn shadow_concrete_method(&self, method: MethodId) -> NodeId {
        self.intern(NodeKey::ShadowConcreteMethod(method))
    }

    pub fn method_dictionary(&self, method: MethodId) -> NodeId {
        self.intern(NodeKey::MethodDictionary(method))
    }

    pub fn virtual_method_use(&self, slot: MethodId) -> NodeId {
        self.intern(NodeKey::VirtualMethodUse(slot))
    }

    pub fn gvm_dependencies(&self, method: MethodId) -> NodeId {
        self.intern(NodeKey::GvmDependencies(method))
    }

    pub fn necessary_type(&self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::NecessaryType(ty))
    }

    pub fn constructed_type(&self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::ConstructedType(ty))
    }

    pub fn gc_static_base(&self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::GcStaticBase(ty))
    }

    pub fn non_gc_static_base(&self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::NonGcStaticBase(ty))
    }

    pub fn gc_statics_region_start(&self) -> NodeId {
        self.intern(NodeKey::GcStaticsRegionStart)
    }

    pub fn gc_statics_region_end(&self) -> NodeId {
        self.intern(NodeKey::GcStaticsRegionEnd)
    }

    pub fn ready_to_run_helper(&self, id: ReadyToRunHelperId, target: HelperTarget) -> NodeId {
        self.intern(NodeKey::ReadyToRunHelper { id, target })
    }

    pub fn generic_lookup_helper(&self, id: GenericHelperId, owner: MethodId, slot: usize) -> NodeId {
        self.intern(NodeKey::ReadyToRunGenericHelper { id, owner, slot })
    }

    pub fn extern_symbol(&self, name: String) -> NodeId {
        self.intern(NodeKey::ExternSymbol(name))
    }

    pub fn helper_entrypoint(&self, entrypoint: HelperEntrypoint) -> NodeId {
        self.extern_symbol(entrypoint.as_ref().to_string())
    }

    pub fn pinvoke_import_cell(&self, import: PInvokeImport) -> NodeId {
        self.intern(NodeKey::PInvokeImportCell(import))
    }

    pub fn string_indirection(&self, value: String) -> NodeId {
        self.intern(NodeKey::StringIndirection(value))
    }

    pub fn frozen_string(&self, value: String) -> NodeId {
        self.intern(NodeKey::FrozenString(value))
    }

    /// Cells holding the address of their target; jumps through them must
    /// load the pointer first.
    #[must_use]
    pub fn represents_indirection_cell(&self, id: NodeId) -> bool {
        matches!(self.key(id), NodeKey::PInvokeImportCell(..) | NodeKey::StringIndirection(..))
    }

    /// Sets the code of a method node. Code is set once; a second attempt is
    /// ignored.
    pub fn set_method_code(&self, id: NodeId, code: CompiledMethod) {
        if self.node(id).set_code(code).is_err() {
            warn!("Code of {} was already set", self.display_name(id));
            debug_assert!(false, "code of {id} set twice");
        }
    }

    /// A human readable name for diagnostics: the symbol name when the node
    /// has one.
    #[must_use]
    pub fn display_name(&self, id: NodeId) -> String {
        if let Some(name) = self.mangled_name(id) {
            return name;
        }

        let ctx = &self.type_system;
        match self.key(id) {
            NodeKey::ShadowConcreteMethod(m) => format!("ShadowConcreteMethod({})", ctx.method_display_name(m)),
            NodeKey::VirtualMethodUse(m) => format!("VirtualMethodUse({})", ctx.method_display_name(m)),
            NodeKey::GvmDependencies(m) => format!("GvmDependencies({})", ctx.method_display_name(m)),
            key => format!("{key:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{type_system::ModuleManifest, Architecture, OperatingSystem};

    fn factory() -> NodeFactory {
        let manifest = ModuleManifest::from_toml(r#"
            [[types]]
            name = "Program"
            [[types.methods]]
            name = "Main"
            static = true
            body = [{ op = "ret" }]
        "#).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 8).unwrap();
        NodeFactory::new(ctx, Platform::new(Architecture::X64, OperatingSystem::Linux))
    }

    #[test]
    fn same_key_same_node() {
        let factory = factory();
        let a = factory.string_indirection("hello".into());
        let b = factory.string_indirection("hello".into());
        let c = factory.frozen_string("hello".into());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(factory.len(), 2);
        assert_eq!(factory.key(a), NodeKey::StringIndirection("hello".into()));
    }

    #[test]
    fn concurrent_interning_is_memoized() {
        let factory = factory();

        let ids: Vec<Vec<NodeId>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| {
                (0..64).map(|i| factory.extern_symbol(format!("symbol_{i}"))).collect::<Vec<_>>()
            })).collect();

            handles.into_iter().map(|x| x.join().unwrap()).collect()
        });

        for other in &ids[1..] {
            assert_eq!(&ids[0], other);
        }

        let distinct: HashSet<NodeId> = ids[0].iter().copied().collect();
        assert_eq!(distinct.len(), 64);
        assert_eq!(factory.len(), 64);
    }

    #[test]
    fn helper_entrypoints_are_extern_symbols() {
        let factory = factory();
        let node = factory.helper_entrypoint(HelperEntrypoint::AllocateObject);
        assert_eq!(factory.key(node), NodeKey::ExternSymbol("__allocate_object".into()));
    }

    #[test]
    fn indirection_cells() {
        let factory = factory();
        let cell = factory.pinvoke_import_cell(PInvokeImport { library: "libc".into(), entry_point: "puts".into() });
        let string = factory.string_indirection("x".into());
        let main = factory.type_system().resolve_method_reference("Program::Main").unwrap();

        assert!(factory.represents_indirection_cell(cell));
        assert!(factory.represents_indirection_cell(string));
        assert!(!factory.represents_indirection_cell(factory.method_code(main)));
        assert!(!factory.represents_indirection_cell(factory.frozen_string("x".into())));
    }
}
