// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! The nodes of the compilation graph. A node is identified by its
//! [`NodeKey`]; the [`NodeFactory`](crate::NodeFactory) interns keys so the
//! same logical key always yields the same [`NodeId`].

mod compare;
mod data;
mod dependencies;
mod kind;

use std::{fmt::Display, sync::OnceLock};

pub use self::{
    compare::compare_nodes,
    data::{EETypeFlags, EmitMode},
    kind::{NodeKind, ObjectNodeSection, KIND_ORDER},
};

use crate::{
    graph::DependencyListEntry,
    type_system::{MethodId, PInvokeImport, TypeId},
    GenericHelperId,
    HelperTarget,
    ObjectData,
    ReadyToRunHelperId,
};

/// Handle of a node in the factory arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    MethodCode(MethodId),
    ShadowConcreteMethod(MethodId),
    MethodDictionary(MethodId),
    VirtualMethodUse(MethodId),
    GvmDependencies(MethodId),

    NecessaryType(TypeId),
    ConstructedType(TypeId),
    GcStaticBase(TypeId),
    NonGcStaticBase(TypeId),

    GcStaticsRegionStart,
    GcStaticsRegionEnd,

    ReadyToRunHelper {
        id: ReadyToRunHelperId,
        target: HelperTarget,
    },

    ReadyToRunGenericHelper {
        id: GenericHelperId,

        /// The canonical method whose dictionary is indexed.
        owner: MethodId,
        slot: usize,
    },

    ExternSymbol(String),
    PInvokeImportCell(PInvokeImport),
    StringIndirection(String),
    FrozenString(String),
}

impl NodeKey {
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::MethodCode(..) => NodeKind::MethodCode,
            Self::ShadowConcreteMethod(..) => NodeKind::ShadowConcreteMethod,
            Self::MethodDictionary(..) => NodeKind::MethodDictionary,
            Self::VirtualMethodUse(..) => NodeKind::VirtualMethodUse,
            Self::GvmDependencies(..) => NodeKind::GvmDependencies,
            Self::NecessaryType(..) => NodeKind::NecessaryType,
            Self::ConstructedType(..) => NodeKind::ConstructedType,
            Self::GcStaticBase(..) => NodeKind::GcStaticBase,
            Self::NonGcStaticBase(..) => NodeKind::NonGcStaticBase,
            Self::GcStaticsRegionStart => NodeKind::GcStaticsRegionStart,
            Self::GcStaticsRegionEnd => NodeKind::GcStaticsRegionEnd,
            Self::ReadyToRunHelper { .. } => NodeKind::ReadyToRunHelper,
            Self::ReadyToRunGenericHelper { .. } => NodeKind::ReadyToRunGenericHelper,
            Self::ExternSymbol(..) => NodeKind::ExternSymbol,
            Self::PInvokeImportCell(..) => NodeKind::PInvokeImportCell,
            Self::StringIndirection(..) => NodeKind::StringIndirection,
            Self::FrozenString(..) => NodeKind::FrozenString,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    NotYetComputed,
    StaticDependenciesComputed,
}

/// The result of compiling a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMethod {
    pub data: ObjectData,
    pub gc_info: Vec<u8>,
    pub eh_info: Option<Vec<u8>>,

    /// Dependencies that are not visible as relocations.
    pub extra_dependencies: Vec<DependencyListEntry>,
    pub section: ObjectNodeSection,
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    key: NodeKey,
    code: OnceLock<CompiledMethod>,
    cached_data: OnceLock<ObjectData>,
}

impl Node {
    #[must_use]
    pub(crate) fn new(id: NodeId, key: NodeKey) -> Self {
        Self {
            id,
            key,
            code: OnceLock::new(),
            cached_data: OnceLock::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn key(&self) -> &NodeKey {
        &self.key
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.key.kind()
    }

    /// Only method bodies have to wait for code generation before their
    /// dependencies are known.
    #[must_use]
    pub fn state(&self) -> NodeState {
        match self.key {
            NodeKey::MethodCode(..) if self.code.get().is_none() => NodeState::NotYetComputed,
            _ => NodeState::StaticDependenciesComputed,
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&CompiledMethod> {
        self.code.get()
    }

    /// Moves the node to [`NodeState::StaticDependenciesComputed`]. Returns
    /// the code back when it was already set.
    pub(crate) fn set_code(&self, code: CompiledMethod) -> Result<(), CompiledMethod> {
        debug_assert!(matches!(self.key, NodeKey::MethodCode(..)), "only method code nodes have code: {:?}", self.key);
        self.code.set(code)
    }

    pub(crate) fn cached_data(&self) -> &OnceLock<ObjectData> {
        &self.cached_data
    }
}
