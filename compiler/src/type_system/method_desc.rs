// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{fmt::Display, sync::Arc};

use super::{MethodBody, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    #[must_use]
    pub(super) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[must_use]
    pub(super) const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PInvokeImport {
    pub library: String,
    pub entry_point: String,
}

#[derive(Debug, Clone)]
pub struct MethodDesc {
    pub(super) owning_type: TypeId,
    pub(super) name: String,
    pub(super) flags: MethodFlags,

    /// The slot-introducing method this one overrides, if any.
    pub(super) overrides: Option<MethodId>,
    pub(super) generic_parameter_count: usize,
    pub(super) instantiation: Vec<TypeId>,

    /// For instantiated methods, the generic definition.
    pub(super) definition: Option<MethodId>,
    pub(super) body: Option<Arc<MethodBody>>,
    pub(super) pinvoke: Option<PInvokeImport>,
}

impl MethodDesc {
    #[must_use]
    pub const fn owning_type(&self) -> TypeId {
        self.owning_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn flags(&self) -> MethodFlags {
        self.flags
    }

    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.flags.is_virtual
    }

    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.flags.is_abstract
    }

    #[must_use]
    pub const fn overrides(&self) -> Option<MethodId> {
        self.overrides
    }

    #[must_use]
    pub const fn generic_parameter_count(&self) -> usize {
        self.generic_parameter_count
    }

    #[must_use]
    pub fn instantiation(&self) -> &[TypeId] {
        &self.instantiation
    }

    #[must_use]
    pub const fn definition(&self) -> Option<MethodId> {
        self.definition
    }

    #[must_use]
    pub fn body(&self) -> Option<&Arc<MethodBody>> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn pinvoke(&self) -> Option<&PInvokeImport> {
        self.pinvoke.as_ref()
    }

    /// A generic virtual method needs a runtime lookup instead of a vtable slot.
    #[must_use]
    pub const fn is_generic_virtual(&self) -> bool {
        self.flags.is_virtual && self.generic_parameter_count != 0
    }

    #[must_use]
    pub fn is_generic_definition(&self) -> bool {
        self.generic_parameter_count != 0 && self.instantiation.is_empty()
    }
}
