// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use super::MethodId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    #[must_use]
    pub(super) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[must_use]
    pub(super) const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Int32,
    Int64,
    IntPtr,
}

impl PrimitiveKind {
    #[must_use]
    pub const fn size(&self, pointer_size: usize) -> usize {
        match self {
            Self::Boolean => 1,
            Self::Byte => 1,
            Self::Int32 => 4,
            Self::Int64 => 8,
            Self::IntPtr => pointer_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    ValueType,
    Primitive(PrimitiveKind),
    Array { element: TypeId },

    /// The placeholder reference types are replaced by in shared generic code.
    Canon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    pub(super) name: String,
    pub(super) field_type: TypeId,
    pub(super) is_static: bool,
}

impl FieldDesc {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn field_type(&self) -> TypeId {
        self.field_type
    }

    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.is_static
    }
}

#[derive(Debug, Clone)]
pub struct TypeDesc {
    pub(super) name: String,
    pub(super) kind: TypeKind,
    pub(super) base: Option<TypeId>,
    pub(super) fields: Vec<FieldDesc>,
    pub(super) methods: Vec<MethodId>,

    /// New-slot virtual methods introduced by this type, in declaration order.
    pub(super) virtual_slots: Vec<MethodId>,
    pub(super) static_constructor: Option<MethodId>,
}

impl TypeDesc {
    #[must_use]
    pub(super) fn new(name: impl Into<String>, kind: TypeKind, base: Option<TypeId>) -> Self {
        Self {
            name: name.into(),
            kind,
            base,
            fields: Vec::new(),
            methods: Vec::new(),
            virtual_slots: Vec::new(),
            static_constructor: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    #[must_use]
    pub const fn base(&self) -> Option<TypeId> {
        self.base
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    #[must_use]
    pub fn methods(&self) -> &[MethodId] {
        &self.methods
    }

    #[must_use]
    pub fn virtual_slots(&self) -> &[MethodId] {
        &self.virtual_slots
    }

    #[must_use]
    pub const fn static_constructor(&self) -> Option<MethodId> {
        self.static_constructor
    }

    #[must_use]
    pub const fn has_static_constructor(&self) -> bool {
        self.static_constructor.is_some()
    }

    #[must_use]
    pub const fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::ValueType | TypeKind::Primitive(..))
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    /// Whether a value of this type is an object reference.
    #[must_use]
    pub const fn is_gc_reference(&self) -> bool {
        matches!(self.kind, TypeKind::Class | TypeKind::Array { .. } | TypeKind::Canon)
    }

    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDesc> {
        self.fields.iter().filter(|f| !f.is_static)
    }

    pub fn static_fields(&self) -> impl Iterator<Item = &FieldDesc> {
        self.fields.iter().filter(|f| f.is_static)
    }
}
