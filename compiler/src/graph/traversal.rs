// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::HashSet;

use crate::type_system::{TypeId, TypeKind, TypeSystemContext};

/// Which instance fields pull their type in front of the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldInclusion {
    /// Only value-type fields, whose layout is part of the owner.
    #[default]
    ValueTypesOnly,
    Always,
}

/// Orders types so that every type comes after its base type, its array
/// element type and the types of its included fields.
#[derive(Debug)]
pub struct TypeTraversal<'a> {
    ctx: &'a TypeSystemContext,
    fields: FieldInclusion,
    visited: HashSet<TypeId>,
    order: Vec<TypeId>,
}

impl<'a> TypeTraversal<'a> {
    #[must_use]
    pub fn new(ctx: &'a TypeSystemContext, fields: FieldInclusion) -> Self {
        Self {
            ctx,
            fields,
            visited: HashSet::new(),
            order: Vec::new(),
        }
    }

    pub fn visit(&mut self, ty: TypeId) {
        if !self.visited.insert(ty) {
            return;
        }

        let desc = self.ctx.type_desc(ty);
        if let Some(base) = desc.base() {
            self.visit(base);
        }

        if let TypeKind::Array { element } = desc.kind() {
            self.visit(element);
        }

        for field in desc.instance_fields() {
            let include = match self.fields {
                FieldInclusion::Always => true,
                FieldInclusion::ValueTypesOnly => self.ctx.type_desc(field.field_type()).is_value_type(),
            };

            if include {
                self.visit(field.field_type());
            }
        }

        self.order.push(ty);
    }

    #[must_use]
    pub fn finish(self) -> Vec<TypeId> {
        self.order
    }
}
