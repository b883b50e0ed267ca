// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! The bytes every data node emits. The layouts match what the runtime
//! expects to find at the symbol.

use std::{collections::HashSet, ops::BitOr};

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    ready_to_run::vtable_slots,
    type_system::{GenericLookup, MethodId, TypeId, TypeSystemContext, TypeKind},
    CodeGenResult,
    NodeFactory,
    NodeId,
    ObjectData,
    ObjectDataBuilder,
};

use super::{NodeKey, ObjectNodeSection};

/// What the data is computed for.
#[derive(Debug, Clone, Copy)]
pub enum EmitMode<'a> {
    /// Only the relocations matter; they are the static dependencies.
    /// Contents that depend on what else gets marked are left out.
    RelocsOnly,

    /// The bytes that go into the object file.
    Final(&'a HashSet<NodeId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EETypeFlags(u16);

impl EETypeFlags {
    pub const VALUE_TYPE: Self = Self(0x0001);
    pub const ARRAY: Self = Self(0x0002);
    pub const HAS_CCTOR: Self = Self(0x0004);
    pub const HAS_POINTERS: Self = Self(0x0008);

    #[must_use]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn for_type(ctx: &TypeSystemContext, ty: TypeId) -> Self {
        let desc = ctx.type_desc(ty);
        let mut flags = Self::default();

        if desc.is_value_type() {
            flags = flags | Self::VALUE_TYPE;
        }

        if desc.has_static_constructor() {
            flags = flags | Self::HAS_CCTOR;
        }

        let has_pointers = match desc.kind() {
            TypeKind::Array { element } => ctx.type_desc(element).is_gc_reference(),
            _ => ctx.base_chain(ty).into_iter()
                .any(|t| ctx.type_desc(t).instance_fields().any(|f| ctx.type_desc(f.field_type()).is_gc_reference())),
        };

        if desc.is_array() {
            flags = flags | Self::ARRAY;
        }

        if has_pointers {
            flags = flags | Self::HAS_POINTERS;
        }

        flags
    }
}

impl BitOr for EETypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl NodeFactory {
    /// The section a node is placed in, `None` for nodes without bytes.
    #[must_use]
    pub fn section(&self, node: NodeId) -> Option<ObjectNodeSection> {
        Some(match self.key(node) {
            NodeKey::MethodCode(..) => {
                self.node(node).code().map_or(ObjectNodeSection::ManagedCode, |code| code.section)
            }

            NodeKey::ReadyToRunHelper { .. } | NodeKey::ReadyToRunGenericHelper { .. } => ObjectNodeSection::FoldableManagedCode,

            NodeKey::NecessaryType(..) | NodeKey::ConstructedType(..) | NodeKey::FrozenString(..) => ObjectNodeSection::ReadOnlyData,

            NodeKey::MethodDictionary(..) if self.platform().is_windows() => ObjectNodeSection::ReadOnlyData,

            NodeKey::MethodDictionary(..)
            | NodeKey::GcStaticBase(..)
            | NodeKey::NonGcStaticBase(..)
            | NodeKey::GcStaticsRegionStart
            | NodeKey::GcStaticsRegionEnd
            | NodeKey::StringIndirection(..)
            | NodeKey::PInvokeImportCell(..) => ObjectNodeSection::Data,

            NodeKey::ShadowConcreteMethod(..)
            | NodeKey::VirtualMethodUse(..)
            | NodeKey::GvmDependencies(..)
            | NodeKey::ExternSymbol(..) => return None,
        })
    }

    /// Computes the bytes of a node. `None` when the node emits nothing,
    /// including method code that was not generated yet.
    pub fn object_data(&self, node: NodeId, mode: EmitMode<'_>) -> CodeGenResult<Option<ObjectData>> {
        let ctx = self.type_system();
        let mut builder = ObjectDataBuilder::new(ctx.pointer_size());

        match self.key(node) {
            NodeKey::MethodCode(..) => return Ok(self.node(node).code().map(|code| code.data.clone())),

            NodeKey::ShadowConcreteMethod(..)
            | NodeKey::VirtualMethodUse(..)
            | NodeKey::GvmDependencies(..)
            | NodeKey::ExternSymbol(..) => return Ok(None),

            NodeKey::ReadyToRunHelper { id, target } => {
                return self.cached_data(node, || self.ready_to_run_helper_data(node, id, target)).map(Some);
            }

            NodeKey::ReadyToRunGenericHelper { id, slot, .. } => {
                return self.cached_data(node, || self.generic_lookup_helper_data(node, id, slot)).map(Some);
            }

            NodeKey::NecessaryType(ty) => {
                if let EmitMode::Final(marked) = mode {
                    let constructed = self.existing(&NodeKey::ConstructedType(ty));
                    if constructed.is_some_and(|x| marked.contains(&x)) {
                        return Ok(None);
                    }
                }
                self.emit_ee_type(&mut builder, node, ty, false, mode);
            }

            NodeKey::ConstructedType(ty) => self.emit_ee_type(&mut builder, node, ty, true, mode),

            NodeKey::MethodDictionary(method) => self.emit_dictionary(&mut builder, node, method, mode),

            NodeKey::GcStaticBase(ty) => {
                let pointer_size = ctx.pointer_size();
                builder.require_alignment(pointer_size);
                builder.add_symbol(node);

                // The cell points at the handle the runtime fills in.
                builder.emit_pointer_reloc(node, pointer_size as i32);
                builder.emit_naturalint(0);
                builder.emit_zeros(ctx.gc_static_size(ty).max(3 * pointer_size));
            }

            NodeKey::NonGcStaticBase(ty) => {
                let pointer_size = ctx.pointer_size();
                builder.require_alignment(pointer_size);

                if let Some(cctor) = ctx.type_desc(ty).static_constructor() {
                    builder.emit_pointer_reloc(self.method_code(cctor), 0);
                    builder.emit_int(0);
                    builder.pad_to_alignment(pointer_size);
                }

                builder.add_symbol(node);
                builder.emit_zeros(ctx.non_gc_static_size(ty).max(pointer_size));
                builder.pad_to_alignment(pointer_size);
            }

            NodeKey::GcStaticsRegionStart | NodeKey::GcStaticsRegionEnd => {
                builder.require_alignment(ctx.pointer_size());
                builder.add_symbol(node);
            }

            NodeKey::StringIndirection(value) => {
                builder.require_alignment(ctx.pointer_size());
                builder.add_symbol(node);
                builder.emit_pointer_reloc(self.frozen_string(value), 0);
            }

            NodeKey::PInvokeImportCell(import) => {
                builder.require_alignment(ctx.pointer_size());
                builder.add_symbol(node);
                builder.emit_pointer_reloc(self.extern_symbol(import.entry_point), 0);
            }

            NodeKey::FrozenString(value) => {
                let pointer_size = ctx.pointer_size();
                builder.require_alignment(pointer_size);
                builder.add_symbol(node);
                builder.emit_pointer_reloc(self.constructed_type(ctx.well_known().string), 0);

                let characters: Vec<u16> = value.encode_utf16().collect();
                builder.emit_int(characters.len() as i32);
                for character in characters {
                    builder.emit_short(character);
                }
                builder.emit_short(0);
                builder.pad_to_alignment(pointer_size);
            }
        }

        Ok(Some(builder.to_object_data()))
    }

    fn cached_data(&self, node: NodeId, compute: impl FnOnce() -> CodeGenResult<ObjectData>) -> CodeGenResult<ObjectData> {
        let node = self.node(node);
        if let Some(data) = node.cached_data().get() {
            return Ok(data.clone());
        }

        let data = compute()?;
        Ok(node.cached_data().get_or_init(|| data).clone())
    }

    fn emit_ee_type(&self, builder: &mut ObjectDataBuilder, node: NodeId, ty: TypeId, constructed: bool, mode: EmitMode<'_>) {
        let ctx = self.type_system();
        let pointer_size = ctx.pointer_size();
        let desc = ctx.type_desc(ty);

        builder.require_alignment(pointer_size);
        builder.add_symbol(node);

        builder.emit_short(ctx.component_size(ty) as u16);
        builder.emit_short(EETypeFlags::for_type(ctx, ty).bits());
        builder.emit_int(ctx.base_size(ty) as i32);

        match desc.base() {
            Some(base) if constructed => builder.emit_pointer_reloc(self.constructed_type(base), 0),
            Some(base) => builder.emit_pointer_reloc(self.necessary_type(base), 0),
            None => builder.emit_naturalint(0),
        }

        if !constructed {
            return;
        }

        for slot in vtable_slots(ctx, ty) {
            let EmitMode::Final(marked) = mode else {
                builder.emit_zeros(pointer_size);
                continue;
            };

            let implementation = ctx.find_override(ty, slot)
                .filter(|m| !ctx.method_desc(*m).is_abstract())
                .and_then(|m| self.existing(&NodeKey::MethodCode(m)))
                .filter(|code| marked.contains(code));

            match implementation {
                Some(code) => builder.emit_pointer_reloc(code, 0),
                None => builder.emit_zeros(pointer_size),
            }
        }
    }

    fn emit_dictionary(&self, builder: &mut ObjectDataBuilder, node: NodeId, method: MethodId, mode: EmitMode<'_>) {
        let ctx = self.type_system();
        let pointer_size = ctx.pointer_size();

        builder.require_alignment(pointer_size);
        builder.emit_int(dictionary_hash(&ctx.method_display_name(method)));
        builder.pad_to_alignment(pointer_size);
        builder.add_symbol(node);

        // The slots are the static dependencies of the shadow method.
        if let EmitMode::RelocsOnly = mode {
            return;
        }

        for lookup in self.dictionary_layout(method) {
            match self.dictionary_slot_target(method, &lookup) {
                Some(target) => builder.emit_pointer_reloc(target, 0),
                None => builder.emit_zeros(pointer_size),
            }
        }
    }

    /// The lookups of the shared body of `method`, in slot order.
    #[must_use]
    pub fn dictionary_layout(&self, method: MethodId) -> Vec<GenericLookup> {
        self.type_system().method_desc(method).body()
            .map(|body| GenericLookup::layout_of(body))
            .unwrap_or_default()
    }

    /// What a dictionary slot of the concrete `method` points at. `None`
    /// leaves the slot empty, for lookups the method never needs at runtime.
    #[must_use]
    pub fn dictionary_slot_target(&self, method: MethodId, lookup: &GenericLookup) -> Option<NodeId> {
        let ctx = self.type_system();
        let desc = ctx.method_desc(method);
        let instantiation = desc.instantiation();

        let resolved = match lookup {
            GenericLookup::TypeHandle { template } => {
                ctx.resolve_type(template, instantiation).map(|ty| Some(self.necessary_type(ty)))
            }

            GenericLookup::ConstructedTypeHandle { template } => {
                ctx.resolve_type(template, instantiation).map(|ty| Some(self.constructed_type(ty)))
            }

            GenericLookup::MethodDictionary { owner, method: name, instantiation: args } => {
                ctx.resolve_method_instantiation(owner, name, args, instantiation)
                    .map(|callee| ctx.requires_dictionary(callee).then(|| self.method_dictionary(callee)))
            }
        };

        match resolved {
            Ok(target) => target,
            Err(error) => {
                debug!("Dictionary slot of {} stays empty: {error}", ctx.method_display_name(method));
                None
            }
        }
    }
}

#[must_use]
fn dictionary_hash(name: &str) -> i32 {
    let digest = Sha256::digest(name.as_bytes());
    i32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}
