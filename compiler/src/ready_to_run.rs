// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Ready-to-run helpers: small stubs that method bodies call for allocation,
//! casting, static bases, virtual dispatch and delegate construction. The
//! helper kinds are a closed set, every architecture emits all of them.

use strum::{AsRefStr, EnumIter};

use crate::{
    backend::create_emitter,
    type_system::{MethodId, TypeId, TypeSystemContext},
    Architecture,
    CodeGenError,
    CodeGenResult,
    NodeFactory,
    NodeId,
    ObjectData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, EnumIter)]
pub enum ReadyToRunHelperId {
    NewHelper,
    NewArr1,
    IsInstanceOf,
    CastClass,
    GetNonGCStaticBase,
    GetGCStaticBase,
    VirtualCall,
    DelegateCtor,
}

/// Helpers used by shared generic code. They receive the generic dictionary
/// in the first argument register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, EnumIter)]
pub enum GenericHelperId {
    /// Returns the dictionary slot.
    DictionaryLookup,

    /// Allocates an object of the type in the dictionary slot.
    NewObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperTarget {
    Type(TypeId),
    Method(MethodId),
}

impl HelperTarget {
    #[must_use]
    pub const fn as_type(&self) -> Option<TypeId> {
        match self {
            Self::Type(ty) => Some(*ty),
            Self::Method(..) => None,
        }
    }

    #[must_use]
    pub const fn as_method(&self) -> Option<MethodId> {
        match self {
            Self::Method(method) => Some(*method),
            Self::Type(..) => None,
        }
    }
}

/// Entry points provided by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
pub enum HelperEntrypoint {
    #[strum(serialize = "__allocate_object")]
    AllocateObject,

    #[strum(serialize = "__allocate_array")]
    AllocateArray,

    #[strum(serialize = "__isinst_class")]
    IsInstanceOfClass,

    #[strum(serialize = "__castclass_class")]
    CastClass,

    #[strum(serialize = "__ensure_cctor_run_and_return_nongc_static_base")]
    EnsureClassConstructorRunAndReturnNonGCStaticBase,

    #[strum(serialize = "__ensure_cctor_run_and_return_gc_static_base")]
    EnsureClassConstructorRunAndReturnGCStaticBase,

    #[strum(serialize = "__delegate_ctor")]
    DelegateCtor,

    #[strum(serialize = "__resolve_generic_virtual")]
    ResolveGenericVirtual,

    #[strum(serialize = "__throw_exception")]
    ThrowException,

    #[strum(serialize = "__compilation_failure")]
    CompilationFailure,
}

pub trait ReadyToRunHelperEmitter {
    fn emit_ready_to_run_helper(&mut self, factory: &NodeFactory, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenResult<()>;

    /// `slot` is the index into the dictionary passed in the first argument.
    fn emit_generic_lookup_helper(&mut self, factory: &NodeFactory, id: GenericHelperId, slot: usize) -> CodeGenResult<()>;
}

/// Component size and flags, base size, then the base type pointer.
#[must_use]
pub const fn vtable_offset(pointer_size: usize) -> usize {
    8 + pointer_size
}

/// The cctor method pointer and the "has run" flag, in front of the non-GC statics.
#[must_use]
pub const fn class_constructor_context_size(pointer_size: usize) -> usize {
    2 * pointer_size
}

/// The new-slot virtual methods `ty` introduces that live in the vtable.
/// Generic virtual methods are dispatched at runtime instead.
fn own_vtable_slots(ctx: &TypeSystemContext, ty: TypeId) -> Vec<MethodId> {
    ctx.type_desc(ty).virtual_slots().iter()
        .copied()
        .filter(|m| !ctx.method_desc(*m).is_generic_virtual())
        .collect()
}

/// Every slot of the vtable of `ty`, base type slots first.
#[must_use]
pub fn vtable_slots(ctx: &TypeSystemContext, ty: TypeId) -> Vec<MethodId> {
    ctx.base_chain(ty).into_iter()
        .rev()
        .flat_map(|ty| own_vtable_slots(ctx, ty))
        .collect()
}

/// Walks the base chain of the declaring type to count the slots in front of
/// it, then finds the method in the declaring type's own slots.
#[must_use]
pub fn virtual_slot_index(ctx: &TypeSystemContext, method: MethodId) -> Option<usize> {
    let declaration = ctx.slot_declaration(method);
    let owner = ctx.method_desc(declaration).owning_type();

    let index = own_vtable_slots(ctx, owner).iter().position(|m| *m == declaration)?;
    let base_slots: usize = ctx.base_chain(owner).into_iter()
        .skip(1)
        .map(|ty| own_vtable_slots(ctx, ty).len())
        .sum();

    Some(base_slots + index)
}

/// Byte offset of the vtable slot of `method` from the start of the type.
pub fn vtable_slot_offset(ctx: &TypeSystemContext, method: MethodId) -> CodeGenResult<i32> {
    let index = virtual_slot_index(ctx, method).ok_or_else(|| CodeGenError::TypeSystem(
        crate::TypeSystemError::MissingMethod {
            owner: ctx.type_name(ctx.method_desc(method).owning_type()),
            name: ctx.method_desc(method).name().to_string(),
        }
    ))?;

    let pointer_size = ctx.pointer_size();
    let offset = vtable_offset(pointer_size) + index * pointer_size;
    i32::try_from(offset).map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "vtable slot", value: offset as i64 })
}

#[must_use]
pub(crate) fn invalid_target(architecture: Architecture, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenError {
    CodeGenError::NotImplemented {
        architecture,
        operation: format!("{} helper for {target:?}", id.as_ref()),
    }
}

impl NodeFactory {
    pub(crate) fn ready_to_run_helper_data(&self, node: NodeId, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenResult<ObjectData> {
        let mut emitter = create_emitter(self.platform());
        emitter.builder().add_symbol(node);
        emitter.emit_ready_to_run_helper(self, id, target)?;
        Ok(emitter.finish())
    }

    pub(crate) fn generic_lookup_helper_data(&self, node: NodeId, id: GenericHelperId, slot: usize) -> CodeGenResult<ObjectData> {
        let mut emitter = create_emitter(self.platform());
        emitter.builder().add_symbol(node);
        emitter.emit_generic_lookup_helper(self, id, slot)?;
        Ok(emitter.finish())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::type_system::ModuleManifest;

    const MODULE: &str = r#"
        [[types]]
        name = "Animal"
        [[types.methods]]
        name = "Speak"
        virtual = true
        [[types.methods]]
        name = "Eat"
        virtual = true
        [[types.methods]]
        name = "Visit"
        virtual = true
        generic_params = 1

        [[types]]
        name = "Dog"
        base = "Animal"
        [[types.methods]]
        name = "Eat"
        override = true
        [[types.methods]]
        name = "Fetch"
        virtual = true

        [[types]]
        name = "Puppy"
        base = "Dog"
        [[types.methods]]
        name = "Speak"
        override = true
        [[types.methods]]
        name = "Nap"
        virtual = true
    "#;

    fn context(pointer_size: usize) -> TypeSystemContext {
        TypeSystemContext::from_manifest(&ModuleManifest::from_toml(MODULE).unwrap(), pointer_size).unwrap()
    }

    #[rstest]
    #[case("Animal::Speak", 0)]
    #[case("Animal::Eat", 1)]
    #[case("Dog::Eat", 1)]
    #[case("Dog::Fetch", 2)]
    #[case("Puppy::Speak", 0)]
    #[case("Puppy::Nap", 3)]
    fn slot_indices(#[case] method: &str, #[case] expected: usize) {
        let ctx = context(8);
        let method = ctx.resolve_method_reference(method).unwrap();
        assert_eq!(virtual_slot_index(&ctx, method), Some(expected));
    }

    #[test]
    fn slot_indices_are_stable_across_contexts() {
        let first = context(8);
        let second = context(8);
        for name in ["Animal::Speak", "Dog::Fetch", "Puppy::Nap"] {
            let a = first.resolve_method_reference(name).unwrap();
            let b = second.resolve_method_reference(name).unwrap();
            assert_eq!(virtual_slot_index(&first, a), virtual_slot_index(&second, b));
        }
    }

    #[test]
    fn generic_virtual_methods_have_no_slot() {
        let ctx = context(8);
        let visit = ctx.resolve_method_reference("Animal::Visit").unwrap();
        assert_eq!(virtual_slot_index(&ctx, visit), None);
    }

    #[rstest]
    #[case(8, "Dog::Fetch", 16 + 2 * 8)]
    #[case(4, "Dog::Fetch", 12 + 2 * 4)]
    #[case(8, "Animal::Speak", 16)]
    fn slot_offsets(#[case] pointer_size: usize, #[case] method: &str, #[case] expected: i32) {
        let ctx = context(pointer_size);
        let method = ctx.resolve_method_reference(method).unwrap();
        assert_eq!(vtable_slot_offset(&ctx, method), Ok(expected));
    }

    #[test]
    fn vtable_of_most_derived_type() {
        let ctx = context(8);
        let puppy = ctx.lookup_type("Puppy").unwrap();
        let names: Vec<String> = vtable_slots(&ctx, puppy).into_iter()
            .map(|m| ctx.method_display_name(m))
            .collect();
        assert_eq!(names, vec!["Animal.Speak", "Animal.Eat", "Dog.Fetch", "Puppy.Nap"]);
    }
}
