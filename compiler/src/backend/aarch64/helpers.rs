// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use crate::{
    backend::{TargetEmitter, TargetRegister},
    ready_to_run::{class_constructor_context_size, invalid_target, vtable_slot_offset},
    type_system::TypeId,
    CodeGenError,
    CodeGenResult,
    GenericHelperId,
    HelperEntrypoint,
    HelperTarget,
    NodeFactory,
    ReadyToRunHelperEmitter,
    ReadyToRunHelperId,
};

use super::{Arm64Emitter, ArmRegister};

impl Arm64Emitter {
    /// Expects the static base in the result register. The context address
    /// goes in the third argument register so the base survives until the
    /// thunk is called with both.
    fn emit_class_constructor_check(&mut self, factory: &NodeFactory, ty: TypeId, entrypoint: HelperEntrypoint, base_in_result: bool) -> CodeGenResult<()> {
        if !factory.type_system().type_desc(ty).has_static_constructor() {
            return self.emit_ret();
        }

        let pointer_size = factory.type_system().pointer_size();
        let context_size = class_constructor_context_size(pointer_size) as i32;

        if base_in_result {
            self.emit_lea(TargetRegister::Arg2, TargetRegister::Result, -context_size)?;
        } else {
            self.emit_load_address(TargetRegister::Arg2, factory.non_gc_static_base(ty))?;
            self.emit_add(TargetRegister::Arg2, -context_size)?;
        }

        self.emit_cmp(TargetRegister::Arg2, pointer_size as i32, 1)?;
        self.emit_ret_if_equal()?;

        self.emit_move_register(TargetRegister::Arg1, TargetRegister::Result)?;
        self.emit_move_register(TargetRegister::Arg0, TargetRegister::Arg2)?;
        self.emit_jmp(factory, factory.helper_entrypoint(entrypoint))
    }
}

impl ReadyToRunHelperEmitter for Arm64Emitter {
    fn emit_ready_to_run_helper(&mut self, factory: &NodeFactory, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenResult<()> {
        let architecture = self.architecture();
        let target_type = || target.as_type().ok_or_else(|| invalid_target(architecture, id, target));
        let target_method = || target.as_method().ok_or_else(|| invalid_target(architecture, id, target));

        match id {
            ReadyToRunHelperId::NewHelper => {
                let ty = target_type()?;
                self.emit_load_address(TargetRegister::Arg0, factory.constructed_type(ty))?;
                self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::AllocateObject))
            }

            ReadyToRunHelperId::NewArr1 => {
                let ty = target_type()?;
                self.emit_load_address(TargetRegister::Arg1, factory.constructed_type(ty))?;
                self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::AllocateArray))
            }

            ReadyToRunHelperId::IsInstanceOf | ReadyToRunHelperId::CastClass => {
                let ty = target_type()?;
                self.emit_load_address(TargetRegister::Arg1, factory.necessary_type(ty))?;
                let entrypoint = if id == ReadyToRunHelperId::IsInstanceOf {
                    HelperEntrypoint::IsInstanceOfClass
                } else {
                    HelperEntrypoint::CastClass
                };
                self.emit_jmp(factory, factory.helper_entrypoint(entrypoint))
            }

            ReadyToRunHelperId::GetNonGCStaticBase => {
                let ty = target_type()?;
                self.emit_load_address(TargetRegister::Result, factory.non_gc_static_base(ty))?;
                self.emit_class_constructor_check(factory, ty, HelperEntrypoint::EnsureClassConstructorRunAndReturnNonGCStaticBase, true)
            }

            ReadyToRunHelperId::GetGCStaticBase => {
                let ty = target_type()?;
                self.emit_load_address(TargetRegister::Result, factory.gc_static_base(ty))?;

                // The cell points at the handle, the handle at the object.
                self.emit_load_indirect(TargetRegister::Result)?;
                self.emit_load_indirect(TargetRegister::Result)?;
                self.emit_class_constructor_check(factory, ty, HelperEntrypoint::EnsureClassConstructorRunAndReturnGCStaticBase, false)
            }

            ReadyToRunHelperId::VirtualCall => {
                let method = target_method()?;
                let offset = vtable_slot_offset(factory.type_system(), method)?;

                self.emit_ldr(ArmRegister::IP0, ArmRegister::X0, 0)?;
                self.emit_ldr(ArmRegister::IP0, ArmRegister::IP0, offset as u32)?;
                self.emit_br(ArmRegister::IP0)
            }

            ReadyToRunHelperId::DelegateCtor => {
                let method = target_method()?;
                self.emit_load_address(TargetRegister::Arg2, factory.method_code(method))?;
                self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::DelegateCtor))
            }
        }
    }

    fn emit_generic_lookup_helper(&mut self, factory: &NodeFactory, id: GenericHelperId, slot: usize) -> CodeGenResult<()> {
        let offset = i32::try_from(slot * factory.type_system().pointer_size())
            .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "dictionary slot", value: slot as i64 })?;

        // The dictionary arrives in x0, which is also the result register.
        self.emit_load(TargetRegister::Result, TargetRegister::Arg0, offset)?;

        match id {
            GenericHelperId::DictionaryLookup => self.emit_ret(),
            GenericHelperId::NewObject => self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::AllocateObject)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        type_system::{ModuleManifest, TypeSystemContext},
        Architecture,
        ObjectData,
        OperatingSystem,
        Platform,
        RelocType,
    };

    fn factory() -> NodeFactory {
        let manifest = ModuleManifest::from_toml(r#"
            [[types]]
            name = "Config"
            [[types.fields]]
            name = "value"
            type = "System.Int64"
            static = true
            [[types.fields]]
            name = "name"
            type = "System.String"
            static = true
            [[types.methods]]
            name = ".cctor"
            static = true
            body = [{ op = "ret" }]
            [[types.methods]]
            name = "Reload"
            virtual = true
        "#).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 8).unwrap();
        NodeFactory::new(ctx, Platform::new(Architecture::AArch64, OperatingSystem::Linux))
    }

    fn words(data: &ObjectData) -> Vec<u32> {
        data.data().chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn helper(factory: &NodeFactory, id: ReadyToRunHelperId, target: HelperTarget) -> ObjectData {
        let node = factory.ready_to_run_helper(id, target);
        factory.ready_to_run_helper_data(node, id, target).unwrap()
    }

    #[test]
    fn new_object() {
        let factory = factory();
        let config = factory.type_system().lookup_type("Config").unwrap();
        let data = helper(&factory, ReadyToRunHelperId::NewHelper, HelperTarget::Type(config));

        assert_eq!(words(&data), vec![0x90000000, 0x91000000, 0x14000000]);

        let kinds: Vec<(usize, RelocType)> = data.relocs().iter().map(|r| (r.offset(), r.kind())).collect();
        assert_eq!(kinds, vec![
            (0, RelocType::Arm64PageBaseRel21),
            (4, RelocType::Arm64PageOffset12A),
            (8, RelocType::Arm64Branch26),
        ]);
    }

    #[test]
    fn non_gc_static_base_with_cctor() {
        let factory = factory();
        let config = factory.type_system().lookup_type("Config").unwrap();
        let data = helper(&factory, ReadyToRunHelperId::GetNonGCStaticBase, HelperTarget::Type(config));

        assert_eq!(words(&data), vec![
            0x90000000, // adrp x0, base
            0x91000000, // add x0, x0, :lo12:base
            0xD1004002, // sub x2, x0, #16
            0xB9400850, // ldr w16, [x2, #8]
            0x7100061F, // cmp w16, #1
            0x54000041, // b.ne +8
            0xD65F03C0, // ret
            0xAA0003E1, // mov x1, x0
            0xAA0203E0, // mov x0, x2
            0x14000000, // b thunk
        ]);
    }

    #[test]
    fn gc_static_base_reloads_the_context() {
        let factory = factory();
        let config = factory.type_system().lookup_type("Config").unwrap();
        let data = helper(&factory, ReadyToRunHelperId::GetGCStaticBase, HelperTarget::Type(config));

        let words = words(&data);
        assert_eq!(&words[..6], &[
            0x90000000, // adrp x0, gc base
            0x91000000, // add
            0xF9400000, // ldr x0, [x0]
            0xF9400000, // ldr x0, [x0]
            0x90000002, // adrp x2, non-gc base
            0x91000042, // add x2, x2, :lo12:
        ]);
        assert_eq!(words[6], 0xD1004042);
    }

    #[test]
    fn virtual_call() {
        let factory = factory();
        let reload = factory.type_system().resolve_method_reference("Config::Reload").unwrap();
        let data = helper(&factory, ReadyToRunHelperId::VirtualCall, HelperTarget::Method(reload));

        assert_eq!(words(&data), vec![
            0xF9400010, // ldr x16, [x0]
            0xF9400A10, // ldr x16, [x16, #16]
            0xD61F0200, // br x16
        ]);
        assert!(data.relocs().is_empty());
    }

    #[test]
    fn dictionary_lookup() {
        let factory = factory();
        let reload = factory.type_system().resolve_method_reference("Config::Reload").unwrap();
        let node = factory.generic_lookup_helper(GenericHelperId::DictionaryLookup, reload, 1);
        let data = factory.generic_lookup_helper_data(node, GenericHelperId::DictionaryLookup, 1).unwrap();

        assert_eq!(words(&data), vec![0xF9400400, 0xD65F03C0]);
    }
}
