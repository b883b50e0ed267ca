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

use super::{AddrMode, X64Emitter, X86FamilyEmitter, X86FamilyRegister};

impl<Reg: X86FamilyRegister> X86FamilyEmitter<Reg> {
    pub(crate) fn emit_x86_family_helper(&mut self, factory: &NodeFactory, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenResult<()> {
        let architecture = Reg::MODE.architecture();
        let target_type = || target.as_type().ok_or_else(|| invalid_target(architecture, id, target));

        match id {
            ReadyToRunHelperId::NewHelper => {
                self.emit_load_address(TargetRegister::Arg0, factory.constructed_type(target_type()?))?;
                self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::AllocateObject))
            }

            ReadyToRunHelperId::NewArr1 => {
                // The element count is already in the first argument.
                self.emit_load_address(TargetRegister::Arg1, factory.constructed_type(target_type()?))?;
                self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::AllocateArray))
            }

            ReadyToRunHelperId::IsInstanceOf | ReadyToRunHelperId::CastClass => {
                self.emit_load_address(TargetRegister::Arg1, factory.necessary_type(target_type()?))?;
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
                let method = target.as_method().ok_or_else(|| invalid_target(architecture, id, target))?;
                let offset = vtable_slot_offset(factory.type_system(), method)?;

                self.emit_load(TargetRegister::Result, TargetRegister::Arg0, 0)?;
                let vtable = self.register(TargetRegister::Result)?;
                self.emit_jmp_indirect(&AddrMode::new(vtable).with_offset(offset).with_size(self.native_size()))
            }

            ReadyToRunHelperId::DelegateCtor => {
                let method = target.as_method().ok_or_else(|| invalid_target(architecture, id, target))?;
                self.emit_load_address(TargetRegister::Arg2, factory.method_code(method))?;
                self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::DelegateCtor))
            }
        }
    }

    /// Expects the static base in the result register. Returns straight away
    /// when the type has no cctor or when it already ran. The context sits
    /// right before the non-GC base, which `base_in_result` says is what the
    /// result register holds.
    fn emit_class_constructor_check(&mut self, factory: &NodeFactory, ty: TypeId, entrypoint: HelperEntrypoint, base_in_result: bool) -> CodeGenResult<()> {
        if !factory.type_system().type_desc(ty).has_static_constructor() {
            return self.emit_ret();
        }

        let pointer_size = factory.type_system().pointer_size();
        let context_size = class_constructor_context_size(pointer_size) as i32;
        if base_in_result {
            self.emit_lea(TargetRegister::Arg0, TargetRegister::Result, -context_size)?;
        } else {
            let context = self.register(TargetRegister::Arg0)?;
            self.emit_lea_symbol(context, factory.non_gc_static_base(ty), -context_size)?;
        }

        // The initialized flag follows the cctor pointer.
        self.emit_cmp(TargetRegister::Arg0, pointer_size as i32, 1)?;
        self.emit_ret_if_equal()?;

        self.emit_move_register(TargetRegister::Arg1, TargetRegister::Result)?;
        self.emit_jmp(factory, factory.helper_entrypoint(entrypoint))
    }

    pub(crate) fn emit_x86_family_generic_lookup(&mut self, factory: &NodeFactory, id: GenericHelperId, slot: usize) -> CodeGenResult<()> {
        let pointer_size = factory.type_system().pointer_size();
        let offset = i32::try_from(slot * pointer_size)
            .map_err(|_| CodeGenError::ImmediateOutOfRange { operation: "dictionary slot", value: slot as i64 })?;

        self.emit_load(TargetRegister::Result, TargetRegister::Arg0, offset)?;

        match id {
            GenericHelperId::DictionaryLookup => self.emit_ret(),
            GenericHelperId::NewObject => {
                self.emit_move_register(TargetRegister::Arg0, TargetRegister::Result)?;
                self.emit_jmp(factory, factory.helper_entrypoint(HelperEntrypoint::AllocateObject))
            }
        }
    }
}

impl ReadyToRunHelperEmitter for X64Emitter {
    fn emit_ready_to_run_helper(&mut self, factory: &NodeFactory, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenResult<()> {
        self.emit_x86_family_helper(factory, id, target)
    }

    fn emit_generic_lookup_helper(&mut self, factory: &NodeFactory, id: GenericHelperId, slot: usize) -> CodeGenResult<()> {
        self.emit_x86_family_generic_lookup(factory, id, slot)
    }
}
