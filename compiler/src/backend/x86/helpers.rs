// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use crate::{
    backend::TargetEmitter,
    CodeGenError,
    CodeGenResult,
    GenericHelperId,
    HelperTarget,
    NodeFactory,
    ReadyToRunHelperEmitter,
    ReadyToRunHelperId,
};

use super::X86Emitter;

impl ReadyToRunHelperEmitter for X86Emitter {
    fn emit_ready_to_run_helper(&mut self, factory: &NodeFactory, id: ReadyToRunHelperId, target: HelperTarget) -> CodeGenResult<()> {
        self.emit_x86_family_helper(factory, id, target)
    }

    // Shared generic code is not generated for x86 yet, so nothing calls these.
    fn emit_generic_lookup_helper(&mut self, _: &NodeFactory, id: GenericHelperId, _: usize) -> CodeGenResult<()> {
        Err(CodeGenError::NotImplemented {
            architecture: self.architecture(),
            operation: format!("{} generic lookup helper", id.as_ref()),
        })
    }
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
        RelocType,
    };

    fn factory() -> NodeFactory {
        let manifest = ModuleManifest::from_toml(r#"
            [[types]]
            name = "Shape"
            [[types.methods]]
            name = "Area"
            virtual = true
            [[types.methods]]
            name = "Make"
            static = true
            body = [{ op = "ret" }]
        "#).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 4).unwrap();
        NodeFactory::new(ctx, Platform::new(Architecture::X86, OperatingSystem::Windows))
    }

    #[test]
    fn new_object_uses_absolute_addresses() {
        let factory = factory();
        let shape = factory.type_system().lookup_type("Shape").unwrap();
        let target = HelperTarget::Type(shape);
        let node = factory.ready_to_run_helper(ReadyToRunHelperId::NewHelper, target);
        let data = factory.ready_to_run_helper_data(node, ReadyToRunHelperId::NewHelper, target).unwrap();

        assert_eq!(data.data(), &[
            // lea ecx, [symbol]
            0x8D, 0x0D, 0, 0, 0, 0,
            0xE9, 0, 0, 0, 0,
        ]);
        let kinds: Vec<RelocType> = data.relocs().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec![RelocType::HighLow, RelocType::Rel32]);
    }

    #[test]
    fn virtual_call_uses_32_bit_slots() {
        let factory = factory();
        let area = factory.type_system().resolve_method_reference("Shape::Area").unwrap();
        let target = HelperTarget::Method(area);
        let node = factory.ready_to_run_helper(ReadyToRunHelperId::VirtualCall, target);
        let data = factory.ready_to_run_helper_data(node, ReadyToRunHelperId::VirtualCall, target).unwrap();

        assert_eq!(data.data(), &[
            // mov eax, [ecx]
            0x8B, 0x01,
            // jmp [eax + 12]
            0xFF, 0x60, 0x0C,
        ]);
    }

    #[test]
    fn delegate_ctor_needs_a_third_register() {
        let factory = factory();
        let make = factory.type_system().resolve_method_reference("Shape::Make").unwrap();
        let target = HelperTarget::Method(make);
        let node = factory.ready_to_run_helper(ReadyToRunHelperId::DelegateCtor, target);

        let result = factory.ready_to_run_helper_data(node, ReadyToRunHelperId::DelegateCtor, target);
        assert!(matches!(result, Err(CodeGenError::NotImplemented { architecture: Architecture::X86, .. })));
    }
}
