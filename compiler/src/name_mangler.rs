// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Linker symbol names. Names only depend on the node key, never on the
//! order nodes were created in.

use sha2::{Digest, Sha256};

use crate::{
    node::NodeKey,
    type_system::{MethodId, TypeId, TypeSystemContext},
    HelperTarget,
    NodeFactory,
    NodeId,
};

/// Makes a type or method name usable as a C identifier.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '[' if chars.peek() == Some(&']') => {
                chars.next();
                result += "__Array";
            }
            '<' | ',' => result += "__",
            '.' | '>' | ':' | ' ' => result.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '$' => result.push(c),
            c => result += &format!("_{:x}_", c as u32),
        }
    }

    result
}

fn type_name(ctx: &TypeSystemContext, ty: TypeId) -> String {
    sanitize(&ctx.type_name(ty))
}

fn method_name(ctx: &TypeSystemContext, method: MethodId) -> String {
    sanitize(&ctx.method_display_name(method))
}

fn string_hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

impl NodeFactory {
    /// The symbol a node defines, without the platform prefix. `None` for
    /// nodes that only carry dependencies.
    #[must_use]
    pub fn mangled_name(&self, id: NodeId) -> Option<String> {
        let ctx = self.type_system();

        Some(match self.key(id) {
            NodeKey::MethodCode(m) => method_name(ctx, m),
            NodeKey::MethodDictionary(m) => format!("__GenericDict_{}", method_name(ctx, m)),

            NodeKey::ShadowConcreteMethod(..)
            | NodeKey::VirtualMethodUse(..)
            | NodeKey::GvmDependencies(..) => return None,

            // Both forms share the symbol, the constructed one wins.
            NodeKey::NecessaryType(ty) | NodeKey::ConstructedType(ty) => format!("__EEType_{}", type_name(ctx, ty)),

            NodeKey::GcStaticBase(ty) => format!("__GCStaticBase_{}", type_name(ctx, ty)),
            NodeKey::NonGcStaticBase(ty) => format!("__NonGCStaticBase_{}", type_name(ctx, ty)),
            NodeKey::GcStaticsRegionStart => "__GCStaticRegionStart".to_string(),
            NodeKey::GcStaticsRegionEnd => "__GCStaticRegionEnd".to_string(),

            NodeKey::ReadyToRunHelper { id, target } => {
                let target = match target {
                    HelperTarget::Type(ty) => type_name(ctx, ty),
                    HelperTarget::Method(m) => method_name(ctx, m),
                };
                format!("__{}_{target}", id.as_ref())
            }

            NodeKey::ReadyToRunGenericHelper { id, owner, slot } => {
                format!("__GenericLookup_{}_{}_{slot}", id.as_ref(), method_name(ctx, owner))
            }

            NodeKey::ExternSymbol(name) => name,
            NodeKey::PInvokeImportCell(import) => format!("__pinvoke_{}_{}", sanitize(&import.library), sanitize(&import.entry_point)),
            NodeKey::StringIndirection(value) => format!("__Str_{}", string_hash(&value)),
            NodeKey::FrozenString(value) => format!("__FrozenStr_{}", string_hash(&value)),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{
        type_system::{ModuleManifest, PInvokeImport},
        Architecture,
        OperatingSystem,
        Platform,
        ReadyToRunHelperId,
    };

    #[rstest]
    #[case("Program.Main", "Program_Main")]
    #[case("System.String[]", "System_String__Array")]
    #[case("Util.Make<System.__Canon>", "Util_Make__System___Canon_")]
    #[case("Util.Pair<System.Int32,System.String>", "Util_Pair__System_Int32__System_String_")]
    #[case("a-b", "a_2d_b")]
    fn sanitized_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize(input), expected);
    }

    fn factory() -> NodeFactory {
        let manifest = ModuleManifest::from_toml(r#"
            [[types]]
            name = "App.Program"
            [[types.methods]]
            name = "Main"
            static = true
            body = [{ op = "ret" }]
        "#).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 8).unwrap();
        NodeFactory::new(ctx, Platform::new(Architecture::X64, OperatingSystem::Linux))
    }

    #[test]
    fn symbol_names() {
        let factory = factory();
        let ctx = factory.type_system();
        let program = ctx.lookup_type("App.Program").unwrap();
        let main = ctx.resolve_method_reference("App.Program::Main").unwrap();

        let name = |id| factory.mangled_name(id).unwrap();
        assert_eq!(name(factory.method_code(main)), "App_Program_Main");
        assert_eq!(name(factory.constructed_type(program)), "__EEType_App_Program");
        assert_eq!(name(factory.necessary_type(program)), "__EEType_App_Program");
        assert_eq!(name(factory.gc_static_base(program)), "__GCStaticBase_App_Program");
        assert_eq!(name(factory.non_gc_static_base(program)), "__NonGCStaticBase_App_Program");
        assert_eq!(name(factory.ready_to_run_helper(ReadyToRunHelperId::NewHelper, HelperTarget::Type(program))), "__NewHelper_App_Program");
        assert_eq!(name(factory.extern_symbol("__allocate_object".into())), "__allocate_object");
        assert_eq!(
            name(factory.pinvoke_import_cell(PInvokeImport { library: "libc".into(), entry_point: "puts".into() })),
            "__pinvoke_libc_puts",
        );

        assert_eq!(factory.mangled_name(factory.virtual_method_use(main)), None);
    }

    #[test]
    fn strings_are_named_by_content() {
        let factory = factory();
        let indirection = factory.mangled_name(factory.string_indirection("hello".into())).unwrap();
        let frozen = factory.mangled_name(factory.frozen_string("hello".into())).unwrap();

        assert_eq!(indirection, "__Str_2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
        assert_eq!(frozen, "__FrozenStr_2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
    }
}
