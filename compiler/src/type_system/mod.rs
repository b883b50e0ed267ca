// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! A deliberately small model of a managed type system: enough to describe the
//! types, methods and generic instantiations the compilation graph is built
//! from. Instantiations are created on demand, from any thread.

mod body;
mod manifest;
mod method_desc;
mod type_desc;

use std::{collections::{HashMap, HashSet}, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use log::debug;
use parking_lot::RwLock;

pub use self::{
    body::{is_generic_template, GenericLookup, MethodBody, Operation},
    manifest::{
        FieldManifest,
        ManifestError,
        ManifestResult,
        MethodManifest,
        ModuleManifest,
        NativeLibraryManifest,
        PInvokeManifest,
        TypeKindManifest,
        TypeManifest,
    },
    method_desc::{MethodDesc, MethodFlags, MethodId, PInvokeImport},
    type_desc::{FieldDesc, PrimitiveKind, TypeDesc, TypeId, TypeKind},
};

use crate::{TypeSystemError, TypeSystemResult};

pub const STATIC_CONSTRUCTOR_NAME: &str = ".cctor";

#[derive(Debug, Clone, Copy)]
pub struct WellKnownTypes {
    pub object: TypeId,
    pub string: TypeId,
    pub canon: TypeId,
    pub boolean: TypeId,
    pub byte: TypeId,
    pub int32: TypeId,
    pub int64: TypeId,
    pub intptr: TypeId,
}

#[derive(Debug)]
pub struct TypeSystemContext {
    pointer_size: usize,
    types: RwLock<Vec<Arc<TypeDesc>>>,
    methods: RwLock<Vec<Arc<MethodDesc>>>,
    type_names: HashMap<String, TypeId>,
    array_types: DashMap<TypeId, TypeId>,
    instantiations: DashMap<(MethodId, Vec<TypeId>), MethodId>,
    native_libraries: HashMap<String, HashSet<String>>,
    well_known: WellKnownTypes,
    entry_point: Option<String>,
    roots: Vec<String>,
}

impl TypeSystemContext {
    /// Loads a module manifest, validating everything that can be validated
    /// up front. Method bodies stay unresolved until they are compiled.
    pub fn from_manifest(manifest: &ModuleManifest, pointer_size: usize) -> ManifestResult<Self> {
        let mut types = Vec::new();
        let mut type_names = HashMap::new();

        fn define(types: &mut Vec<TypeDesc>, type_names: &mut HashMap<String, TypeId>, desc: TypeDesc) -> TypeId {
            let id = TypeId::new(types.len());
            type_names.insert(desc.name.clone(), id);
            types.push(desc);
            id
        }

        let object = define(&mut types, &mut type_names, TypeDesc::new("System.Object", TypeKind::Class, None));
        let mut primitive = |name: &str, kind| define(&mut types, &mut type_names, TypeDesc::new(name, TypeKind::Primitive(kind), None));
        let boolean = primitive("System.Boolean", PrimitiveKind::Boolean);
        let byte = primitive("System.Byte", PrimitiveKind::Byte);
        let int32 = primitive("System.Int32", PrimitiveKind::Int32);
        let int64 = primitive("System.Int64", PrimitiveKind::Int64);
        let intptr = primitive("System.IntPtr", PrimitiveKind::IntPtr);

        let well_known = WellKnownTypes {
            object,
            string: define(&mut types, &mut type_names, TypeDesc::new("System.String", TypeKind::Class, Some(object))),
            canon: define(&mut types, &mut type_names, TypeDesc::new("System.__Canon", TypeKind::Canon, Some(object))),
            boolean,
            byte,
            int32,
            int64,
            intptr,
        };

        let first_module_type = types.len();
        for ty in &manifest.types {
            if type_names.contains_key(&ty.name) {
                return Err(ManifestError::DuplicateType { name: ty.name.clone() });
            }

            let kind = match ty.kind {
                TypeKindManifest::Class => TypeKind::Class,
                TypeKindManifest::Struct => TypeKind::ValueType,
            };
            define(&mut types, &mut type_names, TypeDesc::new(ty.name.clone(), kind, None));
        }

        let mut builder = ContextBuilder {
            types,
            type_names,
            methods: Vec::new(),
            array_types: HashMap::new(),
            pending_overrides: Vec::new(),
        };

        for (index, ty) in manifest.types.iter().enumerate() {
            let id = TypeId::new(first_module_type + index);
            builder.types[id.index()].base = match (&ty.base, ty.kind) {
                (Some(base), _) => Some(builder.type_names.get(base).copied().ok_or_else(|| ManifestError::UnknownBaseType {
                    name: ty.name.clone(),
                    base: base.clone(),
                })?),
                (None, TypeKindManifest::Class) => Some(object),
                (None, TypeKindManifest::Struct) => None,
            };
        }

        for index in 0..manifest.types.len() {
            builder.check_acyclic(TypeId::new(first_module_type + index))?;
        }

        for (index, ty) in manifest.types.iter().enumerate() {
            let id = TypeId::new(first_module_type + index);
            builder.load_fields(id, ty)?;
            builder.load_methods(id, ty)?;
        }

        builder.resolve_overrides()?;

        let native_libraries = manifest.native_libraries.iter()
            .map(|lib| (lib.name.clone(), lib.exports.iter().cloned().collect()))
            .collect();

        debug!("Loaded {} types and {} methods from manifest", builder.types.len(), builder.methods.len());

        let array_types = builder.array_types.into_iter().collect();
        Ok(Self {
            pointer_size,
            types: RwLock::new(builder.types.into_iter().map(Arc::new).collect()),
            methods: RwLock::new(builder.methods.into_iter().map(Arc::new).collect()),
            type_names: builder.type_names,
            array_types,
            instantiations: DashMap::new(),
            native_libraries,
            well_known,
            entry_point: manifest.entry_point.clone(),
            roots: manifest.roots.clone(),
        })
    }

    #[must_use]
    pub const fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    #[must_use]
    pub const fn well_known(&self) -> &WellKnownTypes {
        &self.well_known
    }

    #[must_use]
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    #[must_use]
    pub fn type_desc(&self, id: TypeId) -> Arc<TypeDesc> {
        Arc::clone(&self.types.read()[id.index()])
    }

    #[must_use]
    pub fn method_desc(&self, id: MethodId) -> Arc<MethodDesc> {
        Arc::clone(&self.methods.read()[id.index()])
    }

    #[must_use]
    pub fn type_name(&self, id: TypeId) -> String {
        self.type_desc(id).name.clone()
    }

    /// `Owner.Name` with the instantiation in angle brackets, if any.
    #[must_use]
    pub fn method_display_name(&self, id: MethodId) -> String {
        let method = self.method_desc(id);
        let mut name = format!("{}.{}", self.type_name(method.owning_type), method.name);
        if !method.instantiation.is_empty() {
            let args: Vec<String> = method.instantiation.iter().map(|x| self.type_name(*x)).collect();
            name += &format!("<{}>", args.join(","));
        }
        name
    }

    pub fn lookup_type(&self, name: &str) -> TypeSystemResult<TypeId> {
        if let Some(element) = name.strip_suffix("[]") {
            let element = self.lookup_type(element)?;
            return Ok(self.array_type(element));
        }

        self.type_names.get(name).copied().ok_or_else(|| TypeSystemError::MissingType { name: name.to_string() })
    }

    /// Resolves a type reference from a method body. `!!N` refers to the
    /// N-th generic argument of `instantiation`.
    pub fn resolve_type(&self, template: &str, instantiation: &[TypeId]) -> TypeSystemResult<TypeId> {
        if let Some(element) = template.strip_suffix("[]") {
            let element = self.resolve_type(element, instantiation)?;
            return Ok(self.array_type(element));
        }

        if let Some(index) = template.strip_prefix("!!") {
            let index: usize = index.parse().map_err(|_| TypeSystemError::MissingType { name: template.to_string() })?;
            return instantiation.get(index).copied().ok_or_else(|| TypeSystemError::GenericParameterOutOfRange {
                method: template.to_string(),
                index,
            });
        }

        self.lookup_type(template)
    }

    #[must_use]
    pub fn array_type(&self, element: TypeId) -> TypeId {
        if let Some(id) = self.array_types.get(&element) {
            return *id;
        }

        match self.array_types.entry(element) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let name = format!("{}[]", self.type_name(element));
                let desc = TypeDesc::new(name, TypeKind::Array { element }, Some(self.well_known.object));

                let mut types = self.types.write();
                let id = TypeId::new(types.len());
                types.push(Arc::new(desc));
                entry.insert(id);
                id
            }
        }
    }

    /// Finds a non-instantiated method by name, searching the base chain.
    pub fn find_method(&self, owner: TypeId, name: &str) -> TypeSystemResult<MethodId> {
        for ty in self.base_chain(owner) {
            let desc = self.type_desc(ty);
            if let Some(method) = desc.methods.iter().find(|m| self.method_desc(**m).name == name) {
                return Ok(*method);
            }
        }

        Err(TypeSystemError::MissingMethod { owner: self.type_name(owner), name: name.to_string() })
    }

    /// Parses `Type::Method`.
    pub fn resolve_method_reference(&self, reference: &str) -> TypeSystemResult<MethodId> {
        let Some((owner, name)) = reference.rsplit_once("::") else {
            return Err(TypeSystemError::MissingMethod { owner: String::new(), name: reference.to_string() });
        };

        let owner = self.lookup_type(owner)?;
        self.find_method(owner, name)
    }

    pub fn find_field(&self, owner: TypeId, name: &str) -> TypeSystemResult<FieldDesc> {
        for ty in self.base_chain(owner) {
            if let Some(field) = self.type_desc(ty).fields.iter().find(|f| f.name == name) {
                return Ok(field.clone());
            }
        }

        Err(TypeSystemError::MissingField { owner: self.type_name(owner), name: name.to_string() })
    }

    /// The type and its base types, most derived first.
    #[must_use]
    pub fn base_chain(&self, ty: TypeId) -> Vec<TypeId> {
        let mut chain = vec![ty];
        let mut current = self.type_desc(ty).base;
        while let Some(base) = current {
            chain.push(base);
            current = self.type_desc(base).base;
        }
        chain
    }

    pub fn instantiate_method(&self, definition: MethodId, args: Vec<TypeId>) -> TypeSystemResult<MethodId> {
        let desc = self.method_desc(definition);
        let definition = desc.definition.unwrap_or(definition);

        if args.len() != desc.generic_parameter_count {
            return Err(TypeSystemError::InstantiationArity {
                method: self.method_display_name(definition),
                expected: desc.generic_parameter_count,
                actual: args.len(),
            });
        }

        Ok(self.instantiate_unchecked(definition, args))
    }

    /// Resolves a method reference from a body, instantiating it with the
    /// type templates resolved against `context`.
    pub fn resolve_method_instantiation(&self, owner: &str, method: &str, instantiation: &[String], context: &[TypeId]) -> TypeSystemResult<MethodId> {
        let owner = self.resolve_type(owner, context)?;
        let definition = self.find_method(owner, method)?;

        let args = instantiation.iter()
            .map(|x| self.resolve_type(x, context))
            .collect::<TypeSystemResult<Vec<_>>>()?;

        self.instantiate_method(definition, args)
    }

    fn instantiate_unchecked(&self, definition: MethodId, args: Vec<TypeId>) -> MethodId {
        if args.is_empty() {
            return definition;
        }

        let key = (definition, args);
        if let Some(id) = self.instantiations.get(&key) {
            return *id;
        }

        match self.instantiations.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let mut desc = MethodDesc::clone(&self.method_desc(definition));
                desc.instantiation = entry.key().1.clone();
                desc.definition = Some(definition);

                let mut methods = self.methods.write();
                let id = MethodId::new(methods.len());
                methods.push(Arc::new(desc));
                entry.insert(id);
                id
            }
        }
    }

    /// Reference types are shared through `__Canon`, value types stay exact.
    #[must_use]
    pub fn canonical_type(&self, ty: TypeId) -> TypeId {
        if self.type_desc(ty).is_gc_reference() {
            self.well_known.canon
        } else {
            ty
        }
    }

    #[must_use]
    pub fn canonical_method(&self, method: MethodId) -> MethodId {
        let desc = self.method_desc(method);
        let Some(definition) = desc.definition else {
            return method;
        };

        let args: Vec<TypeId> = desc.instantiation.iter().map(|x| self.canonical_type(*x)).collect();
        if args == desc.instantiation {
            return method;
        }

        self.instantiate_unchecked(definition, args)
    }

    /// Whether the code of this method is shared and needs a dictionary.
    #[must_use]
    pub fn requires_dictionary(&self, method: MethodId) -> bool {
        self.canonical_method(method) != method
    }

    /// Whether this is the canonical form of a shared method.
    #[must_use]
    pub fn is_shared_canonical(&self, method: MethodId) -> bool {
        self.method_desc(method).instantiation.contains(&self.well_known.canon)
    }

    #[must_use]
    pub fn is_canon(&self, ty: TypeId) -> bool {
        ty == self.well_known.canon
    }

    /// Whether the resolved type can only be known at runtime through a
    /// dictionary lookup.
    pub fn needs_runtime_lookup(&self, template: &str, instantiation: &[TypeId]) -> TypeSystemResult<bool> {
        if !is_generic_template(template) {
            return Ok(false);
        }

        let mut ty = self.resolve_type(template, instantiation)?;
        while let TypeKind::Array { element } = self.type_desc(ty).kind {
            ty = element;
        }
        Ok(self.is_canon(ty))
    }

    /// The method introducing the vtable slot `method` occupies.
    #[must_use]
    pub fn slot_declaration(&self, method: MethodId) -> MethodId {
        let desc = self.method_desc(method);
        let definition = desc.definition.unwrap_or(method);
        self.method_desc(definition).overrides.unwrap_or(definition)
    }

    /// The most derived implementation of the slot introduced by `slot`, as seen from `ty`.
    #[must_use]
    pub fn find_override(&self, ty: TypeId, slot: MethodId) -> Option<MethodId> {
        for current in self.base_chain(ty) {
            let desc = self.type_desc(current);
            let found = desc.methods.iter().copied().find(|m| {
                *m == slot || self.method_desc(*m).overrides == Some(slot)
            });

            if found.is_some() {
                return found;
            }
        }
        None
    }

    pub fn resolve_pinvoke(&self, method: MethodId) -> TypeSystemResult<Option<PInvokeImport>> {
        let desc = self.method_desc(method);
        let Some(import) = &desc.pinvoke else {
            return Ok(None);
        };

        let Some(exports) = self.native_libraries.get(&import.library) else {
            return Err(TypeSystemError::MissingNativeLibrary {
                method: self.method_display_name(method),
                library: import.library.clone(),
            });
        };

        if !exports.contains(&import.entry_point) {
            return Err(TypeSystemError::MissingNativeExport {
                library: import.library.clone(),
                entry_point: import.entry_point.clone(),
            });
        }

        Ok(Some(import.clone()))
    }

    /// Size of a value of this type when stored in a field.
    #[must_use]
    pub fn field_size(&self, ty: TypeId) -> usize {
        let desc = self.type_desc(ty);
        match desc.kind {
            TypeKind::Primitive(primitive) => primitive.size(self.pointer_size),
            TypeKind::ValueType => self.instance_field_size(ty).max(1),
            _ => self.pointer_size,
        }
    }

    fn instance_field_size(&self, ty: TypeId) -> usize {
        let mut size = 0;
        for current in self.base_chain(ty).into_iter().rev() {
            for field in self.type_desc(current).instance_fields() {
                let field_size = self.field_size(field.field_type);
                size = align_up(size, field_size.min(self.pointer_size)) + field_size;
            }
        }
        size
    }

    /// The allocation size of an instance, excluding array or string payload.
    #[must_use]
    pub fn base_size(&self, ty: TypeId) -> usize {
        let ptr = self.pointer_size;
        let desc = self.type_desc(ty);

        let size = if ty == self.well_known.string {
            // EEType pointer, length, terminating character
            ptr + 4 + 2
        } else if desc.is_array() {
            ptr + ptr
        } else {
            ptr + self.instance_field_size(ty)
        };

        align_up(size, ptr).max(3 * ptr)
    }

    /// Element size for arrays and strings, zero for everything else.
    #[must_use]
    pub fn component_size(&self, ty: TypeId) -> usize {
        if ty == self.well_known.string {
            return 2;
        }

        match self.type_desc(ty).kind {
            TypeKind::Array { element } => self.field_size(element),
            _ => 0,
        }
    }

    /// Statics holding object references.
    #[must_use]
    pub fn gc_static_size(&self, ty: TypeId) -> usize {
        self.type_desc(ty).static_fields()
            .filter(|f| self.type_desc(f.field_type).is_gc_reference())
            .count() * self.pointer_size
    }

    #[must_use]
    pub fn non_gc_static_size(&self, ty: TypeId) -> usize {
        let desc = self.type_desc(ty);
        let mut size = 0;
        for field in desc.static_fields().filter(|f| !self.type_desc(f.field_type).is_gc_reference()) {
            let field_size = self.field_size(field.field_type);
            size = align_up(size, field_size.min(self.pointer_size)) + field_size;
        }
        size
    }
}

#[must_use]
pub(crate) const fn align_up(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

struct ContextBuilder {
    types: Vec<TypeDesc>,
    type_names: HashMap<String, TypeId>,
    methods: Vec<MethodDesc>,
    array_types: HashMap<TypeId, TypeId>,
    pending_overrides: Vec<MethodId>,
}

impl ContextBuilder {
    fn check_acyclic(&self, ty: TypeId) -> ManifestResult<()> {
        let mut current = self.types[ty.index()].base;
        let mut steps = 0;
        while let Some(base) = current {
            steps += 1;
            if base == ty || steps > self.types.len() {
                return Err(ManifestError::CyclicBaseType { name: self.types[ty.index()].name.clone() });
            }
            current = self.types[base.index()].base;
        }
        Ok(())
    }

    fn lookup(&mut self, name: &str) -> Option<TypeId> {
        if let Some(element) = name.strip_suffix("[]") {
            let element = self.lookup(element)?;
            if let Some(array) = self.array_types.get(&element) {
                return Some(*array);
            }

            let object = self.type_names.get("System.Object").copied();
            let id = TypeId::new(self.types.len());
            let name = format!("{}[]", self.types[element.index()].name);
            self.types.push(TypeDesc::new(name, TypeKind::Array { element }, object));
            self.array_types.insert(element, id);
            return Some(id);
        }

        self.type_names.get(name).copied()
    }

    fn load_fields(&mut self, id: TypeId, ty: &TypeManifest) -> ManifestResult<()> {
        for field in &ty.fields {
            let field_type = self.lookup(&field.field_type).ok_or_else(|| ManifestError::UnknownFieldType {
                owner: ty.name.clone(),
                field: field.name.clone(),
                field_type: field.field_type.clone(),
            })?;

            self.types[id.index()].fields.push(FieldDesc {
                name: field.name.clone(),
                field_type,
                is_static: field.is_static,
            });
        }
        Ok(())
    }

    fn load_methods(&mut self, id: TypeId, ty: &TypeManifest) -> ManifestResult<()> {
        for method in &ty.methods {
            let method_id = MethodId::new(self.methods.len());
            self.methods.push(MethodDesc {
                owning_type: id,
                name: method.name.clone(),
                flags: MethodFlags {
                    is_static: method.is_static,
                    is_virtual: method.is_virtual || method.is_override || method.is_abstract,
                    is_abstract: method.is_abstract,
                },
                overrides: None,
                generic_parameter_count: method.generic_params,
                instantiation: Vec::new(),
                definition: None,
                body: method.body.clone().map(Arc::new),
                pinvoke: method.pinvoke.as_ref().map(|p| PInvokeImport {
                    library: p.library.clone(),
                    entry_point: p.entry_point.clone(),
                }),
            });

            let desc = &mut self.types[id.index()];
            desc.methods.push(method_id);

            if method.name == STATIC_CONSTRUCTOR_NAME {
                if !method.is_static || method.generic_params != 0 {
                    return Err(ManifestError::InvalidStaticConstructor { owner: ty.name.clone() });
                }
                desc.static_constructor = Some(method_id);
            }

            if method.is_override {
                self.pending_overrides.push(method_id);
            } else if method.is_virtual || method.is_abstract {
                desc.virtual_slots.push(method_id);
            }
        }
        Ok(())
    }

    fn depth(&self, ty: TypeId) -> usize {
        let mut depth = 0;
        let mut current = self.types[ty.index()].base;
        while let Some(base) = current {
            depth += 1;
            current = self.types[base.index()].base;
        }
        depth
    }

    /// Resolves overrides base types first, so the virtual method found in a
    /// base type already knows the slot it belongs to.
    fn resolve_overrides(&mut self) -> ManifestResult<()> {
        let mut pending = std::mem::take(&mut self.pending_overrides);
        pending.sort_by_key(|m| (self.depth(self.methods[m.index()].owning_type), *m));

        for id in pending {
            let owner = self.methods[id.index()].owning_type;
            let name = self.methods[id.index()].name.clone();

            let mut slot = None;
            let mut current = self.types[owner.index()].base;
            while let Some(base) = current {
                let found = self.types[base.index()].methods.iter()
                    .copied()
                    .find(|m| self.methods[m.index()].name == name && self.methods[m.index()].flags.is_virtual);

                if let Some(found) = found {
                    slot = Some(self.methods[found.index()].overrides.unwrap_or(found));
                    break;
                }
                current = self.types[base.index()].base;
            }

            let Some(slot) = slot else {
                return Err(ManifestError::NothingToOverride {
                    owner: self.types[owner.index()].name.clone(),
                    method: name,
                });
            };

            self.methods[id.index()].overrides = Some(slot);
        }
        Ok(())
    }
}
