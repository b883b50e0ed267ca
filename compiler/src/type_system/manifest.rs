// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MethodBody;

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse module manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("type `{name}` is defined more than once")]
    DuplicateType { name: String },

    #[error("type `{name}` has unknown base type `{base}`")]
    UnknownBaseType { name: String, base: String },

    #[error("base type chain of `{name}` is cyclic")]
    CyclicBaseType { name: String },

    #[error("field `{owner}.{field}` has unknown type `{field_type}`")]
    UnknownFieldType { owner: String, field: String, field_type: String },

    #[error("`{owner}::{method}` is marked as an override, but no base type declares a virtual `{method}`")]
    NothingToOverride { owner: String, method: String },

    #[error("the static constructor of `{owner}` must be static and non-generic")]
    InvalidStaticConstructor { owner: String },
}

/// The textual description of a managed module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// `Type::Method` of the entry point.
    #[serde(default)]
    pub entry_point: Option<String>,

    /// Extra roots: `Type::Method` for methods, `Type` for constructed types.
    #[serde(default)]
    pub roots: Vec<String>,

    #[serde(default)]
    pub native_libraries: Vec<NativeLibraryManifest>,

    #[serde(default)]
    pub types: Vec<TypeManifest>,
}

impl ModuleManifest {
    pub fn from_toml(source: &str) -> ManifestResult<Self> {
        Ok(toml::from_str(source)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLibraryManifest {
    pub name: String,

    #[serde(default)]
    pub exports: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKindManifest {
    #[default]
    Class,
    Struct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeManifest {
    pub name: String,

    #[serde(default)]
    pub kind: TypeKindManifest,

    /// Defaults to `System.Object` for classes.
    #[serde(default)]
    pub base: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldManifest>,

    #[serde(default)]
    pub methods: Vec<MethodManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldManifest {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodManifest {
    pub name: String,

    #[serde(default, rename = "static")]
    pub is_static: bool,

    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,

    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Overrides the virtual method with the same name of a base type.
    #[serde(default, rename = "override")]
    pub is_override: bool,

    #[serde(default)]
    pub generic_params: usize,

    #[serde(default)]
    pub pinvoke: Option<PInvokeManifest>,

    #[serde(default)]
    pub body: Option<MethodBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PInvokeManifest {
    pub library: String,
    pub entry_point: String,
}
