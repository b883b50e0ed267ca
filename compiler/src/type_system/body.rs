// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use serde::{Deserialize, Serialize};

/// A method body: a straight-line sequence of operations. Type references are
/// textual and resolved when the method is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodBody {
    pub operations: Vec<Operation>,
}

impl MethodBody {
    #[must_use]
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    #[must_use]
    pub fn throws(&self) -> bool {
        self.operations.iter().any(|op| matches!(op, Operation::Throw))
    }

    #[must_use]
    pub fn calls_out(&self) -> bool {
        self.operations.iter().any(Operation::calls_out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Call {
        #[serde(rename = "type")]
        owner: String,
        method: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        instantiation: Vec<String>,
    },

    CallVirt {
        #[serde(rename = "type")]
        owner: String,
        method: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        instantiation: Vec<String>,
    },

    NewObj {
        #[serde(rename = "type")]
        ty: String,
    },

    NewArr {
        element: String,
    },

    CastClass {
        #[serde(rename = "type")]
        ty: String,
    },

    IsInst {
        #[serde(rename = "type")]
        ty: String,
    },

    LoadStatic {
        #[serde(rename = "type")]
        owner: String,
        field: String,
    },

    LoadString {
        value: String,
    },

    /// Loads a constant into the result register.
    LoadInt {
        value: i64,
    },

    /// Adds a constant to the result register.
    AddInt {
        value: i32,
    },

    NewDelegate {
        #[serde(rename = "type")]
        owner: String,
        method: String,
    },

    Throw,
    Ret,
}

impl Operation {
    /// Whether the operation ends the body.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Throw | Self::Ret)
    }

    /// Whether lowering the operation calls another function.
    #[must_use]
    pub const fn calls_out(&self) -> bool {
        !matches!(self, Self::LoadString { .. } | Self::LoadInt { .. } | Self::AddInt { .. } | Self::Ret)
    }
}

/// A runtime lookup shared canonical code performs through its generic
/// dictionary. Templates may refer to generic method parameters as `!!N`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericLookup {
    TypeHandle { template: String },
    ConstructedTypeHandle { template: String },
    MethodDictionary {
        owner: String,
        method: String,
        instantiation: Vec<String>,
    },
}

impl GenericLookup {
    /// The lookup an operation needs when its type references depend on the
    /// generic parameters of the enclosing method.
    #[must_use]
    pub fn for_operation(operation: &Operation) -> Option<Self> {
        match operation {
            Operation::Call { owner, method, instantiation }
            | Operation::CallVirt { owner, method, instantiation } => {
                if !instantiation.iter().any(|x| is_generic_template(x)) {
                    return None;
                }

                Some(Self::MethodDictionary {
                    owner: owner.clone(),
                    method: method.clone(),
                    instantiation: instantiation.clone(),
                })
            }

            Operation::NewObj { ty } if is_generic_template(ty) => {
                Some(Self::ConstructedTypeHandle { template: ty.clone() })
            }

            Operation::NewArr { element } if is_generic_template(element) => {
                Some(Self::ConstructedTypeHandle { template: format!("{element}[]") })
            }

            Operation::CastClass { ty } | Operation::IsInst { ty } if is_generic_template(ty) => {
                Some(Self::TypeHandle { template: ty.clone() })
            }

            _ => None,
        }
    }

    /// The dictionary layout of a body: one slot per distinct lookup, in
    /// operation order.
    #[must_use]
    pub fn layout_of(body: &MethodBody) -> Vec<Self> {
        let mut layout = Vec::new();
        for lookup in body.operations.iter().filter_map(Self::for_operation) {
            if !layout.contains(&lookup) {
                layout.push(lookup);
            }
        }
        layout
    }
}

#[must_use]
pub fn is_generic_template(template: &str) -> bool {
    template.contains("!!")
}
