//! Declared types — the static shape of members
//!
//! A [`TypeExpr`] is what a member *declares*; it is resolved against the
//! [`crate::registry::TypeRegistry`] when values are generated. `TypeExpr` is
//! ordered and hashable because it doubles as the key of the value cache.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a registered type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(String);

impl TypeId {
    pub fn new(name: impl Into<String>) -> Self {
        TypeId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The anonymous subtype used for inheritance probes
    pub(crate) fn subtype(&self) -> TypeId {
        TypeId(format!("{}$Subtype", self.0))
    }

    /// The anonymous concrete subtype used to instantiate abstract records
    pub(crate) fn concrete(&self) -> TypeId {
        TypeId(format!("{}$Concrete", self.0))
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(s: &str) -> Self {
        TypeId::new(s)
    }
}

impl From<String> for TypeId {
    fn from(s: String) -> Self {
        TypeId(s)
    }
}

/// Built-in scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Str,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "Bool",
            ScalarKind::Char => "Char",
            ScalarKind::Int8 => "Int8",
            ScalarKind::Int16 => "Int16",
            ScalarKind::Int32 => "Int32",
            ScalarKind::Int64 => "Int64",
            ScalarKind::UInt8 => "UInt8",
            ScalarKind::UInt16 => "UInt16",
            ScalarKind::UInt32 => "UInt32",
            ScalarKind::UInt64 => "UInt64",
            ScalarKind::Float32 => "Float32",
            ScalarKind::Float64 => "Float64",
            ScalarKind::Str => "String",
        }
    }
}

/// A declared type expression
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Numeric, boolean, character or string scalar
    Scalar(ScalarKind),
    /// Reference to a registered record, enumeration or interface
    Named(TypeId),
    /// Registered generic record applied to type arguments
    Generic { base: TypeId, args: Vec<TypeExpr> },
    /// Type parameter of the enclosing generic record
    Param(String),
    /// Nullable edge: the value may be `Null`
    Option(Box<TypeExpr>),
    /// Ordered sequence
    Seq(Box<TypeExpr>),
    /// Unordered set
    Set(Box<TypeExpr>),
    /// Key/value mapping
    Map(Box<TypeExpr>, Box<TypeExpr>),
}

impl TypeExpr {
    pub fn bool() -> Self {
        TypeExpr::Scalar(ScalarKind::Bool)
    }

    pub fn char() -> Self {
        TypeExpr::Scalar(ScalarKind::Char)
    }

    pub fn int() -> Self {
        TypeExpr::Scalar(ScalarKind::Int64)
    }

    pub fn float() -> Self {
        TypeExpr::Scalar(ScalarKind::Float64)
    }

    pub fn string() -> Self {
        TypeExpr::Scalar(ScalarKind::Str)
    }

    pub fn named(id: impl Into<TypeId>) -> Self {
        TypeExpr::Named(id.into())
    }

    pub fn generic(base: impl Into<TypeId>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Generic {
            base: base.into(),
            args,
        }
    }

    pub fn param(name: impl Into<String>) -> Self {
        TypeExpr::Param(name.into())
    }

    pub fn option(inner: TypeExpr) -> Self {
        TypeExpr::Option(Box::new(inner))
    }

    pub fn seq(elem: TypeExpr) -> Self {
        TypeExpr::Seq(Box::new(elem))
    }

    pub fn set(elem: TypeExpr) -> Self {
        TypeExpr::Set(Box::new(elem))
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Map(Box::new(key), Box::new(value))
    }

    /// Whether `Null` is a legal value of this type
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeExpr::Option(_))
    }

    /// The registered type this expression refers to, if any
    pub fn type_id(&self) -> Option<&TypeId> {
        match self {
            TypeExpr::Named(id) => Some(id),
            TypeExpr::Generic { base, .. } => Some(base),
            _ => None,
        }
    }

    /// Replace type parameters with bound arguments.
    ///
    /// Parameters without a binding are left in place; the generator turns
    /// them into opaque tokens.
    pub fn substitute(&self, bindings: &BTreeMap<String, TypeExpr>) -> TypeExpr {
        match self {
            TypeExpr::Param(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            TypeExpr::Generic { base, args } => TypeExpr::Generic {
                base: base.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeExpr::Option(t) => TypeExpr::Option(Box::new(t.substitute(bindings))),
            TypeExpr::Seq(t) => TypeExpr::Seq(Box::new(t.substitute(bindings))),
            TypeExpr::Set(t) => TypeExpr::Set(Box::new(t.substitute(bindings))),
            TypeExpr::Map(k, v) => TypeExpr::Map(
                Box::new(k.substitute(bindings)),
                Box::new(v.substitute(bindings)),
            ),
            TypeExpr::Scalar(_) | TypeExpr::Named(_) => self.clone(),
        }
    }
}

impl From<TypeId> for TypeExpr {
    fn from(id: TypeId) -> Self {
        TypeExpr::Named(id)
    }
}

impl From<&str> for TypeExpr {
    fn from(name: &str) -> Self {
        TypeExpr::Named(TypeId::new(name))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Scalar(kind) => f.write_str(kind.name()),
            TypeExpr::Named(id) => write!(f, "{}", id),
            TypeExpr::Generic { base, args } => {
                write!(f, "{}<", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeExpr::Param(name) => f.write_str(name),
            TypeExpr::Option(t) => write!(f, "Option<{}>", t),
            TypeExpr::Seq(t) => write!(f, "Seq<{}>", t),
            TypeExpr::Set(t) => write!(f, "Set<{}>", t),
            TypeExpr::Map(k, v) => write!(f, "Map<{}, {}>", k, v),
        }
    }
}
