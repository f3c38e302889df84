//! Native Rust types under test
//!
//! A type implementing [`Reflect`] lists its members and knows how to rebuild
//! itself from member values. The engine then synthesizes instances as usual
//! and answers `equals`/`hash_code`/`render` by rebuilding real values and
//! calling the type's own `PartialEq`, `Hash` and `Debug`.
//!
//! ```ignore
//! #[derive(Debug, PartialEq, Eq, Hash)]
//! struct Money { amount: i64, currency: String }
//!
//! impl Reflect for Money {
//!     const NAME: &'static str = "Money";
//!     fn members() -> Vec<MemberDef> {
//!         vec![member::<i64>("amount"), member::<String>("currency")]
//!     }
//!     fn from_members(values: &Members<'_>) -> Outcome<Self> {
//!         Ok(Money { amount: values.get("amount")?, currency: values.get("currency")? })
//!     }
//! }
//!
//! let result = verify_native::<Money>(&Configuration::new())?;
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::behavior::Behavior;
use crate::config::Configuration;
use crate::error::Result;
use crate::registry::{MemberDef, TypeDef, TypeRegistry};
use crate::types::{ScalarKind, TypeExpr};
use crate::value::{Object, Outcome, Raised, RaisedKind, Value};
use crate::verifier::{verify, VerificationResult};

/// A Rust type the engine can synthesize
pub trait Reflect: PartialEq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Registered type name
    const NAME: &'static str;

    /// State-bearing members, in declaration order
    fn members() -> Vec<MemberDef>;

    /// Rebuild a value from synthesized member values
    fn from_members(values: &Members<'_>) -> Outcome<Self>
    where
        Self: Sized;
}

/// Member values of a synthesized instance, typed on access
pub struct Members<'a> {
    object: &'a Object,
}

impl Members<'_> {
    pub fn get<F: Field>(&self, name: &str) -> Outcome<F> {
        F::from_value(self.object.field(name)?)
    }
}

/// Declare a member whose type is a [`Field`]
pub fn member<F: Field>(name: &str) -> MemberDef {
    MemberDef::new(name, F::type_expr())
}

// ── Field conversions ─────────────────────────────────────

/// A Rust type that can hold a member value
pub trait Field: Sized {
    fn type_expr() -> TypeExpr;
    fn from_value(value: &Value) -> Outcome<Self>;
}

fn mismatch(value: &Value, expected: &str) -> Raised {
    Raised::new(
        RaisedKind::TypeMismatch,
        format!("{} cannot be converted to {}", value.type_name(), expected),
    )
}

macro_rules! int_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Field for $ty {
            fn type_expr() -> TypeExpr {
                TypeExpr::Scalar(ScalarKind::$kind)
            }

            fn from_value(value: &Value) -> Outcome<Self> {
                let converted = match value {
                    Value::Int(i) => <$ty>::try_from(*i).ok(),
                    Value::UInt(u) => <$ty>::try_from(*u).ok(),
                    _ => return Err(mismatch(value, stringify!($ty))),
                };
                converted.ok_or_else(|| {
                    Raised::illegal_state(format!("{} is out of range for {}", value, stringify!($ty)))
                })
            }
        }
    )*};
}

int_field! {
    i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64,
    u8 => UInt8, u16 => UInt16, u32 => UInt32, u64 => UInt64,
}

impl Field for bool {
    fn type_expr() -> TypeExpr {
        TypeExpr::bool()
    }

    fn from_value(value: &Value) -> Outcome<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(other, "bool")),
        }
    }
}

impl Field for char {
    fn type_expr() -> TypeExpr {
        TypeExpr::char()
    }

    fn from_value(value: &Value) -> Outcome<Self> {
        match value {
            Value::Char(c) => Ok(*c),
            other => Err(mismatch(other, "char")),
        }
    }
}

impl Field for f64 {
    fn type_expr() -> TypeExpr {
        TypeExpr::float()
    }

    fn from_value(value: &Value) -> Outcome<Self> {
        match value {
            Value::Float(x) => Ok(*x),
            other => Err(mismatch(other, "f64")),
        }
    }
}

impl Field for String {
    fn type_expr() -> TypeExpr {
        TypeExpr::string()
    }

    fn from_value(value: &Value) -> Outcome<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(mismatch(other, "String")),
        }
    }
}

impl<F: Field> Field for Option<F> {
    fn type_expr() -> TypeExpr {
        TypeExpr::option(F::type_expr())
    }

    fn from_value(value: &Value) -> Outcome<Self> {
        match value {
            Value::Null => Ok(None),
            other => F::from_value(other).map(Some),
        }
    }
}

impl<F: Field> Field for Vec<F> {
    fn type_expr() -> TypeExpr {
        TypeExpr::seq(F::type_expr())
    }

    fn from_value(value: &Value) -> Outcome<Self> {
        match value {
            Value::Seq(items) => items.iter().map(F::from_value).collect(),
            other => Err(mismatch(other, "Vec")),
        }
    }
}

// ── Behavior ──────────────────────────────────────────────

/// Equality, hash and render delegated to `T`'s own trait impls
pub struct NativeBehavior<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> NativeBehavior<T> {
    pub fn new() -> Self {
        NativeBehavior {
            marker: PhantomData,
        }
    }
}

impl<T> Default for NativeBehavior<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn rebuild<T: Reflect>(object: &Object) -> Outcome<T> {
    T::from_members(&Members { object })
}

impl<T: Reflect> Behavior for NativeBehavior<T> {
    fn equals(&self, this: &Object, other: &Value) -> Outcome<bool> {
        // `PartialEq` only compares values of `T` itself
        let Some(other) = other.as_object() else {
            return Ok(false);
        };
        if other.type_id() != this.type_id() {
            return Ok(false);
        }
        Ok(rebuild::<T>(this)? == rebuild::<T>(other)?)
    }

    fn hash_code(&self, this: &Object) -> Outcome<i64> {
        let mut hasher = DefaultHasher::new();
        rebuild::<T>(this)?.hash(&mut hasher);
        Ok(hasher.finish() as i64)
    }

    fn render(&self, this: &Object) -> Outcome<String> {
        Ok(format!("{:?}", rebuild::<T>(this)?))
    }
}

// ── Entry points ──────────────────────────────────────────

/// Register `T` as a final record backed by its own trait impls
pub fn register<T: Reflect>(registry: &mut TypeRegistry) -> Result<()> {
    let mut builder = TypeDef::record(T::NAME).equality(NativeBehavior::<T>::new());
    for m in T::members() {
        builder = builder.member(m);
    }
    registry.register(builder.build())
}

/// Verify `T` in a registry of its own
pub fn verify_native<T: Reflect>(config: &Configuration) -> Result<VerificationResult> {
    let mut registry = TypeRegistry::new();
    register::<T>(&mut registry)?;
    verify(&registry, &TypeExpr::named(T::NAME), config)
}
