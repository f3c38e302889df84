//! Runtime values — what synthesized instances are made of
//!
//! A [`Value`] is either a structural datum (scalar, enumeration variant,
//! container), an [`Object`] carrying the behavior of the type it was built
//! for, or an opaque [`Token`] whose only property is its identity.
//!
//! # Two notions of equality
//!
//! - [`Value::equals`] is *contract* equality: objects answer with their own
//!   [`Behavior`], which may misbehave, so it returns an [`Outcome`].
//! - `PartialEq` is *structural* equality: same shape, same member values,
//!   behaviors ignored. The generator uses it to guarantee red != black.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::behavior::Behavior;
use crate::types::TypeId;

// ── Raised errors ─────────────────────────────────────────

/// Category of an error raised by the type under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaisedKind {
    /// A null value was dereferenced
    NullDereference,
    /// A value was cast to a type it does not have
    TypeMismatch,
    /// The type rejected its own state
    IllegalState,
    /// Anything else, named by the type
    Other(String),
}

impl fmt::Display for RaisedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaisedKind::NullDereference => write!(f, "NullDereference"),
            RaisedKind::TypeMismatch => write!(f, "TypeMismatch"),
            RaisedKind::IllegalState => write!(f, "IllegalState"),
            RaisedKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// An error raised by an equality, hash or render operation under test.
///
/// This is the behavior being tested for, never an engine failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct Raised {
    pub kind: RaisedKind,
    pub message: String,
}

impl Raised {
    pub fn new(kind: RaisedKind, message: impl Into<String>) -> Self {
        Raised {
            kind,
            message: message.into(),
        }
    }

    pub fn null_dereference(what: impl Into<String>) -> Self {
        Raised::new(RaisedKind::NullDereference, what)
    }

    pub fn type_mismatch(found: &str, expected: &TypeId) -> Self {
        Raised::new(
            RaisedKind::TypeMismatch,
            format!("{} cannot be cast to {}", found, expected),
        )
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Raised::new(RaisedKind::IllegalState, message)
    }
}

/// Result of calling an operation of the type under test
pub type Outcome<T> = std::result::Result<T, Raised>;

// ── Value ─────────────────────────────────────────────────

/// A runtime value assigned to a member
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value of a nullable member
    Null,
    Bool(bool),
    Char(char),
    /// Signed integers of every width
    Int(i64),
    /// Unsigned integers of every width
    UInt(u64),
    /// Floating point of every width
    Float(f64),
    Str(String),
    /// Enumeration constant
    Variant { enum_type: TypeId, name: String },
    /// Ordered sequence
    Seq(Vec<Value>),
    /// Set; elements are distinct
    Set(Vec<Value>),
    /// Mapping as ordered key/value entries
    Map(Vec<(Value, Value)>),
    /// Synthesized record instance
    Object(Object),
    /// Opaque identity-equal token
    Token(Token),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name for messages
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "Null".into(),
            Value::Bool(_) => "Bool".into(),
            Value::Char(_) => "Char".into(),
            Value::Int(_) => "Int".into(),
            Value::UInt(_) => "UInt".into(),
            Value::Float(_) => "Float".into(),
            Value::Str(_) => "String".into(),
            Value::Variant { enum_type, .. } => enum_type.to_string(),
            Value::Seq(_) => "Seq".into(),
            Value::Set(_) => "Set".into(),
            Value::Map(_) => "Map".into(),
            Value::Object(obj) => obj.type_id().to_string(),
            Value::Token(token) => token.type_name().to_string(),
        }
    }

    /// Dereference, raising `NullDereference` on `Null`
    pub fn non_null(&self) -> Outcome<&Value> {
        match self {
            Value::Null => Err(Raised::null_dereference("value is null")),
            other => Ok(other),
        }
    }

    /// Unchecked cast to an object of `target` (or a subtype).
    ///
    /// Mirrors what an equality implementation does when it skips its type
    /// check: anything else raises.
    pub fn cast(&self, target: &TypeId) -> Outcome<&Object> {
        match self {
            Value::Null => Err(Raised::null_dereference(format!(
                "cast of null to {}",
                target
            ))),
            Value::Object(obj) if obj.is_instance_of(target) => Ok(obj),
            other => Err(Raised::type_mismatch(&other.type_name(), target)),
        }
    }

    /// Contract equality: objects decide through their own behavior
    pub fn equals(&self, other: &Value) -> Outcome<bool> {
        match (self, other) {
            (Value::Object(obj), _) => obj.equals(other),
            (Value::Token(a), Value::Token(b)) => Ok(a.same_reference(b)),
            (Value::Seq(a), Value::Seq(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.equals(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Set(a), Value::Set(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for x in a {
                    if !contains(b, x)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Map(a), Value::Map(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (k, v) in a {
                    match lookup(b, k)? {
                        Some(w) if v.equals(w)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            _ => Ok(self == other),
        }
    }

    /// Contract hash code
    pub fn hash_code(&self) -> Outcome<i64> {
        match self {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(digest_hash(1, &[*b as u8])),
            Value::Char(c) => Ok(digest_hash(2, &u32::from(*c).to_be_bytes())),
            Value::Int(i) => Ok(digest_hash(3, &i.to_be_bytes())),
            Value::UInt(u) => Ok(digest_hash(4, &u.to_be_bytes())),
            Value::Float(x) => Ok(digest_hash(5, &x.to_bits().to_be_bytes())),
            Value::Str(s) => Ok(digest_hash(6, s.as_bytes())),
            Value::Variant { enum_type, name } => {
                Ok(digest_hash(7, format!("{}::{}", enum_type, name).as_bytes()))
            }
            Value::Seq(items) => fold_hashes(items.iter().map(Value::hash_code)),
            Value::Set(items) => {
                let mut sum: i64 = 0;
                for item in items {
                    sum = sum.wrapping_add(item.hash_code()?);
                }
                Ok(sum)
            }
            Value::Map(entries) => {
                let mut sum: i64 = 0;
                for (k, v) in entries {
                    sum = sum.wrapping_add(k.hash_code()? ^ v.hash_code()?);
                }
                Ok(sum)
            }
            Value::Object(obj) => obj.hash_code(),
            Value::Token(token) => Ok(token.identity_hash()),
        }
    }

    /// Contract string representation
    pub fn render(&self) -> Outcome<String> {
        match self {
            Value::Null => Ok("null".into()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Char(c) => Ok(format!("{:?}", c)),
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            Value::Float(x) => Ok(x.to_string()),
            Value::Str(s) => Ok(format!("{:?}", s)),
            Value::Variant { enum_type, name } => Ok(format!("{}::{}", enum_type, name)),
            Value::Seq(items) => Ok(format!("[{}]", render_all(items)?)),
            Value::Set(items) => Ok(format!("{{{}}}", render_all(items)?)),
            Value::Map(entries) => {
                let mut parts = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    parts.push(format!("{}: {}", k.render()?, v.render()?));
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            Value::Object(obj) => obj.render(),
            Value::Token(token) => Ok(token.to_string()),
        }
    }
}

/// Structural equality; behaviors are not consulted
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (
                Value::Variant { enum_type, name },
                Value::Variant {
                    enum_type: other_type,
                    name: other_name,
                },
            ) => enum_type == other_type && name == other_name,
            (Value::Seq(a), Value::Seq(b)) | (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Token(a), Value::Token(b)) => a.same_reference(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(text) => f.write_str(&text),
            Err(raised) => write!(f, "<{} ({})>", self.type_name(), raised.kind),
        }
    }
}

fn contains(items: &[Value], needle: &Value) -> Outcome<bool> {
    for item in items {
        if needle.equals(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn lookup<'a>(entries: &'a [(Value, Value)], key: &Value) -> Outcome<Option<&'a Value>> {
    for (k, v) in entries {
        if key.equals(k)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

fn render_all(items: &[Value]) -> Outcome<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(item.render()?);
    }
    Ok(parts.join(", "))
}

/// Stable hash of a tagged canonical encoding (first 8 bytes of SHA-256)
fn digest_hash(tag: u8, bytes: &[u8]) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update([tag]);
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(head)
}

/// Order-sensitive `31 * h + x` fold, seeded with 17
pub fn fold_hashes(hashes: impl IntoIterator<Item = Outcome<i64>>) -> Outcome<i64> {
    let mut acc: i64 = 17;
    for h in hashes {
        acc = acc.wrapping_mul(31).wrapping_add(h?);
    }
    Ok(acc)
}

// ── Object ────────────────────────────────────────────────

/// A synthesized instance of a record type.
///
/// Objects are immutable. Every construction (including copies) has its own
/// identity, observable through [`Object::same_reference`]. Identity hashes
/// are derived from content and copy generation, never from addresses, so
/// they repeat across runs.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectData>,
}

struct ObjectData {
    type_id: TypeId,
    ancestors: Arc<[TypeId]>,
    fields: BTreeMap<String, Value>,
    behavior: Arc<dyn Behavior>,
    owner: TypeId,
    /// 0 for a fresh construction, +1 per identical copy
    generation: u32,
}

impl Object {
    pub(crate) fn new(
        type_id: TypeId,
        ancestors: Arc<[TypeId]>,
        fields: BTreeMap<String, Value>,
        behavior: Arc<dyn Behavior>,
        owner: TypeId,
    ) -> Self {
        Object {
            inner: Arc::new(ObjectData {
                type_id,
                ancestors,
                fields,
                behavior,
                owner,
                generation: 0,
            }),
        }
    }

    /// Runtime type
    pub fn type_id(&self) -> &TypeId {
        &self.inner.type_id
    }

    /// Supertypes of the runtime type, nearest first
    pub fn ancestors(&self) -> &[TypeId] {
        &self.inner.ancestors
    }

    /// `instanceof`: the runtime type or one of its ancestors is `ty`
    pub fn is_instance_of(&self, ty: &TypeId) -> bool {
        self.type_id() == ty || self.ancestors().contains(ty)
    }

    /// The type whose equality behavior this object uses
    pub fn behavior_owner(&self) -> &TypeId {
        &self.inner.owner
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.inner.fields.get(member)
    }

    /// Member access that raises like a missing accessor would
    pub fn field(&self, member: &str) -> Outcome<&Value> {
        self.get(member).ok_or_else(|| {
            Raised::illegal_state(format!("{} has no member '{}'", self.type_id(), member))
        })
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.inner.fields
    }

    pub fn same_reference(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Default hash for identity equality.
    ///
    /// An object and its identical copy hash apart; structurally equal
    /// objects of the same copy generation may collide.
    pub fn identity_hash(&self) -> i64 {
        digest_hash(9, format!("{:?}@{}", self, self.inner.generation).as_bytes())
    }

    pub fn equals(&self, other: &Value) -> Outcome<bool> {
        self.inner.behavior.equals(self, other)
    }

    pub fn hash_code(&self) -> Outcome<i64> {
        self.inner.behavior.hash_code(self)
    }

    pub fn render(&self) -> Outcome<String> {
        self.inner.behavior.render(self)
    }

    /// Rendering for diagnostics; never raises
    pub fn describe(&self) -> String {
        match self.render() {
            Ok(text) => text,
            Err(raised) => format!("<{} ({})>", self.type_id(), raised.kind),
        }
    }

    /// Same runtime type and behavior, new identity, one member replaced
    pub(crate) fn with_field(&self, member: &str, value: Value) -> Object {
        let mut fields = self.inner.fields.clone();
        fields.insert(member.to_string(), value);
        self.rebuild(
            self.inner.type_id.clone(),
            self.inner.ancestors.clone(),
            fields,
            self.inner.generation,
        )
    }

    /// Structurally identical, distinct identity
    pub(crate) fn copy(&self) -> Object {
        self.rebuild(
            self.inner.type_id.clone(),
            self.inner.ancestors.clone(),
            self.inner.fields.clone(),
            self.inner.generation.saturating_add(1),
        )
    }

    /// Same members and behavior under another runtime type
    pub(crate) fn retyped(&self, type_id: TypeId, ancestors: Arc<[TypeId]>) -> Object {
        self.rebuild(type_id, ancestors, self.inner.fields.clone(), self.inner.generation)
    }

    fn rebuild(
        &self,
        type_id: TypeId,
        ancestors: Arc<[TypeId]>,
        fields: BTreeMap<String, Value>,
        generation: u32,
    ) -> Object {
        Object {
            inner: Arc::new(ObjectData {
                type_id,
                ancestors,
                fields,
                behavior: self.inner.behavior.clone(),
                owner: self.inner.owner.clone(),
                generation,
            }),
        }
    }
}

/// Structural: same runtime type, structurally equal members
impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        self.type_id() == other.type_id() && self.fields() == other.fields()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.type_id().as_str());
        for (name, value) in self.fields() {
            s.field(name, value);
        }
        s.finish()
    }
}

// ── Token ─────────────────────────────────────────────────

/// Opaque value standing in for an interface or unresolved type parameter.
///
/// Tokens are equal only to themselves.
#[derive(Clone)]
pub struct Token {
    inner: Arc<TokenData>,
}

struct TokenData {
    type_name: String,
    ordinal: u32,
}

impl Token {
    pub fn new(type_name: impl Into<String>, ordinal: u32) -> Self {
        Token {
            inner: Arc::new(TokenData {
                type_name: type_name.into(),
                ordinal,
            }),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn same_reference(&self, other: &Token) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn identity_hash(&self) -> i64 {
        digest_hash(8, self.to_string().as_bytes())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.inner.type_name, self.inner.ordinal)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_hash_is_stable() {
        assert_eq!(Value::Int(1).hash_code(), Value::Int(1).hash_code());
        assert_ne!(Value::Int(1).hash_code(), Value::Int(2).hash_code());
        // the tag separates kinds that share a byte encoding
        assert_ne!(Value::Int(1).hash_code(), Value::UInt(1).hash_code());
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let a = Value::Set(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::Set(vec![Value::Int(2), Value::Int(1)]);
        assert_eq!(a.equals(&b), Ok(true));
        assert_eq!(a.hash_code(), b.hash_code());
        // structural equality is order-sensitive
        assert_ne!(a, b);
    }

    #[test]
    fn test_map_equality_by_key() {
        let a = Value::Map(vec![(Value::Str("k".into()), Value::Int(1))]);
        let b = Value::Map(vec![(Value::Str("k".into()), Value::Int(2))]);
        assert_eq!(a.equals(&a.clone()), Ok(true));
        assert_eq!(a.equals(&b), Ok(false));
    }

    #[test]
    fn test_tokens_equal_only_themselves() {
        let a = Token::new("Shape", 0);
        let b = Token::new("Shape", 0);
        assert_eq!(Value::Token(a.clone()).equals(&Value::Token(a.clone())), Ok(true));
        assert_eq!(Value::Token(a).equals(&Value::Token(b)), Ok(false));
    }

    #[test]
    fn test_identity_hashes_repeat_across_constructions() {
        let a = Token::new("Shape", 0);
        let b = Token::new("Shape", 0);
        assert_eq!(Value::Token(a).hash_code(), Value::Token(b).hash_code());
        assert_ne!(
            Value::Token(Token::new("Shape", 0)).hash_code(),
            Value::Token(Token::new("Shape", 1)).hash_code()
        );

        let build = || {
            Object::new(
                TypeId::new("Handle"),
                Arc::<[TypeId]>::from(Vec::new()),
                BTreeMap::from([("id".to_string(), Value::Int(1))]),
                Arc::new(crate::behavior::Identity),
                TypeId::new("Handle"),
            )
        };
        let first = build();
        assert_eq!(first.identity_hash(), build().identity_hash());
        // a copy is a new identity and hashes apart from its source
        assert_ne!(first.identity_hash(), first.copy().identity_hash());
        assert_eq!(first.copy().identity_hash(), build().copy().identity_hash());
    }

    #[test]
    fn test_cast_raises_on_null_and_foreign_values() {
        let target = TypeId::new("Point");
        let err = Value::Null.cast(&target).unwrap_err();
        assert_eq!(err.kind, RaisedKind::NullDereference);
        let err = Value::Int(3).cast(&target).unwrap_err();
        assert_eq!(err.kind, RaisedKind::TypeMismatch);
        assert_eq!(err.message, "Int cannot be cast to Point");
    }

    #[test]
    fn test_render_containers() {
        let v = Value::Seq(vec![Value::Str("a".into()), Value::Null]);
        assert_eq!(v.render().unwrap(), "[\"a\", null]");
        assert_eq!(v.to_string(), "[\"a\", null]");
    }

    #[test]
    fn test_non_null() {
        assert!(Value::Null.non_null().is_err());
        assert_eq!(Value::Int(1).non_null(), Ok(&Value::Int(1)));
    }
}
