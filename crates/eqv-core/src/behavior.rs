//! Equality, hash and render behavior of a record type
//!
//! This is the capability the engine probes. A registered record either
//! defines a [`Behavior`], inherits one from its supertype, or leaves it
//! abstract. Two stock behaviors cover the common cases:
//!
//! - [`Structural`] compares a chosen set of members (all by default), with an
//!   exact-type or `instanceof`-style type check.
//! - [`Identity`] is reference equality, the default for records whose chain
//!   never defines equality.
//!
//! Misbehaving types are modelled by implementing [`Behavior`] directly.

use std::collections::BTreeSet;

use crate::value::{fold_hashes, Object, Outcome, Value};

/// Equality/hash/render operations of a type under test
pub trait Behavior: Send + Sync {
    /// `this.equals(other)`
    fn equals(&self, this: &Object, other: &Value) -> Outcome<bool>;

    /// `this.hash_code()`
    fn hash_code(&self, this: &Object) -> Outcome<i64>;

    /// `this.to_string()`; defaults to `Type { member: value, .. }`
    fn render(&self, this: &Object) -> Outcome<String> {
        render_members(this)
    }
}

/// Render every member as `Type { a: 1, b: 2 }`
pub fn render_members(this: &Object) -> Outcome<String> {
    if this.fields().is_empty() {
        return Ok(this.type_id().to_string());
    }
    let mut parts = Vec::with_capacity(this.fields().len());
    for (name, value) in this.fields() {
        parts.push(format!("{}: {}", name, value.render()?));
    }
    Ok(format!("{} {{ {} }}", this.type_id(), parts.join(", ")))
}

/// How [`Structural`] decides whether `other` is comparable at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheck {
    /// Runtime types must be identical (`getClass() == other.getClass()`)
    ExactType,
    /// `other` must be an instance of the type that owns this behavior
    InstanceOf,
}

/// Member-wise equality and hash
#[derive(Debug, Clone)]
pub struct Structural {
    type_check: TypeCheck,
    compared: Option<BTreeSet<String>>,
    hashed: Option<BTreeSet<String>>,
}

impl Structural {
    /// Compare every member, exact runtime type required
    pub fn exact() -> Self {
        Structural {
            type_check: TypeCheck::ExactType,
            compared: None,
            hashed: None,
        }
    }

    /// Compare every member, any instance of the owning type accepted
    pub fn instance_of() -> Self {
        Structural {
            type_check: TypeCheck::InstanceOf,
            ..Structural::exact()
        }
    }

    /// Restrict equality (and, unless overridden, hashing) to `members`
    pub fn comparing<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compared = Some(members.into_iter().map(Into::into).collect());
        self
    }

    /// Hash over `members` instead of the compared set
    pub fn hashing<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hashed = Some(members.into_iter().map(Into::into).collect());
        self
    }

    fn accepts(&self, this: &Object, other: &Object) -> bool {
        match self.type_check {
            TypeCheck::ExactType => this.type_id() == other.type_id(),
            TypeCheck::InstanceOf => other.is_instance_of(this.behavior_owner()),
        }
    }

    fn selected<'a>(
        selection: Option<&'a BTreeSet<String>>,
        this: &'a Object,
    ) -> impl Iterator<Item = &'a String> + 'a {
        this.fields()
            .keys()
            .filter(move |name| selection.map_or(true, |set| set.contains(*name)))
    }
}

impl Behavior for Structural {
    fn equals(&self, this: &Object, other: &Value) -> Outcome<bool> {
        let Some(other) = other.as_object() else {
            return Ok(false);
        };
        if this.same_reference(other) {
            return Ok(true);
        }
        if !self.accepts(this, other) {
            return Ok(false);
        }
        for name in Self::selected(self.compared.as_ref(), this) {
            let mine = this.field(name)?;
            match other.get(name) {
                Some(theirs) if mine.equals(theirs)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    fn hash_code(&self, this: &Object) -> Outcome<i64> {
        let selection = self.hashed.as_ref().or(self.compared.as_ref());
        fold_hashes(Self::selected(selection, this).map(|name| this.field(name)?.hash_code()))
    }
}

/// Reference equality; hash is the object's identity hash
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Behavior for Identity {
    fn equals(&self, this: &Object, other: &Value) -> Outcome<bool> {
        Ok(other
            .as_object()
            .map_or(false, |other| this.same_reference(other)))
    }

    fn hash_code(&self, this: &Object) -> Outcome<i64> {
        Ok(this.identity_hash())
    }
}
