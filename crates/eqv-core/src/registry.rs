//! Type registry — explicit metadata for every type the engine may touch
//!
//! Rather than reading runtime metadata, callers describe their types up
//! front: records with their members, supertype and equality behavior;
//! enumerations with their variants; interfaces; opaque foreign types.
//! The registry is immutable once verification starts and may be shared by
//! concurrent runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::behavior::{Behavior, Identity};
use crate::error::{Error, Result};
use crate::types::{TypeExpr, TypeId};

// ── Definitions ───────────────────────────────────────────

/// A state-bearing member of a record
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDef {
    pub name: String,
    pub ty: TypeExpr,
    pub is_final: bool,
    pub is_transient: bool,
}

impl MemberDef {
    /// A final, non-transient member
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        MemberDef {
            name: name.into(),
            ty,
            is_final: true,
            is_transient: false,
        }
    }

    /// Reassignable after construction
    pub fn mutable(mut self) -> Self {
        self.is_final = false;
        self
    }

    /// Not part of the persisted state
    pub fn transient(mut self) -> Self {
        self.is_transient = true;
        self
    }
}

/// Where a record's equality behavior comes from
#[derive(Clone)]
pub enum EqualitySlot {
    /// Use the nearest ancestor's; identity at the root
    Inherited,
    /// Declared but not implemented; a subtype must provide it
    Abstract,
    Defined(Arc<dyn Behavior>),
}

impl fmt::Debug for EqualitySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EqualitySlot::Inherited => write!(f, "Inherited"),
            EqualitySlot::Abstract => write!(f, "Abstract"),
            EqualitySlot::Defined(_) => write!(f, "Defined"),
        }
    }
}

/// A record (class-like) type
#[derive(Debug, Clone)]
pub struct RecordDef {
    pub members: Vec<MemberDef>,
    pub supertype: Option<TypeId>,
    pub type_params: Vec<String>,
    /// Closed to extension
    pub is_final: bool,
    pub is_abstract: bool,
    pub equality: EqualitySlot,
    /// Subtypes cannot redefine equality/hash
    pub equality_final: bool,
}

/// Kind of a registered type
#[derive(Debug, Clone)]
pub enum TypeKind {
    Record(RecordDef),
    Enum { variants: Vec<String> },
    /// Stateless abstraction; values are opaque tokens
    Interface,
    /// Foreign type without accessible metadata
    Opaque,
}

/// A registered type
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: TypeId,
    pub kind: TypeKind,
}

impl TypeDef {
    /// Start a record definition: final, no members, inherited equality
    pub fn record(id: impl Into<TypeId>) -> RecordBuilder {
        RecordBuilder {
            id: id.into(),
            def: RecordDef {
                members: Vec::new(),
                supertype: None,
                type_params: Vec::new(),
                is_final: true,
                is_abstract: false,
                equality: EqualitySlot::Inherited,
                equality_final: false,
            },
        }
    }

    pub fn enumeration<I, S>(id: impl Into<TypeId>, variants: I) -> TypeDef
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDef {
            id: id.into(),
            kind: TypeKind::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn interface(id: impl Into<TypeId>) -> TypeDef {
        TypeDef {
            id: id.into(),
            kind: TypeKind::Interface,
        }
    }

    pub fn opaque(id: impl Into<TypeId>) -> TypeDef {
        TypeDef {
            id: id.into(),
            kind: TypeKind::Opaque,
        }
    }
}

/// Builder for [`TypeDef::record`]
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    id: TypeId,
    def: RecordDef,
}

impl RecordBuilder {
    pub fn member(mut self, member: MemberDef) -> Self {
        self.def.members.push(member);
        self
    }

    /// Shorthand for a final member
    pub fn field(self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.member(MemberDef::new(name, ty))
    }

    pub fn extends(mut self, supertype: impl Into<TypeId>) -> Self {
        self.def.supertype = Some(supertype.into());
        self
    }

    pub fn type_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def.type_params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Open to extension by subtypes
    pub fn open(mut self) -> Self {
        self.def.is_final = false;
        self
    }

    /// Abstract (implies open)
    pub fn abstract_type(mut self) -> Self {
        self.def.is_abstract = true;
        self.def.is_final = false;
        self
    }

    pub fn equality(mut self, behavior: impl Behavior + 'static) -> Self {
        self.def.equality = EqualitySlot::Defined(Arc::new(behavior));
        self
    }

    pub fn shared_equality(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.def.equality = EqualitySlot::Defined(behavior);
        self
    }

    pub fn abstract_equality(mut self) -> Self {
        self.def.equality = EqualitySlot::Abstract;
        self
    }

    /// Equality and hash may not be overridden by subtypes
    pub fn final_equality(mut self) -> Self {
        self.def.equality_final = true;
        self
    }

    pub fn build(self) -> TypeDef {
        TypeDef {
            id: self.id,
            kind: TypeKind::Record(self.def),
        }
    }
}

// ── Layout ────────────────────────────────────────────────

/// A member after inheritance flattening and generic substitution
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutMember {
    pub name: String,
    pub ty: TypeExpr,
    pub declared_in: TypeId,
    pub is_final: bool,
    pub is_transient: bool,
}

/// Flattened shape of a record, as seen through a concrete type expression
#[derive(Debug, Clone)]
pub struct RecordLayout {
    pub id: TypeId,
    pub expr: TypeExpr,
    /// Root ancestor's members first, own members last
    pub members: Vec<LayoutMember>,
    /// Nearest first
    pub ancestors: Vec<TypeId>,
    pub is_final: bool,
    pub is_abstract: bool,
    pub equality_final: bool,
}

/// A resolved equality behavior and the type that defined it
#[derive(Clone)]
pub struct ResolvedEquality {
    pub owner: TypeId,
    pub behavior: Arc<dyn Behavior>,
}

// ── Registry ──────────────────────────────────────────────

/// All types known to a verification run
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    defs: BTreeMap<TypeId, TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; ids are unique
    pub fn register(&mut self, def: TypeDef) -> Result<()> {
        if self.defs.contains_key(&def.id) {
            return Err(Error::introspection(&def.id, "type is already registered"));
        }
        self.defs.insert(def.id.clone(), def);
        Ok(())
    }

    /// Register, chaining
    pub fn with(mut self, def: TypeDef) -> Result<Self> {
        self.register(def)?;
        Ok(self)
    }

    pub fn get(&self, id: &TypeId) -> Option<&TypeDef> {
        self.defs.get(id)
    }

    pub fn contains(&self, id: &TypeId) -> bool {
        self.defs.contains_key(id)
    }

    pub fn lookup(&self, id: &TypeId) -> Result<&TypeDef> {
        self.defs
            .get(id)
            .ok_or_else(|| Error::introspection(id, "type is not registered"))
    }

    pub fn record(&self, id: &TypeId) -> Result<&RecordDef> {
        match &self.lookup(id)?.kind {
            TypeKind::Record(def) => Ok(def),
            TypeKind::Opaque => Err(Error::introspection(id, "opaque type has no accessible metadata")),
            TypeKind::Enum { .. } => Err(Error::introspection(id, "enumeration is not a record")),
            TypeKind::Interface => Err(Error::introspection(id, "interface is not a record")),
        }
    }

    /// Supertypes of `id`, nearest first
    pub fn ancestors(&self, id: &TypeId) -> Result<Vec<TypeId>> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        seen.insert(id.clone());
        let mut current = self.record(id)?.supertype.clone();
        while let Some(parent) = current {
            if !seen.insert(parent.clone()) {
                return Err(Error::introspection(
                    id,
                    format!("supertype chain loops back to {}", parent),
                ));
            }
            current = self.record(&parent)?.supertype.clone();
            chain.push(parent);
        }
        Ok(chain)
    }

    /// Flatten a record reached through `expr` (`Named` or `Generic`)
    pub fn layout(&self, expr: &TypeExpr) -> Result<RecordLayout> {
        let (id, args): (&TypeId, &[TypeExpr]) = match expr {
            TypeExpr::Named(id) => (id, &[]),
            TypeExpr::Generic { base, args } => (base, args.as_slice()),
            other => {
                return Err(Error::introspection(other, "not a record type expression"));
            }
        };
        let def = self.record(id)?;
        if !args.is_empty() && args.len() != def.type_params.len() {
            return Err(Error::introspection(
                id,
                format!(
                    "expects {} type argument(s), found {}",
                    def.type_params.len(),
                    args.len()
                ),
            ));
        }
        let bindings: BTreeMap<String, TypeExpr> = def
            .type_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();

        let ancestors = self.ancestors(id)?;
        let mut members: Vec<LayoutMember> = Vec::new();
        let mut seen = BTreeSet::new();
        for level in ancestors.iter().rev().chain(std::iter::once(id)) {
            let level_def = self.record(level)?;
            for m in &level_def.members {
                if !seen.insert(m.name.clone()) {
                    return Err(Error::introspection(
                        id,
                        format!("member '{}' is declared more than once along the chain", m.name),
                    ));
                }
                let ty = if level == id {
                    m.ty.substitute(&bindings)
                } else {
                    m.ty.clone()
                };
                members.push(LayoutMember {
                    name: m.name.clone(),
                    ty,
                    declared_in: level.clone(),
                    is_final: m.is_final,
                    is_transient: m.is_transient,
                });
            }
        }

        Ok(RecordLayout {
            id: id.clone(),
            expr: expr.clone(),
            members,
            ancestors,
            is_final: def.is_final,
            is_abstract: def.is_abstract,
            equality_final: def.equality_final || self.equality_final_above(id)?,
        })
    }

    fn equality_final_above(&self, id: &TypeId) -> Result<bool> {
        for ancestor in self.ancestors(id)? {
            if self.record(&ancestor)?.equality_final {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Walk the chain for the behavior `id` uses.
    ///
    /// `None` means equality is abstract and nothing below overrides it.
    pub fn equality_of(&self, id: &TypeId) -> Result<Option<ResolvedEquality>> {
        let mut levels = vec![id.clone()];
        levels.extend(self.ancestors(id)?);
        for level in &levels {
            match &self.record(level)?.equality {
                EqualitySlot::Defined(behavior) => {
                    return Ok(Some(ResolvedEquality {
                        owner: level.clone(),
                        behavior: behavior.clone(),
                    }))
                }
                EqualitySlot::Abstract => return Ok(None),
                EqualitySlot::Inherited => {}
            }
        }
        let root = levels.last().cloned().unwrap_or_else(|| id.clone());
        Ok(Some(ResolvedEquality {
            owner: root,
            behavior: Arc::new(Identity),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Structural;

    fn shapes() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                TypeDef::record("Point")
                    .field("x", TypeExpr::int())
                    .field("y", TypeExpr::int())
                    .open()
                    .equality(Structural::exact())
                    .build(),
            )
            .and_then(|r| {
                r.with(
                    TypeDef::record("ColorPoint")
                        .field("color", TypeExpr::string())
                        .extends("Point")
                        .build(),
                )
            })
            .expect("registry should build")
    }

    #[test]
    fn test_layout_flattens_root_first() {
        let layout = shapes().layout(&TypeExpr::named("ColorPoint")).unwrap();
        let names: Vec<_> = layout.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "color"]);
        assert_eq!(layout.ancestors, vec![TypeId::new("Point")]);
        assert_eq!(layout.members[0].declared_in, TypeId::new("Point"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let err = shapes()
            .with(TypeDef::interface("Point"))
            .unwrap_err();
        assert!(matches!(err, Error::Introspection { .. }));
    }

    #[test]
    fn test_equality_inherited_from_ancestor() {
        let registry = shapes();
        let resolved = registry.equality_of(&TypeId::new("ColorPoint")).unwrap().unwrap();
        assert_eq!(resolved.owner, TypeId::new("Point"));
    }

    #[test]
    fn test_root_without_equality_falls_back_to_identity_owner() {
        let registry = TypeRegistry::new()
            .with(TypeDef::record("Plain").field("a", TypeExpr::int()).build())
            .unwrap();
        let resolved = registry.equality_of(&TypeId::new("Plain")).unwrap().unwrap();
        assert_eq!(resolved.owner, TypeId::new("Plain"));
    }

    #[test]
    fn test_abstract_equality_resolves_to_none() {
        let registry = TypeRegistry::new()
            .with(TypeDef::record("Shape").abstract_type().abstract_equality().build())
            .unwrap();
        assert!(registry.equality_of(&TypeId::new("Shape")).unwrap().is_none());
    }

    #[test]
    fn test_supertype_loop_detected() {
        let registry = TypeRegistry::new()
            .with(TypeDef::record("A").extends("B").build())
            .and_then(|r| r.with(TypeDef::record("B").extends("A").build()))
            .unwrap();
        let err = registry.ancestors(&TypeId::new("A")).unwrap_err();
        assert!(err.to_string().contains("loops back"));
    }

    #[test]
    fn test_generic_arity_checked() {
        let registry = TypeRegistry::new()
            .with(
                TypeDef::record("Pair")
                    .type_params(["A", "B"])
                    .field("left", TypeExpr::param("A"))
                    .field("right", TypeExpr::param("B"))
                    .build(),
            )
            .unwrap();
        let err = registry
            .layout(&TypeExpr::generic("Pair", vec![TypeExpr::int()]))
            .unwrap_err();
        assert!(err.to_string().contains("expects 2 type argument(s), found 1"));

        let layout = registry
            .layout(&TypeExpr::generic("Pair", vec![TypeExpr::int(), TypeExpr::bool()]))
            .unwrap();
        assert_eq!(layout.members[1].ty, TypeExpr::bool());
    }

    #[test]
    fn test_opaque_is_not_introspectable() {
        let registry = TypeRegistry::new().with(TypeDef::opaque("Socket")).unwrap();
        let err = registry.layout(&TypeExpr::named("Socket")).unwrap_err();
        assert!(err.to_string().contains("no accessible metadata"));
    }
}
