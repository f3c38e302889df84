//! Type descriptor — the comparable state of the type under test
//!
//! Built once per run from the registry, then frozen. Significance is not
//! declared: the driver discovers it by probing equality and attaches it with
//! [`TypeDescriptor::with_significance`] before any checker runs.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::registry::TypeRegistry;
use crate::types::{TypeExpr, TypeId};

/// One state-bearing member
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub declared_type: TypeExpr,
    pub declared_in: TypeId,
    pub is_final: bool,
    pub is_transient: bool,
    pub is_excluded: bool,
    pub is_significant_in_equality: bool,
}

/// Queryable metadata about the type under test
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub type_id: TypeId,
    pub expr: TypeExpr,
    pub members: Vec<MemberDescriptor>,
    /// Nearest ancestor first
    pub supertype_chain: Vec<TypeDescriptor>,
    pub is_final: bool,
    pub is_abstract: bool,
    pub equality_final: bool,
}

impl TypeDescriptor {
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Members the checkers may vary: everything not excluded
    pub fn candidates(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|m| !m.is_excluded)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|m| m.is_excluded)
    }

    pub fn significant(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|m| m.is_significant_in_equality)
    }

    /// Whether a subtype could redefine equality
    pub fn open_to_redefinition(&self) -> bool {
        !self.is_final && !self.equality_final
    }

    /// Freeze probed significance into a new descriptor
    pub fn with_significance(&self, significance: &BTreeMap<String, bool>) -> TypeDescriptor {
        let mut frozen = self.clone();
        for member in &mut frozen.members {
            member.is_significant_in_equality =
                significance.get(&member.name).copied().unwrap_or(false);
        }
        frozen
    }
}

/// Build the descriptor of `target`, honoring `excluded` member names.
///
/// # Errors
/// `IntrospectionError` if the type (or an ancestor) is unknown, opaque or
/// not a record, if generic arity is wrong, if a member name repeats along the
/// chain, or if an excluded name matches no member.
pub fn describe(
    registry: &TypeRegistry,
    target: &TypeExpr,
    excluded: &BTreeSet<String>,
) -> Result<TypeDescriptor> {
    let descriptor = describe_level(registry, target, excluded)?;
    for name in excluded {
        if descriptor.member(name).is_none() {
            return Err(Error::introspection(
                &descriptor.type_id,
                format!("excluded member '{}' does not exist", name),
            ));
        }
    }
    tracing::debug!(
        type_id = %descriptor.type_id,
        members = descriptor.members.len(),
        ancestors = descriptor.supertype_chain.len(),
        "built type descriptor"
    );
    Ok(descriptor)
}

fn describe_level(
    registry: &TypeRegistry,
    target: &TypeExpr,
    excluded: &BTreeSet<String>,
) -> Result<TypeDescriptor> {
    let layout = registry.layout(target)?;
    let members = layout
        .members
        .iter()
        .map(|m| MemberDescriptor {
            name: m.name.clone(),
            declared_type: m.ty.clone(),
            declared_in: m.declared_in.clone(),
            is_final: m.is_final,
            is_transient: m.is_transient,
            is_excluded: excluded.contains(&m.name),
            is_significant_in_equality: false,
        })
        .collect();

    let mut supertype_chain = Vec::with_capacity(layout.ancestors.len());
    if let Some(parent) = layout.ancestors.first() {
        let parent = describe_level(registry, &TypeExpr::Named(parent.clone()), excluded)?;
        let grandparents = parent.supertype_chain.clone();
        supertype_chain.push(parent);
        supertype_chain.extend(grandparents);
    }

    Ok(TypeDescriptor {
        type_id: layout.id,
        expr: layout.expr,
        members,
        supertype_chain,
        is_final: layout.is_final,
        is_abstract: layout.is_abstract,
        equality_final: layout.equality_final,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemberDef, TypeDef};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeDef::record("Entity")
                    .member(MemberDef::new("id", TypeExpr::int()).mutable())
                    .abstract_type()
                    .build(),
            )
            .unwrap();
        registry
            .register(
                TypeDef::record("Account")
                    .field("owner", TypeExpr::string())
                    .member(MemberDef::new("cache", TypeExpr::int()).transient())
                    .extends("Entity")
                    .open()
                    .build(),
            )
            .unwrap();
        registry
            .register(TypeDef::record("Savings").field("rate", TypeExpr::float()).extends("Account").build())
            .unwrap();
        registry
    }

    #[test]
    fn test_collects_members_at_every_level() {
        let d = describe(&registry(), &TypeExpr::named("Savings"), &BTreeSet::new()).unwrap();
        let names: Vec<_> = d.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["id", "owner", "cache", "rate"]);
        assert!(!d.member("id").unwrap().is_final);
        assert!(d.member("cache").unwrap().is_transient);
        assert!(d.is_final);
    }

    #[test]
    fn test_supertype_chain_nearest_first() {
        let d = describe(&registry(), &TypeExpr::named("Savings"), &BTreeSet::new()).unwrap();
        let chain: Vec<_> = d.supertype_chain.iter().map(|s| s.type_id.as_str()).collect();
        assert_eq!(chain, vec!["Account", "Entity"]);
        assert!(d.supertype_chain[1].is_abstract);
    }

    #[test]
    fn test_exclusions_marked() {
        let excluded: BTreeSet<String> = ["cache".to_string()].into_iter().collect();
        let d = describe(&registry(), &TypeExpr::named("Account"), &excluded).unwrap();
        assert!(d.member("cache").unwrap().is_excluded);
        let candidates: Vec<_> = d.candidates().map(|m| m.name.as_str()).collect();
        assert_eq!(candidates, vec!["id", "owner"]);
    }

    #[test]
    fn test_unknown_exclusion_is_introspection_error() {
        let excluded: BTreeSet<String> = ["nope".to_string()].into_iter().collect();
        let err = describe(&registry(), &TypeExpr::named("Account"), &excluded).unwrap_err();
        assert!(matches!(err, Error::Introspection { .. }));
        assert!(err.to_string().contains("'nope'"));
    }

    #[test]
    fn test_unregistered_type() {
        let err = describe(&registry(), &TypeExpr::named("Ghost"), &BTreeSet::new()).unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn test_with_significance_freezes_flags() {
        let d = describe(&registry(), &TypeExpr::named("Account"), &BTreeSet::new()).unwrap();
        let mut probed = BTreeMap::new();
        probed.insert("owner".to_string(), true);
        let frozen = d.with_significance(&probed);
        let significant: Vec<_> = frozen.significant().map(|m| m.name.as_str()).collect();
        assert_eq!(significant, vec!["owner"]);
        assert!(d.significant().next().is_none());
    }
}
