//! Value generator — red/black pairs for arbitrary declared types
//!
//! Strategy by shape, after overrides and the cache have been consulted:
//!
//! | Shape            | red                    | black                      |
//! |------------------|------------------------|----------------------------|
//! | scalar           | canonical first value  | canonical second value     |
//! | enumeration      | first variant          | second variant             |
//! | `Option<T>`      | `T.red`                | `T.black`                  |
//! | `Seq<T>`/`Set<T>`| empty                  | `[T.red]`                  |
//! | `Map<K, V>`      | empty                  | `{K.red: V.red}`           |
//! | record / generic | all members red        | all members black          |
//! | interface, `T`   | opaque token           | another opaque token       |
//!
//! # Cycles
//!
//! Records are generated under a guard. A record requested again while its
//! own generation is in progress is a cycle. If an `Option` or container edge
//! lies anywhere on the cycle, that edge breaks it: `null`/empty on the red
//! pass, the freshly built red instance as placeholder on the black pass.
//! A cycle through plain members only is an `UnresolvableCycle`. Pairs that
//! still depend on an in-progress type are provisional: they are reused while
//! those types stay open and never enter the settled cache.

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::{Pair, ValueCache};
use crate::error::{Error, Result};
use crate::registry::{LayoutMember, RecordLayout, TypeKind, TypeRegistry};
use crate::synth::Blueprint;
use crate::types::{ScalarKind, TypeExpr, TypeId};
use crate::value::{Token, Value};

/// Return the pair for `ty`, generating and caching it if needed.
///
/// # Errors
/// - `InsufficientVariants` for an enumeration with fewer than two variants
/// - `UnresolvableCycle` for a self-reference no nullable edge breaks
/// - `Introspection` for unknown or opaque types
/// - `Synthesis` for records whose instances cannot be built or told apart
pub fn get_or_generate(
    registry: &TypeRegistry,
    cache: &mut ValueCache,
    ty: &TypeExpr,
) -> Result<Pair> {
    match generate(registry, cache, ty) {
        Ok(generated) => Ok(generated.pair),
        Err(err) => {
            if let Error::UnresolvableCycle { path, .. } = &err {
                tracing::warn!(ty = %ty, path = ?path, "unresolvable generation cycle");
            }
            Err(err)
        }
    }
}

/// A pair plus the in-progress record types it was built against
struct Generated {
    pair: Pair,
    pending: BTreeSet<TypeExpr>,
}

impl Generated {
    fn settled(red: Value, black: Value) -> Self {
        Generated {
            pair: Pair::new(red, black),
            pending: BTreeSet::new(),
        }
    }
}

fn generate(registry: &TypeRegistry, cache: &mut ValueCache, ty: &TypeExpr) -> Result<Generated> {
    if let Some(pair) = cache.lookup(ty) {
        return Ok(Generated {
            pair: pair.clone(),
            pending: BTreeSet::new(),
        });
    }
    if let Some((pair, pending)) = cache.provisional(ty) {
        return Ok(Generated { pair, pending });
    }

    let generated = match ty {
        TypeExpr::Scalar(kind) => scalar_pair(*kind),
        TypeExpr::Param(name) => token_pair(name),
        TypeExpr::Option(inner) => option_pair(registry, cache, inner)?,
        TypeExpr::Seq(inner) => {
            let (red, pending) = element_red(registry, cache, inner)?;
            Generated {
                pair: Pair::new(Value::Seq(Vec::new()), Value::Seq(red.into_iter().collect())),
                pending,
            }
        }
        TypeExpr::Set(inner) => {
            let (red, pending) = element_red(registry, cache, inner)?;
            Generated {
                pair: Pair::new(Value::Set(Vec::new()), Value::Set(red.into_iter().collect())),
                pending,
            }
        }
        TypeExpr::Map(key, value) => {
            let (k, mut pending) = element_red(registry, cache, key)?;
            let (v, more) = element_red(registry, cache, value)?;
            pending.extend(more);
            let entry = k.zip(v).into_iter().collect();
            Generated {
                pair: Pair::new(Value::Map(Vec::new()), Value::Map(entry)),
                pending,
            }
        }
        TypeExpr::Named(id) | TypeExpr::Generic { base: id, .. } => {
            match &registry.lookup(id)?.kind {
                TypeKind::Enum { variants } => enum_pair(ty, id, variants)?,
                TypeKind::Interface => token_pair(id.as_str()),
                TypeKind::Opaque => {
                    return Err(Error::introspection(
                        id,
                        "opaque type has no accessible metadata; register an override for it",
                    ))
                }
                TypeKind::Record(_) => record_pair(registry, cache, ty)?,
            }
        }
    };

    if generated.pending.is_empty() {
        tracing::debug!(
            ty = %ty,
            red = %generated.pair.red,
            black = %generated.pair.black,
            "generated red/black pair"
        );
        cache.insert(ty.clone(), generated.pair.clone());
    } else {
        cache.remember(ty.clone(), generated.pair.clone(), generated.pending.clone());
    }
    Ok(generated)
}

// ── Leaf strategies ───────────────────────────────────────

fn scalar_pair(kind: ScalarKind) -> Generated {
    let (red, black) = match kind {
        ScalarKind::Bool => (Value::Bool(true), Value::Bool(false)),
        ScalarKind::Char => (Value::Char('a'), Value::Char('b')),
        ScalarKind::Int8 | ScalarKind::Int16 | ScalarKind::Int32 | ScalarKind::Int64 => {
            (Value::Int(1), Value::Int(2))
        }
        ScalarKind::UInt8 | ScalarKind::UInt16 | ScalarKind::UInt32 | ScalarKind::UInt64 => {
            (Value::UInt(1), Value::UInt(2))
        }
        ScalarKind::Float32 | ScalarKind::Float64 => (Value::Float(0.5), Value::Float(1.0)),
        ScalarKind::Str => (Value::Str("one".into()), Value::Str("two".into())),
    };
    Generated::settled(red, black)
}

fn token_pair(type_name: &str) -> Generated {
    Generated::settled(
        Value::Token(Token::new(type_name, 0)),
        Value::Token(Token::new(type_name, 1)),
    )
}

fn enum_pair(ty: &TypeExpr, id: &TypeId, variants: &[String]) -> Result<Generated> {
    match variants {
        [first, second, ..] => Ok(Generated::settled(
            Value::Variant {
                enum_type: id.clone(),
                name: first.clone(),
            },
            Value::Variant {
                enum_type: id.clone(),
                name: second.clone(),
            },
        )),
        _ => Err(Error::InsufficientVariants {
            type_name: ty.to_string(),
            found: variants.len(),
        }),
    }
}

// ── Edges that can break cycles ───────────────────────────

fn option_pair(
    registry: &TypeRegistry,
    cache: &mut ValueCache,
    inner: &TypeExpr,
) -> Result<Generated> {
    if cache.is_in_progress(inner) {
        let black = cache.placeholder(inner).cloned().unwrap_or(Value::Null);
        return Ok(Generated {
            pair: Pair::new(Value::Null, black),
            pending: BTreeSet::from([inner.clone()]),
        });
    }
    match generate(registry, cache, inner) {
        Err(err) => match blocked_on(cache, &err) {
            Some(outer) => Ok(Generated {
                pair: Pair::new(Value::Null, Value::Null),
                pending: BTreeSet::from([outer]),
            }),
            None => Err(err),
        },
        generated => generated,
    }
}

/// Red value of a container element; `None` while the element's own red
/// instance is still being built
fn element_red(
    registry: &TypeRegistry,
    cache: &mut ValueCache,
    elem: &TypeExpr,
) -> Result<(Option<Value>, BTreeSet<TypeExpr>)> {
    if cache.is_in_progress(elem) {
        return Ok((
            cache.placeholder(elem).cloned(),
            BTreeSet::from([elem.clone()]),
        ));
    }
    match generate(registry, cache, elem) {
        Ok(generated) => Ok((Some(generated.pair.red), generated.pending)),
        Err(err) => match blocked_on(cache, &err) {
            Some(outer) => Ok((None, BTreeSet::from([outer]))),
            None => Err(err),
        },
    }
}

/// The outer in-progress record a cycle error ran into, if any.
///
/// Seen from a nullable or container edge, such a cycle is broken by that
/// edge: it yields `null`/empty now and is revisited once the outer record's
/// red instance exists.
fn blocked_on(cache: &ValueCache, err: &Error) -> Option<TypeExpr> {
    match err {
        Error::UnresolvableCycle { type_name, .. } => cache
            .in_progress()
            .iter()
            .find(|t| t.to_string() == *type_name)
            .cloned(),
        _ => None,
    }
}

// ── Records ───────────────────────────────────────────────

fn record_pair(
    registry: &TypeRegistry,
    cache: &mut ValueCache,
    ty: &TypeExpr,
) -> Result<Generated> {
    if cache.is_in_progress(ty) {
        // black pass: the red instance stands in for the record being built
        if let Some(placeholder) = cache.placeholder(ty).cloned() {
            return Ok(Generated {
                pair: Pair::new(placeholder.clone(), placeholder),
                pending: BTreeSet::from([ty.clone()]),
            });
        }
        let mut path: Vec<String> = cache.in_progress().iter().map(|t| t.to_string()).collect();
        path.push(ty.to_string());
        tracing::debug!(ty = %ty, path = ?path, "generation cycle");
        return Err(Error::UnresolvableCycle {
            type_name: ty.to_string(),
            path,
        });
    }
    let layout = registry.layout(ty)?;
    let blueprint = Blueprint::resolve(registry, &layout)?;

    cache.begin(ty);
    let outcome = build_record(registry, cache, ty, &layout, &blueprint);
    cache.end(ty);
    outcome
}

fn build_record(
    registry: &TypeRegistry,
    cache: &mut ValueCache,
    ty: &TypeExpr,
    layout: &RecordLayout,
    blueprint: &Blueprint,
) -> Result<Generated> {
    let mut pending = BTreeSet::new();
    let mut reds = BTreeMap::new();
    let mut blacks = BTreeMap::new();
    let mut revisit: Vec<&LayoutMember> = Vec::new();

    for member in &layout.members {
        let generated = generate(registry, cache, &member.ty)?;
        if generated.pending.contains(ty) {
            revisit.push(member);
        }
        pending.extend(generated.pending);
        reds.insert(member.name.clone(), generated.pair.red);
        blacks.insert(member.name.clone(), generated.pair.black);
    }
    let red = blueprint.instantiate(reds);

    // black pass for members that reached back into this record
    if !revisit.is_empty() {
        cache.set_placeholder(ty, Value::Object(red.clone()));
        for member in revisit {
            let generated = generate(registry, cache, &member.ty)?;
            pending.extend(generated.pending);
            blacks.insert(member.name.clone(), generated.pair.black);
        }
    }
    pending.remove(ty);
    let black = blueprint.instantiate(blacks);

    if pending.is_empty() && red == black {
        return Err(Error::synthesis(
            ty,
            "red and black instances are indistinguishable; register an override for it",
        ));
    }
    Ok(Generated {
        pair: Pair::new(Value::Object(red), Value::Object(black)),
        pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Structural;
    use crate::registry::TypeDef;

    fn node_registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                TypeDef::record("Node")
                    .field("value", TypeExpr::int())
                    .field("next", TypeExpr::option(TypeExpr::named("Node")))
                    .equality(Structural::exact())
                    .build(),
            )
            .unwrap()
    }

    #[test]
    fn test_every_scalar_kind_has_distinct_stable_pair() {
        let registry = TypeRegistry::new();
        let mut cache = ValueCache::new();
        for kind in [
            ScalarKind::Bool,
            ScalarKind::Char,
            ScalarKind::Int8,
            ScalarKind::Int64,
            ScalarKind::UInt32,
            ScalarKind::Float32,
            ScalarKind::Str,
        ] {
            let ty = TypeExpr::Scalar(kind);
            let first = get_or_generate(&registry, &mut cache, &ty).unwrap();
            let second = get_or_generate(&registry, &mut cache, &ty).unwrap();
            assert_ne!(first.red, first.black, "{:?}", kind);
            assert_eq!(first, second, "{:?}", kind);
        }
    }

    #[test]
    fn test_seq_red_empty_black_holds_element_red() {
        let registry = TypeRegistry::new();
        let mut cache = ValueCache::new();
        let pair = get_or_generate(&registry, &mut cache, &TypeExpr::seq(TypeExpr::string())).unwrap();
        assert_eq!(pair.red, Value::Seq(vec![]));
        assert_eq!(pair.black, Value::Seq(vec![Value::Str("one".into())]));
    }

    #[test]
    fn test_map_black_pairs_key_and_value_red() {
        let registry = TypeRegistry::new();
        let mut cache = ValueCache::new();
        let ty = TypeExpr::map(TypeExpr::char(), TypeExpr::bool());
        let pair = get_or_generate(&registry, &mut cache, &ty).unwrap();
        assert_eq!(pair.red, Value::Map(vec![]));
        assert_eq!(pair.black, Value::Map(vec![(Value::Char('a'), Value::Bool(true))]));
    }

    #[test]
    fn test_enum_uses_first_two_variants() {
        let registry = TypeRegistry::new()
            .with(TypeDef::enumeration("Color", ["Red", "Green", "Blue"]))
            .unwrap();
        let pair = get_or_generate(&registry, &mut ValueCache::new(), &TypeExpr::named("Color")).unwrap();
        assert_eq!(pair.red.render().unwrap(), "Color::Red");
        assert_eq!(pair.black.render().unwrap(), "Color::Green");
    }

    #[test]
    fn test_single_variant_enum_fails_without_override() {
        let registry = TypeRegistry::new()
            .with(TypeDef::enumeration("Unit", ["Only"]))
            .unwrap();
        let err = get_or_generate(&registry, &mut ValueCache::new(), &TypeExpr::named("Unit"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientVariants {
                type_name: "Unit".into(),
                found: 1
            }
        );
    }

    #[test]
    fn test_single_variant_enum_with_override() {
        let registry = TypeRegistry::new()
            .with(TypeDef::enumeration("Unit", ["Only"]))
            .unwrap();
        let ty = TypeExpr::named("Unit");
        let custom = Pair::new(Value::Str("a".into()), Value::Str("b".into()));
        let mut cache = ValueCache::with_overrides([(&ty, &custom)]).unwrap();
        assert_eq!(get_or_generate(&registry, &mut cache, &ty).unwrap(), custom);
    }

    #[test]
    fn test_self_reference_through_option_terminates() {
        let registry = node_registry();
        let mut cache = ValueCache::new();
        let pair = get_or_generate(&registry, &mut cache, &TypeExpr::named("Node")).unwrap();
        let red = pair.red.as_object().unwrap();
        let black = pair.black.as_object().unwrap();
        assert_eq!(red.get("next"), Some(&Value::Null));
        // the black instance points at the red one
        assert_eq!(black.get("next"), Some(&pair.red));
        assert_ne!(pair.red, pair.black);
        assert!(cache.in_progress().is_empty());
    }

    #[test]
    fn test_self_reference_through_seq_terminates() {
        let registry = TypeRegistry::new()
            .with(
                TypeDef::record("Tree")
                    .field("children", TypeExpr::seq(TypeExpr::named("Tree")))
                    .equality(Structural::exact())
                    .build(),
            )
            .unwrap();
        let mut cache = ValueCache::new();
        let pair = get_or_generate(&registry, &mut cache, &TypeExpr::named("Tree")).unwrap();
        let black = pair.black.as_object().unwrap();
        assert_eq!(black.get("children"), Some(&Value::Seq(vec![pair.red.clone()])));
    }

    #[test]
    fn test_mutual_recursion_through_option() {
        let registry = TypeRegistry::new()
            .with(
                TypeDef::record("Person")
                    .field("employer", TypeExpr::named("Company"))
                    .equality(Structural::exact())
                    .build(),
            )
            .and_then(|r| {
                r.with(
                    TypeDef::record("Company")
                        .field("ceo", TypeExpr::option(TypeExpr::named("Person")))
                        .equality(Structural::exact())
                        .build(),
                )
            })
            .unwrap();
        let mut cache = ValueCache::new();
        let person = get_or_generate(&registry, &mut cache, &TypeExpr::named("Person")).unwrap();
        assert_ne!(person.red, person.black);
        let company = get_or_generate(&registry, &mut cache, &TypeExpr::named("Company")).unwrap();
        assert_eq!(company.red.as_object().unwrap().get("ceo"), Some(&person.red));
    }

    #[test]
    fn test_cycle_broken_by_option_on_outer_edge() {
        // Company is requested first, so Person hits it through a plain member
        let registry = TypeRegistry::new()
            .with(
                TypeDef::record("Person")
                    .field("employer", TypeExpr::named("Company"))
                    .equality(Structural::exact())
                    .build(),
            )
            .and_then(|r| {
                r.with(
                    TypeDef::record("Company")
                        .field("ceo", TypeExpr::option(TypeExpr::named("Person")))
                        .equality(Structural::exact())
                        .build(),
                )
            })
            .unwrap();
        let mut cache = ValueCache::new();
        let company = get_or_generate(&registry, &mut cache, &TypeExpr::named("Company")).unwrap();
        assert_eq!(company.red.as_object().unwrap().get("ceo"), Some(&Value::Null));
        let ceo = company.black.as_object().unwrap().get("ceo").cloned().unwrap();
        let employer = ceo.as_object().unwrap().get("employer").cloned();
        assert_eq!(employer, Some(company.red.clone()));
        assert!(cache.in_progress().is_empty());
    }

    /// `T0..Tn`, each with an id and an optional link to every other type
    fn linked_registry(n: usize) -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for i in 0..n {
            let mut builder = TypeDef::record(format!("T{}", i)).field("id", TypeExpr::int());
            for j in (0..n).filter(|j| *j != i) {
                builder = builder.field(
                    format!("r{}", j),
                    TypeExpr::option(TypeExpr::named(format!("T{}", j))),
                );
            }
            registry
                .register(builder.equality(Structural::exact()).build())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_fully_linked_types_generate_promptly() {
        let registry = linked_registry(6);
        let mut cache = ValueCache::new();
        let started = std::time::Instant::now();
        for i in 0..6 {
            let pair =
                get_or_generate(&registry, &mut cache, &TypeExpr::named(format!("T{}", i))).unwrap();
            assert_ne!(pair.red, pair.black);
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(cache.in_progress().is_empty());
        assert_eq!(cache.provisional_len(), 0);
    }

    #[test]
    fn test_provisional_pair_reused_within_open_frame() {
        let registry = linked_registry(3);
        let mut cache = ValueCache::new();
        let pair = get_or_generate(&registry, &mut cache, &TypeExpr::named("T0")).unwrap();
        let red = pair.red.as_object().unwrap();
        let black = pair.black.as_object().unwrap();
        // T2 was built once inside T1's frame and reused for T0's own r2
        let via_t1 = red.get("r1").and_then(Value::as_object).and_then(|t1| t1.get("r2"));
        assert_eq!(via_t1, red.get("r2"));
        // the black pass sees T0's red instance behind the back edges
        let back = black.get("r1").and_then(Value::as_object).and_then(|t1| t1.get("r0"));
        assert_eq!(back, Some(&pair.red));
    }

    #[test]
    fn test_unbreakable_cycle_fails_and_releases_guard() {
        let registry = TypeRegistry::new()
            .with(
                TypeDef::record("Loop")
                    .field("next", TypeExpr::named("Loop"))
                    .build(),
            )
            .unwrap();
        let mut cache = ValueCache::new();
        let ty = TypeExpr::named("Loop");
        let err = get_or_generate(&registry, &mut cache, &ty).unwrap_err();
        match &err {
            Error::UnresolvableCycle { type_name, path } => {
                assert_eq!(type_name, "Loop");
                assert_eq!(path, &vec!["Loop".to_string(), "Loop".to_string()]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert!(!cache.is_in_progress(&ty));
        // unrelated requests still work and the same request fails the same way
        assert!(get_or_generate(&registry, &mut cache, &TypeExpr::int()).is_ok());
        assert_eq!(get_or_generate(&registry, &mut cache, &ty).unwrap_err(), err);
    }

    #[test]
    fn test_generic_record_resolves_arguments() {
        let registry = TypeRegistry::new()
            .with(
                TypeDef::record("Boxed")
                    .type_params(["T"])
                    .field("item", TypeExpr::param("T"))
                    .equality(Structural::exact())
                    .build(),
            )
            .unwrap();
        let mut cache = ValueCache::new();
        let ty = TypeExpr::generic("Boxed", vec![TypeExpr::bool()]);
        let pair = get_or_generate(&registry, &mut cache, &ty).unwrap();
        assert_eq!(pair.red.as_object().unwrap().get("item"), Some(&Value::Bool(true)));
        assert_eq!(pair.black.as_object().unwrap().get("item"), Some(&Value::Bool(false)));

        // unbound parameter falls back to opaque tokens
        let raw = get_or_generate(&registry, &mut cache, &TypeExpr::named("Boxed")).unwrap();
        assert!(matches!(raw.red.as_object().unwrap().get("item"), Some(Value::Token(_))));
    }

    #[test]
    fn test_interface_tokens_are_identity_distinct() {
        let registry = TypeRegistry::new().with(TypeDef::interface("Shape")).unwrap();
        let pair = get_or_generate(&registry, &mut ValueCache::new(), &TypeExpr::named("Shape")).unwrap();
        assert_eq!(pair.red.equals(&pair.black), Ok(false));
        assert_eq!(pair.red.equals(&pair.red), Ok(true));
    }

    #[test]
    fn test_stateless_record_is_indistinguishable() {
        let registry = TypeRegistry::new()
            .with(TypeDef::record("Marker").equality(Structural::exact()).build())
            .unwrap();
        let err = get_or_generate(&registry, &mut ValueCache::new(), &TypeExpr::named("Marker"))
            .unwrap_err();
        assert!(matches!(err, Error::Synthesis { .. }));
    }

    #[test]
    fn test_opaque_member_type_needs_override() {
        let registry = TypeRegistry::new().with(TypeDef::opaque("Socket")).unwrap();
        let err = get_or_generate(&registry, &mut ValueCache::new(), &TypeExpr::named("Socket"))
            .unwrap_err();
        assert!(matches!(err, Error::Introspection { .. }));
    }
}
