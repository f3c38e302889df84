//! Value cache — red/black pairs per type, for the lifetime of one run
//!
//! Pairs are generated lazily by [`crate::generator`] and reused for the rest
//! of the run, which keeps every synthesized instance repeatable. Overrides
//! supplied by the caller are installed first and always win.
//!
//! The cache also owns the cycle guard: the set of record types whose
//! generation is in progress, and the red placeholder of each once its red
//! instance exists. Pairs built against open guards are kept as provisional
//! entries until every type they depend on has been released, so a cyclic
//! type graph generates each type once per open frame.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::types::TypeExpr;
use crate::value::Value;

/// Two deliberately non-equal sample values of one type
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub red: Value,
    pub black: Value,
}

impl Pair {
    pub fn new(red: Value, black: Value) -> Self {
        Pair { red, black }
    }

    /// The value of `side`
    pub fn side(&self, side: Side) -> &Value {
        match side {
            Side::Red => &self.red,
            Side::Black => &self.black,
        }
    }
}

/// Which value of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Red,
    Black,
}

impl Side {
    pub fn flip(self) -> Side {
        match self {
            Side::Red => Side::Black,
            Side::Black => Side::Red,
        }
    }
}

/// A pair that still depends on in-progress record types
#[derive(Debug, Clone)]
struct Provisional {
    pair: Pair,
    pending: BTreeSet<TypeExpr>,
}

/// Run-scoped registry of red/black pairs
#[derive(Debug, Default)]
pub struct ValueCache {
    overrides: BTreeMap<TypeExpr, Pair>,
    pairs: BTreeMap<TypeExpr, Pair>,
    in_progress: Vec<TypeExpr>,
    placeholders: BTreeMap<TypeExpr, Value>,
    provisional: BTreeMap<TypeExpr, Provisional>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache seeded with caller overrides.
    ///
    /// # Errors
    /// `InvalidOverride` when an override's red and black are the same value,
    /// or when the values' own equality considers them equal.
    pub fn with_overrides<'a, I>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a TypeExpr, &'a Pair)>,
    {
        let mut cache = ValueCache::new();
        for (ty, pair) in overrides {
            if pair.red == pair.black {
                return Err(Error::InvalidOverride {
                    type_name: ty.to_string(),
                    reason: format!("red and black are both {}", pair.red),
                });
            }
            // a raising equals is left for the checkers to report
            if pair.red.equals(&pair.black) == Ok(true) {
                return Err(Error::InvalidOverride {
                    type_name: ty.to_string(),
                    reason: format!("{} and {} are equal to each other", pair.red, pair.black),
                });
            }
            cache.overrides.insert(ty.clone(), pair.clone());
        }
        Ok(cache)
    }

    /// Override or cached pair, in that order
    pub fn lookup(&self, ty: &TypeExpr) -> Option<&Pair> {
        self.overrides.get(ty).or_else(|| self.pairs.get(ty))
    }

    pub fn is_overridden(&self, ty: &TypeExpr) -> bool {
        self.overrides.contains_key(ty)
    }

    /// Number of generated (non-override) pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub(crate) fn insert(&mut self, ty: TypeExpr, pair: Pair) {
        self.pairs.entry(ty).or_insert(pair);
    }

    // ── cycle guard ──────────────────────────────────────

    pub fn is_in_progress(&self, ty: &TypeExpr) -> bool {
        self.in_progress.contains(ty)
    }

    /// Types currently being generated, outermost first
    pub fn in_progress(&self) -> &[TypeExpr] {
        &self.in_progress
    }

    pub(crate) fn begin(&mut self, ty: &TypeExpr) {
        self.in_progress.push(ty.clone());
    }

    /// Release the guard for `ty`, including its placeholder.
    ///
    /// Provisional pairs none of whose dependencies is still open go with it.
    pub(crate) fn end(&mut self, ty: &TypeExpr) {
        if let Some(pos) = self.in_progress.iter().rposition(|t| t == ty) {
            self.in_progress.remove(pos);
        }
        self.placeholders.remove(ty);
        let open = &self.in_progress;
        self.provisional
            .retain(|_, entry| entry.pending.iter().any(|t| open.contains(t)));
    }

    /// Install the red placeholder of `ty` for its black pass.
    ///
    /// Provisional pairs built against `ty` saw no placeholder and are dropped.
    pub(crate) fn set_placeholder(&mut self, ty: &TypeExpr, red: Value) {
        self.provisional.retain(|_, entry| !entry.pending.contains(ty));
        self.placeholders.insert(ty.clone(), red);
    }

    pub fn placeholder(&self, ty: &TypeExpr) -> Option<&Value> {
        self.placeholders.get(ty)
    }

    // ── provisional pairs ────────────────────────────────

    /// Provisional pair for `ty`, with the dependencies that are still open
    pub(crate) fn provisional(&self, ty: &TypeExpr) -> Option<(Pair, BTreeSet<TypeExpr>)> {
        let entry = self.provisional.get(ty)?;
        let pending = entry
            .pending
            .iter()
            .filter(|t| self.is_in_progress(t))
            .cloned()
            .collect();
        Some((entry.pair.clone(), pending))
    }

    pub(crate) fn remember(&mut self, ty: TypeExpr, pair: Pair, pending: BTreeSet<TypeExpr>) {
        self.provisional.insert(ty, Provisional { pair, pending });
    }

    /// Number of provisional pairs currently held
    pub fn provisional_len(&self) -> usize {
        self.provisional.len()
    }
}
