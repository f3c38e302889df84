//! Run configuration
//!
//! A resolved configuration, as handed over by whatever builds it (a fluent
//! builder, a test harness, a JSON file). Everything except value overrides
//! loads from JSON:
//!
//! ```json
//! {
//!   "suppressed_checkers": ["inheritance-safety"],
//!   "excluded_members": ["cache"],
//!   "versioned_entity": true
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cache::Pair;
use crate::checkers::CheckerId;
use crate::error::{Error, Result};
use crate::types::TypeExpr;
use crate::value::Value;

/// Options of one verification run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Checkers not to run
    pub suppressed_checkers: BTreeSet<CheckerId>,
    /// Caller-supplied red/black pairs, by declared type
    #[serde(skip)]
    pub member_value_overrides: BTreeMap<TypeExpr, Pair>,
    /// Members equality deliberately ignores
    pub excluded_members: BTreeSet<String>,
    /// Skip the subtype check for open types
    pub relaxed_inheritance: bool,
    /// Tolerate instances unequal to their identical copies
    pub versioned_entity: bool,
    /// Require instances to be unequal to their identical copies
    pub identical_copy: bool,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from JSON and validate.
    ///
    /// # Errors
    /// `Config` for malformed JSON, unknown keys or checker ids, or
    /// contradictory options.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Configuration =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn suppress(mut self, checker: CheckerId) -> Self {
        self.suppressed_checkers.insert(checker);
        self
    }

    pub fn exclude(mut self, member: impl Into<String>) -> Self {
        self.excluded_members.insert(member.into());
        self
    }

    /// Use `red`/`black` for every member declared as `ty`
    pub fn with_override(mut self, ty: TypeExpr, red: Value, black: Value) -> Self {
        self.member_value_overrides.insert(ty, Pair::new(red, black));
        self
    }

    pub fn with_relaxed_inheritance(mut self) -> Self {
        self.relaxed_inheritance = true;
        self
    }

    pub fn with_versioned_entity(mut self) -> Self {
        self.versioned_entity = true;
        self
    }

    pub fn with_identical_copy(mut self) -> Self {
        self.identical_copy = true;
        self
    }

    pub fn is_suppressed(&self, checker: CheckerId) -> bool {
        self.suppressed_checkers.contains(&checker)
    }

    /// Checkers to run, in run order
    pub fn active_checkers(&self) -> Vec<CheckerId> {
        CheckerId::ALL
            .into_iter()
            .filter(|c| !self.is_suppressed(*c))
            .collect()
    }

    /// Reject contradictory options.
    ///
    /// Override pairs are validated when the run's value cache is built.
    pub fn validate(&self) -> Result<()> {
        if self.identical_copy && self.versioned_entity {
            return Err(Error::Config(
                "identical_copy and versioned_entity are mutually exclusive".into(),
            ));
        }
        if let Some(empty) = self.excluded_members.iter().find(|m| m.is_empty()) {
            return Err(Error::Config(format!("excluded member name {:?} is empty", empty)));
        }
        Ok(())
    }
}
