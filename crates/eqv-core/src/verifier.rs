//! Verification driver — one run over one type
//!
//! # Run
//!
//! 1. **Validate** the configuration
//! 2. **Describe** the type under test (members, chain, exclusions)
//! 3. **Seed** a run-scoped value cache with the caller's overrides
//! 4. **Prepare** the synthesizer; every generation error aborts here
//! 5. **Probe** which members equality and hash actually read
//! 6. **Check** each active checker in order, stopping at the first failure
//!
//! Nothing outlives the run except the registry it read from.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::ValueCache;
use crate::checkers::{CheckContext, CheckResult, CheckerId, Failure, Note};
use crate::config::Configuration;
use crate::descriptor::{describe, TypeDescriptor};
use crate::error::Result;
use crate::registry::TypeRegistry;
use crate::synth::Synthesizer;
use crate::types::TypeExpr;

// ── Verification Result Types ─────────────────────────────

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum Verdict {
    AllPassed,
    FirstFailure(Failure),
}

/// Outcome of verifying one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub type_name: String,
    pub verdict: Verdict,
    /// Warning-level observations, in the order they were made
    pub notes: Vec<Note>,
    /// Checkers that ran, the failing one included
    pub checkers_run: Vec<CheckerId>,
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.verdict, Verdict::AllPassed)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.verdict {
            Verdict::AllPassed => None,
            Verdict::FirstFailure(failure) => Some(failure),
        }
    }

    /// Pretty-printed JSON report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.verdict {
            Verdict::AllPassed => write!(
                f,
                "{}: {} checker(s) passed",
                self.type_name,
                self.checkers_run.len()
            )?,
            Verdict::FirstFailure(failure) => write!(f, "{}: {}", self.type_name, failure)?,
        }
        for note in &self.notes {
            write!(f, "\n  note [{}]: {}", note.checker, note.message)?;
        }
        Ok(())
    }
}

// ── Public API ────────────────────────────────────────────

/// Verify the equality contract of `target`.
///
/// # Errors
/// Engine errors (introspection, generation, synthesis, configuration).
/// A disproved contract is a successful call whose verdict is
/// [`Verdict::FirstFailure`].
pub fn verify(
    registry: &TypeRegistry,
    target: &TypeExpr,
    config: &Configuration,
) -> Result<VerificationResult> {
    config.validate()?;
    tracing::info!(target = %target, "verifying equality contract");

    let descriptor = describe(registry, target, &config.excluded_members)?;
    let mut cache = ValueCache::with_overrides(config.member_value_overrides.iter())?;
    let synth = Synthesizer::prepare(registry, &descriptor, &mut cache)?;
    let descriptor = descriptor.with_significance(&probe_significance(&descriptor, &synth)?);

    let ctx = CheckContext::new(&descriptor, &synth, config);
    let mut notes = Vec::new();
    let mut checkers_run = Vec::new();

    for checker in config.active_checkers() {
        tracing::debug!(checker = %checker, "running checker");
        checkers_run.push(checker);
        if let CheckResult::Fail(failure) = checker.run(&ctx, &mut notes)? {
            tracing::info!(
                target = %target,
                checker = %checker,
                member = failure.member.as_deref().unwrap_or("-"),
                "contract violation: {}",
                failure.message
            );
            return Ok(VerificationResult {
                type_name: target.to_string(),
                verdict: Verdict::FirstFailure(failure),
                notes,
                checkers_run,
            });
        }
    }

    tracing::info!(
        target = %target,
        checkers = checkers_run.len(),
        notes = notes.len(),
        "all checkers passed"
    );
    Ok(VerificationResult {
        type_name: target.to_string(),
        verdict: Verdict::AllPassed,
        notes,
        checkers_run,
    })
}

/// A member is significant when toggling it, against the red or the black
/// instance, changes the equality outcome or the hash code.
///
/// A raise while probing counts as reading the member.
pub(crate) fn probe_significance(
    descriptor: &TypeDescriptor,
    synth: &Synthesizer,
) -> Result<BTreeMap<String, bool>> {
    use crate::cache::Side;

    let bases = [synth.synthesize_side(Side::Red), synth.synthesize_side(Side::Black)];
    let mut significance = BTreeMap::new();
    for member in &descriptor.members {
        let mut read = false;
        for base in &bases {
            let twin = synth.toggle(base, &member.name)?;
            let equality_changed = base.equals(&twin).map_or(true, |equal| !equal);
            let hash_changed = match (base.object().hash_code(), twin.object().hash_code()) {
                (Ok(a), Ok(b)) => a != b,
                _ => true,
            };
            read |= equality_changed || hash_changed;
        }
        tracing::debug!(member = %member.name, significant = read, "probed member");
        significance.insert(member.name.clone(), read);
    }
    Ok(significance)
}
