//! Checker suite — one contract clause per checker
//!
//! Checkers are a closed, ordered set named by [`CheckerId`]. Each one is a
//! pure function of a [`CheckContext`]: it synthesizes its own instances,
//! probes the type's equality/hash/render behavior and answers with a
//! [`CheckResult`]. Warning-level observations go to a shared list of
//! [`Note`]s and never fail a run.
//!
//! # Two channels
//!
//! Inside a checker, `?` short-circuits on either an engine [`Error`] (the
//! run aborts) or a [`Failure`] (the contract is disproved). [`Stop`] carries
//! both until [`CheckerId::run`] separates them again.

mod basic;
mod fields;
mod hash;
mod hierarchy;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::synth::{Instance, Synthesizer};
use crate::value::{Outcome, Raised, Token, Value};

// ── Checker identity ──────────────────────────────────────

/// A named, individually suppressible contract check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckerId {
    NonNullity,
    TypeDiscrimination,
    Reflexivity,
    Symmetry,
    Transitivity,
    HashCoherence,
    SignificantFields,
    Mutability,
    Transience,
    NullFields,
    ReferenceEquality,
    StringRepresentation,
    InheritanceSafety,
}

type CheckFn = fn(&CheckContext<'_>, &mut Vec<Note>) -> Step;

impl CheckerId {
    /// Every checker, in run order
    pub const ALL: [CheckerId; 13] = [
        CheckerId::NonNullity,
        CheckerId::TypeDiscrimination,
        CheckerId::Reflexivity,
        CheckerId::Symmetry,
        CheckerId::Transitivity,
        CheckerId::HashCoherence,
        CheckerId::SignificantFields,
        CheckerId::Mutability,
        CheckerId::Transience,
        CheckerId::NullFields,
        CheckerId::ReferenceEquality,
        CheckerId::StringRepresentation,
        CheckerId::InheritanceSafety,
    ];

    /// Stable kebab-case id, as used in configuration
    pub fn name(self) -> &'static str {
        match self {
            CheckerId::NonNullity => "non-nullity",
            CheckerId::TypeDiscrimination => "type-discrimination",
            CheckerId::Reflexivity => "reflexivity",
            CheckerId::Symmetry => "symmetry",
            CheckerId::Transitivity => "transitivity",
            CheckerId::HashCoherence => "hash-coherence",
            CheckerId::SignificantFields => "significant-fields",
            CheckerId::Mutability => "mutability",
            CheckerId::Transience => "transience",
            CheckerId::NullFields => "null-fields",
            CheckerId::ReferenceEquality => "reference-equality",
            CheckerId::StringRepresentation => "string-representation",
            CheckerId::InheritanceSafety => "inheritance-safety",
        }
    }

    /// Prefix of every failure message this checker produces
    pub fn title(self) -> &'static str {
        match self {
            CheckerId::NonNullity => "Non-nullity",
            CheckerId::TypeDiscrimination => "Type-check",
            CheckerId::Reflexivity => "Reflexivity",
            CheckerId::Symmetry => "Symmetry",
            CheckerId::Transitivity => "Transitivity",
            CheckerId::HashCoherence => "Hash coherence",
            CheckerId::SignificantFields => "Significant fields",
            CheckerId::Mutability => "Mutability",
            CheckerId::Transience => "Transient field",
            CheckerId::NullFields => "Null fields",
            CheckerId::ReferenceEquality => "Reference equality",
            CheckerId::StringRepresentation => "toString",
            CheckerId::InheritanceSafety => "Subclass",
        }
    }

    fn check_fn(self) -> CheckFn {
        match self {
            CheckerId::NonNullity => basic::non_nullity,
            CheckerId::TypeDiscrimination => basic::type_discrimination,
            CheckerId::Reflexivity => basic::reflexivity,
            CheckerId::Symmetry => basic::symmetry,
            CheckerId::Transitivity => basic::transitivity,
            CheckerId::HashCoherence => hash::hash_coherence,
            CheckerId::SignificantFields => fields::significant_fields,
            CheckerId::Mutability => fields::mutability,
            CheckerId::Transience => fields::transience,
            CheckerId::NullFields => fields::null_fields,
            CheckerId::ReferenceEquality => fields::reference_equality,
            CheckerId::StringRepresentation => hierarchy::string_representation,
            CheckerId::InheritanceSafety => hierarchy::inheritance_safety,
        }
    }

    /// Run this checker.
    ///
    /// # Errors
    /// Engine errors only; a disproved contract is `Ok(CheckResult::Fail)`.
    pub fn run(self, ctx: &CheckContext<'_>, notes: &mut Vec<Note>) -> Result<CheckResult> {
        match (self.check_fn())(ctx, notes) {
            Ok(()) => Ok(CheckResult::Pass),
            Err(Stop::Failed(failure)) => Ok(CheckResult::Fail(failure)),
            Err(Stop::Engine(err)) => Err(err),
        }
    }
}

impl fmt::Display for CheckerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Results ───────────────────────────────────────────────

/// Category of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A contract clause returned the wrong answer
    ContractViolation,
    /// `equals(null)` raised instead of returning false
    NullRejection,
    /// `equals(unrelated)` raised instead of returning false
    TypeMismatchRejection,
}

/// A disproved contract clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub checker: CheckerId,
    pub kind: FailureKind,
    pub member: Option<String>,
    pub message: String,
    /// The error the type under test raised, when that is the violation
    pub underlying: Option<Raised>,
}

impl Failure {
    pub fn violation(checker: CheckerId, detail: impl fmt::Display) -> Self {
        Failure {
            checker,
            kind: FailureKind::ContractViolation,
            member: None,
            message: format!("{}: {}", checker.title(), detail),
            underlying: None,
        }
    }

    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn on_member(mut self, member: Option<&str>) -> Self {
        self.member = member.map(str::to_string);
        self
    }

    pub fn caused_by(mut self, raised: Raised) -> Self {
        self.underlying = Some(raised);
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "[{}] {} (member '{}')", self.checker, self.message, member),
            None => write!(f, "[{}] {}", self.checker, self.message),
        }
    }
}

/// Warning-level observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub checker: CheckerId,
    pub member: Option<String>,
    pub message: String,
}

/// Outcome of one checker
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    Pass,
    Fail(Failure),
}

impl CheckResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckResult::Pass)
    }
}

// ── Context ───────────────────────────────────────────────

/// Everything a checker may read; nothing in it is mutated by checkers
pub struct CheckContext<'a> {
    pub descriptor: &'a TypeDescriptor,
    pub synth: &'a Synthesizer,
    pub config: &'a Configuration,
    /// A value of a type unrelated to every registered type
    pub unrelated: Value,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        descriptor: &'a TypeDescriptor,
        synth: &'a Synthesizer,
        config: &'a Configuration,
    ) -> Self {
        CheckContext {
            descriptor,
            synth,
            config,
            unrelated: Value::Token(Token::new("eqv::Unrelated", 0)),
        }
    }

    /// Names of the members checkers may vary
    pub(crate) fn candidates(&self) -> Vec<&'a str> {
        self.descriptor.candidates().map(|m| m.name.as_str()).collect()
    }

    /// The all-red and the all-black instance, freshly synthesized
    pub(crate) fn bases(&self) -> [Instance; 2] {
        use crate::cache::Side;
        [
            self.synth.synthesize_side(Side::Red),
            self.synth.synthesize_side(Side::Black),
        ]
    }
}

// ── Checker plumbing ──────────────────────────────────────

/// Why a checker stopped early
#[derive(Debug)]
pub(crate) enum Stop {
    Engine(Error),
    Failed(Failure),
}

impl From<Error> for Stop {
    fn from(err: Error) -> Self {
        Stop::Engine(err)
    }
}

impl From<Failure> for Stop {
    fn from(failure: Failure) -> Self {
        Stop::Failed(failure)
    }
}

pub(crate) type Step<T = ()> = std::result::Result<T, Stop>;

/// Calls into the type under test on behalf of one checker.
///
/// A raise where a plain answer was expected is itself a violation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Probe {
    checker: CheckerId,
}

impl Probe {
    pub(crate) fn new(checker: CheckerId) -> Self {
        Probe { checker }
    }

    pub(crate) fn fail(&self, member: Option<&str>, detail: impl fmt::Display) -> Stop {
        Stop::Failed(Failure::violation(self.checker, detail).on_member(member))
    }

    fn observe<T>(&self, outcome: Outcome<T>, member: Option<&str>, op: &str) -> Step<T> {
        outcome.map_err(|raised| {
            let detail = format!("{} throws {}", op, raised);
            Stop::Failed(
                Failure::violation(self.checker, detail)
                    .on_member(member)
                    .caused_by(raised),
            )
        })
    }

    /// `a.equals(b)`
    pub(crate) fn equals(&self, a: &Instance, b: &Instance) -> Step<bool> {
        self.observe(a.equals(b), a.twin_member(b), "equals")
    }

    /// `a.equals(value)` for a value that is not a synthesized instance
    pub(crate) fn equals_value(&self, a: &Instance, value: &Value, member: Option<&str>) -> Step<bool> {
        self.observe(a.object().equals(value), member, "equals")
    }

    pub(crate) fn hash(&self, a: &Instance, member: Option<&str>) -> Step<i64> {
        self.observe(a.object().hash_code(), member, "hashCode")
    }

    pub(crate) fn render(&self, a: &Instance, member: Option<&str>) -> Step<String> {
        self.observe(a.object().render(), member, "toString")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checker_ids_round_trip_kebab_case() {
        for id in CheckerId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.name()));
            let back: CheckerId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }
    }

    #[test]
    fn test_run_order_starts_with_null_and_type_checks() {
        assert_eq!(CheckerId::ALL[0], CheckerId::NonNullity);
        assert_eq!(CheckerId::ALL[1], CheckerId::TypeDiscrimination);
        assert_eq!(CheckerId::ALL[12], CheckerId::InheritanceSafety);
        let mut sorted = CheckerId::ALL;
        sorted.sort();
        assert_eq!(sorted, CheckerId::ALL);
    }

    #[test]
    fn test_failure_message_carries_title() {
        let failure = Failure::violation(CheckerId::NonNullity, "true returned for null value");
        assert_eq!(failure.message, "Non-nullity: true returned for null value");
        assert_eq!(failure.kind, FailureKind::ContractViolation);
        assert_eq!(
            failure.on_member(Some("x")).to_string(),
            "[non-nullity] Non-nullity: true returned for null value (member 'x')"
        );
    }

    #[test]
    fn test_failure_serializes_with_underlying() {
        let raised = Raised::illegal_state("boom");
        let failure = Failure::violation(CheckerId::StringRepresentation, "toString throws")
            .caused_by(raised);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["checker"], "string-representation");
        assert_eq!(json["kind"], "contract_violation");
        assert_eq!(json["underlying"]["message"], "boom");
    }
}
