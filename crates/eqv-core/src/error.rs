//! Error types for the verification engine
//!
//! All fallible engine operations return `Result<T, Error>`. These are
//! failures of the *engine*: a type that cannot be introspected, a member
//! whose values cannot be generated, an instance that cannot be built.
//! Contract violations found in the type under test are not errors; they are
//! reported through [`crate::checkers::CheckResult`].

use thiserror::Error;

/// Engine error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Type metadata unavailable or malformed
    #[error("cannot introspect {type_name}: {reason}")]
    Introspection { type_name: String, reason: String },

    /// Enumeration with fewer than two variants and no override
    #[error(
        "enumeration {type_name} has {found} variant(s); two distinct values are needed, \
         register an override for it"
    )]
    InsufficientVariants { type_name: String, found: usize },

    /// Self-reference that no nullable or container edge breaks
    #[error("unresolvable cycle through {type_name} (path: {}); register an override for one of these types", .path.join(" -> "))]
    UnresolvableCycle {
        type_name: String,
        path: Vec<String>,
    },

    /// Instance cannot be built
    #[error("cannot synthesize {type_name}: {reason}")]
    Synthesis { type_name: String, reason: String },

    /// Caller-supplied red/black pair is unusable
    #[error("invalid override for {type_name}: {reason}")]
    InvalidOverride { type_name: String, reason: String },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure while resolving values for one member of the type under test
    #[error("member '{member}': {source}")]
    Member {
        member: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn introspection(type_name: impl ToString, reason: impl Into<String>) -> Self {
        Error::Introspection {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn synthesis(type_name: impl ToString, reason: impl Into<String>) -> Self {
        Error::Synthesis {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the member whose value resolution failed
    pub(crate) fn in_member(self, member: &str) -> Self {
        Error::Member {
            member: member.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping member context
    pub fn root(&self) -> &Error {
        match self {
            Error::Member { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_context_wraps_and_unwraps() {
        let err = Error::InsufficientVariants {
            type_name: "Unit".into(),
            found: 1,
        }
        .in_member("kind");
        assert!(err.to_string().starts_with("member 'kind': enumeration Unit"));
        assert!(matches!(err.root(), Error::InsufficientVariants { found: 1, .. }));
    }

    #[test]
    fn test_cycle_message_names_path() {
        let err = Error::UnresolvableCycle {
            type_name: "A".into(),
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert!(err.to_string().contains("A -> B -> A"));
    }
}
