//! EQV Core - equality, hash and string-representation contract verification
//!
//! Given a type's metadata, the engine manufactures instances of it without
//! running its construction logic, then probes the type's own `equals`,
//! `hash_code` and `render` operations for the clauses of the equality
//! contract.
//!
//! # Architecture
//!
//! ```text
//! TypeRegistry → describe → TypeDescriptor
//!                               ↓
//!              generator ⇄ ValueCache (red/black pairs, cycle guard)
//!                               ↓
//!                          Synthesizer → Instances, mutation twins
//!                               ↓
//!                          Checker suite (fixed order, fail-fast)
//!                               ↓
//!                          VerificationResult
//! ```
//!
//! # Guarantees
//!
//! - **Repeatable**: the same registry and configuration give the same result
//! - **Isolated**: each run owns its cache; registries may be shared across threads
//! - **Two channels**: engine errors are `Err`, disproved contracts are verdicts
//!
//! # Example
//!
//! ```
//! use eqv_core::{verify, Configuration, Structural, TypeDef, TypeExpr, TypeRegistry};
//!
//! let registry = TypeRegistry::new()
//!     .with(
//!         TypeDef::record("Point")
//!             .field("x", TypeExpr::int())
//!             .field("y", TypeExpr::int())
//!             .equality(Structural::exact())
//!             .build(),
//!     )
//!     .unwrap();
//! let result = verify(&registry, &TypeExpr::named("Point"), &Configuration::new()).unwrap();
//! assert!(result.is_success());
//! ```

pub mod behavior;
pub mod cache;
pub mod checkers;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod generator;
pub mod native;
pub mod registry;
pub mod synth;
pub mod types;
pub mod value;
pub mod verifier;

pub use behavior::{Behavior, Identity, Structural, TypeCheck};
pub use cache::{Pair, Side, ValueCache};
pub use checkers::{CheckResult, CheckerId, Failure, FailureKind, Note};
pub use config::Configuration;
pub use descriptor::{describe, MemberDescriptor, TypeDescriptor};
pub use error::{Error, Result};
pub use native::{member, register, verify_native, Field, Members, NativeBehavior, Reflect};
pub use registry::{MemberDef, TypeDef, TypeKind, TypeRegistry};
pub use synth::{Assignment, Instance, Synthesizer};
pub use types::{ScalarKind, TypeExpr, TypeId};
pub use value::{Object, Outcome, Raised, RaisedKind, Token, Value};
pub use verifier::{verify, Verdict, VerificationResult};
