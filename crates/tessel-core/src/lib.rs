//! # tessel-core: Foundational Types for tessel
//!
//! This crate defines the vocabulary shared by every tessel component:
//! schema descriptors, the constraint mini-language, path-qualified
//! validation errors, and per-call runtime options. It depends on nothing
//! internal; `tessel-schema` builds the compiler and both execution
//! backends on top of it.
//!
//! ## Key Design Principles
//!
//! 1. **Descriptors are explicit data.** A [`Schema`] is a tagged enum plus
//!    an optional constraint string, loadable from JSON or YAML.
//!
//! 2. **Constraint strings are parsed once.** [`constraint::parse`] is a
//!    recursive-descent parser producing an immutable AST; malformed input
//!    is a compile-time [`SchemaDefinitionError`], never a validate-time
//!    surprise.
//!
//! 3. **Errors are never empty.** A [`ValidationError`] can only be built
//!    from at least one [`Violation`].
//!
//! 4. **Options are call-scoped.** [`ApplyOptions`] lives for one `apply`
//!    call; validators never hold mutable state.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tessel-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod constraint;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod options;
pub mod path;

// Re-export primary types for ergonomic imports.
pub use constraint::{Condition, ConstraintMap, ConstraintNode, ConstraintValue, ParsedConstraints};
pub use descriptor::{Field, Schema, SchemaKind};
pub use digest::{DigestTree, SchemaDigest};
pub use error::{ErrorKind, SchemaDefinitionError, ValidationError, Violation};
pub use options::{ApplyOptions, Partial, Scope};
