//! # tessel-schema: Compiler and Execution Backends
//!
//! Compiles [`tessel_core::Schema`] descriptors into validators and runs
//! them against `serde_json::Value` data.
//!
//! ## Modules
//!
//! - [`compiler`]: [`SchemaCompiler`], a memoizing descriptor-to-tree
//!   compiler.
//! - [`validator`]: the compiled [`Validator`] tree and its interpreted
//!   execution.
//! - [`codegen`]: [`CodegenCompiler`], which lowers a tree into closures
//!   with the same observable behavior.
//! - [`rules`]: the check primitives both backends share.
//! - [`export`]: JSON Schema rendering of a compiled tree.
//! - [`registry`]: name-to-schema lookup.
//!
//! ## Usage
//!
//! ```
//! use serde_json::json;
//! use tessel_core::{ApplyOptions, Field, Schema};
//! use tessel_schema::SchemaCompiler;
//!
//! let schema = Schema::record(vec![
//!     Field::required("age", Schema::integer().constrained("min=18; max=120")),
//! ]);
//! let validator = SchemaCompiler::new().compile(&schema).unwrap();
//! let err = validator
//!     .apply(&json!({"age": 17}), &ApplyOptions::default())
//!     .unwrap_err();
//! assert!(err.at_path("age").is_some());
//! ```
//!
//! ## Crate Policy
//!
//! - Validators and lowered procedures are immutable and `Send + Sync`.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod codegen;
pub mod compiler;
pub mod export;
pub mod registry;
pub mod rules;
pub mod validator;

use std::sync::Arc;

use tessel_core::{Schema, SchemaDefinitionError};

pub use codegen::{CodegenCompiler, CompiledProcedure};
pub use compiler::{CompilerConfig, SchemaCompiler, RECOGNIZED_KEYS};
pub use export::to_json_schema;
pub use registry::{Registry, RegistryError};
pub use validator::{Metadata, UnionMode, Validator};

/// Compile `schema` with a fresh compiler.
///
/// Nothing is shared with other calls; use a [`SchemaCompiler`] to reuse
/// validators across descriptors.
///
/// # Errors
///
/// See [`SchemaCompiler::compile`].
pub fn compile(schema: &Schema) -> Result<Arc<Validator>, SchemaDefinitionError> {
    SchemaCompiler::new().compile(schema)
}
