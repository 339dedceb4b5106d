//! # Named Schema Registry
//!
//! Maps names to compiled procedures so callers can validate against a
//! schema by name. All registered schemas share one [`CodegenCompiler`],
//! so common sub-descriptors are compiled and lowered once.

use std::collections::BTreeMap;

use serde_json::Value;
use tessel_core::{ApplyOptions, Schema, SchemaDefinitionError, ValidationError};
use thiserror::Error;

use crate::codegen::{CodegenCompiler, CompiledProcedure};
use crate::compiler::CompilerConfig;
use crate::export;

/// Error from a by-name registry operation.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No schema is registered under the name.
    #[error("schema not found: {name}")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// The schema could not be compiled.
    #[error("schema '{name}' is invalid: {source}")]
    Definition {
        /// Schema name.
        name: String,
        /// The compile error.
        #[source]
        source: SchemaDefinitionError,
    },

    /// The registered schema rejected the data.
    #[error("validation against '{name}' failed: {source}")]
    Validation {
        /// Schema name.
        name: String,
        /// The violations.
        #[source]
        source: ValidationError,
    },
}

/// Named collection of compiled schemas.
#[derive(Debug, Default)]
pub struct Registry {
    compiler: CodegenCompiler,
    schemas: BTreeMap<String, CompiledProcedure>,
}

impl Registry {
    /// An empty registry with default compiler limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry whose compiler uses the given limits.
    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            compiler: CodegenCompiler::with_config(config),
            schemas: BTreeMap::new(),
        }
    }

    /// Compile `schema` and register it under `name`, replacing any
    /// previous registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Definition`] if the schema does not
    /// compile; the registry is unchanged in that case.
    pub fn register(&mut self, name: impl Into<String>, schema: &Schema) -> Result<(), RegistryError> {
        let name = name.into();
        let compiled = match self.compiler.compile(schema) {
            Ok(compiled) => compiled,
            Err(source) => return Err(RegistryError::Definition { name, source }),
        };
        if self.schemas.insert(name.clone(), compiled).is_some() {
            tracing::warn!(schema = %name, "replaced registered schema");
        } else {
            tracing::debug!(schema = %name, "registered schema");
        }
        Ok(())
    }

    /// The procedure registered under `name`.
    pub fn get(&self, name: &str) -> Option<&CompiledProcedure> {
        self.schemas.get(name)
    }

    /// Validate `data` against the schema registered under `name`.
    pub fn validate(&self, name: &str, data: &Value, options: &ApplyOptions) -> Result<Value, RegistryError> {
        let procedure = self.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })?;
        procedure
            .apply(data, options)
            .map_err(|source| RegistryError::Validation {
                name: name.to_string(),
                source,
            })
    }

    /// JSON Schema rendering of the schema registered under `name`.
    pub fn json_schema(&self, name: &str) -> Option<Value> {
        self.get(name).map(|p| export::to_json_schema(p.validator()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
