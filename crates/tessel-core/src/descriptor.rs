//! # Schema Descriptors
//!
//! A [`Schema`] describes the expected shape of a value and optionally
//! carries a constraint string in the language defined by
//! [`crate::constraint`]. Descriptors are plain data: they can be built
//! with the constructors below or loaded from JSON/YAML documents.
//!
//! ## Document form
//!
//! ```yaml
//! type: record
//! constraints: "strict; min_props=2"
//! fields:
//!   - name: age
//!     schema: { type: integer, constraints: "min=18; max=120" }
//!   - name: nickname
//!     required: false
//!     schema: { type: text }
//! ```
//!
//! Descriptor trees are owned values, so a descriptor can never contain
//! itself; structurally identical sub-descriptors are shared by the
//! compiler instead.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaDefinitionError;

/// A schema descriptor: a shape plus an optional constraint string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The structural kind of the described value.
    #[serde(flatten)]
    pub kind: SchemaKind,
    /// Constraint string, e.g. `"min=18; max=120"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
}

/// The structural kinds a descriptor can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaKind {
    /// Integral number. Integral floats such as `3.0` are accepted.
    Integer,
    /// Any finite number.
    Float,
    /// Unicode text.
    Text,
    /// Boolean. Accepted without a type check.
    Boolean,
    /// Any value.
    Any,
    /// Homogeneous sequence.
    Sequence {
        /// Descriptor applied to every element.
        items: Box<Schema>,
    },
    /// Fixed-arity positional tuple.
    Tuple {
        /// One descriptor per position.
        items: Vec<Schema>,
    },
    /// Record with named fields.
    Record {
        /// Declared fields, in declaration order.
        fields: Vec<Field>,
    },
    /// Tagged union of alternatives, tried in declared order.
    Union {
        /// The alternatives.
        alternatives: Vec<Schema>,
    },
    /// Enumeration of fixed values.
    Literal {
        /// The allowed values.
        values: Vec<Value>,
    },
}

impl SchemaKind {
    /// Short name used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Any => "any",
            Self::Sequence { .. } => "sequence",
            Self::Tuple { .. } => "tuple",
            Self::Record { .. } => "record",
            Self::Union { .. } => "union",
            Self::Literal { .. } => "literal",
        }
    }
}

/// A named record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name (the key in the validated mapping).
    pub name: String,
    /// Descriptor of the field value.
    pub schema: Schema,
    /// Whether the field must be present and non-null.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Field {
    /// A field that must be present and non-null.
    pub fn required(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
        }
    }

    /// A field that may be absent or null.
    pub fn optional(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
        }
    }
}

impl Schema {
    /// Direct sub-descriptors, in declaration order.
    pub fn children(&self) -> Vec<&Schema> {
        match &self.kind {
            SchemaKind::Sequence { items } => vec![items.as_ref()],
            SchemaKind::Tuple { items } => items.iter().collect(),
            SchemaKind::Record { fields } => fields.iter().map(|f| &f.schema).collect(),
            SchemaKind::Union { alternatives } => alternatives.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            constraints: None,
        }
    }

    /// Integer scalar.
    pub fn integer() -> Self {
        Self::of(SchemaKind::Integer)
    }

    /// Float scalar.
    pub fn float() -> Self {
        Self::of(SchemaKind::Float)
    }

    /// Text scalar.
    pub fn text() -> Self {
        Self::of(SchemaKind::Text)
    }

    /// Boolean scalar.
    pub fn boolean() -> Self {
        Self::of(SchemaKind::Boolean)
    }

    /// Unconstrained value.
    pub fn any() -> Self {
        Self::of(SchemaKind::Any)
    }

    /// Sequence of `items`.
    pub fn sequence(items: Schema) -> Self {
        Self::of(SchemaKind::Sequence {
            items: Box::new(items),
        })
    }

    /// Tuple with one descriptor per position.
    pub fn tuple(items: Vec<Schema>) -> Self {
        Self::of(SchemaKind::Tuple { items })
    }

    /// Record of named fields.
    pub fn record(fields: Vec<Field>) -> Self {
        Self::of(SchemaKind::Record { fields })
    }

    /// Union of alternatives.
    pub fn union(alternatives: Vec<Schema>) -> Self {
        Self::of(SchemaKind::Union { alternatives })
    }

    /// Literal enumeration.
    pub fn literal(values: Vec<Value>) -> Self {
        Self::of(SchemaKind::Literal { values })
    }

    /// Attach a constraint string, appending to any existing one.
    pub fn constrained(mut self, constraints: &str) -> Self {
        self.constraints = Some(match self.constraints.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}; {constraints}"),
            _ => constraints.to_string(),
        });
        self
    }

    /// Load a descriptor from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaDefinitionError::Load`] if the document is not a
    /// valid descriptor.
    pub fn from_json_str(document: &str) -> Result<Self, SchemaDefinitionError> {
        serde_json::from_str(document).map_err(|e| SchemaDefinitionError::Load {
            source_name: "<json>".to_string(),
            reason: format!("invalid JSON descriptor: {e}"),
        })
    }

    /// Load a descriptor from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaDefinitionError::Load`] if the document is not a
    /// valid descriptor.
    pub fn from_yaml_str(document: &str) -> Result<Self, SchemaDefinitionError> {
        serde_yaml::from_str(document).map_err(|e| SchemaDefinitionError::Load {
            source_name: "<yaml>".to_string(),
            reason: format!("invalid YAML descriptor: {e}"),
        })
    }

    /// Load a descriptor from a file, choosing the format by extension
    /// (`.yaml`/`.yml` for YAML, anything else for JSON).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaDefinitionError::Load`] if the file cannot be read
    /// or does not contain a valid descriptor.
    pub fn from_path(path: &Path) -> Result<Self, SchemaDefinitionError> {
        let source_name = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaDefinitionError::Load {
            source_name: source_name.clone(),
            reason: format!("cannot read file: {e}"),
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parsed = match ext {
            "yaml" | "yml" => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        };
        parsed.map_err(|e| match e {
            SchemaDefinitionError::Load { reason, .. } => SchemaDefinitionError::Load {
                source_name,
                reason,
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builders() {
        let s = Schema::integer().constrained("min=1").constrained("max=5");
        assert_eq!(s.kind, SchemaKind::Integer);
        assert_eq!(s.constraints.as_deref(), Some("min=1; max=5"));
    }

    #[test]
    fn test_json_document() {
        let doc = json!({
            "type": "record",
            "constraints": "strict",
            "fields": [
                {"name": "age", "schema": {"type": "integer", "constraints": "min=18"}},
                {"name": "tags", "required": false,
                 "schema": {"type": "sequence", "items": {"type": "text"}}}
            ]
        });
        let schema = Schema::from_json_str(&doc.to_string()).unwrap();
        let expected = Schema::record(vec![
            Field::required("age", Schema::integer().constrained("min=18")),
            Field::optional("tags", Schema::sequence(Schema::text())),
        ])
        .constrained("strict");
        assert_eq!(schema, expected);
    }

    #[test]
    fn test_yaml_document() {
        let yaml = r#"
type: union
constraints: one_of
alternatives:
  - type: literal
    values: [admin, user]
  - type: tuple
    items:
      - type: integer
      - type: float
"#;
        let schema = Schema::from_yaml_str(yaml).unwrap();
        let SchemaKind::Union { alternatives } = &schema.kind else {
            panic!("expected union, got {:?}", schema.kind);
        };
        assert_eq!(alternatives.len(), 2);
        assert_eq!(
            alternatives[0].kind,
            SchemaKind::Literal {
                values: vec![json!("admin"), json!("user")]
            }
        );
        assert_eq!(schema.constraints.as_deref(), Some("one_of"));
    }

    #[test]
    fn test_serialization_round_trips_through_json() {
        let schema = Schema::record(vec![Field::required(
            "point",
            Schema::tuple(vec![Schema::integer(), Schema::integer()]),
        )]);
        let text = serde_json::to_string(&schema).unwrap();
        assert_eq!(Schema::from_json_str(&text).unwrap(), schema);
    }

    #[test]
    fn test_invalid_documents() {
        let err = Schema::from_json_str(r#"{"type": "matrix"}"#).unwrap_err();
        assert!(matches!(err, SchemaDefinitionError::Load { .. }));
        let err = Schema::from_path(Path::new("/nonexistent/schema.yaml")).unwrap_err();
        match err {
            SchemaDefinitionError::Load { source_name, .. } => {
                assert!(source_name.contains("schema.yaml"));
            }
            other => panic!("expected Load, got {other:?}"),
        }
    }
}
