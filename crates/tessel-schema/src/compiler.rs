//! # Schema Compiler
//!
//! Turns a [`Schema`] descriptor into an immutable [`Validator`] tree.
//!
//! ## Compilation
//!
//! 1. The descriptor's constraint string is parsed into plain leaves and
//!    wrapper clauses (`!`, `|`, `?`).
//! 2. Every key, including keys nested inside wrappers, is checked against
//!    the recognized vocabulary. Unrecognized keys are rejected; recognized
//!    keys that do not apply to the descriptor's kind are ignored.
//! 3. The leaves configure the base validator of the descriptor's kind.
//! 4. Each wrapper compiles to its own validator: a leaf inside a wrapper
//!    becomes the descriptor's kind constrained by that one key. If any
//!    wrapper exists the result is a composite of base plus wrappers.
//!
//! ## Memoization
//!
//! Each compiler owns a cache keyed by [`SchemaDigest`]. Compiling the same
//! descriptor twice (or two structurally identical descriptors) returns the
//! same `Arc`. The cache lock is held for one whole top-level compile, so
//! concurrent compiles of overlapping descriptors never build a node twice.
//! Digests come from one [`DigestTree`] pass per top-level compile, so each
//! sub-descriptor is hashed once however deep it sits.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessel_core::constraint::{self, ConstraintMap, ConstraintNode, ConstraintValue};
use tessel_core::{Condition, DigestTree, Field, Schema, SchemaDefinitionError, SchemaDigest, SchemaKind};

use crate::rules::{Format, NumberBounds};
use crate::validator::{
    AnyValidator, CompositeValidator, ConditionalRequirement, ConditionalValidator,
    LiteralValidator, Metadata, NotValidator, NumberValidator, OrValidator, RecordField,
    RecordValidator, SequenceValidator, TextValidator, TupleValidator, UnionMode, UnionValidator,
    Validator,
};

/// Every constraint key the compiler understands.
pub const RECOGNIZED_KEYS: &[&str] = &[
    // numbers
    "min",
    "max",
    "exclusive_min",
    "exclusive_max",
    "step",
    "multiple_of",
    // text
    "min_length",
    "min_len",
    "max_length",
    "max_len",
    "pattern",
    "regex",
    "format",
    // sequences
    "min_items",
    "max_items",
    "unique",
    "unique_items",
    "contains",
    // records
    "strict",
    "additional_properties",
    "strip",
    "min_properties",
    "min_props",
    "required",
    // unions
    "one_of",
    // metadata
    "title",
    "description",
    "default",
];

/// Compiler limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Maximum descriptor nesting depth.
    pub max_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Descriptor-to-validator compiler with a per-instance memo cache.
#[derive(Debug, Default)]
pub struct SchemaCompiler {
    config: CompilerConfig,
    cache: Mutex<HashMap<SchemaDigest, Arc<Validator>>>,
}

impl SchemaCompiler {
    /// A compiler with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// A compiler with the given limits.
    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The active limits.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `schema`, reusing cached nodes for every structurally
    /// identical sub-descriptor compiled before.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaDefinitionError`] for malformed constraint strings,
    /// unknown keys, invalid values or patterns, and descriptors nested
    /// deeper than [`CompilerConfig::max_depth`].
    pub fn compile(&self, schema: &Schema) -> Result<Arc<Validator>, SchemaDefinitionError> {
        let mut cache = self.cache.lock();
        let mut build = Build {
            cache: &mut cache,
            max_depth: self.config.max_depth,
        };
        build.compile_detached(schema, 0)
    }

    /// Number of distinct descriptors compiled so far.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }
}

struct Build<'a> {
    cache: &'a mut HashMap<SchemaDigest, Arc<Validator>>,
    max_depth: usize,
}

impl Build<'_> {
    /// Compile a descriptor that is not part of an already digested tree.
    fn compile_detached(&mut self, schema: &Schema, depth: usize) -> Result<Arc<Validator>, SchemaDefinitionError> {
        let exceeded = SchemaDefinitionError::DepthExceeded {
            max_depth: self.max_depth,
        };
        let budget = self.max_depth.checked_sub(depth).ok_or_else(|| exceeded.clone())?;
        let tree = DigestTree::build(schema, budget).map_err(|_| exceeded)?;
        self.compile(schema, &tree, depth)
    }

    fn compile(
        &mut self,
        schema: &Schema,
        tree: &DigestTree,
        depth: usize,
    ) -> Result<Arc<Validator>, SchemaDefinitionError> {
        let digest = tree.digest;
        if let Some(cached) = self.cache.get(&digest) {
            tracing::trace!(digest = %digest.short(), kind = schema.kind.name(), "validator cache hit");
            return Ok(Arc::clone(cached));
        }

        let validator = Arc::new(self.build(schema, &tree.children, depth)?);
        tracing::debug!(
            digest = %digest.short(),
            kind = schema.kind.name(),
            node = validator.kind_name(),
            "compiled descriptor"
        );
        self.cache.insert(digest, Arc::clone(&validator));
        Ok(validator)
    }

    fn build(
        &mut self,
        schema: &Schema,
        children: &[DigestTree],
        depth: usize,
    ) -> Result<Validator, SchemaDefinitionError> {
        let (leaves, wrappers) = parse_constraints(schema)?;
        let base = self.base(&schema.kind, &leaves, children, depth)?;

        let wrappers = wrappers
            .iter()
            .filter(|node| conditional_requirement(node).is_none())
            .map(|node| self.wrapper(&schema.kind, node, children, depth))
            .collect::<Result<Vec<_>, _>>()?;
        if wrappers.is_empty() {
            return Ok(base);
        }
        Ok(Validator::Composite(CompositeValidator {
            base: Arc::new(base),
            wrappers,
        }))
    }

    fn wrapper(
        &mut self,
        kind: &SchemaKind,
        node: &ConstraintNode,
        children: &[DigestTree],
        depth: usize,
    ) -> Result<Arc<Validator>, SchemaDefinitionError> {
        let validator = match node {
            ConstraintNode::Leaf { key, .. } if key == "required" => Validator::Any(AnyValidator {
                boolean: false,
                meta: Metadata::default(),
            }),
            ConstraintNode::Leaf { key, value } => {
                let mut single = ConstraintMap::new();
                single.insert(key.clone(), value.clone());
                self.base(kind, &single, children, depth)?
            }
            ConstraintNode::Or(alternatives) => Validator::Or(OrValidator {
                alternatives: alternatives
                    .iter()
                    .map(|alt| self.wrapper(kind, alt, children, depth))
                    .collect::<Result<_, _>>()?,
            }),
            ConstraintNode::Not(inner) => Validator::Not(NotValidator {
                inner: self.wrapper(kind, inner, children, depth)?,
            }),
            ConstraintNode::Conditional { condition, then } => {
                Validator::Conditional(ConditionalValidator {
                    condition: condition.clone(),
                    then: self.wrapper(kind, then, children, depth)?,
                })
            }
        };
        Ok(Arc::new(validator))
    }

    fn base(
        &mut self,
        kind: &SchemaKind,
        leaves: &ConstraintMap,
        children: &[DigestTree],
        depth: usize,
    ) -> Result<Validator, SchemaDefinitionError> {
        let meta = metadata(leaves);
        let validator = match kind {
            SchemaKind::Integer | SchemaKind::Float => Validator::Number(NumberValidator {
                integer: matches!(kind, SchemaKind::Integer),
                bounds: number_bounds(leaves)?,
                meta,
            }),
            SchemaKind::Text => Validator::Text(TextValidator {
                min_length: count(leaves, &["min_length", "min_len"])?,
                max_length: count(leaves, &["max_length", "max_len"])?,
                pattern: pattern(leaves)?,
                format: format(leaves)?,
                meta,
            }),
            SchemaKind::Boolean | SchemaKind::Any => Validator::Any(AnyValidator {
                boolean: matches!(kind, SchemaKind::Boolean),
                meta,
            }),
            SchemaKind::Sequence { items } => {
                let contains = match lookup(leaves, &["contains"]) {
                    None => None,
                    Some((_, ConstraintValue::Text(inner))) => {
                        let item_check = Schema {
                            kind: items.kind.clone(),
                            constraints: Some(inner.clone()),
                        };
                        Some(self.compile_detached(&item_check, depth + 1)?)
                    }
                    Some((key, other)) => {
                        return Err(invalid_value(key, other, "expected a quoted constraint string"))
                    }
                };
                Validator::Sequence(SequenceValidator {
                    items: self.compile(items, child(children, 0)?, depth + 1)?,
                    min_items: count(leaves, &["min_items"])?,
                    max_items: count(leaves, &["max_items"])?,
                    unique: flag(leaves, &["unique", "unique_items"])?,
                    contains,
                    meta,
                })
            }
            SchemaKind::Tuple { items } => Validator::Tuple(TupleValidator {
                items: items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.compile(item, child(children, i)?, depth + 1))
                    .collect::<Result<_, _>>()?,
                meta,
            }),
            SchemaKind::Record { fields } => self.record(fields, leaves, meta, children, depth)?,
            SchemaKind::Union { alternatives } => {
                if alternatives.is_empty() {
                    return Err(SchemaDefinitionError::UnsupportedDescriptor(
                        "union must declare at least one alternative".to_string(),
                    ));
                }
                Validator::Union(UnionValidator {
                    alternatives: alternatives
                        .iter()
                        .enumerate()
                        .map(|(i, alt)| self.compile(alt, child(children, i)?, depth + 1))
                        .collect::<Result<_, _>>()?,
                    mode: if flag(leaves, &["one_of"])? {
                        UnionMode::OneOf
                    } else {
                        UnionMode::AnyOf
                    },
                    meta,
                })
            }
            SchemaKind::Literal { values } => Validator::Literal(LiteralValidator {
                values: if values.is_empty() {
                    vec![Value::Null]
                } else {
                    values.clone()
                },
                meta,
            }),
        };
        Ok(validator)
    }

    fn record(
        &mut self,
        fields: &[Field],
        leaves: &ConstraintMap,
        meta: Metadata,
        children: &[DigestTree],
        depth: usize,
    ) -> Result<Validator, SchemaDefinitionError> {
        let mut compiled = Vec::with_capacity(fields.len());
        let mut index = HashMap::with_capacity(fields.len());
        let mut conditional_required = Vec::new();

        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), compiled.len()).is_some() {
                return Err(SchemaDefinitionError::UnsupportedDescriptor(format!(
                    "duplicate record field '{}'",
                    field.name
                )));
            }
            let (forced, conditions) = field_requirements(&field.schema)?;
            let required = field.required || forced;
            conditional_required.extend(conditions.into_iter().map(|condition| {
                ConditionalRequirement {
                    field: field.name.clone(),
                    always_required: required,
                    condition,
                }
            }));
            compiled.push(RecordField {
                name: field.name.clone(),
                validator: self.compile(&field.schema, child(children, i)?, depth + 1)?,
                required,
            });
        }

        let strict = flag(leaves, &["strict"])?
            || matches!(leaves.get("additional_properties"), Some(ConstraintValue::Bool(false)));
        Ok(Validator::Record(RecordValidator {
            fields: compiled,
            index,
            strict,
            strip: flag(leaves, &["strip"])?,
            min_properties: count(leaves, &["min_properties", "min_props"])?,
            conditional_required,
            meta,
        }))
    }
}

fn child(children: &[DigestTree], i: usize) -> Result<&DigestTree, SchemaDefinitionError> {
    children.get(i).ok_or_else(|| {
        SchemaDefinitionError::UnsupportedDescriptor("digest tree does not match descriptor".to_string())
    })
}

/// Parse and key-check a descriptor's constraint string.
fn parse_constraints(schema: &Schema) -> Result<(ConstraintMap, Vec<ConstraintNode>), SchemaDefinitionError> {
    let Some(text) = schema.constraints.as_deref() else {
        return Ok((ConstraintMap::new(), Vec::new()));
    };
    let (leaves, wrappers) = constraint::parse(text)?.split();
    for key in leaves.keys() {
        check_key(key)?;
    }
    for node in &wrappers {
        check_node_keys(node)?;
    }
    Ok((leaves, wrappers))
}

fn check_key(key: &str) -> Result<(), SchemaDefinitionError> {
    if RECOGNIZED_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(SchemaDefinitionError::UnknownConstraint {
            key: key.to_string(),
        })
    }
}

fn check_node_keys(node: &ConstraintNode) -> Result<(), SchemaDefinitionError> {
    match node {
        ConstraintNode::Leaf { key, .. } => check_key(key),
        ConstraintNode::Or(alternatives) => alternatives.iter().try_for_each(check_node_keys),
        ConstraintNode::Not(inner) => check_node_keys(inner),
        ConstraintNode::Conditional { then, .. } => check_node_keys(then),
    }
}

/// `field==literal ? required` at the top level of a constraint string.
fn conditional_requirement(node: &ConstraintNode) -> Option<&Condition> {
    match node {
        ConstraintNode::Conditional { condition, then } => match then.as_leaf() {
            Some(("required", value)) if value.is_true() => Some(condition),
            _ => None,
        },
        _ => None,
    }
}

/// Requiredness declared inside a field's own constraints: a plain
/// `required` leaf and any conditional `required` clauses.
fn field_requirements(schema: &Schema) -> Result<(bool, Vec<Condition>), SchemaDefinitionError> {
    let (leaves, wrappers) = parse_constraints(schema)?;
    let forced = flag(&leaves, &["required"])?;
    let conditions = wrappers
        .iter()
        .filter_map(conditional_requirement)
        .cloned()
        .collect();
    Ok((forced, conditions))
}

// ---------------------------------------------------------------------------
// Value extraction
// ---------------------------------------------------------------------------

/// First present key among `aliases`.
fn lookup<'m>(
    leaves: &'m ConstraintMap,
    aliases: &[&'static str],
) -> Option<(&'static str, &'m ConstraintValue)> {
    aliases
        .iter()
        .find_map(|key| leaves.get(*key).map(|value| (*key, value)))
}

fn invalid_value(key: &str, value: &ConstraintValue, reason: &str) -> SchemaDefinitionError {
    SchemaDefinitionError::InvalidConstraintValue {
        key: key.to_string(),
        value: value.as_text(),
        reason: reason.to_string(),
    }
}

fn number(leaves: &ConstraintMap, aliases: &[&'static str]) -> Result<Option<f64>, SchemaDefinitionError> {
    let Some((key, value)) = lookup(leaves, aliases) else {
        return Ok(None);
    };
    match value {
        ConstraintValue::Text(text) => match text.trim().parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Some(x)),
            _ => Err(invalid_value(key, value, "expected a finite number")),
        },
        ConstraintValue::Bool(_) => Err(invalid_value(key, value, "expected a number")),
    }
}

fn count(leaves: &ConstraintMap, aliases: &[&'static str]) -> Result<Option<usize>, SchemaDefinitionError> {
    let Some((key, value)) = lookup(leaves, aliases) else {
        return Ok(None);
    };
    match value {
        ConstraintValue::Text(text) => text
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid_value(key, value, "expected a non-negative integer")),
        ConstraintValue::Bool(_) => Err(invalid_value(key, value, "expected a non-negative integer")),
    }
}

fn flag(leaves: &ConstraintMap, aliases: &[&'static str]) -> Result<bool, SchemaDefinitionError> {
    match lookup(leaves, aliases) {
        None => Ok(false),
        Some((_, ConstraintValue::Bool(b))) => Ok(*b),
        Some((key, value)) => Err(invalid_value(key, value, "expected true or false")),
    }
}

fn number_bounds(leaves: &ConstraintMap) -> Result<NumberBounds, SchemaDefinitionError> {
    let step = number(leaves, &["step", "multiple_of"])?;
    if step == Some(0.0) {
        if let Some((key, value)) = lookup(leaves, &["step", "multiple_of"]) {
            return Err(invalid_value(key, value, "step must be non-zero"));
        }
    }
    Ok(NumberBounds {
        min: number(leaves, &["min"])?,
        max: number(leaves, &["max"])?,
        exclusive_min: number(leaves, &["exclusive_min"])?,
        exclusive_max: number(leaves, &["exclusive_max"])?,
        step,
    })
}

fn pattern(leaves: &ConstraintMap) -> Result<Option<Regex>, SchemaDefinitionError> {
    let Some((key, value)) = lookup(leaves, &["regex", "pattern"]) else {
        return Ok(None);
    };
    let ConstraintValue::Text(source) = value else {
        return Err(invalid_value(key, value, "expected a regular expression"));
    };
    Regex::new(source)
        .map(Some)
        .map_err(|e| SchemaDefinitionError::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })
}

fn format(leaves: &ConstraintMap) -> Result<Option<Format>, SchemaDefinitionError> {
    let Some((key, value)) = lookup(leaves, &["format"]) else {
        return Ok(None);
    };
    match value {
        ConstraintValue::Text(name) => Format::parse(name)
            .map(Some)
            .ok_or_else(|| invalid_value(key, value, "expected one of email, uuid, ipv4, date-time, uri")),
        ConstraintValue::Bool(_) => Err(invalid_value(key, value, "expected a format name")),
    }
}

fn metadata(leaves: &ConstraintMap) -> Metadata {
    Metadata {
        title: leaves.get("title").map(ConstraintValue::as_text),
        description: leaves.get("description").map(ConstraintValue::as_text),
        default: leaves.get("default").map(|value| match value {
            ConstraintValue::Bool(b) => Value::Bool(*b),
            ConstraintValue::Text(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
        }),
    }
}
