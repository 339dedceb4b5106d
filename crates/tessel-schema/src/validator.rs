//! # Validator Tree
//!
//! The compiled, immutable form of a descriptor. Each node checks one
//! shape and holds its children behind [`Arc`], so a sub-validator shared
//! by several parents (or by several descriptors compiled through the same
//! [`SchemaCompiler`](crate::SchemaCompiler)) exists once.
//!
//! [`Validator::apply`] is the interpreted backend: it walks the tree
//! directly. The closure backend in [`crate::codegen`] lowers the same tree
//! and must agree with it on every input.
//!
//! ## Error aggregation
//!
//! Scalar, literal and union nodes fail with a single violation. Records,
//! sequences and tuples first run their own checks fail-fast, then validate
//! every child and report all child violations together. Composite nodes
//! stop at the first failing stage.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use tessel_core::{path, ApplyOptions, Condition, Scope, ValidationError};

use crate::rules::{self, Format, NumberBounds};

/// Sibling-record context handed to child validators, used by
/// conditional constraints.
pub(crate) type Context<'a> = Option<&'a Map<String, Value>>;

/// Documentation metadata attached by `title=`, `description=` and
/// `default=`. Never affects validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Short title.
    pub title: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Documented default value.
    pub default: Option<Value>,
}

/// A compiled validator node.
#[derive(Debug)]
pub enum Validator {
    /// Integer or float scalar.
    Number(NumberValidator),
    /// Text scalar.
    Text(TextValidator),
    /// Homogeneous sequence.
    Sequence(SequenceValidator),
    /// Fixed-arity tuple.
    Tuple(TupleValidator),
    /// Record with named fields.
    Record(RecordValidator),
    /// Union of alternatives.
    Union(UnionValidator),
    /// Literal enumeration.
    Literal(LiteralValidator),
    /// Passthrough (`any` and `boolean`).
    Any(AnyValidator),
    /// A base validator followed by wrapper validators.
    Composite(CompositeValidator),
    /// `field==literal ? clause`.
    Conditional(ConditionalValidator),
    /// `!clause`.
    Not(NotValidator),
    /// `a | b`.
    Or(OrValidator),
}

/// Integer or float with inclusive, exclusive and step bounds.
#[derive(Debug)]
pub struct NumberValidator {
    pub(crate) integer: bool,
    pub(crate) bounds: NumberBounds,
    pub(crate) meta: Metadata,
}

/// Text with code-point length bounds, a search pattern and a format.
#[derive(Debug)]
pub struct TextValidator {
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) format: Option<Format>,
    pub(crate) meta: Metadata,
}

/// Homogeneous sequence. Own checks run before any element is visited.
#[derive(Debug)]
pub struct SequenceValidator {
    pub(crate) items: Arc<Validator>,
    pub(crate) min_items: Option<usize>,
    pub(crate) max_items: Option<usize>,
    pub(crate) unique: bool,
    pub(crate) contains: Option<Arc<Validator>>,
    pub(crate) meta: Metadata,
}

/// Fixed-arity positional tuple.
#[derive(Debug)]
pub struct TupleValidator {
    pub(crate) items: Vec<Arc<Validator>>,
    pub(crate) meta: Metadata,
}

/// A declared record field.
#[derive(Debug)]
pub struct RecordField {
    pub(crate) name: String,
    pub(crate) validator: Arc<Validator>,
    pub(crate) required: bool,
}

/// `field==literal ? required` declared on a field's constraints.
#[derive(Debug)]
pub struct ConditionalRequirement {
    /// The field that becomes required.
    pub(crate) field: String,
    /// Whether the field is unconditionally required as well.
    pub(crate) always_required: bool,
    pub(crate) condition: Condition,
}

/// Record with declared fields, checked all at once.
#[derive(Debug)]
pub struct RecordValidator {
    pub(crate) fields: Vec<RecordField>,
    pub(crate) index: HashMap<String, usize>,
    /// Reject undeclared fields (`strict`, `additional_properties=false`).
    pub(crate) strict: bool,
    /// Drop undeclared fields from this record's output.
    pub(crate) strip: bool,
    pub(crate) min_properties: Option<usize>,
    pub(crate) conditional_required: Vec<ConditionalRequirement>,
    pub(crate) meta: Metadata,
}

impl RecordValidator {
    pub(crate) fn field(&self, name: &str) -> Option<&RecordField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }
}

/// How many union alternatives must accept a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionMode {
    /// The first accepting alternative wins.
    AnyOf,
    /// Exactly one alternative may accept.
    OneOf,
}

/// Alternatives tried in declared order.
#[derive(Debug)]
pub struct UnionValidator {
    pub(crate) alternatives: Vec<Arc<Validator>>,
    pub(crate) mode: UnionMode,
    pub(crate) meta: Metadata,
}

/// Membership in a fixed set of values.
#[derive(Debug)]
pub struct LiteralValidator {
    pub(crate) values: Vec<Value>,
    pub(crate) meta: Metadata,
}

/// Accepts every value unchanged.
#[derive(Debug)]
pub struct AnyValidator {
    /// Declared as `boolean` rather than `any` (affects `kind_name` only).
    pub(crate) boolean: bool,
    pub(crate) meta: Metadata,
}

/// A base validator plus wrappers that must also accept the raw input.
#[derive(Debug)]
pub struct CompositeValidator {
    pub(crate) base: Arc<Validator>,
    pub(crate) wrappers: Vec<Arc<Validator>>,
}

/// Runs `then` only when a sibling field matches the condition.
#[derive(Debug)]
pub struct ConditionalValidator {
    pub(crate) condition: Condition,
    pub(crate) then: Arc<Validator>,
}

/// Succeeds exactly when `inner` fails.
#[derive(Debug)]
pub struct NotValidator {
    pub(crate) inner: Arc<Validator>,
}

/// Succeeds with the first accepting alternative.
#[derive(Debug)]
pub struct OrValidator {
    pub(crate) alternatives: Vec<Arc<Validator>>,
}

impl Validator {
    /// Validate `data` and return its normalized form.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] holding at least one path-qualified
    /// violation.
    pub fn apply(&self, data: &Value, options: &ApplyOptions) -> Result<Value, ValidationError> {
        self.check(data, "", &options.root_scope(), None)
    }

    /// Short node name, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Number(n) if n.integer => "integer",
            Self::Number(_) => "float",
            Self::Text(_) => "text",
            Self::Sequence(_) => "sequence",
            Self::Tuple(_) => "tuple",
            Self::Record(_) => "record",
            Self::Union(_) => "union",
            Self::Literal(_) => "literal",
            Self::Any(a) if a.boolean => "boolean",
            Self::Any(_) => "any",
            Self::Composite(_) => "composite",
            Self::Conditional(_) => "conditional",
            Self::Not(_) => "not",
            Self::Or(_) => "or",
        }
    }

    /// Documentation metadata of this node. Composite nodes report the
    /// metadata of their base.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Number(n) => Some(&n.meta),
            Self::Text(t) => Some(&t.meta),
            Self::Sequence(s) => Some(&s.meta),
            Self::Tuple(t) => Some(&t.meta),
            Self::Record(r) => Some(&r.meta),
            Self::Union(u) => Some(&u.meta),
            Self::Literal(l) => Some(&l.meta),
            Self::Any(a) => Some(&a.meta),
            Self::Composite(c) => c.base.metadata(),
            Self::Conditional(_) | Self::Not(_) | Self::Or(_) => None,
        }
    }

    pub(crate) fn check(
        &self,
        data: &Value,
        path: &str,
        scope: &Scope<'_>,
        context: Context<'_>,
    ) -> Result<Value, ValidationError> {
        match self {
            Self::Number(n) => n.check(data, path),
            Self::Text(t) => t.check(data, path),
            Self::Sequence(s) => s.check(data, path, scope),
            Self::Tuple(t) => t.check(data, path, scope),
            Self::Record(r) => r.check(data, path, scope),
            Self::Union(u) => u.check(data, path, scope, context),
            Self::Literal(l) => l.check(data, path),
            Self::Any(_) => Ok(data.clone()),
            Self::Composite(c) => {
                let out = c.base.check(data, path, scope, context)?;
                for wrapper in &c.wrappers {
                    wrapper.check(data, path, scope, context)?;
                }
                Ok(out)
            }
            Self::Conditional(c) => {
                if rules::condition_holds(&c.condition, context) {
                    c.then.check(data, path, scope, context)
                } else {
                    Ok(data.clone())
                }
            }
            Self::Not(n) => match n.inner.check(data, path, scope, context) {
                Ok(_) => Err(rules::negation_violation(path)),
                Err(_) => Ok(data.clone()),
            },
            Self::Or(o) => {
                let mut causes = Vec::new();
                for alt in &o.alternatives {
                    match alt.check(data, path, scope, context) {
                        Ok(out) => return Ok(out),
                        Err(e) => causes.extend(e.into_violations()),
                    }
                }
                Err(rules::disjunction_failure(o.alternatives.len(), causes, path))
            }
        }
    }
}

impl NumberValidator {
    fn check(&self, data: &Value, path: &str) -> Result<Value, ValidationError> {
        let x = rules::expect_number(data, self.integer, path)?;
        rules::check_bounds(x, &self.bounds, path)?;
        Ok(rules::normalize_number(data, x, self.integer))
    }
}

impl TextValidator {
    fn check(&self, data: &Value, path: &str) -> Result<Value, ValidationError> {
        let Value::String(s) = data else {
            return Err(rules::type_mismatch(path, "string", data));
        };
        if self.min_length.is_some() || self.max_length.is_some() {
            let len = rules::char_len(s);
            if let Some(min) = self.min_length {
                rules::check_min_length(len, min, path)?;
            }
            if let Some(max) = self.max_length {
                rules::check_max_length(len, max, path)?;
            }
        }
        if let Some(pattern) = &self.pattern {
            rules::check_pattern(s, pattern, path)?;
        }
        if let Some(format) = self.format {
            rules::check_format(s, format, path)?;
        }
        Ok(data.clone())
    }
}

impl SequenceValidator {
    /// Items are checked without a record context; conditionals on an
    /// item only see siblings inside that item.
    fn check(&self, data: &Value, path: &str, scope: &Scope<'_>) -> Result<Value, ValidationError> {
        let Value::Array(items) = data else {
            return Err(rules::type_mismatch(path, "array", data));
        };
        if let Some(min) = self.min_items {
            rules::check_min_items(items.len(), min, path)?;
        }
        if let Some(max) = self.max_items {
            rules::check_max_items(items.len(), max, path)?;
        }
        if self.unique {
            rules::check_unique(items, path)?;
        }
        if let Some(contains) = &self.contains {
            let found = items.iter().enumerate().any(|(i, item)| {
                contains
                    .check(item, &path::index(path, i), scope, None)
                    .is_ok()
            });
            if !found {
                return Err(rules::contains_violation(path));
            }
        }

        let mut out = Vec::with_capacity(items.len());
        let mut violations = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match self.items.check(item, &path::index(path, i), scope, None) {
                Ok(v) => out.push(v),
                Err(e) => violations.extend(e.into_violations()),
            }
        }
        match ValidationError::from_violations(violations) {
            Some(err) => Err(err),
            None => Ok(Value::Array(out)),
        }
    }
}

impl TupleValidator {
    fn check(&self, data: &Value, path: &str, scope: &Scope<'_>) -> Result<Value, ValidationError> {
        let Value::Array(items) = data else {
            return Err(rules::type_mismatch(path, "array", data));
        };
        if items.len() != self.items.len() {
            return Err(rules::arity_mismatch(self.items.len(), items.len(), path));
        }

        let mut out = Vec::with_capacity(items.len());
        let mut violations = Vec::new();
        for (i, (item, validator)) in items.iter().zip(&self.items).enumerate() {
            match validator.check(item, &path::index(path, i), scope, None) {
                Ok(v) => out.push(v),
                Err(e) => violations.extend(e.into_violations()),
            }
        }
        match ValidationError::from_violations(violations) {
            Some(err) => Err(err),
            None => Ok(Value::Array(out)),
        }
    }
}

impl RecordValidator {
    fn check(&self, data: &Value, path: &str, scope: &Scope<'_>) -> Result<Value, ValidationError> {
        let Value::Object(obj) = data else {
            return Err(rules::type_mismatch(path, "object", data));
        };
        let mut violations = Vec::new();

        for field in &self.fields {
            if field.required && !scope.is_partial(&field.name) && rules::is_absent(obj.get(&field.name)) {
                violations.push(rules::required_missing(&path::field(path, &field.name)));
            }
        }

        let mut out = Map::new();
        for (key, value) in obj {
            let child_path = path::field(path, key);
            match self.field(key) {
                Some(field) => {
                    if value.is_null() {
                        // Required nulls were reported above; optional nulls pass through.
                        if !field.required || scope.is_partial(key) {
                            out.insert(key.clone(), Value::Null);
                        }
                        continue;
                    }
                    match field.validator.check(value, &child_path, &scope.field(key), Some(obj)) {
                        Ok(v) => {
                            out.insert(key.clone(), v);
                        }
                        Err(e) => violations.extend(e.into_violations()),
                    }
                }
                None if self.strict => violations.push(rules::unknown_field(&child_path)),
                None if self.strip || scope.strip() => {}
                None => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }

        for req in &self.conditional_required {
            if req.always_required || scope.is_partial(&req.field) {
                continue;
            }
            if rules::condition_holds(&req.condition, Some(obj)) && rules::is_absent(obj.get(&req.field)) {
                violations.push(rules::conditional_required_missing(
                    &path::field(path, &req.field),
                    &req.condition,
                ));
            }
        }

        if let Some(min) = self.min_properties {
            if obj.len() < min {
                violations.push(rules::too_few_properties(min, obj.len(), path));
            }
        }

        match ValidationError::from_violations(violations) {
            Some(err) => Err(err),
            None => Ok(Value::Object(out)),
        }
    }
}

impl UnionValidator {
    fn check(
        &self,
        data: &Value,
        path: &str,
        scope: &Scope<'_>,
        context: Context<'_>,
    ) -> Result<Value, ValidationError> {
        match self.mode {
            UnionMode::AnyOf => {
                for alt in &self.alternatives {
                    if let Ok(out) = alt.check(data, path, scope, context) {
                        return Ok(out);
                    }
                }
                Err(rules::union_no_match(self.alternatives.len(), path))
            }
            UnionMode::OneOf => {
                let mut matched = None;
                let mut count = 0;
                for alt in &self.alternatives {
                    if let Ok(out) = alt.check(data, path, scope, context) {
                        count += 1;
                        matched.get_or_insert(out);
                    }
                }
                match (count, matched) {
                    (1, Some(out)) => Ok(out),
                    (0, _) | (_, None) => Err(rules::union_no_match(self.alternatives.len(), path)),
                    (n, Some(_)) => Err(rules::union_ambiguous(n, path)),
                }
            }
        }
    }
}

impl LiteralValidator {
    fn check(&self, data: &Value, path: &str) -> Result<Value, ValidationError> {
        if self.values.iter().any(|v| rules::values_equal(v, data)) {
            Ok(data.clone())
        } else {
            Err(rules::literal_mismatch(&self.values, data, path))
        }
    }
}
