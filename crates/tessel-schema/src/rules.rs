//! # Check Primitives
//!
//! The individual rules behind every validator node: type checks, numeric
//! bounds, step tolerance, string length/pattern/format, value equality,
//! uniqueness, and sibling-field conditions. Both execution backends call
//! these, so a rule and its message are defined exactly once.
//!
//! Every `check_*` function is fail-fast: it returns the single violation
//! of the rule it implements.

use std::collections::HashSet;

use regex::Regex;
use serde_json::{Map, Value};
use tessel_core::{Condition, ErrorKind, ValidationError};

/// Absolute tolerance of the `step` remainder test.
pub const STEP_TOLERANCE: f64 = 1e-9;

/// JSON type name of a value, for type-mismatch messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A record field counts as present only if it holds a non-null value.
pub fn is_absent(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

/// Render a bound or value for messages: integral values without a
/// fractional part (`18`, not `18.0`).
pub fn fmt_num(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

/// Wrong JSON type for the node.
pub fn type_mismatch(path: &str, expected: &str, actual: &Value) -> ValidationError {
    ValidationError::at(
        path,
        ErrorKind::TypeMismatch,
        format!("expected {expected}, got {}", type_name(actual)),
    )
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Numeric bounds of a Number node. `None` means unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberBounds {
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
    /// Strict lower bound.
    pub exclusive_min: Option<f64>,
    /// Strict upper bound.
    pub exclusive_max: Option<f64>,
    /// Required divisor.
    pub step: Option<f64>,
}

/// Type check for a Number node. Returns the value as `f64`.
pub fn expect_number(data: &Value, integer: bool, path: &str) -> Result<f64, ValidationError> {
    let expected = if integer { "integer" } else { "number" };
    let Value::Number(n) = data else {
        return Err(type_mismatch(path, expected, data));
    };
    let Some(x) = n.as_f64() else {
        return Err(type_mismatch(path, expected, data));
    };
    if integer && n.is_f64() && x.fract() != 0.0 {
        return Err(ValidationError::at(
            path,
            ErrorKind::TypeMismatch,
            format!("expected integer, got non-integral number {x}"),
        ));
    }
    Ok(x)
}

/// Inclusive lower bound.
pub fn check_min(x: f64, min: f64, path: &str) -> Result<(), ValidationError> {
    if x < min {
        return Err(ValidationError::at(
            path,
            ErrorKind::RangeViolation,
            format!("value {} is less than the minimum of {}", fmt_num(x), fmt_num(min)),
        ));
    }
    Ok(())
}

/// Inclusive upper bound.
pub fn check_max(x: f64, max: f64, path: &str) -> Result<(), ValidationError> {
    if x > max {
        return Err(ValidationError::at(
            path,
            ErrorKind::RangeViolation,
            format!("value {} is greater than the maximum of {}", fmt_num(x), fmt_num(max)),
        ));
    }
    Ok(())
}

/// Strict lower bound.
pub fn check_exclusive_min(x: f64, bound: f64, path: &str) -> Result<(), ValidationError> {
    if x <= bound {
        return Err(ValidationError::at(
            path,
            ErrorKind::ExclusiveRangeViolation,
            format!(
                "value {} must be greater than the exclusive minimum of {}",
                fmt_num(x),
                fmt_num(bound)
            ),
        ));
    }
    Ok(())
}

/// Strict upper bound.
pub fn check_exclusive_max(x: f64, bound: f64, path: &str) -> Result<(), ValidationError> {
    if x >= bound {
        return Err(ValidationError::at(
            path,
            ErrorKind::ExclusiveRangeViolation,
            format!(
                "value {} must be less than the exclusive maximum of {}",
                fmt_num(x),
                fmt_num(bound)
            ),
        ));
    }
    Ok(())
}

/// Remainder with the sign of the divisor.
fn floored_rem(x: f64, step: f64) -> f64 {
    let r = x % step;
    if r != 0.0 && (r < 0.0) != (step < 0.0) {
        r + step
    } else {
        r
    }
}

/// Whether `x` is a multiple of `step` up to [`STEP_TOLERANCE`]. The
/// remainder is compared against both `0` and `step`, so `0.3 / 0.1`
/// (remainder `0.0999…`) passes.
pub fn is_multiple_of(x: f64, step: f64) -> bool {
    let r = floored_rem(x, step);
    r.abs() <= STEP_TOLERANCE || (r - step).abs() <= STEP_TOLERANCE
}

/// `x` must sit on the `step` grid, within [`STEP_TOLERANCE`].
pub fn check_step(x: f64, step: f64, path: &str) -> Result<(), ValidationError> {
    if !is_multiple_of(x, step) {
        return Err(ValidationError::at(
            path,
            ErrorKind::StepViolation,
            format!("value {} is not a multiple of {}", fmt_num(x), fmt_num(step)),
        ));
    }
    Ok(())
}

/// All bound checks in their fixed order.
pub fn check_bounds(x: f64, bounds: &NumberBounds, path: &str) -> Result<(), ValidationError> {
    if let Some(min) = bounds.min {
        check_min(x, min, path)?;
    }
    if let Some(max) = bounds.max {
        check_max(x, max, path)?;
    }
    if let Some(b) = bounds.exclusive_min {
        check_exclusive_min(x, b, path)?;
    }
    if let Some(b) = bounds.exclusive_max {
        check_exclusive_max(x, b, path)?;
    }
    if let Some(step) = bounds.step {
        check_step(x, step, path)?;
    }
    Ok(())
}

/// Normalized output of an accepted number: integer nodes emit integer
/// JSON numbers, float nodes emit float JSON numbers.
pub fn normalize_number(data: &Value, x: f64, integer: bool) -> Value {
    let Value::Number(n) = data else {
        return data.clone();
    };
    if integer {
        if n.is_f64() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
            return Value::from(x as i64);
        }
        data.clone()
    } else if n.is_f64() {
        data.clone()
    } else {
        serde_json::Number::from_f64(x).map_or_else(|| data.clone(), Value::Number)
    }
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Lightweight format recognizers. These are heuristics, not full
/// conformance checks against the respective standards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Contains `@`.
    Email,
    /// 8-4-4-4-12 hexadecimal groups, case-insensitive.
    Uuid,
    /// Four dot-separated decimal octets, each at most 255.
    Ipv4,
    /// Starts with `YYYY-MM-DDTHH:MM:SS`.
    DateTime,
    /// Starts with a URI scheme followed by `:`.
    Uri,
}

impl Format {
    /// Parse a `format=` constraint value.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "email" => Some(Self::Email),
            "uuid" => Some(Self::Uuid),
            "ipv4" => Some(Self::Ipv4),
            "date-time" | "datetime" => Some(Self::DateTime),
            "uri" => Some(Self::Uri),
            _ => None,
        }
    }

    /// Canonical JSON Schema format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::Ipv4 => "ipv4",
            Self::DateTime => "date-time",
            Self::Uri => "uri",
        }
    }

    /// Whether `s` is recognized as this format.
    pub fn matches(&self, s: &str) -> bool {
        match self {
            Self::Email => s.contains('@'),
            Self::Uuid => is_uuid(s),
            Self::Ipv4 => is_ipv4(s),
            Self::DateTime => is_date_time_prefix(s),
            Self::Uri => is_uri(s),
        }
    }
}

fn is_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

fn is_ipv4(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.bytes().all(|b| b.is_ascii_digit())
                && p.trim_start_matches('0').len() <= 3
                && p.parse::<u32>().map_or(false, |n| n <= 255)
        })
}

fn is_date_time_prefix(s: &str) -> bool {
    const SHAPE: &[u8] = b"dddd-dd-ddTdd:dd:dd";
    let bytes = s.as_bytes();
    bytes.len() >= SHAPE.len()
        && SHAPE.iter().zip(bytes).all(|(shape, b)| match shape {
            b'd' => b.is_ascii_digit(),
            literal => literal == b,
        })
}

fn is_uri(s: &str) -> bool {
    let mut chars = s.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    for c in chars {
        if c == ':' {
            return true;
        }
        if !(c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-')) {
            return false;
        }
    }
    false
}

/// Length in code points.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Minimum length in code points.
pub fn check_min_length(len: usize, min: usize, path: &str) -> Result<(), ValidationError> {
    if len < min {
        return Err(ValidationError::at(
            path,
            ErrorKind::LengthViolation,
            format!("length {len} is shorter than the minimum of {min}"),
        ));
    }
    Ok(())
}

/// Maximum length in code points.
pub fn check_max_length(len: usize, max: usize, path: &str) -> Result<(), ValidationError> {
    if len > max {
        return Err(ValidationError::at(
            path,
            ErrorKind::LengthViolation,
            format!("length {len} is longer than the maximum of {max}"),
        ));
    }
    Ok(())
}

/// Pattern test with search semantics: a match anywhere in `s` passes.
pub fn check_pattern(s: &str, pattern: &Regex, path: &str) -> Result<(), ValidationError> {
    if !pattern.is_match(s) {
        return Err(ValidationError::at(
            path,
            ErrorKind::PatternMismatch,
            format!("pattern mismatch: '{s}' does not match '{}'", pattern.as_str()),
        ));
    }
    Ok(())
}

/// `s` must be recognized as `format`.
pub fn check_format(s: &str, format: Format, path: &str) -> Result<(), ValidationError> {
    if !format.matches(s) {
        return Err(ValidationError::at(
            path,
            ErrorKind::FormatViolation,
            format!("invalid {} format", format.as_str()),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

/// Minimum sequence length.
pub fn check_min_items(len: usize, min: usize, path: &str) -> Result<(), ValidationError> {
    if len < min {
        return Err(ValidationError::at(
            path,
            ErrorKind::LengthViolation,
            format!("expected at least {min} items, got {len}"),
        ));
    }
    Ok(())
}

/// Maximum sequence length.
pub fn check_max_items(len: usize, max: usize, path: &str) -> Result<(), ValidationError> {
    if len > max {
        return Err(ValidationError::at(
            path,
            ErrorKind::LengthViolation,
            format!("expected at most {max} items, got {len}"),
        ));
    }
    Ok(())
}

/// No two items may be equal under [`values_equal`].
pub fn check_unique(items: &[Value], path: &str) -> Result<(), ValidationError> {
    if has_duplicates(items) {
        return Err(ValidationError::at(
            path,
            ErrorKind::UniquenessViolation,
            "duplicate items found",
        ));
    }
    Ok(())
}

/// No item satisfied the `contains` constraint.
pub fn contains_violation(path: &str) -> ValidationError {
    ValidationError::at(
        path,
        ErrorKind::ContainsViolation,
        "no item satisfies the contains constraint",
    )
}

/// Tuple length differs from the declared arity.
pub fn arity_mismatch(expected: usize, actual: usize, path: &str) -> ValidationError {
    ValidationError::at(
        path,
        ErrorKind::ArityMismatch,
        format!("expected {expected} items, got {actual}"),
    )
}

/// Hashable identity of a scalar value. Integral floats collapse onto
/// integers so that `1` and `1.0` are duplicates.
#[derive(Debug, PartialEq, Eq, Hash)]
enum ScalarKey<'a> {
    Null,
    Bool(bool),
    Int(i128),
    Float(u64),
    Str(&'a str),
}

fn scalar_key(value: &Value) -> Option<ScalarKey<'_>> {
    match value {
        Value::Null => Some(ScalarKey::Null),
        Value::Bool(b) => Some(ScalarKey::Bool(*b)),
        Value::String(s) => Some(ScalarKey::Str(s)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(ScalarKey::Int(i128::from(i)))
            } else if let Some(u) = n.as_u64() {
                Some(ScalarKey::Int(i128::from(u)))
            } else {
                let x = n.as_f64()?;
                if x.fract() == 0.0 && x.abs() < 1.7e38 {
                    Some(ScalarKey::Int(x as i128))
                } else {
                    Some(ScalarKey::Float(x.to_bits()))
                }
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Whether `items` holds two equal values.
///
/// All-scalar sequences are checked with a hash set; sequences holding
/// arrays or objects fall back to pairwise comparison.
pub fn has_duplicates(items: &[Value]) -> bool {
    let keys: Option<Vec<ScalarKey<'_>>> = items.iter().map(scalar_key).collect();
    match keys {
        Some(keys) => {
            let mut seen = HashSet::with_capacity(keys.len());
            !keys.into_iter().all(|k| seen.insert(k))
        }
        None => {
            tracing::trace!(len = items.len(), "uniqueness check falling back to pairwise comparison");
            items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| values_equal(a, b)))
        }
    }
}

/// Structural equality where numbers compare by value (`1 == 1.0`).
///
/// Numbers compare through `ScalarKey`, the same identity
/// [`has_duplicates`] hashes, so nested and flat sequences agree.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => scalar_key(a) == scalar_key(b),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// Records, unions, literals, wrappers
// ---------------------------------------------------------------------------

/// Whether the sibling field named by `condition` stringifies to its
/// literal. Missing context or a missing field never matches.
pub fn condition_holds(condition: &Condition, context: Option<&Map<String, Value>>) -> bool {
    match context.and_then(|m| m.get(&condition.field)) {
        Some(Value::String(s)) => *s == condition.literal,
        Some(other) => other.to_string() == condition.literal,
        None => false,
    }
}

/// Required field absent or null.
pub fn required_missing(path: &str) -> tessel_core::Violation {
    tessel_core::Violation::new(path, ErrorKind::RequiredFieldMissing, "field is required")
}

/// Field required by `condition` absent or null.
pub fn conditional_required_missing(path: &str, condition: &Condition) -> tessel_core::Violation {
    tessel_core::Violation::new(
        path,
        ErrorKind::ConditionalRequiredMissing,
        format!("field is required when {condition}"),
    )
}

/// Undeclared field in a strict record.
pub fn unknown_field(path: &str) -> tessel_core::Violation {
    tessel_core::Violation::new(path, ErrorKind::UnknownFieldRejected, "extra field not allowed")
}

/// Record has fewer than `min` properties.
pub fn too_few_properties(min: usize, actual: usize, path: &str) -> tessel_core::Violation {
    tessel_core::Violation::new(
        path,
        ErrorKind::MinPropertiesViolation,
        format!("expected at least {min} properties, got {actual}"),
    )
}

/// No alternative accepted the value.
pub fn union_no_match(alternatives: usize, path: &str) -> ValidationError {
    ValidationError::at(
        path,
        ErrorKind::UnionNoMatch,
        format!("value matches none of the {alternatives} union alternatives"),
    )
}

/// More than one `one_of` alternative accepted the value.
pub fn union_ambiguous(matches: usize, path: &str) -> ValidationError {
    ValidationError::at(
        path,
        ErrorKind::UnionAmbiguousMatch,
        format!("value matches {matches} alternatives, exactly one is required"),
    )
}

/// Value is not one of `allowed`. A null-only literal reports a type mismatch.
pub fn literal_mismatch(allowed: &[Value], actual: &Value, path: &str) -> ValidationError {
    if allowed.iter().all(Value::is_null) {
        return type_mismatch(path, "null", actual);
    }
    let rendered: Vec<String> = allowed.iter().map(Value::to_string).collect();
    ValidationError::at(
        path,
        ErrorKind::LiteralMismatch,
        format!("expected one of: {}", rendered.join(", ")),
    )
}

/// A negated constraint held.
pub fn negation_violation(path: &str) -> ValidationError {
    ValidationError::at(
        path,
        ErrorKind::NegationViolation,
        "value satisfies a negated constraint",
    )
}

/// Every alternative failed; `causes` holds their violations.
pub fn disjunction_failure(
    alternatives: usize,
    causes: Vec<tessel_core::Violation>,
    path: &str,
) -> ValidationError {
    ValidationError::single(
        tessel_core::Violation::new(
            path,
            ErrorKind::DisjunctionFailure,
            format!("OR constraint failed: none of the {alternatives} alternatives matched"),
        )
        .with_causes(causes),
    )
}
