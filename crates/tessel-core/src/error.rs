//! # Error Types: Compile-Time and Validate-Time Failures
//!
//! Two error classes, matching the two phases of a validator's life:
//!
//! - [`SchemaDefinitionError`] is raised while compiling a descriptor. It is
//!   fatal: the descriptor (or its constraint string) must be fixed before
//!   any data can be validated against it.
//! - [`ValidationError`] is raised while applying a compiled validator to
//!   data. It aggregates one or more path-qualified [`Violation`]s and is
//!   never empty.
//!
//! ## Design
//!
//! - Every violation carries the dot/bracket path of the offending value,
//!   a human-readable message, and a machine-readable [`ErrorKind`].
//! - Scalar checks report a single violation; container checks report
//!   every child violation in one aggregate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised while turning a descriptor into a validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaDefinitionError {
    /// The constraint string does not follow the constraint grammar.
    #[error("malformed constraint clause '{clause}': {reason}")]
    MalformedConstraint {
        /// The offending clause (or the whole input when no clause applies).
        clause: String,
        /// What the parser expected.
        reason: String,
    },

    /// A constraint key outside the recognized vocabulary.
    #[error("unknown constraint '{key}'")]
    UnknownConstraint {
        /// The unrecognized key.
        key: String,
    },

    /// A recognized constraint key carries a value of the wrong shape.
    #[error("invalid value '{value}' for constraint '{key}': {reason}")]
    InvalidConstraintValue {
        /// Constraint key.
        key: String,
        /// Raw value as written in the constraint string.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A `pattern`/`regex` constraint is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// Regex compiler diagnostic.
        reason: String,
    },

    /// The descriptor shape cannot be compiled.
    #[error("unsupported descriptor: {0}")]
    UnsupportedDescriptor(String),

    /// Descriptor nesting exceeds the configured compile depth.
    #[error("descriptor nesting exceeds the maximum depth of {max_depth}")]
    DepthExceeded {
        /// The configured limit.
        max_depth: usize,
    },

    /// A descriptor document could not be read or parsed.
    #[error("descriptor load error for '{source_name}': {reason}")]
    Load {
        /// File path or other source identifier.
        source_name: String,
        /// Reason the document could not be loaded.
        reason: String,
    },
}

/// Machine-readable classification of a single violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The value has the wrong JSON type for the descriptor.
    TypeMismatch,
    /// Inclusive `min`/`max` bound violated.
    RangeViolation,
    /// Strict `exclusive_min`/`exclusive_max` bound violated.
    ExclusiveRangeViolation,
    /// Value is not a multiple of `step`.
    StepViolation,
    /// String length or sequence item count out of bounds.
    LengthViolation,
    /// String does not contain a match for `pattern`.
    PatternMismatch,
    /// String is not recognized as the declared `format`.
    FormatViolation,
    /// Sequence contains duplicate items.
    UniquenessViolation,
    /// No sequence item satisfies the `contains` constraint.
    ContainsViolation,
    /// A required record field is absent or null.
    RequiredFieldMissing,
    /// A field required by a sibling-value condition is absent or null.
    ConditionalRequiredMissing,
    /// A field not declared by a strict record.
    UnknownFieldRejected,
    /// Record has fewer properties than `min_properties`.
    MinPropertiesViolation,
    /// Tuple length differs from the declared arity.
    ArityMismatch,
    /// No union alternative accepted the value.
    UnionNoMatch,
    /// More than one `one_of` alternative accepted the value.
    UnionAmbiguousMatch,
    /// Value is not one of the literal's allowed values.
    LiteralMismatch,
    /// A negated constraint was satisfied.
    NegationViolation,
    /// Every alternative of an `a | b` constraint failed.
    DisjunctionFailure,
}

impl ErrorKind {
    /// Returns the snake_case identifier of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeMismatch => "type_mismatch",
            Self::RangeViolation => "range_violation",
            Self::ExclusiveRangeViolation => "exclusive_range_violation",
            Self::StepViolation => "step_violation",
            Self::LengthViolation => "length_violation",
            Self::PatternMismatch => "pattern_mismatch",
            Self::FormatViolation => "format_violation",
            Self::UniquenessViolation => "uniqueness_violation",
            Self::ContainsViolation => "contains_violation",
            Self::RequiredFieldMissing => "required_field_missing",
            Self::ConditionalRequiredMissing => "conditional_required_missing",
            Self::UnknownFieldRejected => "unknown_field_rejected",
            Self::MinPropertiesViolation => "min_properties_violation",
            Self::ArityMismatch => "arity_mismatch",
            Self::UnionNoMatch => "union_no_match",
            Self::UnionAmbiguousMatch => "union_ambiguous_match",
            Self::LiteralMismatch => "literal_mismatch",
            Self::NegationViolation => "negation_violation",
            Self::DisjunctionFailure => "disjunction_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Dot/bracket path to the violating value (`""` for the root).
    pub path: String,
    /// Human-readable description of the violation.
    pub message: String,
    /// Classification of the violation.
    pub kind: ErrorKind,
    /// Sub-violations that explain this one (the failed alternatives of
    /// an `a | b` constraint). Empty for every other kind.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<Violation>,
}

impl Violation {
    /// Create a violation without causes.
    pub fn new(path: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
            causes: Vec::new(),
        }
    }

    /// Attach explanatory sub-violations.
    pub fn with_causes(mut self, causes: Vec<Violation>) -> Self {
        self.causes = causes;
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.path, self.message)
        }
    }
}

/// Aggregate validation failure: one or more violations, in report order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Build an aggregate from collected violations.
    ///
    /// Returns `None` when `violations` is empty, so an aggregate can never
    /// be raised without content.
    pub fn from_violations(violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    /// An aggregate holding exactly one violation.
    pub fn single(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    /// Shorthand for `single(Violation::new(..))`.
    pub fn at(path: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::single(Violation::new(path, kind, message))
    }

    /// Returns the number of violations (always at least one).
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// Whether any violation has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// The first violation recorded at `path`, if any.
    pub fn at_path(&self, path: &str) -> Option<&Violation> {
        self.violations.iter().find(|v| v.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} violation(s)", self.violations.len())?;
        for v in &self.violations {
            writeln!(f)?;
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
