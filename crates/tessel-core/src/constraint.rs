//! # Constraint Language
//!
//! Parses the constraint mini-language attached to schema descriptors
//! into an explicit AST.
//!
//! ## Grammar
//!
//! ```text
//! constraints := clause (';' clause)*          empty clauses are skipped
//! clause      := [condition '?'] negation
//! condition   := ident '==' literal
//! negation    := '!' negation | disjunction
//! disjunction := operand ('|' operand)*
//! operand     := '!' operand | leaf
//! leaf        := ident [ '=' value ]
//! value       := quoted | bare
//! ```
//!
//! Quoted segments (`'...'` or `"..."`) are opaque to every delimiter:
//! `;`, `|`, `?`, `!` and `=` inside quotes are literal characters, as is
//! the other quote character. A bare key is the
//! boolean flag `true`; bare `true`/`false` values are booleans; anything
//! else is text.
//!
//! `!a | b` negates the whole disjunction, `a | !b` negates one operand.
//!
//! ## Output
//!
//! [`parse`] returns [`ParsedConstraints::Flat`] for the common case of
//! plain `key=value` clauses and [`ParsedConstraints::Clauses`] as soon as
//! any clause uses `?`, `!` or `|`. Malformed input is rejected with
//! [`SchemaDefinitionError::MalformedConstraint`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaDefinitionError;

/// Value of a leaf constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    /// Bare flags and the literals `true`/`false`.
    Bool(bool),
    /// Every other value, with surrounding quotes removed.
    Text(String),
}

impl ConstraintValue {
    /// Whether this value enables a flag (`unique`, `strict=true`, ...).
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// The value as written, booleans rendered as `true`/`false`.
    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Sibling-field equality test guarding a conditional clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Name of the sibling field in the enclosing record.
    pub field: String,
    /// Expected stringified value of that field.
    pub literal: String,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.field, self.literal)
    }
}

/// A node of the constraint AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintNode {
    /// `key`, `key=value` or `key='quoted value'`.
    Leaf {
        /// Constraint key.
        key: String,
        /// Constraint value.
        value: ConstraintValue,
    },
    /// `a | b | ...`: the first alternative that succeeds wins.
    Or(Vec<ConstraintNode>),
    /// `!clause`: succeeds exactly when the wrapped clause fails.
    Not(Box<ConstraintNode>),
    /// `field==literal ? clause`: applies only when the condition holds.
    Conditional {
        /// Guard evaluated against the enclosing record.
        condition: Condition,
        /// Clause applied when the guard holds.
        then: Box<ConstraintNode>,
    },
}

impl ConstraintNode {
    /// Returns the leaf key/value pair, if this node is a leaf.
    pub fn as_leaf(&self) -> Option<(&str, &ConstraintValue)> {
        match self {
            Self::Leaf { key, value } => Some((key, value)),
            _ => None,
        }
    }
}

/// Ordered mapping of plain leaf constraints. A later clause with the same
/// key overrides an earlier one.
pub type ConstraintMap = BTreeMap<String, ConstraintValue>;

/// Result of parsing a constraint string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedConstraints {
    /// Only plain leaves: no `?`, `!` or `|` anywhere.
    Flat(ConstraintMap),
    /// General case: one node per clause, in source order.
    Clauses(Vec<ConstraintNode>),
}

impl ParsedConstraints {
    /// Separate plain leaves from wrapper nodes.
    ///
    /// Leaves merge into a single map (later keys win); every non-leaf
    /// node is returned as a wrapper in source order.
    pub fn split(self) -> (ConstraintMap, Vec<ConstraintNode>) {
        match self {
            Self::Flat(map) => (map, Vec::new()),
            Self::Clauses(nodes) => {
                let mut map = ConstraintMap::new();
                let mut wrappers = Vec::new();
                for node in nodes {
                    match node {
                        ConstraintNode::Leaf { key, value } => {
                            map.insert(key, value);
                        }
                        other => wrappers.push(other),
                    }
                }
                (map, wrappers)
            }
        }
    }

    /// Whether nothing was parsed.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(map) => map.is_empty(),
            Self::Clauses(nodes) => nodes.is_empty(),
        }
    }
}

/// Parse a constraint string.
///
/// # Errors
///
/// Returns [`SchemaDefinitionError::MalformedConstraint`] for unterminated
/// quotes, empty keys or values, empty alternatives, and `?` clauses whose
/// guard is not `field==literal`.
pub fn parse(input: &str) -> Result<ParsedConstraints, SchemaDefinitionError> {
    let mut nodes = Vec::new();
    for clause in split_top_level(input, ';').map_err(|reason| malformed(input, reason))? {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        nodes.push(parse_clause(clause)?);
    }

    if nodes.iter().all(|n| n.as_leaf().is_some()) {
        let map = nodes
            .into_iter()
            .filter_map(|n| match n {
                ConstraintNode::Leaf { key, value } => Some((key, value)),
                _ => None,
            })
            .collect();
        Ok(ParsedConstraints::Flat(map))
    } else {
        Ok(ParsedConstraints::Clauses(nodes))
    }
}

fn parse_clause(clause: &str) -> Result<ConstraintNode, SchemaDefinitionError> {
    let parts = split_top_level(clause, '?').map_err(|reason| malformed(clause, reason))?;
    match parts.as_slice() {
        [body] => parse_negation(body.trim(), clause),
        [guard, body] => {
            let condition = parse_condition(guard.trim(), clause)?;
            let body = body.trim();
            if body.is_empty() {
                return Err(malformed(clause, "conditional clause has no body"));
            }
            Ok(ConstraintNode::Conditional {
                condition,
                then: Box::new(parse_negation(body, clause)?),
            })
        }
        _ => Err(malformed(clause, "at most one '?' is allowed per clause")),
    }
}

fn parse_negation(text: &str, clause: &str) -> Result<ConstraintNode, SchemaDefinitionError> {
    if let Some(rest) = text.strip_prefix('!') {
        let rest = rest.trim_start();
        if rest.is_empty() {
            return Err(malformed(clause, "'!' must be followed by a clause"));
        }
        return Ok(ConstraintNode::Not(Box::new(parse_negation(rest, clause)?)));
    }
    parse_disjunction(text, clause)
}

fn parse_disjunction(text: &str, clause: &str) -> Result<ConstraintNode, SchemaDefinitionError> {
    let alternatives = split_top_level(text, '|').map_err(|reason| malformed(clause, reason))?;
    if alternatives.len() == 1 {
        return parse_operand(text, clause);
    }
    let mut nodes = Vec::with_capacity(alternatives.len());
    for alt in alternatives {
        let alt = alt.trim();
        if alt.is_empty() {
            return Err(malformed(clause, "empty alternative in '|' expression"));
        }
        nodes.push(parse_operand(alt, clause)?);
    }
    Ok(ConstraintNode::Or(nodes))
}

fn parse_operand(text: &str, clause: &str) -> Result<ConstraintNode, SchemaDefinitionError> {
    if let Some(rest) = text.strip_prefix('!') {
        let rest = rest.trim_start();
        if rest.is_empty() {
            return Err(malformed(clause, "'!' must be followed by a clause"));
        }
        return Ok(ConstraintNode::Not(Box::new(parse_operand(rest, clause)?)));
    }
    parse_leaf(text, clause)
}

fn parse_leaf(text: &str, clause: &str) -> Result<ConstraintNode, SchemaDefinitionError> {
    let (key, value) = match find_top_level(text, '=') {
        Some(at) => (&text[..at], Some(&text[at + 1..])),
        None => (text, None),
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(malformed(clause, "constraint key is empty"));
    }
    if !is_ident(key) {
        return Err(malformed(clause, format!("'{key}' is not a valid constraint key")));
    }
    let value = match value {
        None => ConstraintValue::Bool(true),
        Some(raw) => parse_value(raw.trim(), clause)?,
    };
    Ok(ConstraintNode::Leaf {
        key: key.to_string(),
        value,
    })
}

fn parse_value(raw: &str, clause: &str) -> Result<ConstraintValue, SchemaDefinitionError> {
    if raw.is_empty() {
        return Err(malformed(clause, "constraint value is empty"));
    }
    if let Some(inner) = unquote(raw) {
        return Ok(ConstraintValue::Text(inner.to_string()));
    }
    if raw.starts_with(is_quote) {
        return Err(malformed(clause, "unexpected text after quoted value"));
    }
    if raw.eq_ignore_ascii_case("true") {
        Ok(ConstraintValue::Bool(true))
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(ConstraintValue::Bool(false))
    } else {
        Ok(ConstraintValue::Text(raw.to_string()))
    }
}

fn parse_condition(guard: &str, clause: &str) -> Result<Condition, SchemaDefinitionError> {
    let Some(at) = find_top_level_str(guard, "==") else {
        return Err(malformed(clause, "condition must have the form field==literal"));
    };
    let field = guard[..at].trim();
    let literal = guard[at + 2..].trim();
    if !is_ident(field) {
        return Err(malformed(clause, format!("'{field}' is not a valid condition field")));
    }
    if literal.is_empty() {
        return Err(malformed(clause, "condition literal is empty"));
    }
    let literal = match unquote(literal) {
        Some(inner) => inner,
        None if literal.contains(is_quote) => {
            return Err(malformed(clause, "unexpected quote in condition literal"));
        }
        None => literal,
    };
    Ok(Condition {
        field: field.to_string(),
        literal: literal.to_string(),
    })
}

/// Split `text` on `delim` wherever it occurs outside a quoted segment.
fn split_top_level(text: &str, delim: char) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote = None;
    for (i, c) in text.char_indices() {
        if track_quote(&mut quote, c) {
            continue;
        }
        if c == delim && quote.is_none() {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    if quote.is_some() {
        return Err("unterminated quoted segment".to_string());
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        if !track_quote(&mut quote, c) && c == needle && quote.is_none() {
            return Some(i);
        }
    }
    None
}

fn find_top_level_str(text: &str, needle: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        if !track_quote(&mut quote, c) && quote.is_none() && text[i..].starts_with(needle) {
            return Some(i);
        }
    }
    None
}

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}

/// Advance the quote state over `c`; returns whether `c` opened or closed
/// a quoted segment.
fn track_quote(quote: &mut Option<char>, c: char) -> bool {
    match *quote {
        Some(open) if c == open => {
            *quote = None;
            true
        }
        None if is_quote(c) => {
            *quote = Some(c);
            true
        }
        _ => false,
    }
}

fn unquote(raw: &str) -> Option<&str> {
    let open = raw.chars().next().filter(|c| is_quote(*c))?;
    if raw.len() >= 2 && raw.ends_with(open) {
        let inner = &raw[1..raw.len() - 1];
        if !inner.contains(open) {
            return Some(inner);
        }
    }
    None
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn malformed(clause: &str, reason: impl Into<String>) -> SchemaDefinitionError {
    SchemaDefinitionError::MalformedConstraint {
        clause: clause.to_string(),
        reason: reason.into(),
    }
}
