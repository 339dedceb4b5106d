//! # Closure Backend
//!
//! Lowers a compiled [`Validator`] tree into a tree of boxed closures
//! specialized to its exact structure. Every constraint that a node does
//! not declare is absent from its closure, so a lowered procedure does no
//! per-call dispatch on node kinds or optional bounds.
//!
//! The lowered procedure is observationally identical to
//! [`Validator::apply`]: same outputs, same violations, same paths, same
//! messages. Both backends share [`crate::rules`] for every check.
//!
//! Lowered procedures are memoized per validator node, so a node shared
//! by several parents is lowered once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tessel_core::{path, ApplyOptions, Condition, Schema, SchemaDefinitionError, Scope, ValidationError};

use crate::compiler::{CompilerConfig, SchemaCompiler};
use crate::rules;
use crate::validator::{
    Context, LiteralValidator, NumberValidator, RecordValidator, SequenceValidator,
    TextValidator, UnionMode, UnionValidator, Validator,
};

type Procedure = Arc<
    dyn Fn(&Value, &str, &Scope<'_>, Context<'_>) -> Result<Value, ValidationError> + Send + Sync,
>;

type NumberCheck = Box<dyn Fn(f64, &str) -> Result<(), ValidationError> + Send + Sync>;
type TextCheck = Box<dyn Fn(&str, usize, &str) -> Result<(), ValidationError> + Send + Sync>;
type ItemsCheck = Box<dyn Fn(&[Value], &str) -> Result<(), ValidationError> + Send + Sync>;

fn procedure<F>(f: F) -> Procedure
where
    F: Fn(&Value, &str, &Scope<'_>, Context<'_>) -> Result<Value, ValidationError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A validator lowered to closures.
#[derive(Clone)]
pub struct CompiledProcedure {
    validator: Arc<Validator>,
    root: Procedure,
}

impl CompiledProcedure {
    /// Validate `data` and return its normalized form.
    ///
    /// # Errors
    ///
    /// Returns the same [`ValidationError`] the interpreted validator
    /// would.
    pub fn apply(&self, data: &Value, options: &ApplyOptions) -> Result<Value, ValidationError> {
        (self.root)(data, "", &options.root_scope(), None)
    }

    /// The validator tree this procedure was lowered from.
    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }
}

impl fmt::Debug for CompiledProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProcedure")
            .field("validator", &self.validator.kind_name())
            .finish_non_exhaustive()
    }
}

/// Compiles descriptors and lowers them to [`CompiledProcedure`]s.
#[derive(Default)]
pub struct CodegenCompiler {
    tree: SchemaCompiler,
    lowered: Mutex<HashMap<usize, (Arc<Validator>, Procedure)>>,
}

impl fmt::Debug for CodegenCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodegenCompiler")
            .field("tree", &self.tree)
            .field("lowered", &self.lowered.lock().len())
            .finish()
    }
}

impl CodegenCompiler {
    /// A compiler with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// A compiler whose tree compiler uses the given limits.
    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            tree: SchemaCompiler::with_config(config),
            lowered: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying tree compiler.
    pub fn tree_compiler(&self) -> &SchemaCompiler {
        &self.tree
    }

    /// Compile `schema` and lower the result.
    ///
    /// # Errors
    ///
    /// Returns the [`SchemaDefinitionError`] of the tree compile.
    pub fn compile(&self, schema: &Schema) -> Result<CompiledProcedure, SchemaDefinitionError> {
        let validator = self.tree.compile(schema)?;
        Ok(self.lower(&validator))
    }

    /// Lower an already compiled validator tree.
    pub fn lower(&self, validator: &Arc<Validator>) -> CompiledProcedure {
        let mut memo = self.lowered.lock();
        let root = Lowering { memo: &mut memo }.lower(validator);
        CompiledProcedure {
            validator: Arc::clone(validator),
            root,
        }
    }
}

struct Lowering<'a> {
    // Keyed by node address; the stored Arc keeps the address live.
    memo: &'a mut HashMap<usize, (Arc<Validator>, Procedure)>,
}

impl Lowering<'_> {
    fn lower(&mut self, validator: &Arc<Validator>) -> Procedure {
        let key = Arc::as_ptr(validator) as usize;
        if let Some((_, cached)) = self.memo.get(&key) {
            return Arc::clone(cached);
        }
        let lowered = match &**validator {
            Validator::Number(n) => lower_number(n),
            Validator::Text(t) => lower_text(t),
            Validator::Sequence(s) => self.sequence(s),
            Validator::Tuple(t) => {
                let items: Vec<Procedure> = t.items.iter().map(|v| self.lower(v)).collect();
                procedure(move |data, path, scope, _| {
                    let Value::Array(values) = data else {
                        return Err(rules::type_mismatch(path, "array", data));
                    };
                    if values.len() != items.len() {
                        return Err(rules::arity_mismatch(items.len(), values.len(), path));
                    }
                    collect_items(values.iter().zip(&items).enumerate().map(|(i, (value, item))| {
                        item(value, &path::index(path, i), scope, None)
                    }))
                })
            }
            Validator::Record(r) => self.record(r),
            Validator::Union(u) => self.union(u),
            Validator::Literal(l) => lower_literal(l),
            Validator::Any(_) => procedure(|data, _, _, _| Ok(data.clone())),
            Validator::Composite(c) => {
                let base = self.lower(&c.base);
                let wrappers: Vec<Procedure> = c.wrappers.iter().map(|w| self.lower(w)).collect();
                procedure(move |data, path, scope, context| {
                    let out = base(data, path, scope, context)?;
                    for wrapper in &wrappers {
                        wrapper(data, path, scope, context)?;
                    }
                    Ok(out)
                })
            }
            Validator::Conditional(c) => {
                let condition = c.condition.clone();
                let then = self.lower(&c.then);
                procedure(move |data, path, scope, context| {
                    if rules::condition_holds(&condition, context) {
                        then(data, path, scope, context)
                    } else {
                        Ok(data.clone())
                    }
                })
            }
            Validator::Not(n) => {
                let inner = self.lower(&n.inner);
                procedure(move |data, path, scope, context| match inner(data, path, scope, context) {
                    Ok(_) => Err(rules::negation_violation(path)),
                    Err(_) => Ok(data.clone()),
                })
            }
            Validator::Or(o) => {
                let alternatives: Vec<Procedure> = o.alternatives.iter().map(|a| self.lower(a)).collect();
                procedure(move |data, path, scope, context| {
                    let mut causes = Vec::new();
                    for alt in &alternatives {
                        match alt(data, path, scope, context) {
                            Ok(out) => return Ok(out),
                            Err(e) => causes.extend(e.into_violations()),
                        }
                    }
                    Err(rules::disjunction_failure(alternatives.len(), causes, path))
                })
            }
        };
        tracing::debug!(node = validator.kind_name(), "lowered validator node");
        self.memo.insert(key, (Arc::clone(validator), Arc::clone(&lowered)));
        lowered
    }

    fn sequence(&mut self, s: &SequenceValidator) -> Procedure {
        let item = self.lower(&s.items);
        let contains = s.contains.as_ref().map(|c| self.lower(c));

        let mut checks: Vec<ItemsCheck> = Vec::new();
        if let Some(min) = s.min_items {
            checks.push(Box::new(move |values: &[Value], path: &str| {
                rules::check_min_items(values.len(), min, path)
            }));
        }
        if let Some(max) = s.max_items {
            checks.push(Box::new(move |values: &[Value], path: &str| {
                rules::check_max_items(values.len(), max, path)
            }));
        }
        if s.unique {
            checks.push(Box::new(|values: &[Value], path: &str| rules::check_unique(values, path)));
        }

        procedure(move |data, path, scope, _| {
            let Value::Array(values) = data else {
                return Err(rules::type_mismatch(path, "array", data));
            };
            for check in &checks {
                check(values, path)?;
            }
            if let Some(contains) = &contains {
                let found = values
                    .iter()
                    .enumerate()
                    .any(|(i, value)| contains(value, &path::index(path, i), scope, None).is_ok());
                if !found {
                    return Err(rules::contains_violation(path));
                }
            }
            collect_items(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, value)| item(value, &path::index(path, i), scope, None)),
            )
        })
    }

    fn record(&mut self, r: &RecordValidator) -> Procedure {
        struct Lowered {
            name: String,
            check: Procedure,
            required: bool,
        }

        enum Extras {
            Reject,
            Drop,
            FollowScope,
        }

        let fields: Vec<Lowered> = r
            .fields
            .iter()
            .map(|f| Lowered {
                name: f.name.clone(),
                check: self.lower(&f.validator),
                required: f.required,
            })
            .collect();
        let index = r.index.clone();
        let required: Vec<String> = r
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect();
        let conditional: Vec<(String, Condition)> = r
            .conditional_required
            .iter()
            .filter(|req| !req.always_required)
            .map(|req| (req.field.clone(), req.condition.clone()))
            .collect();
        let extras = if r.strict {
            Extras::Reject
        } else if r.strip {
            Extras::Drop
        } else {
            Extras::FollowScope
        };
        let min_properties = r.min_properties;

        procedure(move |data, path, scope, _context| {
            let Value::Object(obj) = data else {
                return Err(rules::type_mismatch(path, "object", data));
            };
            let mut violations = Vec::new();

            for name in &required {
                if !scope.is_partial(name) && rules::is_absent(obj.get(name)) {
                    violations.push(rules::required_missing(&path::field(path, name)));
                }
            }

            let mut out = Map::new();
            for (key, value) in obj {
                let Some(field) = index.get(key).map(|&i| &fields[i]) else {
                    match extras {
                        Extras::Reject => violations.push(rules::unknown_field(&path::field(path, key))),
                        Extras::Drop => {}
                        Extras::FollowScope if scope.strip() => {}
                        Extras::FollowScope => {
                            out.insert(key.clone(), value.clone());
                        }
                    }
                    continue;
                };
                if value.is_null() {
                    if !field.required || scope.is_partial(key) {
                        out.insert(key.clone(), Value::Null);
                    }
                    continue;
                }
                match (field.check)(value, &path::field(path, key), &scope.field(key), Some(obj)) {
                    Ok(v) => {
                        out.insert(key.clone(), v);
                    }
                    Err(e) => violations.extend(e.into_violations()),
                }
            }

            for (name, condition) in &conditional {
                if !scope.is_partial(name)
                    && rules::condition_holds(condition, Some(obj))
                    && rules::is_absent(obj.get(name))
                {
                    violations.push(rules::conditional_required_missing(&path::field(path, name), condition));
                }
            }

            if let Some(min) = min_properties {
                if obj.len() < min {
                    violations.push(rules::too_few_properties(min, obj.len(), path));
                }
            }

            match ValidationError::from_violations(violations) {
                Some(err) => Err(err),
                None => Ok(Value::Object(out)),
            }
        })
    }

    fn union(&mut self, u: &UnionValidator) -> Procedure {
        let alternatives: Vec<Procedure> = u.alternatives.iter().map(|a| self.lower(a)).collect();
        match u.mode {
            UnionMode::AnyOf => procedure(move |data, path, scope, context| {
                alternatives
                    .iter()
                    .find_map(|alt| alt(data, path, scope, context).ok())
                    .ok_or_else(|| rules::union_no_match(alternatives.len(), path))
            }),
            UnionMode::OneOf => procedure(move |data, path, scope, context| {
                let mut successes = alternatives
                    .iter()
                    .filter_map(|alt| alt(data, path, scope, context).ok());
                let Some(first) = successes.next() else {
                    return Err(rules::union_no_match(alternatives.len(), path));
                };
                let extra = successes.count();
                if extra > 0 {
                    return Err(rules::union_ambiguous(extra + 1, path));
                }
                Ok(first)
            }),
        }
    }
}

fn collect_items<I>(results: I) -> Result<Value, ValidationError>
where
    I: Iterator<Item = Result<Value, ValidationError>>,
{
    let mut out = Vec::new();
    let mut violations = Vec::new();
    for result in results {
        match result {
            Ok(v) => out.push(v),
            Err(e) => violations.extend(e.into_violations()),
        }
    }
    match ValidationError::from_violations(violations) {
        Some(err) => Err(err),
        None => Ok(Value::Array(out)),
    }
}

fn lower_number(n: &NumberValidator) -> Procedure {
    let b = n.bounds;
    let mut checks: Vec<NumberCheck> = Vec::new();
    if let Some(min) = b.min {
        checks.push(Box::new(move |x: f64, path: &str| rules::check_min(x, min, path)));
    }
    if let Some(max) = b.max {
        checks.push(Box::new(move |x: f64, path: &str| rules::check_max(x, max, path)));
    }
    if let Some(bound) = b.exclusive_min {
        checks.push(Box::new(move |x: f64, path: &str| rules::check_exclusive_min(x, bound, path)));
    }
    if let Some(bound) = b.exclusive_max {
        checks.push(Box::new(move |x: f64, path: &str| rules::check_exclusive_max(x, bound, path)));
    }
    if let Some(step) = b.step {
        checks.push(Box::new(move |x: f64, path: &str| rules::check_step(x, step, path)));
    }

    let integer = n.integer;
    procedure(move |data, path, _, _| {
        let x = rules::expect_number(data, integer, path)?;
        for check in &checks {
            check(x, path)?;
        }
        Ok(rules::normalize_number(data, x, integer))
    })
}

fn lower_text(t: &TextValidator) -> Procedure {
    let mut checks: Vec<TextCheck> = Vec::new();
    if let Some(min) = t.min_length {
        checks.push(Box::new(move |_: &str, len: usize, path: &str| {
            rules::check_min_length(len, min, path)
        }));
    }
    if let Some(max) = t.max_length {
        checks.push(Box::new(move |_: &str, len: usize, path: &str| {
            rules::check_max_length(len, max, path)
        }));
    }
    if let Some(pattern) = t.pattern.clone() {
        checks.push(Box::new(move |s: &str, _: usize, path: &str| {
            rules::check_pattern(s, &pattern, path)
        }));
    }
    if let Some(format) = t.format {
        checks.push(Box::new(move |s: &str, _: usize, path: &str| {
            rules::check_format(s, format, path)
        }));
    }

    let counts_chars = t.min_length.is_some() || t.max_length.is_some();
    procedure(move |data, path, _, _| {
        let Value::String(s) = data else {
            return Err(rules::type_mismatch(path, "string", data));
        };
        let len = if counts_chars { rules::char_len(s) } else { 0 };
        for check in &checks {
            check(s, len, path)?;
        }
        Ok(data.clone())
    })
}

fn lower_literal(l: &LiteralValidator) -> Procedure {
    let values = l.values.clone();
    if values.iter().all(Value::is_null) {
        return procedure(move |data, path, _, _| {
            if data.is_null() {
                Ok(Value::Null)
            } else {
                Err(rules::literal_mismatch(&values, data, path))
            }
        });
    }
    procedure(move |data, path, _, _| {
        if values.iter().any(|v| rules::values_equal(v, data)) {
            Ok(data.clone())
        } else {
            Err(rules::literal_mismatch(&values, data, path))
        }
    })
}
