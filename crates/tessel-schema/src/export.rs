//! # JSON Schema Export
//!
//! Renders a compiled validator tree as a JSON Schema (draft 2020-12)
//! document.
//!
//! | Node | Rendering |
//! |------|-----------|
//! | integer / float | `"type": "integer"` / `"number"` plus `minimum`, `maximum`, `exclusiveMinimum`, `exclusiveMaximum`, `multipleOf` |
//! | text | `"type": "string"` plus `minLength`, `maxLength`, `pattern`, `format` |
//! | sequence | `"type": "array"`, `items`, `minItems`, `maxItems`, `uniqueItems`, `contains` |
//! | tuple | `"type": "array"`, `prefixItems`, `"items": false`, `minItems` = `maxItems` = arity |
//! | record | `"type": "object"`, `properties`, `required`, `additionalProperties`, `minProperties` |
//! | union | `anyOf`, or `oneOf` under `one_of` |
//! | literal | `enum`, or `"type": "null"` for a null-only literal |
//! | any / boolean | `{}`; booleans are not type-checked, so no `type` either |
//! | composite | the base rendering plus `allOf` of the wrappers |
//!
//! Conditional clauses depend on sibling values and have no faithful
//! rendering; they are left out. Runtime options (strip, partial) are not
//! part of a schema either.

use serde_json::{json, Map, Value};

use crate::validator::{UnionMode, Validator};

/// Render `validator` as a JSON Schema document.
pub fn to_json_schema(validator: &Validator) -> Value {
    Value::Object(render(validator).unwrap_or_default())
}

/// Pretty-printed rendering of [`to_json_schema`].
pub fn to_json_string(validator: &Validator) -> String {
    let value = to_json_schema(validator);
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

fn number(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < 9.0e15 {
        json!(x as i64)
    } else {
        json!(x)
    }
}

/// `None` for nodes that have no rendering (conditionals).
fn render(validator: &Validator) -> Option<Map<String, Value>> {
    let mut out = Map::new();
    match validator {
        Validator::Number(n) => {
            out.insert("type".into(), json!(if n.integer { "integer" } else { "number" }));
            let b = &n.bounds;
            let bounds = [
                ("minimum", b.min),
                ("maximum", b.max),
                ("exclusiveMinimum", b.exclusive_min),
                ("exclusiveMaximum", b.exclusive_max),
                ("multipleOf", b.step),
            ];
            for (key, bound) in bounds {
                if let Some(x) = bound {
                    out.insert(key.into(), number(x));
                }
            }
        }
        Validator::Text(t) => {
            out.insert("type".into(), json!("string"));
            if let Some(min) = t.min_length {
                out.insert("minLength".into(), json!(min));
            }
            if let Some(max) = t.max_length {
                out.insert("maxLength".into(), json!(max));
            }
            if let Some(pattern) = &t.pattern {
                out.insert("pattern".into(), json!(pattern.as_str()));
            }
            if let Some(format) = t.format {
                out.insert("format".into(), json!(format.as_str()));
            }
        }
        Validator::Sequence(s) => {
            out.insert("type".into(), json!("array"));
            out.insert("items".into(), to_json_schema(&s.items));
            if let Some(min) = s.min_items {
                out.insert("minItems".into(), json!(min));
            }
            if let Some(max) = s.max_items {
                out.insert("maxItems".into(), json!(max));
            }
            if s.unique {
                out.insert("uniqueItems".into(), json!(true));
            }
            if let Some(contains) = &s.contains {
                out.insert("contains".into(), to_json_schema(contains));
            }
        }
        Validator::Tuple(t) => {
            out.insert("type".into(), json!("array"));
            let items: Vec<Value> = t.items.iter().map(|v| to_json_schema(v)).collect();
            out.insert("minItems".into(), json!(items.len()));
            out.insert("maxItems".into(), json!(items.len()));
            out.insert("prefixItems".into(), Value::Array(items));
            out.insert("items".into(), json!(false));
        }
        Validator::Record(r) => {
            out.insert("type".into(), json!("object"));
            let properties: Map<String, Value> = r
                .fields
                .iter()
                .map(|f| (f.name.clone(), to_json_schema(&f.validator)))
                .collect();
            out.insert("properties".into(), Value::Object(properties));
            let required: Vec<Value> = r
                .fields
                .iter()
                .filter(|f| f.required)
                .map(|f| json!(f.name))
                .collect();
            if !required.is_empty() {
                out.insert("required".into(), Value::Array(required));
            }
            out.insert("additionalProperties".into(), json!(!r.strict));
            if let Some(min) = r.min_properties {
                out.insert("minProperties".into(), json!(min));
            }
        }
        Validator::Union(u) => {
            let key = match u.mode {
                UnionMode::AnyOf => "anyOf",
                UnionMode::OneOf => "oneOf",
            };
            let alternatives = u.alternatives.iter().map(|v| to_json_schema(v)).collect();
            out.insert(key.into(), Value::Array(alternatives));
        }
        Validator::Literal(l) => {
            if l.values.iter().all(Value::is_null) {
                out.insert("type".into(), json!("null"));
            } else {
                out.insert("enum".into(), Value::Array(l.values.clone()));
            }
        }
        Validator::Any(_) => {}
        Validator::Composite(c) => {
            out = render(&c.base).unwrap_or_default();
            let wrappers: Vec<Value> = c
                .wrappers
                .iter()
                .filter_map(|w| render(w))
                .map(Value::Object)
                .collect();
            if !wrappers.is_empty() {
                out.insert("allOf".into(), Value::Array(wrappers));
            }
            return Some(out);
        }
        Validator::Conditional(_) => return None,
        Validator::Not(n) => {
            let inner = render(&n.inner)?;
            out.insert("not".into(), Value::Object(inner));
            return Some(out);
        }
        Validator::Or(o) => {
            let alternatives: Option<Vec<Value>> = o
                .alternatives
                .iter()
                .map(|alt| render(alt).map(Value::Object))
                .collect();
            // An alternative without a rendering may accept anything.
            out.insert("anyOf".into(), Value::Array(alternatives?));
            return Some(out);
        }
    }

    if let Some(meta) = validator.metadata() {
        if let Some(title) = &meta.title {
            out.insert("title".into(), json!(title));
        }
        if let Some(description) = &meta.description {
            out.insert("description".into(), json!(description));
        }
        if let Some(default) = &meta.default {
            out.insert("default".into(), default.clone());
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchemaCompiler;
    use tessel_core::{Field, Schema};

    fn export(schema: &Schema) -> Value {
        to_json_schema(&SchemaCompiler::new().compile(schema).unwrap())
    }

    #[test]
    fn test_number_export() {
        let doc = export(&Schema::integer().constrained("min=18; max=120; title='Age'"));
        assert_eq!(
            doc,
            json!({"type": "integer", "minimum": 18, "maximum": 120, "title": "Age"})
        );
        let doc = export(&Schema::float().constrained("exclusive_min=0; step=0.5"));
        assert_eq!(
            doc,
            json!({"type": "number", "exclusiveMinimum": 0, "multipleOf": 0.5})
        );
    }

    #[test]
    fn test_record_export() {
        let doc = export(
            &Schema::record(vec![
                Field::required("name", Schema::text().constrained("min_length=1")),
                Field::optional("tags", Schema::sequence(Schema::text()).constrained("unique")),
            ])
            .constrained("strict"),
        );
        assert_eq!(
            doc,
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "tags": {"type": "array", "items": {"type": "string"}, "uniqueItems": true}
                },
                "required": ["name"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_wrapper_export() {
        let doc = export(&Schema::text().constrained("!pattern='^admin'; min_length=3 | format=email"));
        assert_eq!(
            doc,
            json!({
                "type": "string",
                "allOf": [
                    {"not": {"type": "string", "pattern": "^admin"}},
                    {"anyOf": [
                        {"type": "string", "minLength": 3},
                        {"type": "string", "format": "email"}
                    ]}
                ]
            })
        );
    }

    #[test]
    fn test_conditionals_are_omitted() {
        let doc = export(&Schema::text().constrained("kind==a ? min_length=3"));
        assert_eq!(doc, json!({"type": "string"}));
    }

    #[test]
    fn test_union_literal_and_tuple_export() {
        let doc = export(
            &Schema::union(vec![
                Schema::literal(vec![json!("admin"), json!("user")]),
                Schema::tuple(vec![Schema::integer(), Schema::boolean()]),
                Schema::literal(vec![]),
            ])
            .constrained("one_of"),
        );
        assert_eq!(
            doc,
            json!({"oneOf": [
                {"enum": ["admin", "user"]},
                {"type": "array", "prefixItems": [{"type": "integer"}, {}],
                 "items": false, "minItems": 2, "maxItems": 2},
                {"type": "null"}
            ]})
        );
    }

    #[test]
    fn test_boolean_exports_unconstrained() {
        let doc = export(&Schema::boolean().constrained("title='Flag'"));
        assert_eq!(doc, json!({"title": "Flag"}));
    }
}
