//! Integration test: exported documents are valid Draft 2020-12 schemas and
//! agree with the validators they were rendered from.

use std::path::PathBuf;

use serde_json::{json, Value};
use tessel_core::{ApplyOptions, Field, Schema};
use tessel_schema::{export, Registry, SchemaCompiler};

fn draft_2020_12(document: &Value) -> jsonschema::Validator {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);
    opts.build(document)
        .unwrap_or_else(|e| panic!("exported document does not compile: {e}\n{document:#}"))
}

fn account() -> Schema {
    Schema::record(vec![
        Field::required(
            "username",
            Schema::text().constrained("min_length=3; max_length=16; pattern='^[a-z0-9_]+$'"),
        ),
        Field::required("age", Schema::integer().constrained("min=18; max=120")),
        Field::optional("score", Schema::float().constrained("exclusive_min=0; step=0.5")),
        Field::optional(
            "tags",
            Schema::sequence(Schema::text()).constrained("unique; max_items=3"),
        ),
        Field::optional("point", Schema::tuple(vec![Schema::integer(), Schema::integer()])),
        Field::optional("role", Schema::literal(vec![json!("admin"), json!("user")])),
        Field::optional(
            "handle",
            Schema::text().constrained("!pattern='^admin' ; min_length=5 | pattern='^[0-9]+$'"),
        ),
    ])
    .constrained("strict; title='Account'")
}

#[test]
fn test_export_matches_validator_decisions() {
    let validator = SchemaCompiler::new().compile(&account()).unwrap();
    let document = export::to_json_schema(&validator);
    let reference = draft_2020_12(&document);

    let samples = [
        json!({"username": "ada_l", "age": 36}),
        json!({"username": "ada_l", "age": 17}),
        json!({"username": "Ada!", "age": 36}),
        json!({"username": "ad", "age": 36}),
        json!({"username": "ada_l", "age": 36.0}),
        json!({"username": "ada_l", "age": 36.5}),
        json!({"username": "ada_l", "age": 36, "score": 2.5}),
        json!({"username": "ada_l", "age": 36, "score": 2.25}),
        json!({"username": "ada_l", "age": 36, "score": 0}),
        json!({"username": "ada_l", "age": 36, "tags": ["a", "b"]}),
        json!({"username": "ada_l", "age": 36, "tags": ["a", "a"]}),
        json!({"username": "ada_l", "age": 36, "tags": ["a", "b", "c", "d"]}),
        json!({"username": "ada_l", "age": 36, "point": [1, 2]}),
        json!({"username": "ada_l", "age": 36, "point": [1]}),
        json!({"username": "ada_l", "age": 36, "point": [1, 2, 3]}),
        json!({"username": "ada_l", "age": 36, "role": "admin"}),
        json!({"username": "ada_l", "age": 36, "role": "root"}),
        json!({"username": "ada_l", "age": 36, "handle": "lovelace"}),
        json!({"username": "ada_l", "age": 36, "handle": "12"}),
        json!({"username": "ada_l", "age": 36, "handle": "abc"}),
        json!({"username": "ada_l", "age": 36, "handle": "administrator"}),
        json!({"username": "ada_l", "age": 36, "extra": true}),
        json!({"age": 36}),
        json!([]),
    ];
    for sample in samples {
        let ours = validator.apply(&sample, &ApplyOptions::default()).is_ok();
        assert_eq!(
            ours,
            reference.is_valid(&sample),
            "disagreement on {sample}\n{document:#}"
        );
    }
}

#[test]
fn test_export_carries_metadata() {
    let validator = SchemaCompiler::new().compile(&account()).unwrap();
    let document = export::to_json_schema(&validator);
    assert_eq!(document["title"], json!("Account"));
    assert_eq!(document["additionalProperties"], json!(false));
    assert_eq!(document["required"], json!(["username", "age"]));
    assert_eq!(document["properties"]["point"]["items"], json!(false));
}

#[test]
fn test_registry_exports_fixture() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("checkout.yaml");
    let mut registry = Registry::new();
    registry.register("checkout", &Schema::from_path(&path).unwrap()).unwrap();

    let document = registry.json_schema("checkout").unwrap();
    let reference = draft_2020_12(&document);
    let order = json!({
        "order_id": "123e4567-e89b-12d3-a456-426614174000",
        "payment_type": "cash",
        "items": [{"sku": "AB-1", "qty": 2}],
        "contact": "5551234567"
    });
    assert!(reference.is_valid(&order));
    assert!(registry
        .validate("checkout", &order, &ApplyOptions::default())
        .is_ok());

    let text = export::to_json_string(registry.get("checkout").unwrap().validator());
    let reparsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(reparsed, document);
}
