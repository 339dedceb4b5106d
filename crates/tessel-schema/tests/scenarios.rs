//! Integration test: end-to-end validation scenarios.
//!
//! Every scenario runs through both backends (the interpreted tree and the
//! lowered closures) and asserts they agree before checking the outcome.

use std::path::PathBuf;

use serde_json::{json, Value};
use tessel_core::{ApplyOptions, ErrorKind, Field, Partial, Schema, ValidationError};
use tessel_schema::{CodegenCompiler, SchemaCompiler};

fn run(schema: &Schema, data: &Value, options: &ApplyOptions) -> Result<Value, ValidationError> {
    let tree = SchemaCompiler::new().compile(schema).unwrap();
    let lowered = CodegenCompiler::new().compile(schema).unwrap();
    let interpreted = tree.apply(data, options);
    let compiled = lowered.apply(data, options);
    assert_eq!(interpreted, compiled, "backends disagree on {data}");
    interpreted
}

fn check(schema: &Schema, data: Value) -> Result<Value, ValidationError> {
    run(schema, &data, &ApplyOptions::default())
}

fn fixture(name: &str) -> Schema {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    Schema::from_path(&path).unwrap()
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

#[test]
fn test_age_bounds() {
    let schema = Schema::record(vec![Field::required(
        "age",
        Schema::integer().constrained("min=18; max=120"),
    )]);

    let err = check(&schema, json!({"age": 17})).unwrap_err();
    assert_eq!(err.len(), 1);
    let v = err.at_path("age").unwrap();
    assert_eq!(v.kind, ErrorKind::RangeViolation);
    assert!(v.message.contains("18"), "message: {}", v.message);
    assert!(v.message.contains("minimum"), "message: {}", v.message);

    assert_eq!(check(&schema, json!({"age": 18})).unwrap(), json!({"age": 18}));
    assert_eq!(check(&schema, json!({"age": 120})).unwrap(), json!({"age": 120}));
    let err = check(&schema, json!({"age": 121})).unwrap_err();
    assert!(err.has_kind(ErrorKind::RangeViolation));
}

#[test]
fn test_username_pattern() {
    let schema = Schema::record(vec![Field::required(
        "username",
        Schema::text().constrained("pattern=^[a-z0-9_]+$"),
    )]);
    let err = check(&schema, json!({"username": "Invalid!"})).unwrap_err();
    assert_eq!(err.at_path("username").unwrap().kind, ErrorKind::PatternMismatch);
    assert_eq!(
        check(&schema, json!({"username": "valid_1"})).unwrap(),
        json!({"username": "valid_1"})
    );
}

#[test]
fn test_nested_float_path() {
    let schema = Schema::record(vec![Field::required(
        "location",
        Schema::record(vec![Field::required(
            "lat",
            Schema::float().constrained("min=-90; max=90"),
        )]),
    )]);
    let err = check(&schema, json!({"location": {"lat": 100}})).unwrap_err();
    let v = err.at_path("location.lat").unwrap();
    assert_eq!(v.kind, ErrorKind::RangeViolation);

    let out = check(&schema, json!({"location": {"lat": 45}})).unwrap();
    assert_eq!(out, json!({"location": {"lat": 45.0}}));
}

#[test]
fn test_integer_normalization() {
    let schema = Schema::integer();
    assert_eq!(check(&schema, json!(3.0)).unwrap(), json!(3));
    let err = check(&schema, json!(3.5)).unwrap_err();
    assert!(err.has_kind(ErrorKind::TypeMismatch));
    let err = check(&schema, json!(true)).unwrap_err();
    assert!(err.has_kind(ErrorKind::TypeMismatch));
}

#[test]
fn test_step_and_exclusive_bounds() {
    let schema = Schema::float().constrained("exclusive_min=0; exclusive_max=100; step=0.5");
    assert!(check(&schema, json!(10.5)).is_ok());
    assert!(check(&schema, json!(99.5)).is_ok());
    assert!(check(&schema, json!(0)).unwrap_err().has_kind(ErrorKind::ExclusiveRangeViolation));
    assert!(check(&schema, json!(100)).unwrap_err().has_kind(ErrorKind::ExclusiveRangeViolation));
    assert!(check(&schema, json!(10.25)).unwrap_err().has_kind(ErrorKind::StepViolation));

    let tenths = Schema::float().constrained("multiple_of=0.1");
    assert!(check(&tenths, json!(0.3)).is_ok());
}

#[test]
fn test_scalar_checks_are_fail_fast() {
    let schema = Schema::text().constrained("min_length=5; pattern=^[0-9]+$");
    let err = check(&schema, json!("ab")).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.violations()[0].kind, ErrorKind::LengthViolation);
}

#[test]
fn test_text_length_counts_code_points() {
    let schema = Schema::text().constrained("max_len=3");
    assert!(check(&schema, json!("déjà")).is_err());
    assert!(check(&schema, json!("été")).is_ok());
}

#[test]
fn test_formats() {
    let email = Schema::text().constrained("format=email");
    assert!(check(&email, json!("a@b.c")).is_ok());
    let err = check(&email, json!("nobody")).unwrap_err();
    assert_eq!(err.violations()[0].kind, ErrorKind::FormatViolation);

    let ip = Schema::text().constrained("format=ipv4");
    assert!(check(&ip, json!("10.0.0.1")).is_ok());
    assert!(check(&ip, json!("10.0.0.300")).is_err());
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

#[test]
fn test_unique_tags() {
    let schema = Schema::record(vec![Field::required(
        "tags",
        Schema::sequence(Schema::text()).constrained("unique"),
    )]);
    let err = check(&schema, json!({"tags": ["a", "a"]})).unwrap_err();
    assert_eq!(err.at_path("tags").unwrap().kind, ErrorKind::UniquenessViolation);
    assert!(check(&schema, json!({"tags": ["a", "b"]})).is_ok());
}

#[test]
fn test_sequence_aggregates_element_errors() {
    let schema = Schema::sequence(Schema::integer().constrained("min=0"));
    let err = check(&schema, json!([1, -1, "x", -3])).unwrap_err();
    assert_eq!(err.len(), 3);
    assert_eq!(err.at_path("[1]").unwrap().kind, ErrorKind::RangeViolation);
    assert_eq!(err.at_path("[2]").unwrap().kind, ErrorKind::TypeMismatch);
    assert!(err.at_path("[3]").is_some());
}

#[test]
fn test_sequence_own_checks_precede_elements() {
    let schema = Schema::sequence(Schema::integer()).constrained("min_items=3");
    let err = check(&schema, json!(["x"])).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.violations()[0].kind, ErrorKind::LengthViolation);
}

#[test]
fn test_contains() {
    let schema = Schema::sequence(Schema::integer()).constrained("contains='min=10'");
    assert!(check(&schema, json!([1, 2, 12])).is_ok());
    let err = check(&schema, json!([1, 2, 3])).unwrap_err();
    assert_eq!(err.violations()[0].kind, ErrorKind::ContainsViolation);
}

#[test]
fn test_tuple_arity() {
    let schema = Schema::record(vec![Field::required(
        "point",
        Schema::tuple(vec![Schema::integer(), Schema::integer()]),
    )]);
    let err = check(&schema, json!({"point": [1]})).unwrap_err();
    let v = err.at_path("point").unwrap();
    assert_eq!(v.kind, ErrorKind::ArityMismatch);
    assert!(v.message.contains('2'), "message: {}", v.message);

    let err = check(&schema, json!({"point": ["a", "b"]})).unwrap_err();
    assert!(err.at_path("point[0]").is_some());
    assert!(err.at_path("point[1]").is_some());
}

#[test]
fn test_record_requirements() {
    let schema = Schema::record(vec![
        Field::required("id", Schema::integer()),
        Field::required("name", Schema::text()),
        Field::optional("nickname", Schema::text().constrained("min_length=2")),
    ]);
    let err = check(&schema, json!({"name": null})).unwrap_err();
    assert_eq!(err.len(), 2);
    assert_eq!(err.violations()[0].path, "id");
    assert_eq!(err.violations()[1].path, "name");
    assert!(err.violations().iter().all(|v| v.kind == ErrorKind::RequiredFieldMissing));

    let out = check(&schema, json!({"id": 1, "name": "n", "nickname": null})).unwrap();
    assert_eq!(out, json!({"id": 1, "name": "n", "nickname": null}));
}

#[test]
fn test_strict_and_min_properties() {
    let schema = Schema::record(vec![
        Field::optional("a", Schema::integer()),
        Field::optional("b", Schema::integer()),
    ])
    .constrained("strict; min_props=1");
    let err = check(&schema, json!({"a": 1, "c": 2})).unwrap_err();
    assert_eq!(err.at_path("c").unwrap().kind, ErrorKind::UnknownFieldRejected);
    let err = check(&schema, json!({})).unwrap_err();
    assert_eq!(err.violations()[0].kind, ErrorKind::MinPropertiesViolation);

    let closed = Schema::record(vec![Field::optional("a", Schema::integer())])
        .constrained("additional_properties=false");
    assert!(check(&closed, json!({"x": 1})).unwrap_err().has_kind(ErrorKind::UnknownFieldRejected));
    let open = Schema::record(vec![Field::optional("a", Schema::integer())]);
    assert_eq!(check(&open, json!({"x": 1})).unwrap(), json!({"x": 1}));
}

#[test]
fn test_conditional_required() {
    let schema = Schema::record(vec![
        Field::required("payment_type", Schema::text()),
        Field::optional(
            "card_number",
            Schema::text().constrained("payment_type==credit ? required"),
        ),
    ]);
    let err = check(&schema, json!({"payment_type": "credit"})).unwrap_err();
    let v = err.at_path("card_number").unwrap();
    assert_eq!(v.kind, ErrorKind::ConditionalRequiredMissing);
    assert!(check(&schema, json!({"payment_type": "cash"})).is_ok());
    assert!(check(&schema, json!({"payment_type": "credit", "card_number": "4111"})).is_ok());
}

#[test]
fn test_conditional_constraint_uses_sibling_context() {
    let schema = Schema::record(vec![
        Field::required("country", Schema::text()),
        Field::required(
            "zip",
            Schema::text().constrained("country==US ? pattern='^[0-9]{5}$'"),
        ),
    ]);
    assert!(check(&schema, json!({"country": "US", "zip": "12345"})).is_ok());
    let err = check(&schema, json!({"country": "US", "zip": "A1B"})).unwrap_err();
    assert_eq!(err.at_path("zip").unwrap().kind, ErrorKind::PatternMismatch);
    assert!(check(&schema, json!({"country": "CA", "zip": "A1B"})).is_ok());

    // Without a record around it the condition never holds.
    let bare = Schema::text().constrained("country==US ? min_length=5");
    assert!(check(&bare, json!("abc")).is_ok());
}

#[test]
fn test_sequence_items_do_not_see_enclosing_record() {
    let schema = Schema::record(vec![
        Field::required("kind", Schema::text()),
        Field::required(
            "tags",
            Schema::sequence(Schema::text().constrained("kind==x ? min_length=3")),
        ),
        Field::optional(
            "pair",
            Schema::tuple(vec![Schema::text().constrained("kind==x ? min_length=3")]),
        ),
    ]);
    let out = check(&schema, json!({"kind": "x", "tags": ["ab"], "pair": ["ab"]})).unwrap();
    assert_eq!(out["tags"], json!(["ab"]));

    // A record item still sees its own fields.
    let rows = Schema::sequence(Schema::record(vec![
        Field::required("kind", Schema::text()),
        Field::required("name", Schema::text().constrained("kind==x ? min_length=3")),
    ]));
    let err = check(&rows, json!([{"kind": "y", "name": "ab"}, {"kind": "x", "name": "ab"}]))
        .unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.violations()[0].path, "[1].name");
    assert_eq!(err.violations()[0].kind, ErrorKind::LengthViolation);
}

// ---------------------------------------------------------------------------
// Unions and literals
// ---------------------------------------------------------------------------

#[test]
fn test_any_of_returns_first_match() {
    let schema = Schema::union(vec![Schema::float(), Schema::integer()]);
    // Both alternatives accept 3; the float alternative is declared first.
    assert_eq!(check(&schema, json!(3)).unwrap(), json!(3.0));
    let schema = Schema::union(vec![Schema::integer(), Schema::float()]);
    assert_eq!(check(&schema, json!(3.0)).unwrap(), json!(3));
    let err = check(&schema, json!("x")).unwrap_err();
    assert_eq!(err.violations()[0].kind, ErrorKind::UnionNoMatch);
}

#[test]
fn test_one_of_requires_exactly_one() {
    let schema = Schema::union(vec![
        Schema::integer().constrained("max=10"),
        Schema::integer().constrained("min=5"),
    ])
    .constrained("one_of");
    assert_eq!(check(&schema, json!(2)).unwrap(), json!(2));
    assert_eq!(check(&schema, json!(20)).unwrap(), json!(20));
    assert!(check(&schema, json!(7)).unwrap_err().has_kind(ErrorKind::UnionAmbiguousMatch));
    assert!(check(&schema, json!("x")).unwrap_err().has_kind(ErrorKind::UnionNoMatch));
}

#[test]
fn test_literals() {
    let role = Schema::literal(vec![json!("admin"), json!("user")]);
    assert!(check(&role, json!("admin")).is_ok());
    assert!(check(&role, json!("root")).unwrap_err().has_kind(ErrorKind::LiteralMismatch));

    let version = Schema::literal(vec![json!(1), json!(2)]);
    assert_eq!(check(&version, json!(1.0)).unwrap(), json!(1.0));

    let null_only = Schema::literal(vec![]);
    assert!(check(&null_only, Value::Null).is_ok());
    assert!(check(&null_only, json!(0)).unwrap_err().has_kind(ErrorKind::TypeMismatch));
}

// ---------------------------------------------------------------------------
// Wrappers
// ---------------------------------------------------------------------------

#[test]
fn test_negation_and_disjunction() {
    let schema = Schema::text().constrained("!pattern='^admin'");
    assert!(check(&schema, json!("alice")).is_ok());
    let err = check(&schema, json!("admin1")).unwrap_err();
    assert_eq!(err.violations()[0].kind, ErrorKind::NegationViolation);

    let schema = Schema::text().constrained("format=email | pattern='^[0-9]{10}$'");
    assert!(check(&schema, json!("a@b.c")).is_ok());
    assert!(check(&schema, json!("5551234567")).is_ok());
    let err = check(&schema, json!("nope")).unwrap_err();
    let v = &err.violations()[0];
    assert_eq!(v.kind, ErrorKind::DisjunctionFailure);
    assert_eq!(v.causes.len(), 2);
    assert_eq!(v.causes[0].kind, ErrorKind::FormatViolation);
    assert_eq!(v.causes[1].kind, ErrorKind::PatternMismatch);
}

#[test]
fn test_composite_returns_base_output() {
    let schema = Schema::integer().constrained("min=0; !max=5");
    assert_eq!(check(&schema, json!(6.0)).unwrap(), json!(6));
    assert!(check(&schema, json!(3)).unwrap_err().has_kind(ErrorKind::NegationViolation));
    assert!(check(&schema, json!(-1)).unwrap_err().has_kind(ErrorKind::RangeViolation));
}

// ---------------------------------------------------------------------------
// Runtime options
// ---------------------------------------------------------------------------

fn nested_strip_schema(schema_strip: bool) -> Schema {
    let outer = Schema::record(vec![Field::required(
        "inner",
        Schema::record(vec![Field::required("x", Schema::integer())]),
    )]);
    if schema_strip {
        outer.constrained("strip")
    } else {
        outer
    }
}

#[test]
fn test_schema_strip_is_local() {
    let input = json!({"inner": {"x": 1, "extra_inner": "v"}, "extra_outer": "v"});
    let out = run(&nested_strip_schema(true), &input, &ApplyOptions::default()).unwrap();
    assert_eq!(out, json!({"inner": {"x": 1, "extra_inner": "v"}}));
}

#[test]
fn test_runtime_strip_propagates() {
    let input = json!({"inner": {"x": 1, "extra_inner": "v"}, "extra_outer": "v"});
    let out = run(&nested_strip_schema(false), &input, &ApplyOptions::strip()).unwrap();
    assert_eq!(out, json!({"inner": {"x": 1}}));

    let rows = Schema::sequence(Schema::record(vec![Field::required("id", Schema::integer())]));
    let out = run(&rows, &json!([{"id": 1, "junk": true}]), &ApplyOptions::strip()).unwrap();
    assert_eq!(out, json!([{"id": 1}]));
}

#[test]
fn test_partial_modes() {
    let schema = Schema::record(vec![
        Field::required("name", Schema::text()),
        Field::required(
            "address",
            Schema::record(vec![
                Field::required("city", Schema::text()),
                Field::required("zip", Schema::text()),
            ]),
        ),
    ]);
    let input = json!({"address": {"city": "Oslo"}});

    let err = run(&schema, &input, &ApplyOptions::default()).unwrap_err();
    assert_eq!(err.len(), 2);

    assert!(run(&schema, &input, &ApplyOptions::partial(Partial::All)).is_ok());

    let options = ApplyOptions::partial(Partial::paths(["address.zip"]));
    let err = run(&schema, &input, &options).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.violations()[0].path, "name");

    let options = ApplyOptions::partial(Partial::paths(["name", "address.zip", "no.such.path"]));
    assert!(run(&schema, &input, &options).is_ok());
}

#[test]
fn test_partial_all_relaxes_conditional_requirements() {
    let schema = Schema::record(vec![
        Field::required("payment_type", Schema::text()),
        Field::optional(
            "card_number",
            Schema::text().constrained("payment_type==credit ? required"),
        ),
    ]);
    let input = json!({"payment_type": "credit"});
    assert!(run(&schema, &input, &ApplyOptions::partial(Partial::All)).is_ok());
}

#[test]
fn test_revalidation_is_idempotent() {
    let schema = Schema::record(vec![
        Field::required("count", Schema::integer()),
        Field::required("ratio", Schema::float()),
        Field::required("tags", Schema::sequence(Schema::text())),
    ]);
    let input = json!({"count": 4.0, "ratio": 1, "tags": ["a"], "extra": {}});
    for options in [ApplyOptions::default(), ApplyOptions::strip()] {
        let once = run(&schema, &input, &options).unwrap();
        let twice = run(&schema, &once, &options).unwrap();
        assert_eq!(once, twice);
    }
}

// ---------------------------------------------------------------------------
// Descriptor documents
// ---------------------------------------------------------------------------

#[test]
fn test_checkout_fixture() {
    let schema = fixture("checkout.yaml");
    let ok = json!({
        "order_id": "123e4567-e89b-12d3-a456-426614174000",
        "payment_type": "credit",
        "card_number": "4111111111111111",
        "items": [{"sku": "AB-1", "qty": 2}],
        "contact": "buyer@example.com"
    });
    assert!(check(&schema, ok).is_ok());

    let bad = json!({
        "order_id": "not-a-uuid",
        "payment_type": "credit",
        "items": [{"sku": "AB-1", "qty": 0}, {"sku": "AB-1", "qty": 0}],
        "contact": "nowhere"
    });
    let err = check(&schema, bad).unwrap_err();
    assert_eq!(err.at_path("order_id").unwrap().kind, ErrorKind::FormatViolation);
    assert_eq!(err.at_path("card_number").unwrap().kind, ErrorKind::ConditionalRequiredMissing);
    assert_eq!(err.at_path("items").unwrap().kind, ErrorKind::UniquenessViolation);
    assert_eq!(err.at_path("contact").unwrap().kind, ErrorKind::DisjunctionFailure);
}

#[test]
fn test_json_fixture_matches_builders() {
    let loaded = fixture("user.json");
    let built = Schema::record(vec![
        Field::required("username", Schema::text().constrained("pattern='^[a-z0-9_]+$'")),
        Field::required("age", Schema::integer().constrained("min=18; max=120")),
        Field::optional("role", Schema::literal(vec![json!("admin"), json!("user")])),
    ])
    .constrained("strict");
    assert_eq!(loaded, built);
}
