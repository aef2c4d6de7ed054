//! Property-based invariant tests for conditional validation.
//!
//! 1. Errors always equal the failures of the active validators.
//! 2. Writing the same driver value twice leaves validators and errors as
//!    writing it once.
//! 3. Active validators depend only on the current driver value, never on
//!    the order of earlier driver values.
//! 4. The limit/minimum rule only fails under QUANTITY with limit < minimum.
//! 5. Loading an entity and projecting the form back reproduces every scalar
//!    the entity supplied (numbers compared by value).
//! 6. Non-finite numeric text never satisfies a numeric bound.

use painel_forms::validation::{ERROR_CODE_BELOW_MINIMUM, ERROR_CODE_NUMBER, Validator};
use painel_forms::{
    Activation, Coercion, ConditionalPolicy, CrossFieldRule, FieldValue, Form, FormProjection,
    JsonProjection, RuleSet,
};
use painel_runtime::DerivationGraph;
use proptest::prelude::*;
use serde_json::{Map, Value, json};

// ── Strategies ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Kind(&'static str),
    Minimum(String),
    Limit(String),
}

fn kind() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("SINGLE"), Just("MULTI"), Just("QUANTITY"), Just("")]
}

fn number_text() -> impl Strategy<Value = String> {
    prop_oneof![
        (0i32..12).prop_map(|n| n.to_string()),
        Just(String::new()),
        Just("abc".to_string()),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        kind().prop_map(Op::Kind),
        number_text().prop_map(Op::Minimum),
        number_text().prop_map(Op::Limit),
    ]
}

fn form() -> Form {
    let policy = ConditionalPolicy::new("kind", ["minimum", "limit"], |kind| {
        match kind.as_text().as_str() {
            "QUANTITY" => vec![
                Activation::new("minimum", [Validator::Required, Validator::Min(0.0)]),
                Activation::new("limit", [Validator::Required, Validator::Min(1.0)]),
            ],
            "MULTI" => vec![
                Activation::cleared("minimum"),
                Activation::new("limit", [Validator::Min(1.0)]),
            ],
            _ => vec![Activation::cleared("minimum"), Activation::cleared("limit")],
        }
    });
    let rules = RuleSet::new()
        .field_with("kind", "SINGLE", [])
        .field("minimum", [])
        .field("limit", [])
        .policy(policy)
        .cross(CrossFieldRule::at_least("limit", "minimum").when("kind", ["QUANTITY"]));
    Form::new(&DerivationGraph::new(), rules).unwrap()
}

fn apply(form: &Form, op: &Op) {
    match op {
        Op::Kind(k) => form.set("kind", *k).unwrap(),
        Op::Minimum(v) => form.set("minimum", v.as_str()).unwrap(),
        Op::Limit(v) => form.set("limit", v.as_str()).unwrap(),
    }
}

// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn errors_equal_active_failures(ops in proptest::collection::vec(op(), 0..30)) {
        let form = form();
        for op in &ops {
            apply(&form, op);
            let snapshot = form.snapshot();
            for field in ["minimum", "limit"] {
                let expected: Vec<_> = form
                    .active_validators(field)
                    .unwrap()
                    .iter()
                    .filter_map(|v| v.validate(snapshot.get(field), &snapshot).into_error())
                    .collect();
                prop_assert_eq!(form.field_errors(field).unwrap(), expected);
            }
        }
    }
}

proptest! {
    #[test]
    fn driver_reapply_is_idempotent(
        ops in proptest::collection::vec(op(), 0..20),
        driver in kind(),
    ) {
        let form = form();
        for op in &ops {
            apply(&form, op);
        }
        form.set("kind", driver).unwrap();
        let validators = (
            form.active_validators("minimum").unwrap(),
            form.active_validators("limit").unwrap(),
        );
        let errors = (form.errors_for("minimum").unwrap(), form.errors_for("limit").unwrap());

        form.set("kind", driver).unwrap();
        prop_assert_eq!(
            (
                form.active_validators("minimum").unwrap(),
                form.active_validators("limit").unwrap(),
            ),
            validators
        );
        prop_assert_eq!(
            (form.errors_for("minimum").unwrap(), form.errors_for("limit").unwrap()),
            errors
        );
    }
}

proptest! {
    #[test]
    fn active_set_depends_only_on_driver(
        history in proptest::collection::vec(kind(), 0..10),
        last in kind(),
    ) {
        let fresh = form();
        fresh.set("kind", last).unwrap();

        let walked = form();
        for k in history {
            walked.set("kind", k).unwrap();
        }
        walked.set("kind", last).unwrap();

        for field in ["minimum", "limit"] {
            prop_assert_eq!(
                walked.active_validators(field).unwrap(),
                fresh.active_validators(field).unwrap()
            );
        }
    }
}

proptest! {
    #[test]
    fn limit_rule_only_under_quantity(
        driver in kind(),
        minimum in 0i32..12,
        limit in 0i32..12,
    ) {
        let form = form();
        form.set("kind", driver).unwrap();
        form.set("minimum", FieldValue::text(minimum.to_string())).unwrap();
        form.set("limit", FieldValue::text(limit.to_string())).unwrap();

        let failed = form
            .cross_errors()
            .iter()
            .any(|f| f.code == ERROR_CODE_BELOW_MINIMUM);
        prop_assert_eq!(failed, driver == "QUANTITY" && limit < minimum);
    }
}

// ── Projection round trip ─────────────────────────────────────────────────

/// Absent key, explicit `null`, or a value.
fn slot(inner: impl Strategy<Value = Value>) -> impl Strategy<Value = Option<Value>> {
    prop_oneof![Just(None), Just(Some(Value::Null)), inner.prop_map(Some)]
}

fn number() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1000i64..1000).prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|n| json!(n)),
        (-1000i64..1000).prop_map(|n| json!(n as f64)),
    ]
}

fn entity() -> impl Strategy<Value = Value> {
    (
        slot("\\PC{0,8}".prop_map(Value::String)),
        slot(number()),
        slot(any::<bool>().prop_map(Value::Bool)),
        slot((0i64..100_000).prop_map(|n| json!(n))),
    )
        .prop_map(|(texto, valor, ligado, categoria)| {
            let mut map = Map::new();
            for (key, value) in [
                ("texto", texto),
                ("valor", valor),
                ("ligado", ligado),
                ("id_categoria", categoria),
            ] {
                if let Some(value) = value {
                    map.insert(key.to_string(), value);
                }
            }
            Value::Object(map)
        })
}

fn round_trip_projection() -> JsonProjection {
    JsonProjection::new()
        .field("texto", Coercion::Text)
        .field("valor", Coercion::Number)
        .field("ligado", Coercion::Bool)
        .select("categoria", "id_categoria")
}

fn same_scalar(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

proptest! {
    #[test]
    fn entity_survives_form_round_trip(entity in entity()) {
        let rules = RuleSet::new()
            .field("texto", [])
            .field("valor", [])
            .field("ligado", [])
            .field("categoria", []);
        let form = Form::new(&DerivationGraph::new(), rules).unwrap();
        let projection = round_trip_projection();
        for (name, value) in projection.to_fields(&entity) {
            form.load_value(&name, value).unwrap();
        }

        let payload = projection.to_payload(&form.snapshot());
        for (key, original) in entity.as_object().unwrap() {
            let sent = &payload[key.as_str()];
            prop_assert!(
                same_scalar(sent, original),
                "{} sent as {} but loaded as {}", key, sent, original
            );
        }
    }
}

proptest! {
    #[test]
    fn non_finite_text_fails_bounds(
        text in prop_oneof![
            Just("NaN"), Just("nan"), Just("inf"), Just("-inf"),
            Just("infinity"), Just("-Infinity"),
        ],
        bound in -10.0f64..10.0,
    ) {
        let rules = RuleSet::new()
            .field("limite", [Validator::Required, Validator::Min(bound), Validator::Max(bound + 1.0)]);
        let form = Form::new(&DerivationGraph::new(), rules).unwrap();
        form.set("limite", text).unwrap();

        prop_assert!(!form.is_valid());
        let codes: Vec<_> = form.field_errors("limite").unwrap().iter().map(|e| e.code).collect();
        prop_assert_eq!(codes, vec![ERROR_CODE_NUMBER, ERROR_CODE_NUMBER]);
    }
}
