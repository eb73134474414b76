//! Behavioral properties of the full pipeline

use octofhir_cel::eval::{MapKey, MapValue, equals};
use octofhir_cel::{CelEnv, CelType, CheckerOptions, IdentDecl, MapActivation, Value, run};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

fn run_err(source: &str) -> String {
    run(source)
        .expect_err("evaluation fails")
        .message()
        .to_string()
}

// ============================================================================
// Numeric Equality
// ============================================================================

proptest! {
    #[test]
    fn prop_int_double_equality_is_symmetric(i in -(1_i64 << 53)..(1_i64 << 53)) {
        let int = Value::Int(i);
        let double = Value::Double(i as f64);
        prop_assert!(equals(&int, &double));
        prop_assert!(equals(&double, &int));
    }

    #[test]
    fn prop_uint_int_equality_is_symmetric(u in 0_u64..(i64::MAX as u64)) {
        let uint = Value::Uint(u);
        let int = Value::Int(u as i64);
        prop_assert!(equals(&uint, &int));
        prop_assert!(equals(&int, &uint));
    }

    #[test]
    fn prop_numeric_literals_compare_equal(i in 0_i64..1_000_000) {
        prop_assert_eq!(run(&format!("{i} == {i}u")), Ok(Value::Bool(true)));
        prop_assert_eq!(run(&format!("{i}.0 == {i}")), Ok(Value::Bool(true)));
        prop_assert_eq!(run(&format!("{i}u == {i}.0")), Ok(Value::Bool(true)));
    }

    #[test]
    fn prop_integral_double_keys_match_int_keys(i in -1000_i64..1000) {
        let source = format!("{{{i}.0: 'hit'}}[{i}]");
        prop_assert_eq!(run(&source), Ok(Value::from("hit")));
    }
}

#[test]
fn test_nan_is_not_equal_to_itself() {
    let nan = Value::Double(f64::NAN);
    assert!(!equals(&nan, &nan));
}

// ============================================================================
// Map Keys
// ============================================================================

#[test]
fn test_non_integral_double_key_fails() {
    assert_eq!(run_err("{1.5: 'a'}"), "unsupported key type");
    assert_eq!(run_err("{1: 'a'}[1.5]"), "unsupported key type");
}

#[rstest]
#[case("{1.0: 'a'}[1]")]
#[case("{1.0: 'a'}[1u]")]
#[case("{1: 'a'}[1.0]")]
fn test_integral_double_key_is_accepted(#[case] source: &str) {
    assert_eq!(run(source), Ok(Value::from("a")));
}

#[test]
fn test_integral_double_key_is_stored_as_int() {
    let result = run("{2.0: true}").expect("map builds");
    let map = result.as_map().expect("map value");
    assert_eq!(map.get(&MapKey::Int(2)), Some(&Value::Bool(true)));
}

// ============================================================================
// Overflow
// ============================================================================

#[rstest]
#[case("9223372036854775807 + 1", "int overflow during _+_")]
#[case("0u - 1u", "uint overflow during _-_")]
#[case("-(-9223372036854775808)", "int overflow during -_")]
#[case("9223372036854775807 * 2", "int overflow during _*_")]
fn test_overflow_is_an_error(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_err(source), expected);
}

// ============================================================================
// Non-strict Logic
// ============================================================================

#[rstest]
#[case("1 / 0 == 0")]
#[case("unbound")]
#[case("'a' < 1")]
#[case("[1][3]")]
#[case("true")]
fn test_short_circuit_identities(#[case] operand: &str) {
    assert_eq!(run(&format!("false && ({operand})")), Ok(Value::Bool(false)));
    assert_eq!(run(&format!("({operand}) && false")), Ok(Value::Bool(false)));
    assert_eq!(run(&format!("true || ({operand})")), Ok(Value::Bool(true)));
    assert_eq!(run(&format!("({operand}) || true")), Ok(Value::Bool(true)));
}

#[test]
fn test_merged_errors_keep_evaluation_order() {
    let err = run("(1 / 0 == 0) && ([1][3] == 1)").expect_err("both operands fail");
    assert_eq!(err.message(), "int divide by zero");
    assert_eq!(
        err.causes().first().map(|cause| cause.message()),
        Some("index 3 out of bounds [0, 1)")
    );
}

// ============================================================================
// Type Names
// ============================================================================

#[rstest]
#[case("1", "int")]
#[case("1u", "uint")]
#[case("1.5", "double")]
#[case("true", "bool")]
#[case("'s'", "string")]
#[case("b's'", "bytes")]
#[case("null", "null_type")]
#[case("[1]", "list")]
#[case("{'a': 1}", "map")]
#[case("int", "type")]
fn test_type_name_round_trip(#[case] value: &str, #[case] expected: &str) {
    assert_eq!(run(&format!("type({value}).name")), Ok(Value::from(expected)));
}

// ============================================================================
// Comprehensions
// ============================================================================

#[rstest]
#[case("[].all(i, v, v > 0)", true)]
#[case("[].exists(i, v, v > 0)", false)]
#[case("{}.all(k, v, v > 0)", true)]
#[case("{}.exists(k, v, v > 0)", false)]
#[case("[].all(x, x > 0)", true)]
#[case("[].exists(x, x > 0)", false)]
fn test_vacuous_folds(#[case] source: &str, #[case] expected: bool) {
    assert_eq!(run(source), Ok(Value::Bool(expected)));
}

// ============================================================================
// End-to-end
// ============================================================================

#[rstest]
#[case("1 + 1", Value::Int(2))]
#[case("1u + 2u", Value::Uint(3))]
#[case("[1,2,3].exists(x, x > 2)", Value::Bool(true))]
#[case("{'a':1}.a", Value::Int(1))]
fn test_end_to_end(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(run(source), Ok(expected));
}

#[test]
fn test_division_by_zero() {
    assert!(run_err("1/0").contains("divide by zero"));
}

#[test]
fn test_presence_on_unbound_variable_is_an_error() {
    assert_eq!(run_err("has(x.y)"), "unresolved attribute");
}

#[test]
fn test_presence_on_bound_variable() {
    let env = CelEnv::new();
    let x: MapValue = [(MapKey::from("y"), Value::Int(1))].into_iter().collect();
    env.set("x", x);
    assert_eq!(env.run("has(x.y)"), Ok(Value::Bool(true)));
    assert_eq!(env.run("has(x.z)"), Ok(Value::Bool(false)));
}

// ============================================================================
// Environments
// ============================================================================

#[test]
fn test_container_environment() {
    let env = CelEnv::builder()
        .container("acme.config")
        .build()
        .expect("builds");
    env.set("acme.config.limit", 5_i64);
    env.set("limit", 100_i64);
    assert_eq!(env.run("limit"), Ok(Value::Int(5)));
    assert_eq!(env.run(".limit"), Ok(Value::Int(100)));
}

#[test]
fn test_comprehension_variable_shadows_container_binding() {
    let env = CelEnv::builder().container("ns").build().expect("builds");
    env.set("ns.x", 100_i64);
    assert_eq!(
        env.run("[1, 2].map(x, x)"),
        Ok(Value::from(vec![Value::Int(1), Value::Int(2)]))
    );
    assert_eq!(env.run("x"), Ok(Value::Int(100)));
}

#[test]
fn test_top_level_any_is_unpacked() {
    let source = r"google.protobuf.Any{type_url: 'type.googleapis.com/google.protobuf.Int64Value', value: b'\x08\x05'}";
    assert_eq!(run(source), Ok(Value::Int(5)));
}

#[test]
fn test_checked_pipeline() {
    let env = CelEnv::builder()
        .idents([IdentDecl::new("scores", CelType::list(CelType::Int))])
        .checker_options(CheckerOptions::default().with_homogeneous_aggregate_literals(true))
        .build()
        .expect("builds");
    let parsed = env.parse("scores[1] * 2").expect("parses");
    let checked = env.check(&parsed).expect("checks");
    assert_eq!(checked.result_type(), &CelType::Int);

    let plan = env.plan(&checked.expr).expect("plans");
    let vars = MapActivation::new().with("scores", vec![Value::Int(1), Value::Int(4)]);
    assert_eq!(env.eval(&plan, &vars), Ok(Value::Int(8)));
}

#[test]
fn test_check_rejects_undeclared_identifier() {
    let env = CelEnv::new();
    let parsed = env.parse("missing + 1").expect("parses");
    assert!(env.check(&parsed).is_err());
}

#[test]
fn test_plan_is_shared_across_threads() {
    let env = Arc::new(CelEnv::new());
    let parsed = env.parse("[1, 2, 3].map(x, x * n)").expect("parses");
    let plan = Arc::new(env.plan(&parsed.expr).expect("plans"));

    std::thread::scope(|scope| {
        for n in 0..4_i64 {
            let env = Arc::clone(&env);
            let plan = Arc::clone(&plan);
            scope.spawn(move || {
                let vars = MapActivation::new().with("n", n);
                assert_eq!(
                    env.eval(&plan, &vars),
                    Ok(Value::from(vec![
                        Value::Int(n),
                        Value::Int(2 * n),
                        Value::Int(3 * n)
                    ]))
                );
            });
        }
    });
}

#[test]
fn test_concurrent_checks_share_one_environment() {
    let env = CelEnv::builder()
        .idents([IdentDecl::new("x", CelType::Int)])
        .build()
        .expect("builds");
    std::thread::scope(|scope| {
        let sources = ["x + 1", "x == 2", "'s' + string(x)", "[x].size()"];
        for source in sources {
            let env = &env;
            scope.spawn(move || {
                let parsed = env.parse(source).expect("parses");
                assert!(env.check(&parsed).is_ok(), "{source} checks");
            });
        }
    });
}
