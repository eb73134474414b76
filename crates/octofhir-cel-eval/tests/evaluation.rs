//! End-to-end evaluation tests: parse, plan and evaluate source text

use octofhir_cel_ast::{ComprehensionExpr, Expr};
use octofhir_cel_eval::{
    Activation, CelResult, EmptyActivation, MapActivation, MapKey, MapValue, OrderedDispatcher,
    Planner, Value,
};
use octofhir_cel_model::ProtoRegistry;
use octofhir_cel_types::Namespace;
use pretty_assertions::assert_eq;
use prost_reflect::prost_types::field_descriptor_proto::{Label, Type};
use prost_reflect::prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use rstest::rstest;
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

fn account_file() -> FileDescriptorProto {
    let field = |name: &str, number: i32, ty: Type, type_name: Option<&str>| FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(str::to_string),
        ..Default::default()
    };
    FileDescriptorProto {
        name: Some("acme/v1/account.proto".to_string()),
        package: Some("acme.v1".to_string()),
        dependency: vec![
            "google/protobuf/wrappers.proto".to_string(),
            "google/protobuf/any.proto".to_string(),
        ],
        message_type: vec![DescriptorProto {
            name: Some("Account".to_string()),
            field: vec![
                field("id", 1, Type::Int64, None),
                field("name", 2, Type::String, None),
                field(
                    "balance",
                    3,
                    Type::Message,
                    Some(".google.protobuf.Int64Value"),
                ),
                field("details", 4, Type::Message, Some(".google.protobuf.Any")),
            ],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn planner(container: &str) -> Planner {
    let mut registry = ProtoRegistry::new();
    registry
        .register_file(account_file())
        .expect("fixture registers");
    Planner::new(
        OrderedDispatcher::standard(),
        Arc::new(registry),
        Namespace::new(container),
    )
}

fn eval_in(container: &str, source: &str, vars: &dyn Activation) -> CelResult {
    let parsed = octofhir_cel_parser::parse(source).expect("source parses");
    planner(container)
        .plan(&parsed.expr)
        .expect("expression plans")
        .eval(vars)
}

fn eval_with(source: &str, vars: &dyn Activation) -> CelResult {
    eval_in("", source, vars)
}

fn eval(source: &str) -> CelResult {
    eval_with(source, &EmptyActivation)
}

fn eval_err(source: &str) -> String {
    eval(source)
        .expect_err("evaluation fails")
        .message()
        .to_string()
}

fn list(values: impl IntoIterator<Item = i64>) -> Value {
    Value::from(values.into_iter().map(Value::Int).collect::<Vec<_>>())
}

// ============================================================================
// Arithmetic
// ============================================================================

#[rstest]
#[case("1 + 2 * 3", Value::Int(7))]
#[case("7 / 2", Value::Int(3))]
#[case("-7 / 2", Value::Int(-3))]
#[case("7 % 3", Value::Int(1))]
#[case("1u + 2u", Value::Uint(3))]
#[case("1.5 * 2.0", Value::Double(3.0))]
#[case("-(3 - 5)", Value::Int(2))]
#[case("'ab' + 'cd'", Value::from("abcd"))]
#[case("b'a' + b'b'", Value::from("ab".as_bytes()))]
fn test_arithmetic(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

#[test]
fn test_list_concatenation() {
    assert_eq!(eval("[1] + [2, 3]"), Ok(list([1, 2, 3])));
}

#[rstest]
#[case("9223372036854775807 + 1", "int overflow during _+_")]
#[case("-9223372036854775808 - 1", "int overflow during _-_")]
#[case("1u - 2u", "uint overflow during _-_")]
#[case("1 / 0", "int divide by zero")]
#[case("1 % 0", "int modulus by zero")]
#[case(
    "1 + 1u",
    "found no matching overload for '_+_' applied to '(int, uint)'"
)]
fn test_arithmetic_errors(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval_err(source), expected);
}

#[test]
fn test_error_carries_expression_id() {
    let parsed = octofhir_cel_parser::parse("1 / 0").expect("source parses");
    let err = planner("")
        .plan(&parsed.expr)
        .expect("expression plans")
        .eval(&EmptyActivation)
        .expect_err("division fails");
    assert_eq!(err.expr_id(), Some(parsed.expr.id));
}

// ============================================================================
// Equality and Ordering
// ============================================================================

#[rstest]
#[case("1 == 1.0", true)]
#[case("1u == 1", true)]
#[case("'a' == 1", false)]
#[case("null == null", true)]
#[case("[1, 2] == [1.0, 2u]", true)]
#[case("{'a': 1} == {'a': 1.0}", true)]
#[case("[1] != [1, 2]", true)]
#[case("1 < 2.5", true)]
#[case("2u > 1", true)]
#[case("'a' < 'b'", true)]
#[case("b'a' < b'b'", true)]
#[case("true > false", true)]
#[case("3 >= 3u", true)]
fn test_comparison(#[case] source: &str, #[case] expected: bool) {
    assert_eq!(eval(source), Ok(Value::Bool(expected)));
}

#[test]
fn test_ordering_across_kinds_fails() {
    assert_eq!(
        eval_err("1 < 'a'"),
        "found no matching overload for '_<_' applied to '(int, string)'"
    );
}

// ============================================================================
// Logical Operators
// ============================================================================

#[rstest]
#[case("false && 1 / 0 == 1", false)]
#[case("1 / 0 == 1 && false", false)]
#[case("true || 1 / 0 == 1", true)]
#[case("1 / 0 == 1 || true", true)]
#[case("!false", true)]
fn test_logical_absorbs_errors(#[case] source: &str, #[case] expected: bool) {
    assert_eq!(eval(source), Ok(Value::Bool(expected)));
}

#[test]
fn test_logical_absorbs_unbound_variable() {
    assert_eq!(eval("x || true"), Ok(Value::Bool(true)));
    assert_eq!(eval("false && x"), Ok(Value::Bool(false)));
}

#[rstest]
#[case("1 / 0 == 1 && true")]
#[case("true && 1 / 0 == 1")]
#[case("1 / 0 == 1 || false")]
fn test_logical_propagates_errors(#[case] source: &str) {
    assert_eq!(eval_err(source), "int divide by zero");
}

#[rstest]
#[case("true ? 1 : 1 / 0", Value::Int(1))]
#[case("false ? 1 / 0 : 2", Value::Int(2))]
fn test_conditional(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

#[test]
fn test_conditional_requires_bool() {
    assert!(eval_err("1 ? 2 : 3").starts_with("found no matching overload for '_?_:_'"));
}

// ============================================================================
// Aggregates and Access
// ============================================================================

#[rstest]
#[case("[1, 2, 3][1]", Value::Int(2))]
#[case("{'a': 1}['a']", Value::Int(1))]
#[case("{'a': 1}.a", Value::Int(1))]
#[case("{'a': {'b': 2}}.a.b", Value::Int(2))]
#[case("{1: 'one'}[1u]", Value::from("one"))]
#[case("{1: 'one'}[1.0]", Value::from("one"))]
#[case("2 in [1, 2, 3]", Value::Bool(true))]
#[case("'a' in {'a': 1}", Value::Bool(true))]
#[case("3 in {1: 'a'}", Value::Bool(false))]
#[case("size([1, 2]) + {'a': 1}.size()", Value::Int(3))]
fn test_access(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

#[rstest]
#[case("[1][5]", "index 5 out of bounds [0, 1)")]
#[case("{'a': 1}['b']", "no such key: b")]
#[case("{'a': 1}.b", "no such key: b")]
#[case("{'a': 1, 'a': 2}", "map key conflict: a")]
fn test_access_errors(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval_err(source), expected);
}

#[test]
fn test_map_literal_preserves_entries() {
    let expected: MapValue = [
        (MapKey::from("x"), Value::Int(1)),
        (MapKey::from("y"), Value::Bool(true)),
    ]
    .into_iter()
    .collect();
    assert_eq!(eval("{'x': 1, 'y': true}"), Ok(Value::from(expected)));
}

#[rstest]
#[case("has({'a': 1}.a)", true)]
#[case("has({'a': 1}.b)", false)]
#[case("has({'a': {'b': 1}}.a.b)", true)]
fn test_presence(#[case] source: &str, #[case] expected: bool) {
    assert_eq!(eval(source), Ok(Value::Bool(expected)));
}

// ============================================================================
// Strings
// ============================================================================

#[rstest]
#[case("'hello'.size()", Value::Int(5))]
#[case("size('héllo')", Value::Int(5))]
#[case("'hello'.contains('ell')", Value::Bool(true))]
#[case("'hello'.startsWith('he')", Value::Bool(true))]
#[case("'hello'.endsWith('lo')", Value::Bool(true))]
#[case("'abc123'.matches('[0-9]+')", Value::Bool(true))]
#[case("'abc'.matches('^b')", Value::Bool(false))]
fn test_string_functions(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

// ============================================================================
// Macros
// ============================================================================

#[rstest]
#[case("[1, 2, 3].all(x, x > 0)", Value::Bool(true))]
#[case("[1, 2, 3].all(x, x > 1)", Value::Bool(false))]
#[case("[1, 2, 3].exists(x, x > 2)", Value::Bool(true))]
#[case("[1, 2, 3].exists_one(x, x > 1)", Value::Bool(false))]
#[case("[1, 2, 3].exists_one(x, x > 2)", Value::Bool(true))]
#[case("{'a': 1, 'b': 2}.all(k, k != 'c')", Value::Bool(true))]
#[case("{'a': 1}.exists(k, v, k == 'a' && v == 1)", Value::Bool(true))]
#[case("['a', 'b'].all(i, v, i < 2 && v != '')", Value::Bool(true))]
#[case("[0, 1].exists(x, 1 / x == 1)", Value::Bool(true))]
#[case("[1, 0].all(x, 1 / x > 5)", Value::Bool(false))]
fn test_quantifiers(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

#[rstest]
#[case("[1, 2, 3].map(x, x * 2)", list([2, 4, 6]))]
#[case("[1, 2, 3].filter(x, x % 2 == 1)", list([1, 3]))]
#[case("[1, 2, 3].map(x, x > 1, x * 10)", list([20, 30]))]
#[case("[].map(x, x)", list([]))]
fn test_transforms(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

#[test]
fn test_quantifier_error_without_deciding_element() {
    assert_eq!(eval_err("[0, 1].all(x, 1 / x > 0)"), "int divide by zero");
}

#[test]
fn test_macro_over_variable() {
    let vars = MapActivation::new().with("items", list([4, 5, 6]));
    assert_eq!(
        eval_with("items.filter(i, i > 4).map(i, i - 4)", &vars),
        Ok(list([1, 2]))
    );
}

// ============================================================================
// Optional Values
// ============================================================================

#[rstest]
#[case("{'a': 1}.?a.hasValue()", Value::Bool(true))]
#[case("{'a': 1}.?b.hasValue()", Value::Bool(false))]
#[case("{'a': 1}.?a.value()", Value::Int(1))]
#[case("{'a': 1}.?b.orValue(5)", Value::Int(5))]
#[case("[1, 2][?5].hasValue()", Value::Bool(false))]
#[case("[1, 2][?0].value()", Value::Int(1))]
fn test_optional_access(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

#[test]
fn test_optional_aggregate_entries() {
    assert_eq!(eval("[?{'a': 1}.?b, 2]"), Ok(list([2])));
    let expected: MapValue = [(MapKey::from("x"), Value::Int(1))].into_iter().collect();
    assert_eq!(
        eval("{?'x': {'a': 1}.?a, ?'y': {'a': 1}.?b}"),
        Ok(Value::from(expected))
    );
}

#[test]
fn test_empty_optional_dereference() {
    assert_eq!(eval_err("{'a': 1}.?b.value()"), "optional.none() dereference");
}

// ============================================================================
// Conversions and Types
// ============================================================================

#[rstest]
#[case("int('42')", Value::Int(42))]
#[case("int(2.9)", Value::Int(2))]
#[case("uint(7)", Value::Uint(7))]
#[case("double(1)", Value::Double(1.0))]
#[case("string(1.5)", Value::from("1.5"))]
#[case("bytes('hi')", Value::from("hi".as_bytes()))]
#[case("bool('true')", Value::Bool(true))]
#[case("dyn(1) + 1", Value::Int(2))]
fn test_conversions(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), Ok(expected));
}

#[rstest]
#[case("uint(-1)", "uint return error for overflow during uint")]
#[case("int(18446744073709551615u)", "int return error for overflow during int")]
#[case("int('x')", "Unable to convert string 'x' to int")]
fn test_conversion_errors(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval_err(source), expected);
}

#[rstest]
#[case("type(1) == int", true)]
#[case("type('a') == string", true)]
#[case("type(1u) == int", false)]
#[case("type(type(1)) == type", true)]
#[case("type([1]) == list", true)]
fn test_type_values(#[case] source: &str, #[case] expected: bool) {
    assert_eq!(eval(source), Ok(Value::Bool(expected)));
}

#[test]
fn test_type_name() {
    assert_eq!(eval("type('a').name"), Ok(Value::from("string")));
}

#[test]
fn test_comprehension_variables_shadow_container_names() {
    let vars = MapActivation::new()
        .with("ns.x", 100_i64)
        .with("ns.y", 1_i64);
    assert_eq!(
        eval_in("ns", "[1, 2].map(x, x)", &vars),
        Ok(list([1, 2]))
    );
    assert_eq!(
        eval_in("ns", "[1, 2].map(x, x + y)", &vars),
        Ok(list([2, 3]))
    );
    assert_eq!(
        eval_in("ns", "{'a': 5}.all(x, y, x == 'a' && y == 5)", &vars),
        Ok(Value::Bool(true))
    );
}

#[test]
fn test_fold_condition_error_ends_evaluation() {
    let parse = |source: &str| {
        octofhir_cel_parser::parse(source)
            .expect("source parses")
            .expr
    };
    let fold = Expr::comprehension(
        100,
        ComprehensionExpr {
            iter_var: "x".to_string(),
            iter_var2: None,
            iter_range: parse("[1]"),
            accu_var: "@result".to_string(),
            accu_init: parse("7"),
            loop_condition: parse("1 / 0 > 0"),
            loop_step: Expr::ident(101, "@result"),
            result: Expr::ident(102, "@result"),
        },
    );
    let result = planner("")
        .plan(&fold)
        .expect("expression plans")
        .eval(&EmptyActivation);
    assert_eq!(
        result.expect_err("condition fails").message(),
        "int divide by zero"
    );
}

// ============================================================================
// Variables and Name Resolution
// ============================================================================

#[test]
fn test_variables() {
    let vars = MapActivation::new().with("x", 6_i64).with("name", "cel");
    assert_eq!(eval_with("x * 2 > 10", &vars), Ok(Value::Bool(true)));
    assert_eq!(eval_with("name + '!'", &vars), Ok(Value::from("cel!")));
}

#[test]
fn test_unbound_variable() {
    assert_eq!(eval_err("missing + 1"), "unresolved attribute");
}

#[test]
fn test_qualified_variable() {
    let vars = MapActivation::new().with("a.b.c", 1_i64);
    assert_eq!(eval_with("a.b.c", &vars), Ok(Value::Int(1)));
}

#[test]
fn test_qualified_variable_falls_back_to_selection() {
    let inner: MapValue = [(MapKey::from("c"), Value::Int(2))].into_iter().collect();
    let vars = MapActivation::new().with("a.b", inner);
    assert_eq!(eval_with("a.b.c", &vars), Ok(Value::Int(2)));
}

#[test]
fn test_container_resolution() {
    let vars = MapActivation::new()
        .with("acme.x", 1_i64)
        .with("x", 2_i64)
        .with("y", 3_i64);
    assert_eq!(eval_in("acme", "x + y", &vars), Ok(Value::Int(4)));
    assert_eq!(eval_in("acme", ".x", &vars), Ok(Value::Int(2)));
}

// ============================================================================
// Messages
// ============================================================================

#[test]
fn test_message_construction_and_selection() {
    assert_eq!(
        eval("acme.v1.Account{id: 7, name: 'ada'}.name"),
        Ok(Value::from("ada"))
    );
    assert_eq!(
        eval_in("acme.v1", "Account{id: 7}.id", &EmptyActivation),
        Ok(Value::Int(7))
    );
}

#[test]
fn test_message_defaults() {
    assert_eq!(eval("acme.v1.Account{}.id"), Ok(Value::Int(0)));
    assert_eq!(eval("acme.v1.Account{}.balance"), Ok(Value::Null));
    assert_eq!(eval("has(acme.v1.Account{}.name)"), Ok(Value::Bool(false)));
    assert_eq!(
        eval("has(acme.v1.Account{name: 'x'}.name)"),
        Ok(Value::Bool(true))
    );
}

#[test]
fn test_message_wrapper_field() {
    assert_eq!(
        eval("acme.v1.Account{balance: 12}.balance"),
        Ok(Value::Int(12))
    );
}

// ============================================================================
// Any
// ============================================================================

const PACKED_INT: &str =
    r"google.protobuf.Any{type_url: 'type.googleapis.com/google.protobuf.Int64Value', value: b'\x08\x05'}";

#[test]
fn test_any_equals_its_payload() {
    assert_eq!(eval(&format!("{PACKED_INT} == 5")), Ok(Value::Bool(true)));
    assert_eq!(eval(&format!("6 == {PACKED_INT}")), Ok(Value::Bool(false)));
}

#[test]
fn test_any_field_read_unpacks_payload() {
    let source = r"google.protobuf.Any{type_url: 'type.googleapis.com/acme.v1.Account', value: b'\x08\x07'}.id";
    assert_eq!(eval(source), Ok(Value::Int(7)));
}

#[test]
fn test_any_typed_field_compares_by_payload() {
    assert_eq!(
        eval(&format!("acme.v1.Account{{details: {PACKED_INT}}}.details == 5")),
        Ok(Value::Bool(true))
    );
}

#[test]
fn test_any_with_unknown_type_fails_on_read() {
    let source = "google.protobuf.Any{type_url: 'type.googleapis.com/acme.v1.Missing'}.id";
    assert_eq!(
        eval_err(source),
        "unknown type in Any: 'type.googleapis.com/acme.v1.Missing'"
    );
}
