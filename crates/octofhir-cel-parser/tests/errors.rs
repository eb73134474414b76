//! Tests for parse error reporting
//!
//! Error codes, messages and source locations for malformed input.

use octofhir_cel_diagnostics::{CEL0001, CEL0002, CEL0007, CEL0008, CEL0009};
use octofhir_cel_parser::{ParseOptions, parse, parse_with_options};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("1 +", CEL0002)]
#[case("(a", CEL0002)]
#[case("f(a,", CEL0002)]
#[case("a b", CEL0001)]
#[case("a = b", CEL0001)]
#[case("[1 2]", CEL0001)]
#[case("{'a' 1}", CEL0001)]
#[case("a.1", CEL0001)]
#[case(")", CEL0001)]
fn test_syntax_errors(#[case] input: &str, #[case] code: octofhir_cel_diagnostics::ErrorCode) {
    let err = parse(input).unwrap_err();
    assert_eq!(err.code(), code, "{input}: {err}");
}

#[test]
fn test_error_message_names_the_token() {
    let err = parse("a b").unwrap_err();
    assert_eq!(
        err.message(),
        "Syntax error: unexpected 'b', expected end of input"
    );
}

#[test]
fn test_error_location() {
    let err = parse("a &&\n  b +").unwrap_err();
    let location = err.location().expect("parse errors carry a location");
    assert_eq!((location.line, location.column), (2, 6));
}

#[rstest]
#[case("while")]
#[case("a.if")]
#[case("package.x")]
#[case("Msg{var: 1}")]
fn test_reserved_identifiers(#[case] input: &str) {
    let err = parse(input).unwrap_err();
    assert_eq!(err.code(), CEL0009, "{input}: {err}");
}

#[rstest]
#[case("has(a)")]
#[case("xs.exists(1, true)")]
#[case("xs.all(a.b, true)")]
fn test_invalid_macro_calls(#[case] input: &str) {
    assert_eq!(parse(input).unwrap_err().code(), CEL0007);
}

#[test]
fn test_recursion_limit() {
    let options = ParseOptions::default().with_max_recursion_depth(10);
    let shallow = format!("{}1{}", "(".repeat(8), ")".repeat(8));
    assert!(parse_with_options(&shallow, options).is_ok());

    let deep = format!("{}1{}", "(".repeat(12), ")".repeat(12));
    let err = parse_with_options(&deep, options).unwrap_err();
    assert_eq!(err.code(), CEL0008);
    assert_eq!(err.message(), "expression recursion limit exceeded: 10");
}

#[test]
fn test_default_depth_accepts_moderate_nesting() {
    let nested = format!("{}x{}", "[".repeat(40), "]".repeat(40));
    assert!(parse(&nested).is_ok());
}
