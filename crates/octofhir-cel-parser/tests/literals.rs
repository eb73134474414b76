//! Tests for parsing CEL literal values
//!
//! Covers all CEL literal types:
//! - Integers (decimal, hexadecimal) and unsigned integers
//! - Doubles
//! - Strings (quoted, triple-quoted, raw, escaped)
//! - Bytes
//! - Booleans and null

use octofhir_cel_ast::{Constant, ExprKind};
use octofhir_cel_diagnostics::{CEL0004, CEL0005, CEL0006};
use octofhir_cel_parser::parse;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

fn parse_constant(input: &str) -> Constant {
    let parsed = parse(input).unwrap_or_else(|e| panic!("Failed to parse '{input}': {e}"));
    match parsed.expr.kind {
        ExprKind::Const(constant) => constant,
        other => panic!("Expected constant for '{input}', got: {other:?}"),
    }
}

// === Numbers ===

#[rstest]
#[case("0", Constant::Int(0))]
#[case("42", Constant::Int(42))]
#[case("-42", Constant::Int(-42))]
#[case("0x1F", Constant::Int(31))]
#[case("-0x10", Constant::Int(-16))]
#[case("9223372036854775807", Constant::Int(i64::MAX))]
#[case("-9223372036854775808", Constant::Int(i64::MIN))]
#[case("42u", Constant::Uint(42))]
#[case("0xFFu", Constant::Uint(255))]
#[case("18446744073709551615u", Constant::Uint(u64::MAX))]
#[case("1.5", Constant::Double(1.5))]
#[case("-2.25", Constant::Double(-2.25))]
#[case("1e3", Constant::Double(1000.0))]
#[case("2.5E-1", Constant::Double(0.25))]
#[case(".5", Constant::Double(0.5))]
fn test_numbers(#[case] input: &str, #[case] expected: Constant) {
    assert_eq!(parse_constant(input), expected);
}

#[rstest]
#[case("9223372036854775808")]
#[case("-9223372036854775809")]
#[case("18446744073709551616u")]
fn test_integer_out_of_range(#[case] input: &str) {
    let err = parse(input).unwrap_err();
    assert_eq!(err.code(), CEL0006, "{input}: {err}");
}

#[test]
fn test_negative_uint_is_invalid() {
    assert!(parse("-1u").is_err());
}

// === Strings ===

#[rstest]
#[case("'hello'", "hello")]
#[case("\"hello\"", "hello")]
#[case("''", "")]
#[case("'it\\'s'", "it's")]
#[case("\"tab\\there\"", "tab\there")]
#[case("'\\u00e9'", "é")]
#[case("'\\U0001F600'", "\u{1F600}")]
#[case("'\\x41\\102'", "AB")]
#[case("'''a\nb'''", "a\nb")]
#[case("\"\"\"say \"hi\" there\"\"\"", "say \"hi\" there")]
#[case("r'\\d+'", "\\d+")]
#[case("R\"\\n\"", "\\n")]
#[case("'héllo'", "héllo")]
fn test_strings(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(parse_constant(input), Constant::String(expected.to_string()));
}

#[rstest]
#[case("b'abc'", b"abc".to_vec())]
#[case("B\"\\xff\\x00\"", vec![0xff, 0x00])]
#[case("b'\\303\\277'", vec![0xc3, 0xbf])]
#[case("b'ÿ'", vec![0xc3, 0xbf])]
#[case("rb'\\x'", b"\\x".to_vec())]
fn test_bytes(#[case] input: &str, #[case] expected: Vec<u8>) {
    assert_eq!(parse_constant(input), Constant::Bytes(expected));
}

#[rstest]
#[case("'abc")]
#[case("'a\nb'")]
#[case("'''abc''")]
fn test_unterminated_strings(#[case] input: &str) {
    assert_eq!(parse(input).unwrap_err().code(), CEL0005);
}

#[rstest]
#[case("'\\q'")]
#[case("b'\\u0041'")]
#[case("'\\uD800'")]
fn test_invalid_escapes(#[case] input: &str) {
    assert_eq!(parse(input).unwrap_err().code(), CEL0004);
}

// === Booleans and Null ===

#[rstest]
#[case("true", Constant::Bool(true))]
#[case("false", Constant::Bool(false))]
#[case("null", Constant::Null)]
fn test_keywords(#[case] input: &str, #[case] expected: Constant) {
    assert_eq!(parse_constant(input), expected);
}

#[test]
fn test_keyword_prefix_is_an_identifier() {
    let parsed = parse("nullable").unwrap();
    assert_eq!(parsed.expr.as_ident(), Some("nullable"));
}

proptest! {
    #[test]
    fn prop_int_literals_round_trip(value in any::<i64>()) {
        prop_assert_eq!(parse_constant(&value.to_string()), Constant::Int(value));
    }

    #[test]
    fn prop_uint_literals_round_trip(value in any::<u64>()) {
        prop_assert_eq!(parse_constant(&format!("{value}u")), Constant::Uint(value));
    }
}
