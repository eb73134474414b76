//! Lexical combinators for CEL source text

use octofhir_cel_ast::{
    ADD, DIVIDE, EQUALS, GREATER, GREATER_EQUALS, IN, LESS, LESS_EQUALS, MODULO, MULTIPLY,
    NOT_EQUALS, SUBTRACT,
};
use winnow::ascii::{digit1, hex_digit1, multispace1};
use winnow::combinator::{alt, not, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{literal, one_of, take_till, take_while};

pub(crate) type Input<'a> = &'a str;
pub(crate) type PResult<T> = winnow::ModalResult<T>;

/// Words that can never be identifiers or field names
pub(crate) const RESERVED: &[&str] = &[
    "as", "break", "const", "continue", "else", "false", "for", "function", "if", "import", "in",
    "let", "loop", "package", "namespace", "null", "return", "true", "var", "void", "while",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Skip whitespace and `//` line comments
pub(crate) fn ws(input: &mut Input<'_>) -> PResult<()> {
    repeat(0.., alt((multispace1.void(), line_comment))).parse_next(input)
}

fn line_comment(input: &mut Input<'_>) -> PResult<()> {
    ("//", take_till(0.., '\n')).void().parse_next(input)
}

/// Exact token
pub(crate) fn lit<'a>(token: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    literal(token)
}

/// Word not followed by an identifier character (`in` but not `inner`)
pub(crate) fn keyword<'a>(
    word: &'static str,
) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    terminated(literal(word), not(one_of(is_ident_char)))
}

pub(crate) fn identifier<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    (one_of(is_ident_start), take_while(0.., is_ident_char))
        .take()
        .parse_next(input)
}

/// True when the input starts like a string literal, prefixes included
pub(crate) fn starts_string(input: &str) -> bool {
    let body = input.trim_start_matches(['r', 'R', 'b', 'B']);
    input.len() - body.len() <= 2 && body.starts_with(['"', '\''])
}

/// `==`, `!=`, `<=`, `>=`, `<`, `>` and `in`
pub(crate) fn relation_op(input: &mut Input<'_>) -> PResult<&'static str> {
    alt((
        "==".value(EQUALS),
        "!=".value(NOT_EQUALS),
        "<=".value(LESS_EQUALS),
        ">=".value(GREATER_EQUALS),
        "<".value(LESS),
        ">".value(GREATER),
        keyword("in").value(IN),
    ))
    .parse_next(input)
}

pub(crate) fn additive_op(input: &mut Input<'_>) -> PResult<&'static str> {
    alt(("+".value(ADD), "-".value(SUBTRACT))).parse_next(input)
}

pub(crate) fn multiplicative_op(input: &mut Input<'_>) -> PResult<&'static str> {
    alt(("*".value(MULTIPLY), "/".value(DIVIDE), "%".value(MODULO))).parse_next(input)
}

/// Unconverted numeric literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Number<'a> {
    Integer {
        digits: &'a str,
        radix: u32,
        unsigned: bool,
    },
    Double(&'a str),
}

pub(crate) fn number<'a>(input: &mut Input<'a>) -> PResult<Number<'a>> {
    alt((hex_number, decimal_number)).parse_next(input)
}

fn hex_number<'a>(input: &mut Input<'a>) -> PResult<Number<'a>> {
    let digits = preceded(alt(("0x", "0X")), hex_digit1).parse_next(input)?;
    let unsigned = opt(one_of(['u', 'U'])).parse_next(input)?.is_some();
    Ok(Number::Integer {
        digits,
        radix: 16,
        unsigned,
    })
}

fn decimal_number<'a>(input: &mut Input<'a>) -> PResult<Number<'a>> {
    let text = alt((
        (digit1, opt(('.', digit1)), opt(exponent)).take(),
        ('.', digit1, opt(exponent)).take(),
    ))
    .parse_next(input)?;
    if text.contains(['.', 'e', 'E']) {
        return Ok(Number::Double(text));
    }
    let unsigned = opt(one_of(['u', 'U'])).parse_next(input)?.is_some();
    Ok(Number::Integer {
        digits: text,
        radix: 10,
        unsigned,
    })
}

fn exponent<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    (one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)
        .take()
        .parse_next(input)
}

/// Quoted text before escape processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Quoted<'a> {
    pub body: &'a str,
    pub raw: bool,
    pub bytes: bool,
}

/// String or bytes literal
///
/// Fails with a backtrack error when the input is not a string literal and
/// with a cut error when the closing quote is missing.
pub(crate) fn quoted<'a>(input: &mut Input<'a>) -> PResult<Quoted<'a>> {
    let prefix = opt(alt((
        "rb", "rB", "Rb", "RB", "br", "bR", "Br", "BR", "r", "R", "b", "B",
    )))
    .parse_next(input)?
    .unwrap_or_default();
    let quote = alt(("\"\"\"", "'''", "\"", "'")).parse_next(input)?;
    let raw = prefix.contains(['r', 'R']);
    let body = string_body(input, quote, raw)?;
    Ok(Quoted {
        body,
        raw,
        bytes: prefix.contains(['b', 'B']),
    })
}

fn string_body<'a>(input: &mut Input<'a>, quote: &str, raw: bool) -> PResult<&'a str> {
    let text = *input;
    let mut chars = text.char_indices();
    while let Some((index, c)) = chars.next() {
        if text[index..].starts_with(quote) {
            *input = &text[index + quote.len()..];
            return Ok(&text[..index]);
        }
        match c {
            '\\' if !raw => {
                chars.next();
            }
            '\n' | '\r' if quote.len() == 1 => break,
            _ => {}
        }
    }
    Err(ErrMode::Cut(ContextError::new()))
}

/// Process escape sequences
///
/// In strings `\x`, octal and unicode escapes denote code points; in bytes
/// `\x` and octal escapes denote single bytes and unicode escapes are invalid.
pub(crate) fn unescape(quoted: &Quoted<'_>) -> Result<Vec<u8>, String> {
    if quoted.raw {
        return Ok(quoted.body.as_bytes().to_vec());
    }
    let mut out = Vec::with_capacity(quoted.body.len());
    let mut chars = quoted.body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut out, c);
            continue;
        }
        let Some(escape) = chars.next() else {
            return Err("trailing backslash in literal".to_string());
        };
        match escape {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' | '\'' | '"' | '`' | '?' => push_char(&mut out, escape),
            'x' | 'X' => {
                let value = take_digits(&mut chars, 2, 16)?;
                push_code(&mut out, value, quoted.bytes)?;
            }
            'u' | 'U' if quoted.bytes => {
                return Err(format!("unicode escape '\\{escape}' in bytes literal"));
            }
            'u' => {
                let value = take_digits(&mut chars, 4, 16)?;
                push_code(&mut out, value, false)?;
            }
            'U' => {
                let value = take_digits(&mut chars, 8, 16)?;
                push_code(&mut out, value, false)?;
            }
            '0'..='3' => {
                let rest = take_digits(&mut chars, 2, 8)?;
                let value = (escape as u32 - '0' as u32) * 64 + rest;
                push_code(&mut out, value, quoted.bytes)?;
            }
            other => return Err(format!("invalid escape sequence '\\{other}'")),
        }
    }
    Ok(out)
}

fn take_digits(chars: &mut std::str::Chars<'_>, count: usize, radix: u32) -> Result<u32, String> {
    (0..count).try_fold(0u32, |value, _| {
        chars
            .next()
            .and_then(|c| c.to_digit(radix))
            .map(|digit| value * radix + digit)
            .ok_or_else(|| "malformed escape sequence".to_string())
    })
}

fn push_code(out: &mut Vec<u8>, value: u32, as_byte: bool) -> Result<(), String> {
    if as_byte {
        let byte = u8::try_from(value).map_err(|_| format!("byte escape out of range: {value}"))?;
        out.push(byte);
        return Ok(());
    }
    let c = char::from_u32(value).ok_or_else(|| format!("invalid code point: {value:#x}"))?;
    push_char(out, c);
    Ok(())
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn run<'a, T>(parser: fn(&mut Input<'a>) -> PResult<T>, text: &'a str) -> (T, &'a str) {
        let mut input = text;
        let value = parser(&mut input).unwrap_or_else(|e| panic!("{text}: {e:?}"));
        (value, input)
    }

    #[test]
    fn test_ws_skips_comments() {
        let mut input = "  // note\n\t x";
        ws(&mut input).unwrap();
        assert_eq!(input, "x");
    }

    #[rstest]
    #[case("42", Number::Integer { digits: "42", radix: 10, unsigned: false })]
    #[case("42u", Number::Integer { digits: "42", radix: 10, unsigned: true })]
    #[case("0xFFU", Number::Integer { digits: "FF", radix: 16, unsigned: true })]
    #[case("1.5", Number::Double("1.5"))]
    #[case("1e-3", Number::Double("1e-3"))]
    #[case(".25", Number::Double(".25"))]
    fn test_number(#[case] text: &str, #[case] expected: Number<'static>) {
        assert_eq!(run(number, text), (expected, ""));
    }

    #[test]
    fn test_number_leaves_member_access() {
        assert_eq!(
            run(number, "1.foo"),
            (Number::Integer { digits: "1", radix: 10, unsigned: false }, ".foo")
        );
    }

    #[test]
    fn test_keyword_boundary() {
        let mut input = "inner";
        assert!(keyword("in").parse_next(&mut input).is_err());
        let mut input = "in x";
        assert!(keyword("in").parse_next(&mut input).is_ok());
    }

    #[rstest]
    #[case(r#""a\"b""#, r#"a\"b"#, false, false)]
    #[case("'''multi\nline'''", "multi\nline", false, false)]
    #[case(r"r'\d+'", r"\d+", true, false)]
    #[case("b'abc'", "abc", false, true)]
    #[case("RB'x'", "x", true, true)]
    fn test_quoted(
        #[case] text: &str,
        #[case] body: &str,
        #[case] raw: bool,
        #[case] bytes: bool,
    ) {
        assert_eq!(run(quoted, text), (Quoted { body, raw, bytes }, ""));
    }

    #[test]
    fn test_unterminated_string_is_cut() {
        let mut input = "'abc";
        assert!(matches!(quoted(&mut input), Err(ErrMode::Cut(_))));
        let mut input = "'a\nb'";
        assert!(matches!(quoted(&mut input), Err(ErrMode::Cut(_))));
    }

    #[test]
    fn test_identifier_prefix_is_not_a_string() {
        let mut input = "rate";
        assert!(matches!(quoted(&mut input), Err(ErrMode::Backtrack(_))));
        assert!(!starts_string("rate"));
        assert!(starts_string("br'x'"));
    }

    #[rstest]
    #[case(r"a\nb", false, b"a\nb".to_vec())]
    #[case(r"\x41\101", false, b"AA".to_vec())]
    #[case(r"é", false, "é".as_bytes().to_vec())]
    #[case(r"\xff", true, vec![0xff])]
    #[case(r"\377", true, vec![0xff])]
    #[case(r"\xff", false, "ÿ".as_bytes().to_vec())]
    fn test_unescape(#[case] body: &str, #[case] bytes: bool, #[case] expected: Vec<u8>) {
        let quoted = Quoted { body, raw: false, bytes };
        assert_eq!(unescape(&quoted), Ok(expected));
    }

    #[rstest]
    #[case(r"\q", false)]
    #[case(r"\u0041", true)]
    #[case(r"\x4", false)]
    #[case(r"\ud800", false)]
    fn test_unescape_errors(#[case] body: &str, #[case] bytes: bool) {
        assert!(unescape(&Quoted { body, raw: false, bytes }).is_err());
    }
}
