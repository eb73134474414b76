//! String functions
//!
//! Implements: `contains`, `startsWith`, `endsWith` and `matches`.
//! `matches` is a search, not a full match: `'abc'.matches('b')` is true.

use crate::error::{CelError, CelResult};
use crate::registry::{Func, Overload};
use crate::value::Value;
use octofhir_cel_types::CelType;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Compiled patterns kept per function table
const REGEX_CACHE_LIMIT: usize = 128;

pub(crate) fn functions() -> Vec<Func> {
    let cache = Arc::new(RegexCache::default());
    let global_cache = Arc::clone(&cache);
    vec![
        Func::new("contains").with_overload(string_predicate("contains_string", |s, sub| {
            s.contains(sub)
        })),
        Func::new("startsWith").with_overload(string_predicate("starts_with_string", |s, p| {
            s.starts_with(p)
        })),
        Func::new("endsWith").with_overload(string_predicate("ends_with_string", |s, p| {
            s.ends_with(p)
        })),
        Func::new("matches")
            .with_overload(Overload::binary(
                "matches",
                CelType::String,
                CelType::String,
                CelType::Bool,
                move |text, pattern| global_cache.matches(text, pattern),
            ))
            .with_overload(
                Overload::binary(
                    "matches_string",
                    CelType::String,
                    CelType::String,
                    CelType::Bool,
                    move |text, pattern| cache.matches(text, pattern),
                )
                .member(),
            ),
    ]
}

/// Receiver-style `string.f(string) -> bool`
fn string_predicate(id: &'static str, test: fn(&str, &str) -> bool) -> Overload {
    Overload::binary(
        id,
        CelType::String,
        CelType::String,
        CelType::Bool,
        move |lhs, rhs| match (lhs, rhs) {
            (Value::String(a), Value::String(b)) => Ok(Value::Bool(test(a, b))),
            _ => Err(CelError::no_matching_overload(id, [lhs, rhs])),
        },
    )
    .member()
}

#[derive(Debug, Default)]
struct RegexCache {
    compiled: Mutex<HashMap<String, Regex>>,
}

impl RegexCache {
    fn matches(&self, text: &Value, pattern: &Value) -> CelResult {
        let (Value::String(text), Value::String(pattern)) = (text, pattern) else {
            return Err(CelError::no_matching_overload("matches", [text, pattern]));
        };
        let regex = self.compile(pattern)?;
        Ok(Value::Bool(regex.is_match(text)))
    }

    fn compile(&self, pattern: &str) -> CelResult<Regex> {
        let mut compiled = self.compiled.lock();
        if let Some(regex) = compiled.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)
            .map_err(|err| CelError::new(format!("invalid regular expression '{pattern}': {err}")))?;
        if compiled.len() >= REGEX_CACHE_LIMIT {
            compiled.clear();
        }
        compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn call(name: &str, target: &str, arg: &str, is_member: bool) -> CelResult {
        let func = functions()
            .into_iter()
            .find(|func| func.name() == name)
            .expect("declared");
        func.dispatch(&[Ok(Value::from(target)), Ok(Value::from(arg))], is_member)
            .unwrap_or_else(|| Err(CelError::new("no overload")))
    }

    #[rstest]
    #[case("contains", "hello", "ell", true)]
    #[case("startsWith", "hello", "he", true)]
    #[case("endsWith", "hello", "he", false)]
    #[case("matches", "hello", "l+", true)]
    #[case("matches", "hello", "^l", false)]
    fn test_member_predicates(
        #[case] name: &str,
        #[case] target: &str,
        #[case] arg: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(call(name, target, arg, true), Ok(Value::Bool(expected)));
    }

    #[rstest]
    #[case("contains")]
    #[case("startsWith")]
    #[case("endsWith")]
    fn test_predicates_are_receiver_only(#[case] name: &str) {
        assert_eq!(
            call(name, "hello", "he", false),
            Err(CelError::new("no overload"))
        );
    }

    #[test]
    fn test_global_matches() {
        assert_eq!(call("matches", "abc", "b", false), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = call("matches", "abc", "(", true).unwrap_err();
        assert!(err.message().starts_with("invalid regular expression '('"));
    }
}
