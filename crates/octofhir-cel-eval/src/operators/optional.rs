//! Optional value accessors: `hasValue`, `value` and `orValue`

use crate::error::{CelError, CelResult};
use crate::registry::{Func, Overload};
use crate::value::Value;
use octofhir_cel_types::CelType;

pub(crate) fn functions() -> Vec<Func> {
    let optional = || CelType::optional(CelType::type_param("A"));
    vec![
        Func::new("hasValue").with_overload(
            Overload::unary("optional_hasValue", optional(), CelType::Bool, |value| {
                match value {
                    Value::Optional(inner) => Ok(Value::Bool(inner.is_some())),
                    other => Err(CelError::no_matching_overload("hasValue", [other])),
                }
            })
            .member(),
        ),
        Func::new("value").with_overload(
            Overload::unary("optional_value", optional(), CelType::type_param("A"), |value| {
                match value {
                    Value::Optional(Some(inner)) => Ok((**inner).clone()),
                    Value::Optional(None) => Err(CelError::new("optional.none() dereference")),
                    other => Err(CelError::no_matching_overload("value", [other])),
                }
            })
            .member(),
        ),
        Func::new("orValue").with_overload(
            Overload::binary(
                "optional_orValue_value",
                optional(),
                CelType::type_param("A"),
                CelType::type_param("A"),
                or_value,
            )
            .member(),
        ),
    ]
}

fn or_value(optional: &Value, fallback: &Value) -> CelResult {
    match optional {
        Value::Optional(Some(inner)) => Ok((**inner).clone()),
        Value::Optional(None) => Ok(fallback.clone()),
        other => Err(CelError::no_matching_overload("orValue", [other, fallback])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dispatch(name: &str, args: Vec<Value>) -> Option<CelResult> {
        let args: Vec<CelResult> = args.into_iter().map(Ok).collect();
        functions()
            .into_iter()
            .find(|func| func.name() == name)
            .and_then(|func| func.dispatch(&args, true))
    }

    #[test]
    fn test_accessors() {
        let some = Value::Optional(Some(Box::new(Value::Int(1))));
        let none = Value::Optional(None);
        assert_eq!(dispatch("hasValue", vec![some.clone()]), Some(Ok(Value::Bool(true))));
        assert_eq!(dispatch("value", vec![some.clone()]), Some(Ok(Value::Int(1))));
        assert_eq!(
            dispatch("orValue", vec![none.clone(), Value::Int(9)]),
            Some(Ok(Value::Int(9)))
        );
        let err = dispatch("value", vec![none]).and_then(Result::err);
        assert_eq!(err.map(|e| e.message().to_string()), Some("optional.none() dereference".into()));
    }

    #[test]
    fn test_plain_values_do_not_match() {
        assert_eq!(dispatch("hasValue", vec![Value::Int(1)]), None);
    }
}
