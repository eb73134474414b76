//! Standard library declarations
//!
//! Operator and built-in function signatures, with overload ids following the
//! cel-go naming conventions so that checked references line up with the
//! evaluator's function table.

use octofhir_cel_ast::{
    ADD, CONDITIONAL, DIVIDE, EQUALS, GREATER, GREATER_EQUALS, IN, INDEX, LESS, LESS_EQUALS,
    LOGICAL_AND, LOGICAL_NOT, LOGICAL_OR, MODULO, MULTIPLY, NEGATE, NOT_EQUALS,
    NOT_STRICTLY_FALSE, OPT_INDEX, SUBTRACT,
};
use octofhir_cel_types::{CelType, FunctionDecl, OverloadDecl};

/// Overloads comparing int, uint and double with each other
///
/// They are disabled unless `CheckerOptions::cross_type_numeric_comparisons` is set.
pub const CROSS_TYPE_NUMERIC_COMPARISONS: [&str; 24] = [
    "less_double_int64",
    "less_double_uint64",
    "less_equals_double_int64",
    "less_equals_double_uint64",
    "greater_double_int64",
    "greater_double_uint64",
    "greater_equals_double_int64",
    "greater_equals_double_uint64",
    "less_int64_double",
    "less_int64_uint64",
    "less_equals_int64_double",
    "less_equals_int64_uint64",
    "greater_int64_double",
    "greater_int64_uint64",
    "greater_equals_int64_double",
    "greater_equals_int64_uint64",
    "less_uint64_double",
    "less_uint64_int64",
    "less_equals_uint64_double",
    "less_equals_uint64_int64",
    "greater_uint64_double",
    "greater_uint64_int64",
    "greater_equals_uint64_double",
    "greater_equals_uint64_int64",
];

fn a() -> CelType {
    CelType::type_param("A")
}

fn b() -> CelType {
    CelType::type_param("B")
}

fn global(id: &str, params: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::function(id, params, result)
}

fn member(id: &str, params: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::method(id, params, result)
}

fn function(name: &str, overloads: Vec<OverloadDecl>) -> FunctionDecl {
    overloads
        .into_iter()
        .fold(FunctionDecl::new(name), FunctionDecl::with_overload)
}

/// Build the standard declarations
///
/// Returned fresh on every call so environments never share mutable state.
pub fn standard_declarations() -> Vec<FunctionDecl> {
    let mut decls = Vec::new();
    arithmetic(&mut decls);
    comparisons(&mut decls);
    logic(&mut decls);
    collections(&mut decls);
    optionals(&mut decls);
    strings(&mut decls);
    conversions(&mut decls);
    decls
}

// ============================================================================
// Arithmetic
// ============================================================================

fn arithmetic(decls: &mut Vec<FunctionDecl>) {
    let numeric = [
        ("int64", CelType::Int),
        ("uint64", CelType::Uint),
        ("double", CelType::Double),
    ];
    let binary = |prefix: &str, extra: Vec<OverloadDecl>| {
        let mut overloads: Vec<OverloadDecl> = numeric
            .iter()
            .map(|(suffix, ty)| {
                global(
                    &format!("{prefix}_{suffix}"),
                    vec![ty.clone(), ty.clone()],
                    ty.clone(),
                )
            })
            .collect();
        overloads.extend(extra);
        overloads
    };

    decls.push(function(
        ADD,
        binary(
            "add",
            vec![
                global(
                    "add_string",
                    vec![CelType::String, CelType::String],
                    CelType::String,
                ),
                global(
                    "add_bytes",
                    vec![CelType::Bytes, CelType::Bytes],
                    CelType::Bytes,
                ),
                global(
                    "add_list",
                    vec![CelType::list(a()), CelType::list(a())],
                    CelType::list(a()),
                ),
            ],
        ),
    ));
    decls.push(function(SUBTRACT, binary("subtract", vec![])));
    decls.push(function(MULTIPLY, binary("multiply", vec![])));
    decls.push(function(DIVIDE, binary("divide", vec![])));
    decls.push(function(
        MODULO,
        vec![
            global(
                "modulo_int64",
                vec![CelType::Int, CelType::Int],
                CelType::Int,
            ),
            global(
                "modulo_uint64",
                vec![CelType::Uint, CelType::Uint],
                CelType::Uint,
            ),
        ],
    ));
    decls.push(function(
        NEGATE,
        vec![
            global("negate_int64", vec![CelType::Int], CelType::Int),
            global("negate_double", vec![CelType::Double], CelType::Double),
        ],
    ));
}

// ============================================================================
// Equality and Ordering
// ============================================================================

fn comparisons(decls: &mut Vec<FunctionDecl>) {
    decls.push(function(
        EQUALS,
        vec![global("equals", vec![a(), a()], CelType::Bool)],
    ));
    decls.push(function(
        NOT_EQUALS,
        vec![global("not_equals", vec![a(), a()], CelType::Bool)],
    ));

    let ordered = [
        ("bool", CelType::Bool),
        ("int64", CelType::Int),
        ("uint64", CelType::Uint),
        ("double", CelType::Double),
        ("string", CelType::String),
        ("bytes", CelType::Bytes),
    ];
    let numeric = [
        ("int64", CelType::Int),
        ("uint64", CelType::Uint),
        ("double", CelType::Double),
    ];
    for (name, prefix) in [
        (LESS, "less"),
        (LESS_EQUALS, "less_equals"),
        (GREATER, "greater"),
        (GREATER_EQUALS, "greater_equals"),
    ] {
        let mut overloads: Vec<OverloadDecl> = ordered
            .iter()
            .map(|(suffix, ty)| {
                global(
                    &format!("{prefix}_{suffix}"),
                    vec![ty.clone(), ty.clone()],
                    CelType::Bool,
                )
            })
            .collect();
        for (lhs_name, lhs) in &numeric {
            for (rhs_name, rhs) in &numeric {
                if lhs_name != rhs_name {
                    overloads.push(global(
                        &format!("{prefix}_{lhs_name}_{rhs_name}"),
                        vec![lhs.clone(), rhs.clone()],
                        CelType::Bool,
                    ));
                }
            }
        }
        decls.push(function(name, overloads));
    }
}

// ============================================================================
// Logic
// ============================================================================

fn logic(decls: &mut Vec<FunctionDecl>) {
    decls.push(function(
        LOGICAL_NOT,
        vec![global("logical_not", vec![CelType::Bool], CelType::Bool)],
    ));
    decls.push(function(
        LOGICAL_AND,
        vec![global(
            "logical_and",
            vec![CelType::Bool, CelType::Bool],
            CelType::Bool,
        )],
    ));
    decls.push(function(
        LOGICAL_OR,
        vec![global(
            "logical_or",
            vec![CelType::Bool, CelType::Bool],
            CelType::Bool,
        )],
    ));
    decls.push(function(
        NOT_STRICTLY_FALSE,
        vec![global(
            "not_strictly_false",
            vec![CelType::Bool],
            CelType::Bool,
        )],
    ));
    decls.push(function(
        CONDITIONAL,
        vec![global("conditional", vec![CelType::Bool, a(), a()], a())],
    ));
}

// ============================================================================
// Collections
// ============================================================================

fn collections(decls: &mut Vec<FunctionDecl>) {
    decls.push(function(
        INDEX,
        vec![
            global("index_list", vec![CelType::list(a()), CelType::Int], a()),
            global("index_map", vec![CelType::map(a(), b()), a()], b()),
        ],
    ));
    decls.push(function(
        OPT_INDEX,
        vec![
            global(
                "list_optindex_optional_int",
                vec![CelType::list(a()), CelType::Int],
                CelType::optional(a()),
            ),
            global(
                "map_optindex_optional_value",
                vec![CelType::map(a(), b()), a()],
                CelType::optional(b()),
            ),
        ],
    ));
    decls.push(function(
        IN,
        vec![
            global("in_list", vec![a(), CelType::list(a())], CelType::Bool),
            global("in_map", vec![a(), CelType::map(a(), b())], CelType::Bool),
        ],
    ));
    decls.push(function(
        "size",
        vec![
            global("size_string", vec![CelType::String], CelType::Int),
            global("size_bytes", vec![CelType::Bytes], CelType::Int),
            global("size_list", vec![CelType::list(a())], CelType::Int),
            global("size_map", vec![CelType::map(a(), b())], CelType::Int),
            member("string_size", vec![CelType::String], CelType::Int),
            member("bytes_size", vec![CelType::Bytes], CelType::Int),
            member("list_size", vec![CelType::list(a())], CelType::Int),
            member("map_size", vec![CelType::map(a(), b())], CelType::Int),
        ],
    ));
}

// ============================================================================
// Optionals
// ============================================================================

fn optionals(decls: &mut Vec<FunctionDecl>) {
    decls.push(function(
        "hasValue",
        vec![member(
            "optional_hasValue",
            vec![CelType::optional(a())],
            CelType::Bool,
        )],
    ));
    decls.push(function(
        "value",
        vec![member("optional_value", vec![CelType::optional(a())], a())],
    ));
    decls.push(function(
        "orValue",
        vec![member(
            "optional_orValue_value",
            vec![CelType::optional(a()), a()],
            a(),
        )],
    ));
}

// ============================================================================
// Strings
// ============================================================================

fn strings(decls: &mut Vec<FunctionDecl>) {
    let string_pair = || vec![CelType::String, CelType::String];
    decls.push(function(
        "contains",
        vec![member("contains_string", string_pair(), CelType::Bool)],
    ));
    decls.push(function(
        "startsWith",
        vec![member("starts_with_string", string_pair(), CelType::Bool)],
    ));
    decls.push(function(
        "endsWith",
        vec![member("ends_with_string", string_pair(), CelType::Bool)],
    ));
    decls.push(function(
        "matches",
        vec![
            global("matches", string_pair(), CelType::Bool),
            member("matches_string", string_pair(), CelType::Bool),
        ],
    ));
}

// ============================================================================
// Type Conversions
// ============================================================================

fn conversions(decls: &mut Vec<FunctionDecl>) {
    let convert = |name: &str, target: CelType, target_id: &str, sources: &[(&str, CelType)]| {
        function(
            name,
            sources
                .iter()
                .map(|(source_id, source)| {
                    global(
                        &format!("{source_id}_to_{target_id}"),
                        vec![source.clone()],
                        target.clone(),
                    )
                })
                .collect(),
        )
    };

    decls.push(convert(
        "int",
        CelType::Int,
        "int64",
        &[
            ("int64", CelType::Int),
            ("uint64", CelType::Uint),
            ("double", CelType::Double),
            ("string", CelType::String),
        ],
    ));
    decls.push(convert(
        "uint",
        CelType::Uint,
        "uint64",
        &[
            ("uint64", CelType::Uint),
            ("int64", CelType::Int),
            ("double", CelType::Double),
            ("string", CelType::String),
        ],
    ));
    decls.push(convert(
        "double",
        CelType::Double,
        "double",
        &[
            ("double", CelType::Double),
            ("int64", CelType::Int),
            ("uint64", CelType::Uint),
            ("string", CelType::String),
        ],
    ));
    decls.push(convert(
        "bool",
        CelType::Bool,
        "bool",
        &[("bool", CelType::Bool), ("string", CelType::String)],
    ));
    decls.push(convert(
        "string",
        CelType::String,
        "string",
        &[
            ("string", CelType::String),
            ("bool", CelType::Bool),
            ("int64", CelType::Int),
            ("uint64", CelType::Uint),
            ("double", CelType::Double),
            ("bytes", CelType::Bytes),
        ],
    ));
    decls.push(convert(
        "bytes",
        CelType::Bytes,
        "bytes",
        &[("bytes", CelType::Bytes), ("string", CelType::String)],
    ));
    decls.push(function(
        "dyn",
        vec![global("to_dyn", vec![a()], CelType::Dyn)],
    ));
    decls.push(function(
        "type",
        vec![global("type", vec![a()], CelType::type_of(a()))],
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn find(name: &str) -> FunctionDecl {
        standard_declarations()
            .into_iter()
            .find(|decl| decl.name == name)
            .unwrap_or_else(|| panic!("{name} not declared"))
    }

    #[rstest]
    #[case(ADD, "add_int64")]
    #[case(ADD, "add_list")]
    #[case(LESS, "less_int64_double")]
    #[case(GREATER_EQUALS, "greater_equals_bytes")]
    #[case("size", "map_size")]
    #[case("int", "string_to_int64")]
    #[case("string", "bytes_to_string")]
    #[case(OPT_INDEX, "map_optindex_optional_value")]
    fn test_overload_declared(#[case] function: &str, #[case] overload: &str) {
        assert!(find(function).overload(overload).is_some());
    }

    #[test]
    fn test_names_are_unique() {
        let decls = standard_declarations();
        let mut names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), decls.len());
    }

    #[test]
    fn test_cross_type_comparisons_are_declared() {
        let all: Vec<String> = standard_declarations()
            .into_iter()
            .flat_map(|d| d.overloads.into_iter().map(|o| o.id))
            .collect();
        for id in CROSS_TYPE_NUMERIC_COMPARISONS {
            assert!(all.iter().any(|o| o == id), "{id} missing");
        }
    }
}
