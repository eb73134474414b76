//! CEL operators and their function names
//!
//! Operators are ordinary calls in the expression tree; the parser emits the
//! mangled function name (`_+_`, `!_`, `@in`, ...) returned by
//! [`Operator::function_name`].

use serde::{Deserialize, Serialize};

pub const ADD: &str = "_+_";
pub const SUBTRACT: &str = "_-_";
pub const MULTIPLY: &str = "_*_";
pub const DIVIDE: &str = "_/_";
pub const MODULO: &str = "_%_";
pub const NEGATE: &str = "-_";
pub const EQUALS: &str = "_==_";
pub const NOT_EQUALS: &str = "_!=_";
pub const LESS: &str = "_<_";
pub const LESS_EQUALS: &str = "_<=_";
pub const GREATER: &str = "_>_";
pub const GREATER_EQUALS: &str = "_>=_";
pub const IN: &str = "@in";
pub const LOGICAL_AND: &str = "_&&_";
pub const LOGICAL_OR: &str = "_||_";
pub const LOGICAL_NOT: &str = "!_";
pub const CONDITIONAL: &str = "_?_:_";
pub const INDEX: &str = "_[_]";
pub const OPT_INDEX: &str = "_[?_]";
pub const OPT_SELECT: &str = "_?._";
pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";

/// Operators with precedence information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // Precedence 1 (lowest)
    Conditional,

    // Precedence 2
    LogicalOr,

    // Precedence 3
    LogicalAnd,

    // Precedence 4
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    In,

    // Precedence 5
    Add,
    Subtract,

    // Precedence 6
    Multiply,
    Divide,
    Modulo,

    // Precedence 7 (unary)
    LogicalNot,
    Negate,

    // Postfix
    Index,
    OptIndex,
    OptSelect,
}

impl Operator {
    /// Get the precedence level (higher binds tighter)
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Conditional => 1,
            Self::LogicalOr => 2,
            Self::LogicalAnd => 3,
            Self::Equals
            | Self::NotEquals
            | Self::Less
            | Self::LessEquals
            | Self::Greater
            | Self::GreaterEquals
            | Self::In => 4,
            Self::Add | Self::Subtract => 5,
            Self::Multiply | Self::Divide | Self::Modulo => 6,
            Self::LogicalNot | Self::Negate => 7,
            Self::Index | Self::OptIndex | Self::OptSelect => 8,
        }
    }

    pub const fn function_name(&self) -> &'static str {
        match self {
            Self::Conditional => CONDITIONAL,
            Self::LogicalOr => LOGICAL_OR,
            Self::LogicalAnd => LOGICAL_AND,
            Self::Equals => EQUALS,
            Self::NotEquals => NOT_EQUALS,
            Self::Less => LESS,
            Self::LessEquals => LESS_EQUALS,
            Self::Greater => GREATER,
            Self::GreaterEquals => GREATER_EQUALS,
            Self::In => IN,
            Self::Add => ADD,
            Self::Subtract => SUBTRACT,
            Self::Multiply => MULTIPLY,
            Self::Divide => DIVIDE,
            Self::Modulo => MODULO,
            Self::LogicalNot => LOGICAL_NOT,
            Self::Negate => NEGATE,
            Self::Index => INDEX,
            Self::OptIndex => OPT_INDEX,
            Self::OptSelect => OPT_SELECT,
        }
    }

    /// Source-level symbol, used when rendering diagnostics
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Conditional => "?:",
            Self::LogicalOr => "||",
            Self::LogicalAnd => "&&",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Less => "<",
            Self::LessEquals => "<=",
            Self::Greater => ">",
            Self::GreaterEquals => ">=",
            Self::In => "in",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::LogicalNot => "!",
            Self::Negate => "-",
            Self::Index => "[]",
            Self::OptIndex => "[?]",
            Self::OptSelect => ".?",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        const ALL: [Operator; 20] = [
            Operator::Conditional,
            Operator::LogicalOr,
            Operator::LogicalAnd,
            Operator::Equals,
            Operator::NotEquals,
            Operator::Less,
            Operator::LessEquals,
            Operator::Greater,
            Operator::GreaterEquals,
            Operator::In,
            Operator::Add,
            Operator::Subtract,
            Operator::Multiply,
            Operator::Divide,
            Operator::Modulo,
            Operator::LogicalNot,
            Operator::Negate,
            Operator::Index,
            Operator::OptIndex,
            Operator::OptSelect,
        ];
        ALL.into_iter().find(|op| op.function_name() == name)
    }

    /// Binary relation operators
    pub const fn is_relation(&self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::NotEquals
                | Self::Less
                | Self::LessEquals
                | Self::Greater
                | Self::GreaterEquals
                | Self::In
        )
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_name_roundtrip() {
        for name in [ADD, LOGICAL_AND, IN, OPT_SELECT, NEGATE] {
            let op = Operator::from_function_name(name).unwrap();
            assert_eq!(op.function_name(), name);
        }
        assert_eq!(Operator::from_function_name("size"), None);
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(Operator::Multiply.precedence() > Operator::Add.precedence());
        assert!(Operator::Add.precedence() > Operator::Less.precedence());
        assert!(Operator::LogicalAnd.precedence() > Operator::LogicalOr.precedence());
        assert!(Operator::LogicalOr.precedence() > Operator::Conditional.precedence());
    }
}
