//! CEL parser using Winnow
//!
//! Recursive descent with precedence climbing over the CEL grammar. Macros
//! (`has`, `all`, `exists`, `exists_one`, `map`, `filter`) are expanded while
//! parsing, so the tree handed to the checker and planner only contains the
//! canonical expression kinds.
//!
//! ```
//! use octofhir_cel_ast::ExprKind;
//!
//! let parsed = octofhir_cel_parser::parse("[1, 2, 3].exists(x, x > 2)")?;
//! assert!(matches!(parsed.expr.kind, ExprKind::Comprehension(_)));
//! # Ok::<(), octofhir_cel_diagnostics::CompileError>(())
//! ```

mod combinators;
mod expression;
mod macros;

pub use macros::ACCUMULATOR;

use expression::ExprParser;
use octofhir_cel_ast::ParsedExpr;
use octofhir_cel_diagnostics::Result;

/// Parser configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum nesting of sub-expressions before parsing fails
    pub max_recursion_depth: usize,
    /// Accept `a.?b`, `a[?b]` and `?`-marked aggregate entries
    pub enable_optional_syntax: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: 250,
            enable_optional_syntax: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_optional_syntax(mut self, enabled: bool) -> Self {
        self.enable_optional_syntax = enabled;
        self
    }
}

/// Parse CEL source text with default options
pub fn parse(source: &str) -> Result<ParsedExpr> {
    parse_with_options(source, ParseOptions::default())
}

/// Parse CEL source text
pub fn parse_with_options(source: &str, options: ParseOptions) -> Result<ParsedExpr> {
    ExprParser::new(source, options).parse()
}
