//! Parsed expressions and their source metadata

use crate::{Expr, ExprId};
use octofhir_cel_diagnostics::SourceLocation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source metadata produced alongside an expression tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Description of the expression origin (file name, rule name, ...)
    pub location: String,
    /// Byte offset at which each line after the first begins
    pub line_offsets: Vec<usize>,
    /// Byte offset of each expression node
    pub positions: BTreeMap<ExprId, usize>,
    /// Original call expressions for nodes produced by macro expansion
    pub macro_calls: BTreeMap<ExprId, Expr>,
}

impl SourceInfo {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    /// Build line offsets for `source`
    pub fn with_source(mut self, source: &str) -> Self {
        self.line_offsets = source
            .char_indices()
            .filter(|(_, c)| *c == '\n')
            .map(|(i, _)| i + 1)
            .collect();
        self
    }

    pub fn offset_of(&self, id: ExprId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Line/column location of an expression node
    pub fn location_of(&self, id: ExprId) -> Option<SourceLocation> {
        self.offset_of(id)
            .map(|offset| SourceLocation::from_line_offsets(&self.line_offsets, offset))
    }
}

/// The parser output: an expression tree plus source metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedExpr {
    pub expr: Expr,
    pub source_info: SourceInfo,
}

impl ParsedExpr {
    pub fn new(expr: Expr, source_info: SourceInfo) -> Self {
        Self { expr, source_info }
    }
}

impl From<Expr> for ParsedExpr {
    fn from(expr: Expr) -> Self {
        Self::new(expr, SourceInfo::default())
    }
}
