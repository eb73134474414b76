//! CEL expression tree definitions
//!
//! These are the data structures that cross the parser boundary: every node is
//! addressed by a numeric id, and [`SourceInfo`] maps ids back to source offsets.

mod expression;
mod operator;
mod source;

pub use expression::*;
pub use operator::*;
pub use source::*;

/// Expression node identifier, assigned monotonically by the parser
pub type ExprId = i64;
