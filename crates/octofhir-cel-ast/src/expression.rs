//! Expression nodes
//!
//! The tree mirrors the canonical CEL `Expr` message: constants, identifiers,
//! selects, calls, aggregate literals and comprehensions. Macros such as
//! `all` or `exists` are already expanded into [`ComprehensionExpr`] nodes.

use crate::ExprId;
use serde::{Deserialize, Serialize};

/// A CEL expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

/// All CEL expression kinds
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ExprKind {
    /// Kind not set; rejected by the checker and planner
    #[default]
    Unspecified,
    /// Literal value
    Const(Constant),
    /// Identifier reference (`x`, `pkg.Type` after qualification)
    Ident(IdentExpr),
    /// Field selection (`a.b`) or presence test (`has(a.b)`)
    Select(SelectExpr),
    /// Function, method or operator call
    Call(CallExpr),
    /// List literal
    List(ListExpr),
    /// Map or message literal
    Struct(StructExpr),
    /// Expanded comprehension
    Comprehension(Box<ComprehensionExpr>),
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentExpr {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectExpr {
    pub operand: Box<Expr>,
    pub field: String,
    /// True for the `has()` presence test
    pub test_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    /// Receiver for member-style calls (`target.fn(args)`)
    pub target: Option<Box<Expr>>,
    pub function: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListExpr {
    pub elements: Vec<Expr>,
    /// Indices of `?elem` optional elements
    pub optional_indices: Vec<usize>,
}

/// Map literal (`message_name` empty) or message literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructExpr {
    pub message_name: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: ExprId,
    pub key: EntryKey,
    pub value: Expr,
    /// `?key: value` entries are skipped when the value is absent
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryKey {
    /// Message field name
    Field(String),
    /// Map key expression
    MapKey(Expr),
}

/// A fold over `iter_range`
///
/// For two-variable comprehensions `iter_var` binds the list index or map key
/// and `iter_var2` the element or map value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensionExpr {
    pub iter_var: String,
    pub iter_var2: Option<String>,
    pub iter_range: Expr,
    pub accu_var: String,
    pub accu_init: Expr,
    pub loop_condition: Expr,
    pub loop_step: Expr,
    pub result: Expr,
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    pub fn constant(id: ExprId, value: Constant) -> Self {
        Self::new(id, ExprKind::Const(value))
    }

    pub fn ident(id: ExprId, name: impl Into<String>) -> Self {
        Self::new(id, ExprKind::Ident(IdentExpr { name: name.into() }))
    }

    pub fn select(id: ExprId, operand: Expr, field: impl Into<String>) -> Self {
        Self::new(
            id,
            ExprKind::Select(SelectExpr {
                operand: Box::new(operand),
                field: field.into(),
                test_only: false,
            }),
        )
    }

    pub fn presence_test(id: ExprId, operand: Expr, field: impl Into<String>) -> Self {
        Self::new(
            id,
            ExprKind::Select(SelectExpr {
                operand: Box::new(operand),
                field: field.into(),
                test_only: true,
            }),
        )
    }

    pub fn call(id: ExprId, function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            id,
            ExprKind::Call(CallExpr {
                target: None,
                function: function.into(),
                args,
            }),
        )
    }

    pub fn member_call(
        id: ExprId,
        target: Expr,
        function: impl Into<String>,
        args: Vec<Expr>,
    ) -> Self {
        Self::new(
            id,
            ExprKind::Call(CallExpr {
                target: Some(Box::new(target)),
                function: function.into(),
                args,
            }),
        )
    }

    pub fn list(id: ExprId, elements: Vec<Expr>) -> Self {
        Self::new(
            id,
            ExprKind::List(ListExpr {
                elements,
                optional_indices: Vec::new(),
            }),
        )
    }

    pub fn map(id: ExprId, entries: Vec<Entry>) -> Self {
        Self::new(
            id,
            ExprKind::Struct(StructExpr {
                message_name: String::new(),
                entries,
            }),
        )
    }

    pub fn message(id: ExprId, message_name: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self::new(
            id,
            ExprKind::Struct(StructExpr {
                message_name: message_name.into(),
                entries,
            }),
        )
    }

    pub fn comprehension(id: ExprId, comprehension: ComprehensionExpr) -> Self {
        Self::new(id, ExprKind::Comprehension(Box::new(comprehension)))
    }

    /// Name of an identifier node
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(&ident.name),
            _ => None,
        }
    }

    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Unspecified | ExprKind::Const(_) | ExprKind::Ident(_) => Vec::new(),
            ExprKind::Select(select) => vec![&*select.operand],
            ExprKind::Call(call) => call
                .target
                .iter()
                .map(|t| &**t)
                .chain(call.args.iter())
                .collect(),
            ExprKind::List(list) => list.elements.iter().collect(),
            ExprKind::Struct(st) => st
                .entries
                .iter()
                .flat_map(|entry| match &entry.key {
                    EntryKey::MapKey(key) => vec![key, &entry.value],
                    EntryKey::Field(_) => vec![&entry.value],
                })
                .collect(),
            ExprKind::Comprehension(comp) => vec![
                &comp.iter_range,
                &comp.accu_init,
                &comp.loop_condition,
                &comp.loop_step,
                &comp.result,
            ],
        }
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(Expr::node_count)
            .sum::<usize>()
    }

    /// Largest id used in this subtree
    pub fn max_id(&self) -> ExprId {
        let own = match &self.kind {
            ExprKind::Struct(st) => st.entries.iter().map(|e| e.id).max().unwrap_or(self.id),
            _ => self.id,
        };
        self.children()
            .into_iter()
            .map(Expr::max_id)
            .fold(own.max(self.id), ExprId::max)
    }
}

impl Entry {
    pub fn field(id: ExprId, name: impl Into<String>, value: Expr) -> Self {
        Self {
            id,
            key: EntryKey::Field(name.into()),
            value,
            optional: false,
        }
    }

    pub fn map_key(id: ExprId, key: Expr, value: Expr) -> Self {
        Self {
            id,
            key: EntryKey::MapKey(key),
            value,
            optional: false,
        }
    }
}

impl Constant {
    /// Name of the constant's CEL type
    pub fn type_name(&self) -> &'static str {
        match self {
            Constant::Null => "null_type",
            Constant::Bool(_) => "bool",
            Constant::Int(_) => "int",
            Constant::Uint(_) => "uint",
            Constant::Double(_) => "double",
            Constant::String(_) => "string",
            Constant::Bytes(_) => "bytes",
        }
    }
}

impl From<i64> for Constant {
    fn from(v: i64) -> Self {
        Constant::Int(v)
    }
}

impl From<u64> for Constant {
    fn from(v: u64) -> Self {
        Constant::Uint(v)
    }
}

impl From<f64> for Constant {
    fn from(v: f64) -> Self {
        Constant::Double(v)
    }
}

impl From<bool> for Constant {
    fn from(v: bool) -> Self {
        Constant::Bool(v)
    }
}

impl From<&str> for Constant {
    fn from(v: &str) -> Self {
        Constant::String(v.to_string())
    }
}
