//! Expression parser using recursive descent with precedence climbing
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, relations, `+ -`, `* / %`,
//! unary `! -`, then member selection, indexing and calls. Chains of `||`
//! and `&&` are built as balanced trees so long conjunctions do not nest
//! deeper than `log2(n)`.

use crate::ParseOptions;
use crate::combinators::{
    Input, Number, PResult, Quoted, additive_op, identifier, is_reserved, keyword, lit,
    multiplicative_op, number, quoted, relation_op, starts_string, unescape, ws,
};
use octofhir_cel_ast::{
    CONDITIONAL, Constant, Entry, Expr, ExprId, ExprKind, INDEX, LOGICAL_AND,
    LOGICAL_NOT, LOGICAL_OR, NEGATE, OPT_INDEX, OPT_SELECT, ParsedExpr, SourceInfo,
};
use octofhir_cel_diagnostics::{
    CEL0001, CEL0002, CEL0003, CEL0004, CEL0005, CEL0006, CEL0008, CEL0009, CompileError,
    ErrorCode, Result, SourceLocation,
};
use std::collections::BTreeMap;
use winnow::error::ErrMode;
use winnow::prelude::*;

type Step<'s> = fn(&mut ExprParser<'s>, &mut Input<'s>) -> Result<Expr>;

/// Parser state for one source text
pub(crate) struct ExprParser<'s> {
    source: &'s str,
    options: ParseOptions,
    line_offsets: Vec<usize>,
    next_id: ExprId,
    depth: usize,
    positions: BTreeMap<ExprId, usize>,
    macro_calls: BTreeMap<ExprId, Expr>,
}

impl<'s> ExprParser<'s> {
    pub(crate) fn new(source: &'s str, options: ParseOptions) -> Self {
        let line_offsets = SourceInfo::default().with_source(source).line_offsets;
        Self {
            source,
            options,
            line_offsets,
            next_id: 1,
            depth: 0,
            positions: BTreeMap::new(),
            macro_calls: BTreeMap::new(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<ParsedExpr> {
        let mut input = self.source;
        let expr = self.expr(&mut input)?;
        ws(&mut input).ok();
        if !input.is_empty() {
            return Err(self.unexpected(input, "end of input"));
        }
        let source_info = SourceInfo {
            location: "<input>".to_string(),
            line_offsets: self.line_offsets,
            positions: self.positions,
            macro_calls: self.macro_calls,
        };
        Ok(ParsedExpr::new(expr, source_info))
    }

    // ========================================================================
    // Node bookkeeping
    // ========================================================================

    /// Allocate the next id and record its source offset
    pub(crate) fn id_at(&mut self, offset: usize) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        self.positions.insert(id, offset);
        id
    }

    pub(crate) fn record_macro(&mut self, id: ExprId, call: Expr) {
        self.macro_calls.insert(id, call);
    }

    fn offset(&self, input: &str) -> usize {
        self.source.len() - input.len()
    }

    pub(crate) fn error(
        &self,
        code: ErrorCode,
        message: impl Into<String>,
        offset: usize,
    ) -> CompileError {
        let location = SourceLocation::from_line_offsets(&self.line_offsets, offset);
        CompileError::parse_at(code, message, self.source, location)
    }

    fn unexpected(&self, input: &str, expected: &str) -> CompileError {
        let offset = self.offset(input);
        match next_token(input) {
            None => self.error(
                CEL0002,
                format!("Syntax error: unexpected end of input, expected {expected}"),
                offset,
            ),
            Some(token) => self.error(
                CEL0001,
                format!("Syntax error: unexpected '{token}', expected {expected}"),
                offset,
            ),
        }
    }

    /// Consume `token` after optional whitespace
    fn eat(&self, input: &mut Input<'s>, token: &'static str) -> bool {
        ws(input).ok();
        lit(token).parse_next(input).is_ok()
    }

    fn expect(&self, input: &mut Input<'s>, token: &'static str) -> Result<()> {
        if self.eat(input, token) {
            Ok(())
        } else {
            Err(self.unexpected(input, &format!("'{token}'")))
        }
    }

    fn require_optional_syntax(&self, token: &str, offset: usize) -> Result<()> {
        if self.options.enable_optional_syntax {
            Ok(())
        } else {
            Err(self.error(CEL0001, format!("Syntax error: unsupported syntax '{token}'"), offset))
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    /// Parse a full expression, counting nesting against the recursion limit
    pub(crate) fn expr(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        self.depth += 1;
        if self.depth > self.options.max_recursion_depth {
            let offset = self.offset(input);
            return Err(self.error(
                CEL0008,
                format!(
                    "expression recursion limit exceeded: {}",
                    self.options.max_recursion_depth
                ),
                offset,
            ));
        }
        let result = self.conditional(input);
        self.depth -= 1;
        result
    }

    fn conditional(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        let condition = self.or(input)?;
        ws(input).ok();
        let offset = self.offset(input);
        if !self.eat(input, "?") {
            return Ok(condition);
        }
        let truthy = self.or(input)?;
        self.expect(input, ":")?;
        let falsy = self.expr(input)?;
        let id = self.id_at(offset);
        Ok(Expr::call(id, CONDITIONAL, vec![condition, truthy, falsy]))
    }

    fn or(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        self.logical(input, "||", LOGICAL_OR, Self::and)
    }

    fn and(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        self.logical(input, "&&", LOGICAL_AND, Self::relation)
    }

    fn logical(
        &mut self,
        input: &mut Input<'s>,
        token: &'static str,
        function: &'static str,
        operand: Step<'s>,
    ) -> Result<Expr> {
        let first = operand(self, input)?;
        let mut rest = Vec::new();
        loop {
            ws(input).ok();
            let offset = self.offset(input);
            if !self.eat(input, token) {
                break;
            }
            rest.push((offset, operand(self, input)?));
        }
        Ok(self.balance(function, first, rest))
    }

    /// Fold `first op e1 op e2 ...` into a balanced tree
    fn balance(
        &mut self,
        function: &'static str,
        first: Expr,
        mut rest: Vec<(usize, Expr)>,
    ) -> Expr {
        if rest.is_empty() {
            return first;
        }
        let mut right = rest.split_off(rest.len() / 2);
        let (offset, right_first) = right.remove(0);
        let lhs = self.balance(function, first, rest);
        let rhs = self.balance(function, right_first, right);
        let id = self.id_at(offset);
        Expr::call(id, function, vec![lhs, rhs])
    }

    fn relation(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        self.binary(input, relation_op, Self::addition)
    }

    fn addition(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        self.binary(input, additive_op, Self::multiplication)
    }

    fn multiplication(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        self.binary(input, multiplicative_op, Self::unary)
    }

    /// Left-associative operator level
    fn binary(
        &mut self,
        input: &mut Input<'s>,
        operator: fn(&mut Input<'s>) -> PResult<&'static str>,
        operand: Step<'s>,
    ) -> Result<Expr> {
        let mut lhs = operand(self, input)?;
        loop {
            ws(input).ok();
            let offset = self.offset(input);
            let Ok(function) = operator(input) else {
                break;
            };
            let rhs = operand(self, input)?;
            let id = self.id_at(offset);
            lhs = Expr::call(id, function, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    /// `!` and `-` prefixes; pairs cancel out
    ///
    /// An odd run of `-` directly before a numeric literal negates the
    /// literal itself, so `-9223372036854775808` is a valid int.
    fn unary(&mut self, input: &mut Input<'s>) -> Result<Expr> {
        ws(input).ok();
        let offset = self.offset(input);
        if input.starts_with('!') {
            let count = self.count_prefix(input, "!");
            let operand = self.member(input, false)?;
            if count % 2 == 0 {
                return Ok(operand);
            }
            let id = self.id_at(offset);
            return Ok(Expr::call(id, LOGICAL_NOT, vec![operand]));
        }
        if input.starts_with('-') {
            let count = self.count_prefix(input, "-");
            ws(input).ok();
            if count % 2 == 1 && starts_number(input) {
                return self.member(input, true);
            }
            let operand = self.member(input, false)?;
            if count % 2 == 0 {
                return Ok(operand);
            }
            let id = self.id_at(offset);
            return Ok(Expr::call(id, NEGATE, vec![operand]));
        }
        self.member(input, false)
    }

    fn count_prefix(&self, input: &mut Input<'s>, token: &'static str) -> usize {
        let mut count = 0;
        while self.eat(input, token) {
            count += 1;
        }
        count
    }

    // ========================================================================
    // Members
    // ========================================================================

    fn member(&mut self, input: &mut Input<'s>, negative: bool) -> Result<Expr> {
        let mut expr = self.primary(input, negative)?;
        loop {
            ws(input).ok();
            let offset = self.offset(input);
            if self.eat(input, ".") {
                let optional = self.eat(input, "?");
                if optional {
                    self.require_optional_syntax(".?", offset)?;
                }
                ws(input).ok();
                let name_offset = self.offset(input);
                let field = self.field_name(input)?;
                if optional {
                    let field_id = self.id_at(name_offset);
                    let field = Expr::constant(field_id, Constant::String(field));
                    let id = self.id_at(offset);
                    expr = Expr::call(id, OPT_SELECT, vec![expr, field]);
                } else if self.eat(input, "(") {
                    let args = self.args(input)?;
                    expr = self.member_call(name_offset, expr, field, args)?;
                } else {
                    let id = self.id_at(offset);
                    expr = Expr::select(id, expr, field);
                }
            } else if self.eat(input, "[") {
                let optional = self.eat(input, "?");
                if optional {
                    self.require_optional_syntax("[?", offset)?;
                }
                let index = self.expr(input)?;
                self.expect(input, "]")?;
                let id = self.id_at(offset);
                let function = if optional { OPT_INDEX } else { INDEX };
                expr = Expr::call(id, function, vec![expr, index]);
            } else if input.starts_with('{') {
                let Some(name) = qualified_name(&expr) else {
                    break;
                };
                self.eat(input, "{");
                expr = self.message(input, offset, name)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn field_name(&self, input: &mut Input<'s>) -> Result<String> {
        let offset = self.offset(input);
        let name = identifier(input).map_err(|_| self.unexpected(input, "a field name"))?;
        if is_reserved(name) {
            return Err(self.error(CEL0009, format!("reserved identifier: {name}"), offset));
        }
        Ok(name.to_string())
    }

    /// Arguments after `(`, through the closing `)`
    fn args(&mut self, input: &mut Input<'s>) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(input, ")") {
            return Ok(args);
        }
        loop {
            args.push(self.expr(input)?);
            if self.eat(input, ",") {
                continue;
            }
            self.expect(input, ")")?;
            return Ok(args);
        }
    }

    // ========================================================================
    // Primaries
    // ========================================================================

    fn primary(&mut self, input: &mut Input<'s>, negative: bool) -> Result<Expr> {
        ws(input).ok();
        let offset = self.offset(input);
        if negative || starts_number(input) {
            return self.number(input, offset, negative);
        }
        if starts_string(input) {
            return self.string(input, offset);
        }
        if self.eat(input, "(") {
            let expr = self.expr(input)?;
            self.expect(input, ")")?;
            return Ok(expr);
        }
        if self.eat(input, "[") {
            return self.list(input, offset);
        }
        if self.eat(input, "{") {
            return self.map(input, offset);
        }
        let leading_dot = self.eat(input, ".");
        ws(input).ok();
        let name_offset = self.offset(input);
        let Ok(name) = identifier(input) else {
            return Err(self.unexpected(input, "an expression"));
        };
        if !leading_dot {
            let constant = match name {
                "true" => Some(Constant::Bool(true)),
                "false" => Some(Constant::Bool(false)),
                "null" => Some(Constant::Null),
                _ => None,
            };
            if let Some(constant) = constant {
                let id = self.id_at(offset);
                return Ok(Expr::constant(id, constant));
            }
        }
        if is_reserved(name) {
            return Err(self.error(CEL0009, format!("reserved identifier: {name}"), name_offset));
        }
        let name = if leading_dot {
            format!(".{name}")
        } else {
            name.to_string()
        };
        if self.eat(input, "(") {
            let args = self.args(input)?;
            return self.global_call(offset, name, args);
        }
        let id = self.id_at(offset);
        Ok(Expr::ident(id, name))
    }

    fn number(&mut self, input: &mut Input<'s>, offset: usize, negative: bool) -> Result<Expr> {
        let text_offset = self.offset(input);
        let token = number(input).map_err(|_| self.unexpected(input, "a number"))?;
        let sign = if negative { "-" } else { "" };
        let constant = match token {
            Number::Double(text) => {
                let value = text.parse::<f64>().map_err(|_| {
                    self.error(CEL0003, format!("invalid double literal '{text}'"), text_offset)
                })?;
                Constant::Double(if negative { -value } else { value })
            }
            Number::Integer {
                digits,
                radix,
                unsigned: true,
            } => {
                if negative {
                    return Err(self.error(
                        CEL0003,
                        format!("invalid uint literal '-{digits}u'"),
                        offset,
                    ));
                }
                u64::from_str_radix(digits, radix)
                    .map(Constant::Uint)
                    .map_err(|_| {
                        self.error(CEL0006, format!("uint literal out of range: {digits}u"), offset)
                    })?
            }
            Number::Integer {
                digits,
                radix,
                unsigned: false,
            } => i64::from_str_radix(&format!("{sign}{digits}"), radix)
                .map(Constant::Int)
                .map_err(|_| {
                    self.error(CEL0006, format!("int literal out of range: {sign}{digits}"), offset)
                })?,
        };
        let id = self.id_at(offset);
        Ok(Expr::constant(id, constant))
    }

    fn string(&mut self, input: &mut Input<'s>, offset: usize) -> Result<Expr> {
        let checkpoint = *input;
        let text: Quoted<'s> = match quoted(input) {
            Ok(text) => text,
            Err(ErrMode::Cut(_)) => {
                return Err(self.error(CEL0005, "unterminated string literal", offset));
            }
            Err(_) => {
                *input = checkpoint;
                return Err(self.unexpected(input, "a string literal"));
            }
        };
        let decoded = unescape(&text).map_err(|message| self.error(CEL0004, message, offset))?;
        let constant = if text.bytes {
            Constant::Bytes(decoded)
        } else {
            Constant::String(
                String::from_utf8(decoded)
                    .map_err(|err| self.error(CEL0004, err.to_string(), offset))?,
            )
        };
        let id = self.id_at(offset);
        Ok(Expr::constant(id, constant))
    }

    /// List literal after `[`
    fn list(&mut self, input: &mut Input<'s>, offset: usize) -> Result<Expr> {
        let mut elements = Vec::new();
        let mut optional_indices = Vec::new();
        while !self.eat(input, "]") {
            ws(input).ok();
            let element_offset = self.offset(input);
            if self.eat(input, "?") {
                self.require_optional_syntax("?", element_offset)?;
                optional_indices.push(elements.len());
            }
            elements.push(self.expr(input)?);
            if !self.eat(input, ",") {
                self.expect(input, "]")?;
                break;
            }
        }
        let id = self.id_at(offset);
        let mut list = Expr::list(id, elements);
        if let ExprKind::List(literal) = &mut list.kind {
            literal.optional_indices = optional_indices;
        }
        Ok(list)
    }

    /// Map literal after `{`
    fn map(&mut self, input: &mut Input<'s>, offset: usize) -> Result<Expr> {
        let mut entries = Vec::new();
        while !self.eat(input, "}") {
            ws(input).ok();
            let entry_offset = self.offset(input);
            let optional = self.eat(input, "?");
            if optional {
                self.require_optional_syntax("?", entry_offset)?;
            }
            let key = self.expr(input)?;
            self.expect(input, ":")?;
            let value = self.expr(input)?;
            let id = self.id_at(entry_offset);
            entries.push(Entry {
                optional,
                ..Entry::map_key(id, key, value)
            });
            if !self.eat(input, ",") {
                self.expect(input, "}")?;
                break;
            }
        }
        let id = self.id_at(offset);
        Ok(Expr::map(id, entries))
    }

    /// Message literal after `Name{`
    fn message(&mut self, input: &mut Input<'s>, offset: usize, name: String) -> Result<Expr> {
        let mut entries = Vec::new();
        while !self.eat(input, "}") {
            ws(input).ok();
            let entry_offset = self.offset(input);
            let optional = self.eat(input, "?");
            if optional {
                self.require_optional_syntax("?", entry_offset)?;
            }
            let field = self.field_name(input)?;
            self.expect(input, ":")?;
            let value = self.expr(input)?;
            let id = self.id_at(entry_offset);
            entries.push(Entry {
                optional,
                ..Entry::field(id, field, value)
            });
            if !self.eat(input, ",") {
                self.expect(input, "}")?;
                break;
            }
        }
        let id = self.id_at(offset);
        Ok(Expr::message(id, name, entries))
    }
}

/// Dotted name of an identifier or select chain
fn qualified_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(ident) => Some(ident.name.clone()),
        ExprKind::Select(select) if !select.test_only => {
            qualified_name(&select.operand).map(|operand| format!("{operand}.{}", select.field))
        }
        _ => None,
    }
}

fn starts_number(input: &str) -> bool {
    let mut chars = input.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// The token at the start of `input` for error messages
fn next_token(input: &str) -> Option<&str> {
    let mut rest = input;
    if let Ok(word) = identifier(&mut rest) {
        return Some(word);
    }
    if keyword("in").parse_next(&mut rest).is_ok() {
        return Some("in");
    }
    input.chars().next().map(|c| &input[..c.len_utf8()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> ParsedExpr {
        ExprParser::new(source, ParseOptions::default())
            .parse()
            .unwrap_or_else(|err| panic!("{source}: {err}"))
    }

    fn depth(expr: &Expr) -> usize {
        1 + expr.children().into_iter().map(depth).max().unwrap_or(0)
    }

    #[test]
    fn test_logical_chain_is_balanced() {
        let parsed = parse("a || b || c || d || e || f || g || h");
        assert_eq!(depth(&parsed.expr), 4);
    }

    #[test]
    fn test_ids_are_unique_and_positioned() {
        let parsed = parse("a.b + f(1, [2])");
        let count = parsed.expr.node_count();
        assert_eq!(parsed.source_info.positions.len(), count);
        assert_eq!(parsed.expr.max_id(), count as ExprId);
    }

    #[test]
    fn test_operator_positions() {
        let parsed = parse("x\n  + y");
        assert_eq!(parsed.source_info.offset_of(parsed.expr.id), Some(4));
        let location = parsed.source_info.location_of(parsed.expr.id).unwrap();
        assert_eq!((location.line, location.column), (2, 3));
    }

    #[test]
    fn test_qualified_name() {
        let parsed = parse("a.b.c");
        assert_eq!(qualified_name(&parsed.expr).as_deref(), Some("a.b.c"));
        let parsed = parse("a[0].c");
        assert_eq!(qualified_name(&parsed.expr), None);
    }

    #[test]
    fn test_next_token() {
        assert_eq!(next_token("foo bar"), Some("foo"));
        assert_eq!(next_token("é"), Some("é"));
        assert_eq!(next_token(""), None);
    }
}
