//! Binary operations.
//!
//! Custom operators bound in the meta symbol table win; then arithmetic,
//! boolean and comparison operators map one to one onto target nodes; the
//! remaining language operators are lowered structurally.

use makrell_foundation::{Error, ErrorKind, Result, Span};

use super::Code;
use crate::context::{Context, MetaSymbol};
use crate::node::{Node, NodeKind, SequenceKind, deparen};
use crate::target::{
    BinOperator, BoolOperator, CmpOperator, Expr, ExprKind, FunctionDef, Stmt, StmtKind,
};

/// Name of the runtime pattern-matching function.
pub const MATCH_FUNCTION: &str = "match";

impl Context {
    pub(crate) fn compile_binop(
        &mut self,
        left: &Node,
        op: &str,
        right: &Node,
        span: Span,
    ) -> Result<Code> {
        if let Some(MetaSymbol::Operator(func)) = self.symbols.get(op).cloned() {
            let args = vec![self.compile_expr(left)?, self.compile_expr(right)?];
            return Ok(Code::Expr(Expr::call(func, args, span)));
        }

        if let Some(op) = BinOperator::from_symbol(op) {
            let (left, right) = self.operands(left, right)?;
            return Ok(expr(ExprKind::BinOp { left, op, right }, span));
        }
        if let Some(op) = BoolOperator::from_symbol(op) {
            let (left, right) = self.operands(left, right)?;
            return Ok(expr(ExprKind::BoolOp { op, left, right }, span));
        }
        if let Some(op) = CmpOperator::from_symbol(op) {
            let (left, right) = self.operands(left, right)?;
            return Ok(expr(
                ExprKind::Compare {
                    left,
                    ops: vec![op],
                    comparators: vec![*right],
                },
                span,
            ));
        }

        match op {
            "=" => {
                let target = self.compile_target(left)?;
                let value = self.compile_expr(right)?;
                Ok(Code::stmt(StmtKind::Assign { target, value }, span))
            }
            "->" => self.compile_arrow(left, right, span),
            "@" => {
                let value = Box::new(self.compile_expr(left)?);
                let index = match deparen(right).as_binop("..") {
                    Some((lower, upper)) => self.slice(lower, upper, right.span)?,
                    None => self.compile_expr(right)?,
                };
                Ok(expr(
                    ExprKind::Subscript {
                        value,
                        index: Box::new(index),
                    },
                    span,
                ))
            }
            ".." => Ok(Code::Expr(self.slice(left, right, span)?)),
            "." => {
                let value = Box::new(self.compile_expr(left)?);
                let attr = right.as_identifier().ok_or_else(|| {
                    Error::syntax(format!("member name expected after '.', found {right}"))
                        .at(right.span)
                })?;
                Ok(expr(
                    ExprKind::Attribute {
                        value,
                        attr: attr.to_string(),
                    },
                    span,
                ))
            }
            "|" => self.apply(right, left, span),
            "\\" => self.apply(left, right, span),
            "|*" => self.map(right, left, span),
            "*\\" => self.map(left, right, span),
            "~=" => Ok(Code::Expr(self.pattern_match(left, right, span)?)),
            "!~=" => {
                let matched = self.pattern_match(left, right, span)?;
                Ok(expr(ExprKind::Not(Box::new(matched)), span))
            }
            _ => Err(Error::unknown_operator(op).at(span)),
        }
    }

    fn operands(&mut self, left: &Node, right: &Node) -> Result<(Box<Expr>, Box<Expr>)> {
        Ok((
            Box::new(self.compile_expr(left)?),
            Box::new(self.compile_expr(right)?),
        ))
    }

    fn slice(&mut self, lower: &Node, upper: &Node, span: Span) -> Result<Expr> {
        let (lower, upper) = self.operands(lower, upper)?;
        Ok(Expr::new(
            ExprKind::Slice {
                lower: Some(lower),
                upper: Some(upper),
                step: None,
            },
            span,
        ))
    }

    fn apply(&mut self, func: &Node, arg: &Node, span: Span) -> Result<Code> {
        let func = self.compile_expr(func)?;
        let arg = self.compile_expr(arg)?;
        Ok(Code::Expr(Expr::call(func, vec![arg], span)))
    }

    fn map(&mut self, func: &Node, items: &Node, span: Span) -> Result<Code> {
        let func = self.compile_expr(func)?;
        let items = self.compile_expr(items)?;
        Ok(Code::Expr(Expr::call(
            Expr::name("map", span),
            vec![func, items],
            span,
        )))
    }

    fn pattern_match(&mut self, value: &Node, pattern: &Node, span: Span) -> Result<Expr> {
        let value = self.compile_expr(value)?;
        let pattern = self.quote(pattern)?;
        let pattern = self.compile_expr(&pattern)?;
        Ok(Expr::call(
            Expr::name(MATCH_FUNCTION, span),
            vec![value, pattern],
            span,
        ))
    }

    /// `params -> body`, hoisting a named function for `{do ...}` bodies.
    fn compile_arrow(&mut self, params: &Node, body: &Node, span: Span) -> Result<Code> {
        let params = lambda_params(params)?;
        if body.is_curly_headed_by("do") {
            let children = body
                .as_sequence_of(SequenceKind::Curly)
                .map(|seq| seq.regular())
                .unwrap_or_default();
            let name = self.gensym();
            let body = self.compile_body(children.get(1..).unwrap_or_default(), span)?;
            self.hoist(Stmt::new(
                StmtKind::FunctionDef(std::rc::Rc::new(FunctionDef {
                    name: name.clone(),
                    params,
                    body,
                    is_async: false,
                })),
                span,
            ));
            return Ok(Code::Expr(Expr::name(name, span)));
        }
        let body = self.compile_expr(body)?;
        Ok(Code::Expr(Expr::lambda(params, body, span)))
    }
}

fn expr(kind: ExprKind, span: Span) -> Code {
    Code::Expr(Expr::new(kind, span))
}

/// Parameter names on the left of `->`: one identifier or a square list.
pub(super) fn lambda_params(node: &Node) -> Result<Vec<String>> {
    let invalid = || Error::new(ErrorKind::InvalidLambdaParams(node.to_string())).at(node.span);
    match &node.kind {
        NodeKind::Identifier(name) => Ok(vec![name.clone()]),
        NodeKind::Sequence(seq) if seq.kind == SequenceKind::Square => seq
            .regular()
            .iter()
            .map(|n| n.as_identifier().map(str::to_string).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Value;
    use crate::pretty::pretty_print;

    fn eval(source: &str) -> Value {
        let mut ctx = Context::new().expect("prelude");
        ctx.eval_source(source).expect("runs")
    }

    fn compile_err(source: &str) -> Error {
        Context::bare().compile_source(source).expect_err("fails")
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("2 + 3 * 5"), Value::Int(17));
        assert_eq!(eval("2 * 3 + 5 * 7"), Value::Int(41));
        assert_eq!(eval("2 * (3 + 5) / 4"), Value::Float(4.0));
        assert_eq!(eval("2 * (3 + 5) ** 2"), Value::Int(128));
    }

    #[test]
    fn lambdas() {
        assert_eq!(eval("f = x -> x + 1 {f 1}"), Value::Int(2));
        assert_eq!(eval("g = [a b] -> a * b {g 3 4}"), Value::Int(12));
        assert_eq!(eval("h = [] -> {do y = 5 y + 1} {h}"), Value::Int(6));
    }

    #[test]
    fn block_lambdas_are_hoisted() {
        let mut ctx = Context::bare();
        let unit = ctx.compile_source("h = x -> {do x}").expect("compiles");
        assert!(matches!(unit.program.body[0].kind, StmtKind::FunctionDef(_)));
        assert!(pretty_print(&unit.program).contains("h = __gensym_1__"));
    }

    #[test]
    fn invalid_lambda_params() {
        let err = compile_err("2 -> 3");
        assert!(matches!(err.kind, ErrorKind::InvalidLambdaParams(_)));
        let err = compile_err("[a 1] -> 3");
        assert!(matches!(err.kind, ErrorKind::InvalidLambdaParams(_)));
    }

    #[test]
    fn indexing_and_slices() {
        assert_eq!(eval("xs = [1 2 3 4] xs@1"), Value::Int(2));
        assert_eq!(eval("xs = [1 2 3 4] xs@(1..3)").to_string(), "[2, 3]");
        assert_eq!(eval("{\"hello\".upper}").to_string(), "HELLO");
    }

    #[test]
    fn pipes_and_maps() {
        assert_eq!(eval("f = x -> x * 2 3 | f"), Value::Int(6));
        assert_eq!(eval("f = x -> x * 2 f \\ 4"), Value::Int(8));
        assert_eq!(eval("f = x -> x + 1 [1 2] |* f").to_string(), "[2, 3]");
        assert_eq!(eval("f = x -> x + 1 f *\\ [1 2]").to_string(), "[2, 3]");
    }

    #[test]
    fn pattern_operators() {
        assert_eq!(eval("[1 2] ~= [_ 2]"), Value::Bool(true));
        assert_eq!(eval("[1 2] !~= [_ 3]"), Value::Bool(true));
        assert_eq!(eval("5 ~= \"5\""), Value::Bool(false));
    }

    #[test]
    fn boolean_and_comparison() {
        assert_eq!(eval("1 < 2 && 2 < 3"), Value::Bool(true));
        assert_eq!(eval("false || 7"), Value::Int(7));
    }

    #[test]
    fn unknown_operators_are_fatal() {
        let err = compile_err("1 <~> 2");
        assert!(matches!(err.kind, ErrorKind::UnknownOperator(ref op) if op == "<~>"));
        assert!(err.span.is_some());
    }
}
