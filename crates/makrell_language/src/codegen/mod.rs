//! Lowering of parsed nodes into the target program.
//!
//! Dispatch is by node variant. Binary operations live in [`binop`], curly
//! call forms in [`curly`] and reserved special forms in [`special`].
//!
//! A node compiles to [`Code`]: either a single expression or a list of
//! statements. Helper functions synthesized while compiling an expression
//! (`do` blocks, `->` lambdas with block bodies) are hoisted into the
//! pending-definitions frame of the innermost enclosing block and emitted
//! right before the statement that needed them.

mod binop;
mod curly;
mod special;

pub use curly::{LEFT_PARAM, RIGHT_PARAM};
pub use special::SPECIAL_FORMS;

use makrell_foundation::{Error, Result, Span};

use crate::context::{Context, MetaSymbol};
use crate::interp::Value;
use crate::interp::builtins::nodes::value_to_node;
use crate::literal::{Literal, literal_value};
use crate::node::{Node, NodeKind, SequenceKind, regular};
use crate::operator::parse_operators_counted;
use crate::target::{Constant, Expr, ExprKind, Stmt, StmtKind};

/// Reserved identifier for an argument hole and a trailing tuple marker.
pub const PLACEHOLDER: &str = "_";

/// Compiled form of one node.
#[derive(Clone, Debug, PartialEq)]
pub enum Code {
    /// A value-producing expression.
    Expr(Expr),
    /// Zero or more statements.
    Stmts(Vec<Stmt>),
}

impl Code {
    /// Compiles to nothing.
    #[must_use]
    pub const fn nothing() -> Self {
        Self::Stmts(Vec::new())
    }

    /// A single statement.
    #[must_use]
    pub fn stmt(kind: StmtKind, span: Span) -> Self {
        Self::Stmts(vec![Stmt::new(kind, span)])
    }

    /// The statements of this code; expressions become expression statements.
    #[must_use]
    pub fn into_stmts(self) -> Vec<Stmt> {
        match self {
            Self::Expr(expr) => vec![expr.into_stmt()],
            Self::Stmts(stmts) => stmts,
        }
    }

    /// The expression of this code.
    ///
    /// Nothing is `null`, and a lone expression statement is its expression.
    ///
    /// # Errors
    /// Fails for any other statement list.
    pub fn into_expr(self, span: Span) -> Result<Expr> {
        match self {
            Self::Expr(expr) => Ok(expr),
            Self::Stmts(mut stmts) => {
                if stmts.is_empty() {
                    return Ok(Expr::null(span));
                }
                if stmts.len() == 1 {
                    let stmt = stmts.remove(0);
                    if let StmtKind::Expr(expr) = stmt.kind {
                        return Ok(expr);
                    }
                }
                Err(Error::syntax("statement used where a value is expected").at(span))
            }
        }
    }
}

/// Maps a literal to a constant.
#[must_use]
pub fn literal_constant(literal: Literal) -> Constant {
    match literal {
        Literal::Int(n) => Constant::Int(n),
        Literal::Float(f) => Constant::Float(f),
        Literal::Complex(re, im) => Constant::Complex(re, im),
        Literal::Str(s) => Constant::Str(s),
        Literal::DateTime(dt) => Constant::DateTime(dt),
        Literal::Regex(r) => Constant::Regex(r),
    }
}

impl Context {
    /// Compiles one node.
    ///
    /// # Errors
    /// Returns fatal compilation errors; recoverable problems are recorded
    /// as diagnostics instead.
    pub fn compile(&mut self, node: &Node) -> Result<Code> {
        match &node.kind {
            NodeKind::Identifier(name) => Ok(self.compile_identifier(name, node.span)),
            NodeKind::String { .. } | NodeKind::Number { .. } => {
                let literal = literal_value(node).map_err(|e| e.at(node.span))?;
                Ok(Code::Expr(Expr::constant(literal_constant(literal), node.span)))
            }
            NodeKind::BinOp { left, op, right } => self.compile_binop(left, op, right, node.span),
            NodeKind::Sequence(seq) => match seq.kind {
                SequenceKind::Round => self.compile_round(&seq.regular(), node.span),
                SequenceKind::Square => {
                    let items = self.parse_ops(&seq.regular())?;
                    let items = self.compile_exprs(&items)?;
                    Ok(Code::Expr(Expr::new(ExprKind::List(items), node.span)))
                }
                SequenceKind::Curly => self.compile_curly(node, &seq.regular()),
                SequenceKind::NoBrackets => {
                    let children = seq.regular();
                    match children.as_slice() {
                        [] => Ok(Code::Expr(Expr::null(node.span))),
                        [only] => self.compile(only),
                        _ => Ok(Code::Stmts(self.compile_block(&children)?)),
                    }
                }
            },
            NodeKind::Operator(op) => {
                Err(Error::syntax(format!("operator {op} without operands")).at(node.span))
            }
            NodeKind::Unknown(text) => {
                Err(Error::syntax(format!("unexpected input {text:?}")).at(node.span))
            }
            NodeKind::Whitespace(_) | NodeKind::Comment(_) => Ok(Code::nothing()),
        }
    }

    /// Compiles a node that must produce a value.
    ///
    /// # Errors
    /// Fails like [`Context::compile`], and when the node compiles to
    /// statements.
    pub fn compile_expr(&mut self, node: &Node) -> Result<Expr> {
        self.compile(node)?.into_expr(node.span)
    }

    pub(crate) fn compile_exprs(&mut self, nodes: &[Node]) -> Result<Vec<Expr>> {
        nodes.iter().map(|n| self.compile_expr(n)).collect()
    }

    /// Compiles a statement list.
    ///
    /// Operator parsing runs over the whole list. When compiling an item
    /// changes the operator table, the remaining nodes are parsed again so
    /// new operators apply to the rest of the list.
    pub(crate) fn compile_block(&mut self, nodes: &[Node]) -> Result<Vec<Stmt>> {
        self.push_pending();
        let result = self.compile_block_items(nodes);
        self.pop_pending();
        result
    }

    fn compile_block_items(&mut self, nodes: &[Node]) -> Result<Vec<Stmt>> {
        let raw = regular(nodes);
        let mut version = self.operators.borrow().version();
        let mut parsed = self.parse_ops_counted(&raw)?;
        let mut stmts = Vec::new();
        let mut offset = 0;
        let mut index = 0;
        while let Some((node, width)) = parsed.get(index).cloned() {
            let code = self.compile(&node)?;
            stmts.extend(self.take_pending());
            stmts.extend(code.into_stmts());
            offset += width;
            index += 1;

            let current = self.operators.borrow().version();
            if current != version {
                version = current;
                parsed = self.parse_ops_counted(&raw[offset..])?;
                index = 0;
            }
        }
        Ok(stmts)
    }

    fn parse_ops_counted(&self, nodes: &[Node]) -> Result<Vec<(Node, usize)>> {
        let table = self.operators.borrow();
        parse_operators_counted(nodes, |op| table.lookup(op))
    }

    /// Compiles a function body; a final expression statement is returned.
    pub(crate) fn compile_body(&mut self, nodes: &[Node], span: Span) -> Result<Vec<Stmt>> {
        let mut body = self.compile_block(nodes)?;
        match body.pop() {
            Some(Stmt {
                kind: StmtKind::Expr(expr),
                span,
            }) => body.push(Stmt::new(StmtKind::Return(Some(expr)), span)),
            Some(last) => body.push(last),
            None => body.push(Stmt::new(StmtKind::Return(None), span)),
        }
        Ok(body)
    }

    /// Compiles a statement body; an empty body becomes `pass`.
    pub(crate) fn compile_suite(&mut self, nodes: &[Node], span: Span) -> Result<Vec<Stmt>> {
        let body = self.compile_block(nodes)?;
        Ok(if body.is_empty() { vec![Stmt::pass(span)] } else { body })
    }

    fn compile_identifier(&mut self, name: &str, span: Span) -> Code {
        let expr = |kind| Code::Expr(Expr::new(kind, span));
        match name {
            "true" => expr(ExprKind::Constant(Constant::Bool(true))),
            "false" => expr(ExprKind::Constant(Constant::Bool(false))),
            "null" => expr(ExprKind::Constant(Constant::None)),
            "return" => Code::stmt(StmtKind::Return(None), span),
            "yield" => expr(ExprKind::Yield(None)),
            "yieldfrom" => expr(ExprKind::YieldFrom(Box::new(Expr::null(span)))),
            "pass" => Code::stmt(StmtKind::Pass, span),
            "break" => Code::stmt(StmtKind::Break, span),
            "continue" => Code::stmt(StmtKind::Continue, span),
            _ => Code::Expr(self.reference(name, span)),
        }
    }

    /// A reference to `name`, substituting meta bindings outside meta code.
    fn reference(&mut self, name: &str, span: Span) -> Expr {
        if self.in_meta() {
            return Expr::name(name, span);
        }
        match self.symbols.get(name) {
            Some(MetaSymbol::Binding(Some(def))) => {
                Expr::new(ExprKind::Function(std::rc::Rc::clone(def)), span)
            }
            Some(MetaSymbol::Binding(None)) => self
                .meta_constant(name, span)
                .unwrap_or_else(|| Expr::name(name, span)),
            _ => Expr::name(name, span),
        }
    }

    /// The value of a meta binding as code producing an equal value.
    fn meta_constant(&mut self, name: &str, span: Span) -> Option<Expr> {
        let value = self.meta_scope.get_local(name)?;
        let node = value_to_node(&value).ok()?.with_span_deep(span);
        let node = match value {
            Value::Node(_) => self.quote(&node).ok()?,
            _ => node,
        };
        self.compile_expr(&node).ok()
    }

    /// An assignment or loop target: plain names are never substituted.
    pub(crate) fn compile_target(&mut self, node: &Node) -> Result<Expr> {
        match &node.kind {
            NodeKind::Identifier(name) => Ok(Expr::name(name.clone(), node.span)),
            NodeKind::Sequence(seq) if seq.kind != SequenceKind::Curly => {
                let items = self.parse_ops(&seq.regular())?;
                let targets = items
                    .iter()
                    .map(|n| self.compile_target(n))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::new(
                    match seq.kind {
                        SequenceKind::Round => ExprKind::Tuple(targets),
                        _ => ExprKind::List(targets),
                    },
                    node.span,
                ))
            }
            _ => self.compile_expr(node),
        }
    }

    fn compile_round(&mut self, children: &[Node], span: Span) -> Result<Code> {
        let mut items = self.parse_ops(children)?;
        match items.len() {
            0 => return Ok(Code::Expr(Expr::null(span))),
            1 => return self.compile(&items[0]),
            _ => {}
        }
        if items.last().is_some_and(|n| n.is_identifier(PLACEHOLDER)) {
            items.pop();
        }
        let items = self.compile_exprs(&items)?;
        Ok(Code::Expr(Expr::new(ExprKind::Tuple(items), span)))
    }
}
