//! Reserved special forms.
//!
//! Forms that break a fixed arity fail with [`ErrorKind::Arity`]. A few
//! forms that editors commonly see half-typed (`if` without arguments,
//! `when`, `for`, `return`, `yield`, `yieldfrom`) record a diagnostic
//! instead and compile to nothing, so the rest of the unit still compiles.

use std::rc::Rc;

use makrell_foundation::{Error, ErrorKind, Result, Span};

use super::Code;
use super::binop::lambda_params;
use super::curly::Form;
use crate::context::Context;
use crate::include::{check_cycle, include_path};
use crate::literal::{Literal, literal_value};
use crate::node::{Node, SequenceKind, regular};
use crate::target::{
    Expr, ExprKind, FunctionDef, Handler, ImportAlias, Keyword, Stmt, StmtKind,
};
use crate::trace::TraceEvent;
use crate::tree::parse_source;

/// Identifiers that head special forms.
pub const SPECIAL_FORMS: &[&str] = &[
    "not", "if", "when", "while", "for", "fun", "class", "do", "try", "with", "import",
    "importm", "include", "return", "yield", "yieldfrom", "raise", "del", "assert", "pass",
    "break", "continue", "global", "nonlocal", "async", "await", "dict", "set", "slice", "quote",
    "meta", "macro", "def",
];

fn check_arity(name: &str, form: &Form, min: usize, max: Option<usize>, span: Span) -> Result<()> {
    let count = form.len();
    if count < min || max.is_some_and(|max| count > max) {
        return Err(Error::arity(name, count).at(span));
    }
    Ok(())
}

fn identifier(node: &Node) -> Result<String> {
    node.as_identifier()
        .map(str::to_string)
        .ok_or_else(|| Error::syntax(format!("name expected, found {node}")).at(node.span))
}

/// A dotted module path written as `a` or `a.b.c`.
fn dotted(node: &Node) -> Option<String> {
    if let Some(name) = node.as_identifier() {
        return Some(name.to_string());
    }
    let (left, right) = node.as_binop(".")?;
    Some(format!("{}.{}", dotted(left)?, right.as_identifier()?))
}

impl Context {
    /// Compiles `{name ...}` if `name` is a special form.
    pub(crate) fn compile_special(
        &mut self,
        name: &str,
        form: &Form,
        span: Span,
    ) -> Result<Option<Code>> {
        let items = &form.items;
        let code = match name {
            "not" => {
                check_arity(name, form, 1, Some(1), span)?;
                let value = self.compile_expr(&items[0])?;
                Code::Expr(Expr::new(ExprKind::Not(Box::new(value)), span))
            }
            "if" => self.compile_if(items, span)?,
            "when" => {
                if items.is_empty() {
                    self.report("No test given to when.", span);
                    return Ok(Some(Code::nothing()));
                }
                let test = self.compile_expr(&items[0])?;
                let body = self.compile_suite(form.rest(1), span)?;
                Code::stmt(
                    StmtKind::If {
                        test,
                        body,
                        orelse: Vec::new(),
                    },
                    span,
                )
            }
            "while" => {
                check_arity(name, form, 2, None, span)?;
                let test = self.compile_expr(&items[0])?;
                let body = self.compile_suite(form.rest(1), span)?;
                Code::stmt(StmtKind::While { test, body }, span)
            }
            "for" => self.compile_for(form, false, span)?,
            "fun" => self.compile_fun(form, false, span)?,
            "class" => self.compile_class(form, span)?,
            "do" => {
                let name = self.gensym();
                let body = self.compile_body(form.rest(0), span)?;
                self.hoist(Stmt::new(
                    StmtKind::FunctionDef(Rc::new(FunctionDef {
                        name: name.clone(),
                        params: Vec::new(),
                        body,
                        is_async: false,
                    })),
                    span,
                ));
                Code::Expr(Expr::call(Expr::name(name, span), Vec::new(), span))
            }
            "try" => self.compile_try(form, span)?,
            "with" => self.compile_with(form, false, span)?,
            "import" => self.compile_import(items, span)?,
            "importm" => {
                check_arity(name, form, 1, None, span)?;
                for item in items {
                    let module = match item.as_binop("@") {
                        Some((module, _)) => dotted(module),
                        None => dotted(item),
                    }
                    .ok_or_else(|| {
                        Error::syntax(format!("module name expected, found {item}")).at(item.span)
                    })?;
                    self.import_macros(&module, item.span)?;
                }
                Code::nothing()
            }
            "include" => self.compile_include(form, span)?,
            "return" => match items.as_slice() {
                [] => Code::stmt(StmtKind::Return(None), span),
                [value] => {
                    let value = self.compile_expr(value)?;
                    Code::stmt(StmtKind::Return(Some(value)), span)
                }
                _ => {
                    self.report("return takes at most one value.", span);
                    Code::nothing()
                }
            },
            "yield" => match items.as_slice() {
                [] => Code::Expr(Expr::new(ExprKind::Yield(None), span)),
                [value] => {
                    let value = self.compile_expr(value)?;
                    Code::Expr(Expr::new(ExprKind::Yield(Some(Box::new(value))), span))
                }
                _ => {
                    self.report("yield takes at most one value.", span);
                    Code::nothing()
                }
            },
            "yieldfrom" => match items.as_slice() {
                [value] => {
                    let value = self.compile_expr(value)?;
                    Code::Expr(Expr::new(ExprKind::YieldFrom(Box::new(value)), span))
                }
                _ => {
                    self.report("yieldfrom takes exactly one value.", span);
                    Code::nothing()
                }
            },
            "raise" => {
                check_arity(name, form, 0, Some(2), span)?;
                let mut exprs = self.compile_exprs(items)?.into_iter();
                let exc = exprs.next();
                let cause = exprs.next();
                Code::stmt(StmtKind::Raise { exc, cause }, span)
            }
            "del" => {
                check_arity(name, form, 1, None, span)?;
                let targets = items
                    .iter()
                    .map(|n| self.compile_target(n))
                    .collect::<Result<Vec<_>>>()?;
                Code::stmt(StmtKind::Delete(targets), span)
            }
            "assert" => {
                check_arity(name, form, 1, Some(2), span)?;
                let mut exprs = self.compile_exprs(items)?.into_iter();
                let test = exprs.next().unwrap_or_else(|| Expr::null(span));
                let msg = exprs.next();
                Code::stmt(StmtKind::Assert { test, msg }, span)
            }
            "pass" | "break" | "continue" => {
                check_arity(name, form, 0, Some(0), span)?;
                let kind = match name {
                    "pass" => StmtKind::Pass,
                    "break" => StmtKind::Break,
                    _ => StmtKind::Continue,
                };
                Code::stmt(kind, span)
            }
            "global" | "nonlocal" => {
                check_arity(name, form, 1, None, span)?;
                let names = items.iter().map(identifier).collect::<Result<Vec<_>>>()?;
                let kind = if name == "global" {
                    StmtKind::Global(names)
                } else {
                    StmtKind::Nonlocal(names)
                };
                Code::stmt(kind, span)
            }
            "async" => {
                check_arity(name, form, 1, None, span)?;
                let rest = form.skip(1);
                match items[0].as_identifier() {
                    Some("fun") => self.compile_fun(&rest, true, span)?,
                    Some("for") => self.compile_for(&rest, true, span)?,
                    Some("with") => self.compile_with(&rest, true, span)?,
                    _ => {
                        return Err(Error::syntax(format!(
                            "async must be followed by fun, for or with, found {}",
                            items[0]
                        ))
                        .at(span));
                    }
                }
            }
            "await" => {
                check_arity(name, form, 1, Some(1), span)?;
                let value = self.compile_expr(&items[0])?;
                Code::Expr(Expr::new(ExprKind::Await(Box::new(value)), span))
            }
            "dict" => {
                if items.len() % 2 != 0 {
                    return Err(Error::arity(name, items.len()).at(span));
                }
                let mut pairs = Vec::with_capacity(items.len() / 2);
                for pair in items.chunks(2) {
                    pairs.push((self.compile_expr(&pair[0])?, self.compile_expr(&pair[1])?));
                }
                Code::Expr(Expr::new(ExprKind::Dict(pairs), span))
            }
            "set" => {
                let elements = self.compile_exprs(items)?;
                Code::Expr(Expr::new(ExprKind::Set(elements), span))
            }
            "slice" => {
                check_arity(name, form, 0, Some(3), span)?;
                let mut bounds = self.compile_exprs(items)?.into_iter().map(Box::new);
                Code::Expr(Expr::new(
                    ExprKind::Slice {
                        lower: bounds.next(),
                        upper: bounds.next(),
                        step: bounds.next(),
                    },
                    span,
                ))
            }
            "quote" => {
                check_arity(name, form, 1, Some(1), span)?;
                let quoted = self.quote(&items[0])?;
                Code::Expr(self.compile_expr(&quoted)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(code))
    }

    /// `{if test value test value ... else}` as a chained conditional expression.
    fn compile_if(&mut self, items: &[Node], span: Span) -> Result<Code> {
        match items.len() {
            0 => {
                self.report("No arguments to if.", span);
                return Ok(Code::nothing());
            }
            1 => return Ok(Code::Expr(Expr::null(span))),
            _ => {}
        }
        let mut exprs = self.compile_exprs(items)?;
        let fallback = if exprs.len() % 2 == 1 { exprs.pop() } else { None };
        let mut result = fallback.unwrap_or_else(|| Expr::null(span));
        while let (Some(body), Some(test)) = (exprs.pop(), exprs.pop()) {
            result = Expr::new(
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(result),
                },
                span,
            );
        }
        Ok(Code::Expr(result))
    }

    fn compile_for(&mut self, form: &Form, is_async: bool, span: Span) -> Result<Code> {
        if form.len() < 2 {
            self.report("for needs a target and an iterable.", span);
            return Ok(Code::nothing());
        }
        let target = self.compile_target(&form.items[0])?;
        let iter = self.compile_expr(&form.items[1])?;
        let body = self.compile_suite(form.rest(2), span)?;
        Ok(Code::stmt(
            StmtKind::For {
                target,
                iter,
                body,
                is_async,
            },
            span,
        ))
    }

    /// `{fun name [params] body...}`, or `{fun [params] body...}` as a value.
    fn compile_fun(&mut self, form: &Form, is_async: bool, span: Span) -> Result<Code> {
        let items = &form.items;
        match items.first().map(|n| &n.kind) {
            Some(crate::node::NodeKind::Identifier(name)) => {
                check_arity("fun", form, 2, None, span)?;
                let params = lambda_params(&items[1])?;
                let body = self.compile_body(form.rest(2), span)?;
                let def = FunctionDef {
                    name: name.clone(),
                    params,
                    body,
                    is_async,
                };
                Ok(Code::stmt(StmtKind::FunctionDef(Rc::new(def)), span))
            }
            Some(_) if items[0].as_sequence_of(SequenceKind::Square).is_some() => {
                let params = lambda_params(&items[0])?;
                let body = self.compile_body(form.rest(1), span)?;
                let def = FunctionDef {
                    name: self.gensym(),
                    params,
                    body,
                    is_async,
                };
                Ok(Code::Expr(Expr::new(ExprKind::Function(Rc::new(def)), span)))
            }
            _ => Err(Error::arity("fun", items.len()).at(span)),
        }
    }

    /// `{class Name [bases and name=value entries] body...}`.
    fn compile_class(&mut self, form: &Form, span: Span) -> Result<Code> {
        check_arity("class", form, 1, None, span)?;
        let name = identifier(&form.items[0])?;
        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        let mut body_start = 1;
        if let Some(header) = form.items.get(1).and_then(|n| n.as_sequence_of(SequenceKind::Square)) {
            body_start = 2;
            for entry in self.parse_ops(&header.regular())? {
                match entry.as_binop("=") {
                    Some((key, value)) => keywords.push(Keyword {
                        name: identifier(key)?,
                        value: self.compile_expr(value)?,
                    }),
                    None => bases.push(self.compile_expr(&entry)?),
                }
            }
        }
        let body = self.compile_suite(form.rest(body_start), span)?;
        Ok(Code::stmt(
            StmtKind::ClassDef {
                name,
                bases,
                keywords,
                body,
            },
            span,
        ))
    }

    /// `{try body... {catch ...}* {else ...}? {finally ...}?}`.
    fn compile_try(&mut self, form: &Form, span: Span) -> Result<Code> {
        let clause_of = |node: &Node| {
            ["catch", "else", "finally"]
                .into_iter()
                .position(|clause| node.is_curly_headed_by(clause))
        };
        let first_clause = form
            .items
            .iter()
            .position(|n| clause_of(n).is_some())
            .unwrap_or(form.len());
        let body = self.compile_suite(form.range(0, first_clause), span)?;

        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();
        let mut last: Option<usize> = None;
        for item in &form.items[first_clause..] {
            let names = ["catch", "else", "finally"];
            let order_error = |last: Option<usize>| {
                Error::new(ErrorKind::TryClauseOrder {
                    clause: names[last.unwrap_or(0)].to_string(),
                })
                .at(item.span)
            };
            let Some(clause) = clause_of(item) else {
                return Err(order_error(last));
            };
            let in_order = match last {
                None => true,
                Some(previous) => clause > previous || (clause == 0 && previous == 0),
            };
            if !in_order {
                return Err(order_error(last));
            }
            let children = item
                .as_sequence_of(SequenceKind::Curly)
                .map(|seq| seq.regular())
                .unwrap_or_default();
            match clause {
                0 => handlers.push(self.compile_handler(&children[1..], item.span)?),
                1 => orelse = self.compile_suite(&children[1..], item.span)?,
                _ => finalbody = self.compile_suite(&children[1..], item.span)?,
            }
            last = Some(clause);
        }
        if handlers.is_empty() && finalbody.is_empty() {
            handlers.push(Handler {
                class: None,
                name: None,
                body: vec![Stmt::pass(span)],
            });
        }
        Ok(Code::stmt(
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            span,
        ))
    }

    /// `{catch}`, `{catch Type body...}` or `{catch name:Type body...}`.
    fn compile_handler(&mut self, nodes: &[Node], span: Span) -> Result<Handler> {
        let form = self.form(nodes)?;
        let Some(first) = form.items.first() else {
            return Ok(Handler {
                class: None,
                name: None,
                body: vec![Stmt::pass(span)],
            });
        };
        let (name, class) = match first.as_binop(":") {
            Some((name, class)) => (Some(identifier(name)?), self.compile_expr(class)?),
            None => (None, self.compile_expr(first)?),
        };
        Ok(Handler {
            class: Some(class),
            name,
            body: self.compile_suite(form.rest(1), span)?,
        })
    }

    /// `{with expr name body...}`; `_` binds nothing.
    fn compile_with(&mut self, form: &Form, is_async: bool, span: Span) -> Result<Code> {
        check_arity("with", form, 2, None, span)?;
        let context = self.compile_expr(&form.items[0])?;
        let target = identifier(&form.items[1])?;
        let target = (target != super::PLACEHOLDER).then_some(target);
        let body = self.compile_suite(form.rest(2), span)?;
        Ok(Code::stmt(
            StmtKind::With {
                context,
                target,
                body,
                is_async,
            },
            span,
        ))
    }

    /// `{import a a.b c@[x y]}`.
    fn compile_import(&mut self, items: &[Node], span: Span) -> Result<Code> {
        if items.is_empty() {
            return Err(Error::arity("import", 0).at(span));
        }
        let mut stmts = Vec::with_capacity(items.len());
        for item in items {
            let invalid =
                || Error::syntax(format!("module name expected, found {item}")).at(item.span);
            let kind = match item.as_binop("@") {
                Some((module, names)) => {
                    let module = dotted(module).ok_or_else(invalid)?;
                    let names = names
                        .as_sequence_of(SequenceKind::Square)
                        .ok_or_else(invalid)?
                        .regular()
                        .iter()
                        .map(|n| {
                            identifier(n).map(|name| ImportAlias { name, alias: None })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    StmtKind::ImportFrom { module, names }
                }
                None => StmtKind::Import(vec![ImportAlias {
                    name: dotted(item).ok_or_else(invalid)?,
                    alias: None,
                }]),
            };
            stmts.push(Stmt::new(kind, item.span));
        }
        Ok(Code::Stmts(stmts))
    }

    /// `{include "path"}`: compiles the named file's nodes in place.
    ///
    /// The path is relative to the file being included, or to the unit's
    /// source path at the top.
    fn compile_include(&mut self, form: &Form, span: Span) -> Result<Code> {
        check_arity("include", form, 1, Some(1), span)?;
        let relative = match literal_value(&form.items[0]) {
            Ok(Literal::Str(path)) => path,
            _ => {
                return Err(Error::syntax(format!(
                    "include expects a path string, found {}",
                    form.items[0]
                ))
                .at(span));
            }
        };
        let base = match self.include_stack.last() {
            Some(including) => Some(including.as_path()),
            None => self.config.source_path(),
        };
        let path = include_path(base, &relative);
        check_cycle(&self.include_stack, &path, &relative).map_err(|e| e.at(span))?;
        let source = self.loader.load(&path).map_err(|e| e.at(span))?;
        let nodes = regular(&parse_source(&source, &mut self.diagnostics)?);
        self.record(TraceEvent::IncludeExpanded {
            path: relative,
            nodes: nodes.len(),
        });
        self.include_stack.push(path);
        let compiled = self.compile_block(&nodes);
        self.include_stack.pop();
        Ok(Code::Stmts(compiled?))
    }
}
