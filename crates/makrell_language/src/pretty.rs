//! Pretty-printer for target programs.
//!
//! Renders a [`Program`] as indented pseudo-source, used by `--emit` and
//! the REPL's `:emit` command.
//!
//! # Example
//!
//! ```
//! use makrell_language::{Context, pretty::pretty_print};
//!
//! let mut ctx = Context::bare();
//! let unit = ctx.compile_source("x = 2 + 3").unwrap();
//! assert_eq!(pretty_print(&unit.program), "x = (2 + 3)");
//! ```

use std::fmt::Write;

use crate::literal::escape;
use crate::target::{
    BoolOperator, Constant, Expr, ExprKind, FunctionDef, Handler, ImportAlias, Keyword, Program,
    Stmt, StmtKind,
};

/// Configuration for pretty-printing.
#[derive(Debug, Clone)]
pub struct PrettyConfig {
    /// Number of spaces for each indentation level.
    pub indent_width: usize,
}

impl Default for PrettyConfig {
    fn default() -> Self {
        Self { indent_width: 4 }
    }
}

/// Pretty-prints a program with the default configuration.
#[must_use]
pub fn pretty_print(program: &Program) -> String {
    pretty_print_with_config(program, &PrettyConfig::default())
}

/// Pretty-prints a program with a custom configuration.
#[must_use]
pub fn pretty_print_with_config(program: &Program, config: &PrettyConfig) -> String {
    let mut printer = PrettyPrinter {
        config: config.clone(),
        output: String::new(),
        indent_level: 0,
    };
    printer.block(&program.body);
    printer.output.trim_end().to_string()
}

/// Renders one expression on a single line.
#[must_use]
pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

struct PrettyPrinter {
    config: PrettyConfig,
    output: String,
    indent_level: usize,
}

impl PrettyPrinter {
    fn line(&mut self, text: &str) {
        let pad = " ".repeat(self.indent_level * self.config.indent_width);
        let _ = writeln!(self.output, "{pad}{text}");
    }

    fn nested(&mut self, header: &str, body: &[Stmt]) {
        self.line(header);
        self.indent_level += 1;
        if body.is_empty() {
            self.line("pass");
        } else {
            self.block(body);
        }
        self.indent_level -= 1;
    }

    fn block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        let prefix = if def.is_async { "async fun" } else { "fun" };
        let header = format!("{prefix} {}({}):", def.name, def.params.join(", "));
        self.nested(&header, &def.body);
    }

    fn handler(&mut self, handler: &Handler) {
        let header = match (&handler.class, &handler.name) {
            (None, _) => "catch:".to_string(),
            (Some(class), None) => format!("catch {}:", expr_to_string(class)),
            (Some(class), Some(name)) => format!("catch {} as {name}:", expr_to_string(class)),
        };
        self.nested(&header, &handler.body);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.line(&expr_to_string(expr)),
            StmtKind::Assign { target, value } => {
                self.line(&format!("{} = {}", expr_to_string(target), expr_to_string(value)));
            }
            StmtKind::FunctionDef(def) => self.function(def),
            StmtKind::ClassDef {
                name,
                bases,
                keywords,
                body,
            } => {
                let mut parts: Vec<String> = bases.iter().map(expr_to_string).collect();
                parts.extend(keywords.iter().map(keyword_to_string));
                self.nested(&format!("class {name}({}):", parts.join(", ")), body);
            }
            StmtKind::Return(value) => match value {
                Some(value) => self.line(&format!("return {}", expr_to_string(value))),
                None => self.line("return"),
            },
            StmtKind::If { test, body, orelse } => {
                self.nested(&format!("if {}:", expr_to_string(test)), body);
                if !orelse.is_empty() {
                    self.nested("else:", orelse);
                }
            }
            StmtKind::While { test, body } => {
                self.nested(&format!("while {}:", expr_to_string(test)), body);
            }
            StmtKind::For {
                target,
                iter,
                body,
                is_async,
            } => {
                let prefix = if *is_async { "async for" } else { "for" };
                let header = format!(
                    "{prefix} {} in {}:",
                    expr_to_string(target),
                    expr_to_string(iter)
                );
                self.nested(&header, body);
            }
            StmtKind::With {
                context,
                target,
                body,
                is_async,
            } => {
                let prefix = if *is_async { "async with" } else { "with" };
                let header = match target {
                    Some(name) => format!("{prefix} {} as {name}:", expr_to_string(context)),
                    None => format!("{prefix} {}:", expr_to_string(context)),
                };
                self.nested(&header, body);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.nested("try:", body);
                for handler in handlers {
                    self.handler(handler);
                }
                if !orelse.is_empty() {
                    self.nested("else:", orelse);
                }
                if !finalbody.is_empty() {
                    self.nested("finally:", finalbody);
                }
            }
            StmtKind::Raise { exc, cause } => {
                let mut text = "raise".to_string();
                if let Some(exc) = exc {
                    let _ = write!(text, " {}", expr_to_string(exc));
                }
                if let Some(cause) = cause {
                    let _ = write!(text, " from {}", expr_to_string(cause));
                }
                self.line(&text);
            }
            StmtKind::Assert { test, msg } => match msg {
                Some(msg) => self.line(&format!(
                    "assert {}, {}",
                    expr_to_string(test),
                    expr_to_string(msg)
                )),
                None => self.line(&format!("assert {}", expr_to_string(test))),
            },
            StmtKind::Delete(targets) => {
                let list: Vec<String> = targets.iter().map(expr_to_string).collect();
                self.line(&format!("del {}", list.join(", ")));
            }
            StmtKind::Import(names) => self.line(&format!("import {}", aliases(names))),
            StmtKind::ImportFrom { module, names } => {
                self.line(&format!("from {module} import {}", aliases(names)));
            }
            StmtKind::Global(names) => self.line(&format!("global {}", names.join(", "))),
            StmtKind::Nonlocal(names) => self.line(&format!("nonlocal {}", names.join(", "))),
            StmtKind::Pass => self.line("pass"),
            StmtKind::Break => self.line("break"),
            StmtKind::Continue => self.line("continue"),
        }
    }
}

fn aliases(names: &[ImportAlias]) -> String {
    names
        .iter()
        .map(|a| match &a.alias {
            Some(alias) => format!("{} as {alias}", a.name),
            None => a.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn keyword_to_string(keyword: &Keyword) -> String {
    format!("{}={}", keyword.name, expr_to_string(&keyword.value))
}

fn constant_to_string(value: &Constant) -> String {
    match value {
        Constant::None => "null".to_string(),
        Constant::Bool(b) => b.to_string(),
        Constant::Int(n) => n.to_string(),
        Constant::Float(f) => format!("{f:?}"),
        Constant::Complex(re, im) => format!("({re:?}+{im:?}i)"),
        Constant::Str(s) => format!("\"{}\"", escape(s)),
        Constant::DateTime(dt) => format!("\"{dt}\"dt"),
        Constant::Regex(r) => format!("\"{r}\"regex"),
    }
}

fn join(out: &mut String, items: &[Expr]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item);
    }
}

fn write_opt(out: &mut String, expr: Option<&Expr>) {
    if let Some(expr) = expr {
        write_expr(out, expr);
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Constant(value) => out.push_str(&constant_to_string(value)),
        ExprKind::Name(name) => out.push_str(name),
        ExprKind::BinOp { left, op, right } => {
            out.push('(');
            write_expr(out, left);
            let _ = write!(out, " {} ", op.symbol());
            write_expr(out, right);
            out.push(')');
        }
        ExprKind::Not(operand) => {
            out.push_str("not ");
            write_expr(out, operand);
        }
        ExprKind::BoolOp { op, left, right } => {
            out.push('(');
            write_expr(out, left);
            out.push_str(match op {
                BoolOperator::And => " and ",
                BoolOperator::Or => " or ",
            });
            write_expr(out, right);
            out.push(')');
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            out.push('(');
            write_expr(out, left);
            for (op, right) in ops.iter().zip(comparators) {
                let _ = write!(out, " {} ", op.symbol());
                write_expr(out, right);
            }
            out.push(')');
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            write_expr(out, func);
            out.push('(');
            join(out, args);
            for (i, kw) in keywords.iter().enumerate() {
                if i > 0 || !args.is_empty() {
                    out.push_str(", ");
                }
                out.push_str(&keyword_to_string(kw));
            }
            out.push(')');
        }
        ExprKind::Lambda { params, body } => {
            let _ = write!(out, "(lambda {}: ", params.join(", "));
            write_expr(out, body);
            out.push(')');
        }
        ExprKind::Function(def) => {
            let _ = write!(out, "<fun {}({})>", def.name, def.params.join(", "));
        }
        ExprKind::IfExp { test, body, orelse } => {
            out.push('(');
            write_expr(out, body);
            out.push_str(" if ");
            write_expr(out, test);
            out.push_str(" else ");
            write_expr(out, orelse);
            out.push(')');
        }
        ExprKind::Attribute { value, attr } => {
            write_expr(out, value);
            let _ = write!(out, ".{attr}");
        }
        ExprKind::Subscript { value, index } => {
            write_expr(out, value);
            out.push('[');
            write_expr(out, index);
            out.push(']');
        }
        ExprKind::Slice { lower, upper, step } => {
            write_opt(out, lower.as_deref());
            out.push(':');
            write_opt(out, upper.as_deref());
            if let Some(step) = step {
                out.push(':');
                write_expr(out, step);
            }
        }
        ExprKind::List(items) => {
            out.push('[');
            join(out, items);
            out.push(']');
        }
        ExprKind::Tuple(items) => {
            out.push('(');
            join(out, items);
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        ExprKind::Set(items) => {
            out.push_str("set(");
            join(out, items);
            out.push(')');
        }
        ExprKind::Dict(pairs) => {
            out.push('{');
            for (i, (key, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, key);
                out.push_str(": ");
                write_expr(out, value);
            }
            out.push('}');
        }
        ExprKind::Yield(value) => {
            out.push_str("(yield");
            if let Some(value) = value {
                out.push(' ');
                write_expr(out, value);
            }
            out.push(')');
        }
        ExprKind::YieldFrom(value) => {
            out.push_str("(yield from ");
            write_expr(out, value);
            out.push(')');
        }
        ExprKind::Await(value) => {
            out.push_str("(await ");
            write_expr(out, value);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::BinOperator;
    use makrell_foundation::Span;
    use std::rc::Rc;

    fn sp() -> Span {
        Span::at_start()
    }

    fn int(n: i64) -> Expr {
        Expr::constant(Constant::Int(n), sp())
    }

    #[test]
    fn prints_nested_function() {
        let def = FunctionDef {
            name: "add".into(),
            params: vec!["a".into(), "b".into()],
            body: vec![Stmt::new(
                StmtKind::Return(Some(Expr::new(
                    ExprKind::BinOp {
                        left: Box::new(Expr::name("a", sp())),
                        op: BinOperator::Add,
                        right: Box::new(Expr::name("b", sp())),
                    },
                    sp(),
                ))),
                sp(),
            )],
            is_async: false,
        };
        let program = Program {
            body: vec![Stmt::new(StmtKind::FunctionDef(Rc::new(def)), sp())],
        };
        assert_eq!(pretty_print(&program), "fun add(a, b):\n    return (a + b)");
    }

    #[test]
    fn prints_calls_with_keywords() {
        let call = Expr::new(
            ExprKind::Call {
                func: Box::new(Expr::name("f", sp())),
                args: vec![int(1)],
                keywords: vec![Keyword {
                    name: "k".into(),
                    value: Expr::constant(Constant::Str("v\"".into()), sp()),
                }],
            },
            sp(),
        );
        assert_eq!(expr_to_string(&call), r#"f(1, k="v\"")"#);
    }

    #[test]
    fn prints_empty_bodies_as_pass() {
        let program = Program {
            body: vec![Stmt::new(
                StmtKind::While {
                    test: Expr::constant(Constant::Bool(true), sp()),
                    body: Vec::new(),
                },
                sp(),
            )],
        };
        assert_eq!(pretty_print(&program), "while true:\n    pass");
    }

    #[test]
    fn prints_one_tuple_with_comma() {
        let tuple = Expr::new(ExprKind::Tuple(vec![int(1)]), sp());
        assert_eq!(expr_to_string(&tuple), "(1,)");
    }
}
