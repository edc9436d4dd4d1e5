//! The meta engine: code that runs while the unit compiles.
//!
//! A meta block is compiled with identifier substitution switched off and
//! run at once in the context's meta scope. Names bound at its top level
//! become meta symbols: later call-shaped nodes headed by them are macro
//! calls, inside meta code too, which receive their unparsed argument nodes
//! and whose result is compiled in place of the call.
//!
//! Operator definitions register a precedence and a `$left`/`$right`
//! function. Every meta block and operator definition is recorded as source
//! text so a unit importing this one with `importm` can replay them.

use std::rc::Rc;

use makrell_foundation::{Error, ErrorKind, Result, Span};

use crate::codegen::Code;
use crate::context::{Context, MetaSymbol};
use crate::gensym::Gensym;
use crate::interp::builtins::nodes::value_to_node;
use crate::interp::{Args, RuntimeError, Value};
use crate::literal::{Literal, literal_value};
use crate::node::{Node, SequenceKind};
use crate::operator::{Associativity, Precedence};
use crate::target::{Expr, ExprKind, FunctionDef, StmtKind};
use crate::trace::TraceEvent;

/// Marker making a defined operator right-associative.
pub const RIGHT_ASSOC_MARKER: &str = "rightassoc";

fn meta_error(err: RuntimeError, span: Span) -> Error {
    let uncaught = Error::from(err);
    Error::new(ErrorKind::Meta(uncaught.kind.to_string())).at(span)
}

fn source_text(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Context {
    /// Compiles and runs `nodes` in the meta scope.
    ///
    /// With `record`, the block's source is kept for importers.
    ///
    /// # Errors
    /// Fails when the block does not compile or raises.
    pub fn run_meta_block(&mut self, nodes: &[Node], record: bool) -> Result<()> {
        let span = nodes.first().map(|n| n.span).unwrap_or_default();
        let source = source_text(nodes);

        self.meta_depth += 1;
        let compiled = self.compile_block(nodes);
        self.meta_depth -= 1;
        let stmts = compiled?;

        let scope = Rc::clone(&self.meta_scope);
        self.interp
            .run_statements(&stmts, &scope)
            .map_err(|e| meta_error(e, span))?;

        for stmt in &stmts {
            match &stmt.kind {
                StmtKind::FunctionDef(def) if !Gensym::is_gensym(&def.name) => {
                    self.symbols
                        .insert(def.name.clone(), MetaSymbol::Binding(Some(Rc::clone(def))));
                    self.record(TraceEvent::MacroDefined {
                        name: def.name.clone(),
                    });
                }
                StmtKind::Assign { target, .. } => {
                    if let ExprKind::Name(name) = &target.kind {
                        self.symbols.insert(name.clone(), MetaSymbol::Binding(None));
                    }
                }
                StmtKind::ClassDef { name, .. } => {
                    self.symbols.insert(name.clone(), MetaSymbol::Binding(None));
                }
                _ => {}
            }
        }

        self.record(TraceEvent::MetaBlockRun {
            nodes: nodes.len(),
            recorded: record,
        });
        if record && !self.in_meta() {
            self.meta_sources.push(source);
        }
        Ok(())
    }

    /// `{def macro ...}` and `{def operator ...}`.
    pub(crate) fn compile_def(&mut self, nodes: &[Node], span: Span) -> Result<Code> {
        match nodes.first().and_then(Node::as_identifier) {
            Some("macro") => self.define_macro(&nodes[1..], span),
            Some("operator") => {
                self.define_operator(&nodes[1..], span)?;
                Ok(Code::nothing())
            }
            _ => Err(Error::syntax("def must be followed by macro or operator").at(span)),
        }
    }

    /// `{macro name [params] body...}`: a function defined in the meta scope.
    pub(crate) fn define_macro(&mut self, nodes: &[Node], span: Span) -> Result<Code> {
        if nodes.len() < 2 {
            return Err(Error::arity("macro", nodes.len()).at(span));
        }
        let mut children = Vec::with_capacity(nodes.len() + 1);
        children.push(Node::identifier("fun", span));
        children.extend_from_slice(nodes);
        let fun = Node::sequence(SequenceKind::Curly, children, span);
        self.run_meta_block(&[fun], true)?;
        Ok(Code::nothing())
    }

    /// `{def operator SYM PREC [rightassoc] EXPR...}`.
    ///
    /// `EXPR` sees the operands as `$left` and `$right`.
    pub(crate) fn define_operator(&mut self, nodes: &[Node], span: Span) -> Result<()> {
        if nodes.len() < 3 {
            return Err(Error::arity("operator", nodes.len()).at(span));
        }
        let symbol = nodes[0]
            .as_operator()
            .ok_or_else(|| {
                Error::syntax(format!("operator symbol expected, found {}", nodes[0]))
                    .at(nodes[0].span)
            })?
            .to_string();
        let level = match literal_value(&nodes[1]) {
            Ok(Literal::Int(level)) => i32::try_from(level).map_err(|_| {
                Error::syntax(format!("precedence out of range: {level}")).at(nodes[1].span)
            })?,
            _ => {
                return Err(Error::syntax(format!(
                    "integer precedence expected, found {}",
                    nodes[1]
                ))
                .at(nodes[1].span));
            }
        };
        let (associativity, body) = if nodes[2].is_identifier(RIGHT_ASSOC_MARKER) {
            (Associativity::Right, &nodes[3..])
        } else {
            (Associativity::Left, &nodes[2..])
        };
        if body.is_empty() {
            return Err(Error::arity("operator", nodes.len()).at(span));
        }

        let params = vec![
            crate::codegen::LEFT_PARAM.to_string(),
            crate::codegen::RIGHT_PARAM.to_string(),
        ];
        let parsed = self.parse_ops(body)?;
        let func = if let [expr] = parsed.as_slice() {
            let expr = self.compile_expr(expr)?;
            Expr::lambda(params, expr, span)
        } else {
            let body = self.compile_body(body, span)?;
            let def = FunctionDef {
                name: self.gensym(),
                params,
                body,
                is_async: false,
            };
            Expr::new(ExprKind::Function(Rc::new(def)), span)
        };

        self.operators
            .borrow_mut()
            .define(symbol.clone(), Precedence::new(level, associativity));
        self.symbols.insert(symbol.clone(), MetaSymbol::Operator(func));
        self.record(TraceEvent::OperatorDefined {
            symbol,
            level,
            right_assoc: associativity == Associativity::Right,
        });
        if !self.in_meta() {
            self.meta_sources
                .push(format!("{{def operator {}}}", source_text(nodes)));
        }
        Ok(())
    }

    /// Calls macro `name` with raw argument nodes and compiles its result.
    ///
    /// # Errors
    /// Fails when the macro raises, returns something that is not syntax,
    /// or expansions nest deeper than the configured limit.
    pub(crate) fn expand_macro(&mut self, name: &str, args: Vec<Node>, span: Span) -> Result<Code> {
        let max = self.config.max_expansion_depth();
        if self.expansion_depth >= max {
            return Err(Error::new(ErrorKind::ExpansionDepth(max)).at(span));
        }
        self.expansion_depth += 1;
        let result = self.expand(name, args, span);
        self.expansion_depth -= 1;
        result
    }

    fn expand(&mut self, name: &str, args: Vec<Node>, span: Span) -> Result<Code> {
        let func = self.meta_scope.lookup(name).ok_or_else(|| {
            Error::new(ErrorKind::Meta(format!("macro {name} is not defined"))).at(span)
        })?;
        let arg = Value::list(args.into_iter().map(Value::node).collect());
        let value = self
            .interp
            .call(&func, Args::new(vec![arg]))
            .map_err(|e| meta_error(e, span))?;

        let items = match &value {
            Value::List(items) => items.borrow().clone(),
            Value::Tuple(items) => items.as_ref().clone(),
            other => vec![other.clone()],
        };
        let mut nodes = Vec::with_capacity(items.len());
        for item in &items {
            let node = value_to_node(item).map_err(|e| meta_error(e, span))?;
            if node.is_regular() {
                nodes.push(if node.span == Span::at_start() {
                    node.with_span_deep(span)
                } else {
                    node
                });
            }
        }
        self.record(TraceEvent::MacroExpanded {
            name: name.to_string(),
            produced: nodes.len(),
        });
        match nodes.as_slice() {
            [node] if !matches!(value, Value::List(_) | Value::Tuple(_)) => self.compile(node),
            _ => Ok(Code::Stmts(self.compile_block(&nodes)?)),
        }
    }

    /// Replays the recorded meta blocks of `module`.
    ///
    /// # Errors
    /// Fails when no resolver is set, the module cannot be resolved, or a
    /// replayed block fails.
    pub(crate) fn import_macros(&mut self, module: &str, span: Span) -> Result<()> {
        let resolver = self
            .resolver
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::ModuleNotFound(module.to_string())).at(span))?;
        let unit = resolver.resolve(module).map_err(|e| e.at(span))?;
        for source in &unit.meta_sources {
            let nodes = self.parse(source)?;
            self.run_meta_block(&nodes, true)?;
        }
        self.record(TraceEvent::MacroModuleImported {
            module: module.to_string(),
            blocks: unit.meta_sources.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::MemoryResolver;

    fn eval(ctx: &mut Context, source: &str) -> Value {
        ctx.eval_source(source).expect("runs")
    }

    #[test]
    fn meta_blocks_run_during_compilation() {
        let mut ctx = Context::bare();
        ctx.compile_source("{meta counter = 41 {print \"compiling\"}}").expect("compiles");
        assert_eq!(ctx.take_output(), ["compiling"]);
        assert!(ctx.is_meta_symbol("counter"));
        assert_eq!(eval(&mut ctx, "counter + 1"), Value::Int(42));
    }

    #[test]
    fn macros_receive_raw_nodes() {
        let mut ctx = Context::new().expect("prelude");
        let source = r#"
            {macro count_args [ns] {len {regular ns}}}
            {count_args a + b c}
        "#;
        assert_eq!(eval(&mut ctx, source), Value::Int(4));
    }

    #[test]
    fn macros_returning_syntax_are_compiled() {
        let mut ctx = Context::new().expect("prelude");
        let source = r#"
            {def macro swap_sub [ns]
                ns = {operator_parse {regular ns}}
                {quote {$ ns@1} - {$ ns@0}}}
            {swap_sub 1 10}
        "#;
        assert_eq!(eval(&mut ctx, source), Value::Int(9));
    }

    #[test]
    fn macros_returning_lists_compile_every_node() {
        let mut ctx = Context::new().expect("prelude");
        let source = r#"
            {def macro twice [ns]
                ns = {operator_parse {regular ns}}
                [ns@0 ns@0]}
            n = 0
            {twice n = n + 1}
            n
        "#;
        assert_eq!(eval(&mut ctx, source), Value::Int(2));

        let mut ctx = Context::new().expect("prelude");
        let source = r#"
            {macro defs [ns]
                [{quote a = 1} {quote b = 2}]}
            {defs}
            a + b
        "#;
        assert_eq!(eval(&mut ctx, source), Value::Int(3));
    }

    #[test]
    fn macro_bodies_expand_other_macros() {
        let mut ctx = Context::new().expect("prelude");
        let source = "{macro m [ns] x = 0 {unless false x = 1} x} {m}";
        assert_eq!(eval(&mut ctx, source), Value::Int(1));

        let mut ctx = Context::new().expect("prelude");
        let source = r#"
            {macro m2 [ns] {unless false {print "expanding"}} {quote 5}}
            {m2}
        "#;
        assert_eq!(eval(&mut ctx, source), Value::Int(5));
        assert_eq!(ctx.take_output(), ["expanding"]);
    }

    #[test]
    fn macros_defined_in_meta_blocks_expand_in_later_meta_code() {
        let mut ctx = Context::new().expect("prelude");
        let source = r#"
            {macro twice [ns] ns = {regular ns} {quote {$ ns@0} * 2}}
            {meta doubled = {twice 21}}
            doubled
        "#;
        assert_eq!(eval(&mut ctx, source), Value::Int(42));
    }

    #[test]
    fn operators_bind_after_their_definition() {
        let mut ctx = Context::bare();
        assert!(ctx.compile_source("1 +* 2").is_err());

        let mut ctx = Context::bare();
        let source = "{def operator +* 110 $left * 10 + $right} 1 +* 2";
        assert_eq!(eval(&mut ctx, source), Value::Int(12));
    }

    #[test]
    fn operator_associativity() {
        let mut ctx = Context::bare();
        let left = "{def operator <- 110 [$left $right]} 1 <- 2 <- 3";
        assert_eq!(eval(&mut ctx, left).to_string(), "[[1, 2], 3]");
        let mut ctx = Context::bare();
        let right = "{def operator <- 110 rightassoc [$left $right]} 1 <- 2 <- 3";
        assert_eq!(eval(&mut ctx, right).to_string(), "[1, [2, 3]]");
    }

    #[test]
    fn recursive_macros_hit_the_depth_limit() {
        let config = crate::context::ContextConfig::new().with_max_expansion_depth(5);
        let mut ctx = Context::with_config(config).expect("prelude");
        let err = ctx
            .eval_source("{macro loop [ns] {quote {loop}}} {loop}")
            .expect_err("too deep");
        assert!(matches!(err.kind, ErrorKind::ExpansionDepth(5)));
        assert_eq!(ctx.expansion_depth, 0);
    }

    #[test]
    fn macros_returning_infinity_fail_with_a_type_error() {
        let mut ctx = Context::new().expect("prelude");
        let err = ctx
            .eval_source("{macro inf [ns] {float \"inf\"}} {inf}")
            .expect_err("no literal");
        assert!(matches!(err.kind, ErrorKind::Meta(ref m) if m.starts_with("TypeError: cannot convert non-finite float")));
    }

    #[test]
    fn failing_meta_code_is_a_meta_error() {
        let mut ctx = Context::bare();
        let err = ctx.compile_source("{meta {raise {ValueError \"no\"}}}").expect_err("raises");
        assert!(matches!(err.kind, ErrorKind::Meta(ref m) if m == "ValueError: no"));
    }

    #[test]
    fn meta_sources_are_recorded() {
        let mut ctx = Context::bare();
        let unit = ctx
            .compile_source("{meta x = 1} {def operator %% 120 $left % $right}")
            .expect("compiles");
        assert_eq!(unit.meta_sources.len(), 2);
        assert_eq!(unit.meta_sources[0], "x = 1");
        assert!(unit.meta_sources[1].starts_with("{def operator %% 120"));
    }

    #[test]
    fn importm_replays_macros_and_operators() {
        let resolver = MemoryResolver::new();
        resolver.add(
            "lib",
            "{def operator ^^ 130 rightassoc $left ** $right} {macro ident [ns] {regular ns}@0}",
        );
        let mut ctx = Context::new().expect("prelude");
        ctx.set_resolver(resolver);
        assert_eq!(eval(&mut ctx, "{importm lib} 2 ^^ 3"), Value::Int(8));
        assert_eq!(eval(&mut ctx, "{ident 7}"), Value::Int(7));
        assert!(ctx.is_meta_symbol("ident"));
    }

    #[test]
    fn importm_without_resolver_fails() {
        let mut ctx = Context::bare();
        let err = ctx.compile_source("{importm lib}").expect_err("no resolver");
        assert!(matches!(err.kind, ErrorKind::ModuleNotFound(_)));
    }
}
