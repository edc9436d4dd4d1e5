//! Quasiquotation.
//!
//! Quoting turns a node into a node that, compiled and run, rebuilds the
//! original: `x` becomes `{Identifier "x"}`, `a + 1` becomes
//! `{BinOp {Identifier "a"} "+" {Number "1" ""}}`, and a bracket sequence
//! becomes a call of its kind's constructor on a list of quoted children.
//! Node classes are runtime constructors, so the same tree type is both
//! code and data.
//!
//! `{unquote expr}` (or `{$ expr}`) inside a quoted tree is not quoted; its
//! expression is compiled as is and its value spliced in. Sequence
//! constructors flatten list arguments, so an unquote producing a list of
//! nodes splices all of them.

use makrell_foundation::{Error, Result, Span};

use crate::context::Context;
use crate::literal::escape;
use crate::node::{Node, NodeKind, SequenceKind, regular};
use crate::operator::{Precedence, parse_operators};

/// Heads of unquote escapes.
pub const UNQUOTE_MARKERS: [&str; 2] = ["unquote", "$"];

fn text(value: &str, span: Span) -> Node {
    Node::string(format!("\"{}\"", escape(value)), "", span)
}

fn construct(class: &str, args: Vec<Node>, span: Span) -> Node {
    let mut nodes = Vec::with_capacity(args.len() + 1);
    nodes.push(Node::identifier(class, span));
    nodes.extend(args);
    Node::sequence(SequenceKind::Curly, nodes, span)
}

/// The escaped expression of an unquote node, if `node` is one.
fn unquoted(node: &Node, lookup: &dyn Fn(&str) -> Precedence) -> Result<Option<Node>> {
    let Some(seq) = node.as_sequence_of(SequenceKind::Curly) else {
        return Ok(None);
    };
    let children = seq.regular();
    let is_escape = children
        .first()
        .and_then(Node::as_identifier)
        .is_some_and(|head| UNQUOTE_MARKERS.contains(&head));
    if !is_escape {
        return Ok(None);
    }
    let parsed = parse_operators(&children[1..], lookup)?;
    match parsed.into_iter().next() {
        Some(expr) => Ok(Some(expr)),
        None => Err(Error::arity("unquote", 0).at(node.span)),
    }
}

/// Quotes `node`. With `raw`, trivia inside sequences is kept.
///
/// # Errors
/// Fails on an empty unquote and on operator errors inside one.
pub fn quote_with(node: &Node, raw: bool, lookup: &dyn Fn(&str) -> Precedence) -> Result<Node> {
    let span = node.span;
    Ok(match &node.kind {
        NodeKind::Identifier(v) => construct("Identifier", vec![text(v, span)], span),
        NodeKind::Operator(v) => construct("Operator", vec![text(v, span)], span),
        NodeKind::Whitespace(v) => construct("Whitespace", vec![text(v, span)], span),
        NodeKind::Comment(v) => construct("Comment", vec![text(v, span)], span),
        NodeKind::Unknown(v) => construct("Unknown", vec![text(v, span)], span),
        NodeKind::String { value, suffix } => {
            construct("String", vec![text(value, span), text(suffix, span)], span)
        }
        NodeKind::Number { value, suffix } => {
            construct("Number", vec![text(value, span), text(suffix, span)], span)
        }
        NodeKind::BinOp { left, op, right } => construct(
            "BinOp",
            vec![
                quote_with(left, raw, lookup)?,
                text(op, span),
                quote_with(right, raw, lookup)?,
            ],
            span,
        ),
        NodeKind::Sequence(seq) => {
            if let Some(expr) = unquoted(node, lookup)? {
                return Ok(expr);
            }
            let children = if raw {
                seq.nodes.as_ref().clone()
            } else {
                regular(&seq.nodes)
            };
            let quoted = children
                .iter()
                .map(|n| quote_with(n, raw, lookup))
                .collect::<Result<Vec<_>>>()?;
            let list = Node::sequence(SequenceKind::Square, quoted, span);
            construct(seq.kind.name(), vec![list], span)
        }
    })
}

impl Context {
    /// Quotes `node` with the current operator table.
    ///
    /// # Errors
    /// See [`quote_with`].
    pub fn quote(&self, node: &Node) -> Result<Node> {
        let table = self.operators.borrow();
        quote_with(node, false, &|op| table.lookup(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Value;

    fn eval(source: &str) -> Value {
        let mut ctx = Context::new().expect("prelude");
        ctx.eval_source(source).expect("runs")
    }

    #[test]
    fn quoting_identifiers_builds_constructor_calls() {
        let mut ctx = Context::bare();
        let node = ctx.parse("x").expect("parses").remove(0);
        let quoted = ctx.quote(&node).expect("quotes");
        assert_eq!(quoted.to_string(), "{Identifier \"x\"}");
    }

    #[test]
    fn quoted_literals_evaluate_to_equal_values() {
        for (source, expected) in [("5", Value::Int(5)), ("true", Value::Bool(true)), ("null", Value::None)] {
            let mut ctx = Context::new().expect("prelude");
            let quoted = ctx.eval_source(&format!("{{quote {source}}}")).expect("runs");
            let node = quoted.as_node().expect("node").clone();
            assert_eq!(ctx.eval_nodes(&[node]).expect("runs"), expected, "{source}");
        }
        assert_eq!(eval("{quote \"hi\"}").to_string(), "\"hi\"");
    }

    #[test]
    fn quoted_code_keeps_its_structure() {
        assert_eq!(eval("{node_name {quote a + 1}}").to_string(), "BinOp");
        assert_eq!(eval("{quote {f a + 1 [b]}}").to_string(), "{f a + 1 [b]}");
    }

    #[test]
    fn unquote_splices_values() {
        assert_eq!(eval("n = 3 {quote {f {$ n + 1}}}").to_string(), "{f 4}");
        assert_eq!(eval("xs = [1 2] {quote [0 {unquote xs}]}").to_string(), "[0 1 2]");
    }

    #[test]
    fn empty_unquote_is_an_arity_error() {
        let mut ctx = Context::bare();
        let node = ctx.parse("{$}").expect("parses").remove(0);
        assert!(ctx.quote(&node).is_err());
    }
}
