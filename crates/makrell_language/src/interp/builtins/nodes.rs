//! Syntax nodes as runtime values.
//!
//! Node classes double as constructors, so quoted code (which compiles to
//! calls like `{CurlyBrackets [{Identifier "f"} {Number "1" ""}]}`) rebuilds
//! the original tree. Sequence constructors flatten list arguments, which
//! is what makes list-valued unquotes splice.

use std::cell::RefCell;
use std::rc::Rc;

use makrell_foundation::Span;

use super::register;
use crate::gensym::Gensym;
use crate::interp::value::{Args, NativeFunction, NodeClass, Value};
use crate::interp::{Interpreter, RtResult, RuntimeError, literal_to_value};
use crate::literal::{escape, literal_value};
use crate::node::{Node, NodeKind, SequenceKind};
use crate::operator::{OperatorTable, parse_operators};

pub(super) fn install(interp: &Interpreter) {
    register(interp, "regular", native_regular);
    register(interp, "literal_value", native_literal_value);
    register(interp, "node_name", native_node_name);
}

/// Builds a node of `class` from constructor arguments.
///
/// # Errors
/// Raises `TypeError` for missing or ill-typed fields.
pub(crate) fn construct(_interp: &mut Interpreter, class: NodeClass, args: Args) -> RtResult<Value> {
    let span = Span::at_start();
    let text = |i: usize| -> RtResult<String> {
        match args.get(i) {
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(Value::Int(n)) => Ok(n.to_string()),
            Some(Value::Float(f)) => Ok(Value::Float(*f).to_string()),
            None if i > 0 => Ok(String::new()),
            _ => Err(RuntimeError::type_error(format!(
                "{}() field {} must be a string",
                class.name(),
                i + 1
            ))),
        }
    };
    let node = match class {
        NodeClass::Identifier => Node::identifier(text(0)?, span),
        NodeClass::Operator => Node::operator(text(0)?, span),
        NodeClass::Whitespace => Node::new(NodeKind::Whitespace(text(0)?), span),
        NodeClass::Comment => Node::new(NodeKind::Comment(text(0)?), span),
        NodeClass::Unknown => Node::new(NodeKind::Unknown(text(0)?), span),
        NodeClass::String => Node::string(text(0)?, text(1)?, span),
        NodeClass::Number => Node::number(text(0)?, text(1)?, span),
        NodeClass::BinOp => {
            args.check("BinOp", 3, 3)?;
            let left = value_to_node(&args.positional[0])?;
            let op = text(1)?;
            let right = value_to_node(&args.positional[2])?;
            Node::binop(left, op, right)
        }
        NodeClass::Sequence => sequence(SequenceKind::NoBrackets, &args)?,
        NodeClass::RoundBrackets => sequence(SequenceKind::Round, &args)?,
        NodeClass::SquareBrackets => sequence(SequenceKind::Square, &args)?,
        NodeClass::CurlyBrackets => sequence(SequenceKind::Curly, &args)?,
        NodeClass::Node => return Err(RuntimeError::type_error("Node() cannot be instantiated")),
    };
    Ok(Value::node(node))
}

fn sequence(kind: SequenceKind, args: &Args) -> RtResult<Node> {
    let mut nodes = Vec::new();
    for arg in &args.positional {
        flatten_into(arg, &mut nodes)?;
    }
    Ok(Node::sequence(kind, nodes, Span::at_start()))
}

fn flatten_into(value: &Value, out: &mut Vec<Node>) -> RtResult<()> {
    match value {
        Value::List(items) => {
            for item in items.borrow().iter() {
                flatten_into(item, out)?;
            }
        }
        Value::Tuple(items) => {
            for item in items.iter() {
                flatten_into(item, out)?;
            }
        }
        other => out.push(value_to_node(other)?),
    }
    Ok(())
}

/// Converts a runtime value into syntax that evaluates back to it.
///
/// # Errors
/// Raises `TypeError` for values without a literal form.
pub fn value_to_node(value: &Value) -> RtResult<Node> {
    let span = Span::at_start();
    Ok(match value {
        Value::Node(node) => node.as_ref().clone(),
        Value::None => Node::identifier("null", span),
        Value::Bool(b) => Node::identifier(b.to_string(), span),
        Value::Int(n) => Node::number(n.to_string(), "", span),
        Value::Float(f) if !f.is_finite() => {
            return Err(RuntimeError::type_error(format!(
                "cannot convert non-finite float {} to syntax",
                Value::Float(*f)
            )));
        }
        Value::Float(f) => Node::number(Value::Float(*f).to_string(), "", span),
        Value::Str(s) => Node::string(format!("\"{}\"", escape(s)), "", span),
        Value::List(items) => {
            let nodes = items.borrow().iter().map(value_to_node).collect::<RtResult<_>>()?;
            Node::sequence(SequenceKind::Square, nodes, span)
        }
        other => {
            return Err(RuntimeError::type_error(format!(
                "cannot convert {} to syntax",
                other.type_name()
            )));
        }
    })
}

/// Attribute `attr` of a node value.
pub(crate) fn node_attr(node: &Rc<Node>, attr: &str) -> Option<Value> {
    Some(match (&node.kind, attr) {
        (
            NodeKind::Identifier(text)
            | NodeKind::Operator(text)
            | NodeKind::Whitespace(text)
            | NodeKind::Comment(text)
            | NodeKind::Unknown(text),
            "value",
        ) => Value::str(text),
        (NodeKind::String { value, .. } | NodeKind::Number { value, .. }, "value") => {
            Value::str(value)
        }
        (NodeKind::String { suffix, .. } | NodeKind::Number { suffix, .. }, "suffix") => {
            Value::str(suffix)
        }
        (NodeKind::Sequence(seq), "nodes") => {
            Value::list(seq.nodes.iter().cloned().map(Value::node).collect())
        }
        (NodeKind::BinOp { left, .. }, "left") => Value::node(left.as_ref().clone()),
        (NodeKind::BinOp { op, .. }, "op") => Value::str(op),
        (NodeKind::BinOp { right, .. }, "right") => Value::node(right.as_ref().clone()),
        (_, "line") => Value::Int(i64::from(node.span.line)),
        (_, "column") => Value::Int(i64::from(node.span.column)),
        _ => return None,
    })
}

fn node_items(interp: &mut Interpreter, value: &Value) -> RtResult<Vec<Value>> {
    match value {
        Value::Node(node) => match node.as_sequence() {
            Some(seq) => Ok(seq.nodes.iter().cloned().map(Value::node).collect()),
            None => Ok(vec![value.clone()]),
        },
        other => interp.iter_values(other),
    }
}

/// regular: drops whitespace, comments and unknown runs
fn native_regular(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("regular", 1, 1)?;
    let items = node_items(interp, &args.positional[0])?;
    Ok(Value::list(
        items
            .into_iter()
            .filter(|v| v.as_node().is_none_or(Node::is_regular))
            .collect(),
    ))
}

/// literal_value: the value of a string or number node
fn native_literal_value(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("literal_value", 1, 1)?;
    let node = args.positional[0]
        .as_node()
        .ok_or_else(|| RuntimeError::type_error("literal_value() expects a node"))?;
    let literal = literal_value(node).map_err(|e| RuntimeError::value_error(e.to_string()))?;
    literal_to_value(literal)
}

/// node_name: the variant name of a node
fn native_node_name(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("node_name", 1, 1)?;
    let node = args.positional[0]
        .as_node()
        .ok_or_else(|| RuntimeError::type_error("node_name() expects a node"))?;
    Ok(Value::str(node.variant_name()))
}

/// `operator_parse` bound to a compilation's operator table.
#[must_use]
pub fn operator_parse_native(table: Rc<RefCell<OperatorTable>>) -> Value {
    NativeFunction::value("operator_parse", move |interp, args| {
        args.check("operator_parse", 1, 1)?;
        let items = node_items(interp, &args.positional[0])?;
        let nodes = items.iter().map(value_to_node).collect::<RtResult<Vec<_>>>()?;
        let table = table.borrow();
        let parsed = parse_operators(&nodes, |op| table.lookup(op))
            .map_err(|e| RuntimeError::value_error(e.to_string()))?;
        Ok(Value::list(parsed.into_iter().map(Value::node).collect()))
    })
}

/// `gensym` sharing a compilation's counter.
#[must_use]
pub fn gensym_native(gensym: Gensym) -> Value {
    NativeFunction::value("gensym", move |_, args| {
        args.check("gensym", 0, 0)?;
        Ok(Value::str(gensym.next()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ExceptionKind;

    fn ctor(interp: &mut Interpreter, class: NodeClass, args: Vec<Value>) -> Node {
        let value = construct(interp, class, Args::new(args)).expect("constructs");
        value.as_node().expect("node").clone()
    }

    #[test]
    fn constructors_rebuild_source() {
        let mut interp = Interpreter::new();
        let f = ctor(&mut interp, NodeClass::Identifier, vec![Value::str("f")]);
        let one = ctor(&mut interp, NodeClass::Number, vec![Value::str("1"), Value::str("")]);
        let call = ctor(
            &mut interp,
            NodeClass::CurlyBrackets,
            vec![Value::list(vec![Value::node(f), Value::node(one)])],
        );
        assert_eq!(call.to_string(), "{f 1}");
    }

    #[test]
    fn sequence_constructors_splice_values() {
        let mut interp = Interpreter::new();
        let node = ctor(
            &mut interp,
            NodeClass::SquareBrackets,
            vec![Value::list(vec![
                Value::Int(1),
                Value::list(vec![Value::str("a"), Value::Bool(true)]),
            ])],
        );
        assert_eq!(node.to_string(), "[1 \"a\" true]");
    }

    #[test]
    fn non_finite_floats_have_no_syntax() {
        assert_eq!(value_to_node(&Value::Float(2.5)).expect("finite").to_string(), "2.5");
        for f in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = value_to_node(&Value::Float(f)).expect_err("non-finite");
            assert!(matches!(err, RuntimeError::Builtin { kind: ExceptionKind::TypeError, .. }));
        }
    }

    #[test]
    fn node_attributes() {
        let node = Rc::new(Node::binop(
            Node::identifier("a", Span::at_start()),
            "+",
            Node::number("2", "", Span::at_start()),
        ));
        assert_eq!(node_attr(&node, "op"), Some(Value::str("+")));
        assert_eq!(
            node_attr(&node, "left").map(|v| v.to_string()),
            Some("a".to_string())
        );
        assert!(node_attr(&node, "suffix").is_none());
    }

    #[test]
    fn operator_parse_uses_shared_table() {
        let mut interp = Interpreter::new();
        let table = Rc::new(RefCell::new(OperatorTable::new()));
        let parse = operator_parse_native(Rc::clone(&table));
        let sp = Span::at_start();
        let input = Value::list(vec![
            Value::node(Node::number("1", "", sp)),
            Value::node(Node::operator("+", sp)),
            Value::node(Node::number("2", "", sp)),
            Value::node(Node::operator("*", sp)),
            Value::node(Node::number("3", "", sp)),
        ]);
        let parsed = interp.call(&parse, Args::new(vec![input])).expect("parses");
        let Value::List(items) = parsed else {
            panic!("expected a list");
        };
        let items = items.borrow();
        assert_eq!(items.len(), 1);
        let root = items[0].as_node().expect("node");
        assert_eq!(root.as_binop("+").map(|(_, r)| r.to_string()), Some("2 * 3".to_string()));
    }

    #[test]
    fn gensym_native_shares_counter() {
        let mut interp = Interpreter::new();
        let gensym = Gensym::new();
        let native = gensym_native(gensym.clone());
        let first = interp.call(&native, Args::default()).expect("ok");
        assert_eq!(first, Value::str("__gensym_1__"));
        assert_eq!(gensym.next(), "__gensym_2__");
    }
}
