//! Curly-bracket forms: operator functions, definitions, macro calls and
//! ordinary calls.

use makrell_foundation::{Error, Result, Span};

use super::{Code, PLACEHOLDER};
use crate::context::Context;
use crate::node::{Node, SequenceKind};
use crate::operator::parse_operators_counted;
use crate::target::{Expr, ExprKind, Keyword};

/// Names of the operator function parameters.
pub const LEFT_PARAM: &str = "$left";
/// See [`LEFT_PARAM`].
pub const RIGHT_PARAM: &str = "$right";

/// The children of a curly form after operator parsing, remembering where
/// each parsed item starts in the raw child list.
///
/// Header positions are read from `items`; bodies are compiled from the
/// raw nodes so that operators defined inside a body apply to its rest.
#[derive(Debug)]
pub(crate) struct Form {
    pub items: Vec<Node>,
    raw: Vec<Node>,
    offsets: Vec<usize>,
}

impl Form {
    /// Raw nodes from item `index` to the end.
    pub fn rest(&self, index: usize) -> &[Node] {
        self.range(index, self.items.len())
    }

    /// Raw nodes of items `start..end`.
    pub fn range(&self, start: usize, end: usize) -> &[Node] {
        let offset = |i: usize| self.offsets.get(i).copied().unwrap_or(self.raw.len());
        &self.raw[offset(start)..offset(end)]
    }

    /// The form without its first `count` items.
    pub fn skip(&self, count: usize) -> Self {
        let base = self.offsets.get(count).copied().unwrap_or(self.raw.len());
        Self {
            items: self.items.iter().skip(count).cloned().collect(),
            raw: self.raw[base..].to_vec(),
            offsets: self.offsets.iter().skip(count).map(|o| o - base).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl Context {
    /// Operator-parses regular nodes into a [`Form`].
    pub(crate) fn form(&self, raw: &[Node]) -> Result<Form> {
        let parsed = {
            let table = self.operators.borrow();
            parse_operators_counted(raw, |op| table.lookup(op))?
        };
        let mut items = Vec::with_capacity(parsed.len());
        let mut offsets = Vec::with_capacity(parsed.len());
        let mut offset = 0;
        for (node, width) in parsed {
            items.push(node);
            offsets.push(offset);
            offset += width;
        }
        Ok(Form {
            items,
            raw: raw.to_vec(),
            offsets,
        })
    }

    pub(crate) fn compile_curly(&mut self, node: &Node, children: &[Node]) -> Result<Code> {
        let span = node.span;
        let Some(head) = children.first() else {
            return Ok(Code::Expr(Expr::null(span)));
        };

        if let Some(op) = head.as_operator() {
            return self.operator_function(op, &children[1..], span);
        }
        if let Some(name) = head.as_identifier() {
            match name {
                "def" => return self.compile_def(&children[1..], span),
                "meta" => {
                    self.run_meta_block(&children[1..], true)?;
                    return Ok(Code::nothing());
                }
                "macro" => return self.define_macro(&children[1..], span),
                _ => {}
            }
        }

        let full = self.form(children)?;
        let Some(head) = full.items.first().cloned() else {
            return Ok(Code::Expr(Expr::null(span)));
        };
        let form = full.skip(1);
        if let Some(name) = head.as_identifier() {
            if let Some(code) = self.compile_special(name, &form, span)? {
                return Ok(code);
            }
            if self.is_meta_symbol(name) {
                let args = node
                    .as_sequence_of(SequenceKind::Curly)
                    .map(|seq| {
                        seq.nodes
                            .iter()
                            .skip_while(|n| !n.is_regular())
                            .skip(1)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                return self.expand_macro(name, args, span);
            }
        }
        self.compile_call(&head, &form.items, span)
    }

    /// `{op}` and `{op x}`: an operator as a function value.
    fn operator_function(&mut self, op: &str, rest: &[Node], span: Span) -> Result<Code> {
        let left = Node::identifier(LEFT_PARAM, span);
        let (params, applied) = match rest {
            [] => (
                vec![LEFT_PARAM.to_string(), RIGHT_PARAM.to_string()],
                Node::binop(left, op, Node::identifier(RIGHT_PARAM, span)),
            ),
            [arg] => (vec![LEFT_PARAM.to_string()], Node::binop(arg.clone(), op, left)),
            _ => return Err(Error::arity(op, rest.len()).at(span)),
        };
        let body = self.compile_expr(&applied)?;
        Ok(Code::Expr(Expr::lambda(params, body, span)))
    }

    /// A call; `name=value` arguments are keywords and `_` arguments are
    /// holes that turn the call into a function of the missing values.
    fn compile_call(&mut self, head: &Node, args: &[Node], span: Span) -> Result<Code> {
        let func = match head.as_identifier() {
            Some(name) => Expr::name(name, head.span),
            None => self.compile_expr(head)?,
        };
        let mut positional = Vec::with_capacity(args.len());
        let mut keywords = Vec::new();
        let mut holes = Vec::new();
        for arg in args {
            if let Some((name, value)) = arg.as_binop("=") {
                let name = name.as_identifier().ok_or_else(|| {
                    Error::syntax(format!("keyword name must be an identifier, found {name}"))
                        .at(arg.span)
                })?;
                if value.is_identifier(PLACEHOLDER) {
                    return Err(Error::unsupported(format!(
                        "placeholder as the value of keyword argument {name}"
                    ))
                    .at(arg.span));
                }
                keywords.push(Keyword {
                    name: name.to_string(),
                    value: self.compile_expr(value)?,
                });
            } else if arg.is_identifier(PLACEHOLDER) {
                let param = self.gensym();
                positional.push(Expr::name(param.clone(), arg.span));
                holes.push(param);
            } else {
                positional.push(self.compile_expr(arg)?);
            }
        }
        let call = Expr::new(
            ExprKind::Call {
                func: Box::new(func),
                args: positional,
                keywords,
            },
            span,
        );
        Ok(Code::Expr(if holes.is_empty() {
            call
        } else {
            Expr::lambda(holes, call, span)
        }))
    }
}

#[cfg(test)]
mod tests {
    use makrell_foundation::ErrorKind;

    use super::*;
    use crate::interp::Value;

    fn eval(source: &str) -> Value {
        let mut ctx = Context::new().expect("prelude");
        ctx.eval_source(source).expect("runs")
    }

    #[test]
    fn operator_heads_are_functions() {
        assert_eq!(eval("{{+} 2 3}"), Value::Int(5));
        assert_eq!(eval("{{- 10} 3}"), Value::Int(7));
        assert_eq!(eval("[1 2 3] |* {* 2}").to_string(), "[2, 4, 6]");
    }

    #[test]
    fn operator_heads_take_at_most_one_argument() {
        let err = Context::bare().compile_source("{+ 1 2}").expect_err("arity");
        assert!(matches!(err.kind, ErrorKind::Arity { ref form, count: 2 } if form == "+"));
    }

    #[test]
    fn keyword_arguments() {
        let source = "{fun f [a b] a - b} {f b=1 a=10}";
        assert_eq!(eval(source), Value::Int(9));
    }

    #[test]
    fn partial_application() {
        assert_eq!(eval("{fun f [a b] a - b} g = {f _ 2} {g 10}"), Value::Int(8));
        assert_eq!(eval("{fun f [a b c] a + b + c} g = {f _ 2 _} {g 1 3}"), Value::Int(6));
    }

    #[test]
    fn placeholder_keyword_values_are_unsupported() {
        let err = Context::bare().compile_source("{f x=_}").expect_err("unsupported");
        assert!(matches!(err.kind, ErrorKind::Unsupported(_)));
    }

    #[test]
    fn operator_parsed_heads_are_called() {
        assert_eq!(eval("xs = [] {xs.append 1} {xs.append 2} {len xs}"), Value::Int(2));
        assert_eq!(eval("{\"a-b\".split \"-\"}").to_string(), "[\"a\", \"b\"]");
    }

    #[test]
    fn empty_curly_is_null() {
        assert_eq!(eval("{}"), Value::None);
    }

    #[test]
    fn form_maps_items_to_raw_ranges() {
        let mut ctx = Context::bare();
        let raw = ctx.parse("a + b c d * e").expect("parses");
        let form = ctx.form(&raw).expect("parses operators");
        assert_eq!(form.len(), 3);
        assert_eq!(form.rest(1).len(), 4);
        assert_eq!(form.range(0, 1).len(), 3);
        let skipped = form.skip(2);
        assert_eq!(skipped.items.len(), 1);
        assert_eq!(skipped.rest(0).len(), 3);
    }
}
