//! Bracket-tree building.
//!
//! Turns the flat token stream into nested [`Sequence`] nodes with a single
//! left-to-right pass over an explicit stack of open composites. Strings
//! tagged with the interpolation suffix are expanded inline into a
//! concatenation expression.

use std::rc::Rc;

use makrell_foundation::{Error, ErrorKind, Result, Span};

use crate::diagnostics::{Diagnostics, codes};
use crate::lexer::tokenize;
use crate::node::{Node, NodeKind, Sequence, SequenceKind};
use crate::token::{Token, TokenKind};

/// String suffix that requests `{expr}` interpolation.
pub const INTERPOLATION_SUFFIX: &str = "e";

/// Name of the string-conversion callee wrapped around interpolated regions.
const STRING_CONVERSION: &str = "str";

struct Frame {
    kind: SequenceKind,
    nodes: Vec<Node>,
    original: Vec<Node>,
    expanded: bool,
    open: Span,
}

impl Frame {
    const fn new(kind: SequenceKind, open: Span) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            original: Vec::new(),
            expanded: false,
            open,
        }
    }

    fn push(&mut self, node: Node) {
        self.nodes.push(node.clone());
        self.original.push(node);
    }

    fn finish(self, close: Span) -> Node {
        let nodes = Rc::new(self.nodes);
        let original = if self.expanded {
            Rc::new(self.original)
        } else {
            Rc::clone(&nodes)
        };
        Node::new(
            NodeKind::Sequence(Sequence {
                kind: self.kind,
                nodes,
                original: Some(original),
            }),
            self.open.to(close),
        )
    }
}

/// Builds the bracket tree for a token stream.
///
/// The returned top-level nodes still contain trivia; consumers filter
/// with [`crate::node::regular`]. Brackets left open at end of input are
/// closed implicitly and reported as an incomplete-input diagnostic.
///
/// # Errors
/// Fails on a closing bracket that does not match the innermost open
/// composite, and on unbalanced braces in an interpolated string.
pub fn build(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Result<Vec<Node>> {
    let mut stack = vec![Frame::new(SequenceKind::NoBrackets, Span::at_start())];

    for token in tokens {
        match token.kind {
            TokenKind::Open(kind) => stack.push(Frame::new(kind, token.span)),
            TokenKind::Close(kind) => {
                let top = stack.last().map_or(SequenceKind::NoBrackets, |f| f.kind);
                if stack.len() < 2 || top != kind {
                    let found = kind.delimiters().map_or('?', |(_, close)| close);
                    return Err(Error::new(ErrorKind::UnmatchedBracket {
                        found,
                        open: top.name().to_string(),
                    })
                    .at(token.span));
                }
                close_frame(&mut stack, token.span);
            }
            TokenKind::String { ref value, ref suffix } if suffix == INTERPOLATION_SUFFIX => {
                let expansion = interpolate(value, token.span)?;
                if let (Some(frame), Some(raw)) = (stack.last_mut(), Token::clone(&token).into_node()) {
                    frame.nodes.push(expansion);
                    frame.original.push(raw);
                    frame.expanded = true;
                }
            }
            _ => {
                if let (Some(frame), Some(node)) = (stack.last_mut(), token.into_node()) {
                    frame.push(node);
                }
            }
        }
    }

    while stack.len() > 1 {
        let open = stack.last().map_or(Span::at_start(), |f| f.open);
        diagnostics.error(
            codes::INCOMPLETE_INPUT,
            "Unmatched opening bracket",
            Some(open),
        );
        let end = stack
            .last()
            .and_then(|f| f.original.last())
            .map_or(open, |n| n.span);
        close_frame(&mut stack, end);
    }

    Ok(stack.pop().map(|root| root.nodes).unwrap_or_default())
}

fn close_frame(stack: &mut Vec<Frame>, close: Span) {
    if let Some(frame) = stack.pop() {
        let node = frame.finish(close);
        if let Some(parent) = stack.last_mut() {
            parent.push(node);
        }
    }
}

/// Lexes and builds source text in one step.
///
/// # Errors
/// Propagates lexical and bracket errors.
pub fn parse_source(source: &str, diagnostics: &mut Diagnostics) -> Result<Vec<Node>> {
    build(tokenize(source)?, diagnostics)
}

enum Segment<'a> {
    Literal(&'a str),
    Expression(&'a str),
}

fn segments(inner: &str) -> Option<Vec<Segment<'_>>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut from = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    if i > from {
                        out.push(Segment::Literal(&inner[from..i]));
                    }
                    from = i + 1;
                }
                depth += 1;
            }
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    out.push(Segment::Expression(&inner[from..i]));
                    from = i + 1;
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    if from < inner.len() {
        out.push(Segment::Literal(&inner[from..]));
    }
    Some(out)
}

/// Expands an interpolated string literal into `(part + part + ...)`.
///
/// `value` is the literal text including its quotes.
///
/// # Errors
/// Fails on unbalanced braces, or when an embedded expression is not valid
/// source on its own.
pub fn interpolate(value: &str, span: Span) -> Result<Node> {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    let unbalanced = || Error::new(ErrorKind::Interpolation(value.to_string())).at(span);
    let parts = segments(inner).ok_or_else(unbalanced)?;

    let mut pieces = Vec::new();
    for part in parts {
        let node = match part {
            Segment::Literal(text) => Node::string(format!("\"{text}\""), "", span),
            Segment::Expression(expr) => {
                let mut diagnostics = Diagnostics::new();
                let source = format!("{{{STRING_CONVERSION} {expr}}}");
                let nodes = parse_source(&source, &mut diagnostics).map_err(|e| e.at(span))?;
                if diagnostics.has_errors() {
                    return Err(unbalanced());
                }
                let Some(call) = nodes.into_iter().find(Node::is_regular) else {
                    return Err(unbalanced());
                };
                call.with_span_deep(span)
            }
        };
        if !pieces.is_empty() {
            pieces.push(Node::operator("+", span));
        }
        pieces.push(node);
    }
    if pieces.is_empty() {
        pieces.push(Node::string("\"\"", "", span));
    }
    Ok(Node::sequence(SequenceKind::Round, pieces, span))
}
