use std::path::Path;

use makrell_foundation::{Error, ErrorKind, Result, Span};
use makrell_language::literal::{Literal, literal_value};
use makrell_language::node::regular;
use makrell_language::operator::parse_operators;
use makrell_language::{Context, Diagnostics, Node, NodeKind, OperatorTable, SequenceKind, parse_source};

use crate::element::Element;

/// Head of an evaluated curly form.
pub const EXEC_MARKER: &str = "$";

fn markup_error(message: impl Into<String>, span: Span) -> Error {
    Error::new(ErrorKind::Data(message.into())).at(span)
}

/// MRML reader.
///
/// `{$ ...}` forms are evaluated only by readers built with
/// [`Reader::with_exec`]; they share one evaluation context, created on
/// first use.
#[derive(Debug, Default)]
pub struct Reader {
    allow_exec: bool,
    operators: OperatorTable,
    context: Option<Context>,
}

impl Reader {
    /// A reader that treats `{$ ...}` as an element named `$`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A reader that evaluates `{$ ...}` forms as Makrell code.
    #[must_use]
    pub fn with_exec() -> Self {
        Self {
            allow_exec: true,
            ..Self::default()
        }
    }

    /// Reads a document holding one root element.
    ///
    /// # Errors
    /// See [`crate::parse_str`].
    pub fn parse_str(&mut self, text: &str) -> Result<Element> {
        let mut diagnostics = Diagnostics::new();
        let nodes = regular(&parse_source(text, &mut diagnostics)?);
        if diagnostics.has_errors() {
            let messages: Vec<String> = diagnostics.items().iter().map(ToString::to_string).collect();
            return Err(Error::new(ErrorKind::Diagnostics(messages.join("; "))));
        }
        match nodes.as_slice() {
            [root] => self.element(root),
            [] => Err(Error::new(ErrorKind::Data("Empty document".to_string()))),
            [_, extra, ..] => Err(markup_error(
                format!("Expected one root element, found {}", nodes.len()),
                extra.span,
            )),
        }
    }

    /// Reads a document from a file.
    ///
    /// # Errors
    /// See [`crate::parse_file`].
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<Element> {
        let text = std::fs::read_to_string(path)?;
        self.parse_str(&text)
    }

    fn element(&mut self, node: &Node) -> Result<Element> {
        let Some(seq) = node.as_sequence_of(SequenceKind::Curly) else {
            return Err(markup_error("Expected curly brackets", node.span));
        };
        let mut rest = seq.nodes.iter().skip_while(|n| n.is_trivia()).peekable();
        let Some(head) = rest.next() else {
            return Err(markup_error("Empty curly brackets", node.span));
        };
        let name = match &head.kind {
            NodeKind::Identifier(name) => name.clone(),
            NodeKind::String { .. } => string_text(head),
            _ => return Err(markup_error(format!("Expected identifier, found {head}"), head.span)),
        };
        let mut element = Element::new(name);

        while rest.next_if(|n| n.is_trivia()).is_some() {}
        if let Some(attrs) = rest.next_if(|n| n.as_sequence_of(SequenceKind::Square).is_some()) {
            self.attributes(&mut element, attrs)?;
            while rest.next_if(|n| n.is_trivia()).is_some() {}
        }

        for child in rest {
            match &child.kind {
                NodeKind::Comment(_) => {}
                NodeKind::Sequence(inner) if inner.kind == SequenceKind::Curly => {
                    match self.exec_body(child) {
                        Some(body) => {
                            let value = self.eval(&body, child.span)?;
                            element.push_text(&value);
                        }
                        None => {
                            let sub = self.element(child)?;
                            element.push_child(sub);
                        }
                    }
                }
                NodeKind::String { .. } => element.push_text(&string_text(child)),
                _ => element.push_text(&child.to_string()),
            }
        }
        Ok(element)
    }

    /// `[name=value ...]` after the element name.
    fn attributes(&mut self, element: &mut Element, node: &Node) -> Result<()> {
        let children = node.as_sequence().map(|s| s.regular()).unwrap_or_default();
        let parsed = parse_operators(&children, |op| self.operators.lookup(op))?;
        for attr in &parsed {
            let Some((name, value)) = attr.as_binop("=") else {
                return Err(markup_error(format!("Expected attribute, found {attr}"), attr.span));
            };
            let value = if value.as_sequence_of(SequenceKind::Curly).is_some() {
                let Some(body) = self.exec_body(value) else {
                    return Err(markup_error("Expected attribute value", value.span));
                };
                self.eval(&body, value.span)?
            } else {
                node_text(value)
            };
            element.set_attribute(node_text(name), value);
        }
        Ok(())
    }

    /// The nodes after `$` when `node` is an evaluated form this reader runs.
    fn exec_body(&self, node: &Node) -> Option<Vec<Node>> {
        let seq = node.as_sequence_of(SequenceKind::Curly)?;
        let mut nodes = seq.nodes.iter().skip_while(|n| n.is_trivia());
        let head = nodes.next()?;
        (self.allow_exec && head.is_identifier(EXEC_MARKER)).then(|| nodes.cloned().collect())
    }

    fn eval(&mut self, body: &[Node], span: Span) -> Result<String> {
        if self.context.is_none() {
            self.context = Some(Context::new()?);
        }
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| Error::internal("no evaluation context"))?;
        let value = context.eval_nodes(body).map_err(|e| e.at(span))?;
        Ok(value.to_string())
    }
}

/// The text of a string literal, or its source when it has no plain
/// string value.
fn string_text(node: &Node) -> String {
    match literal_value(node) {
        Ok(Literal::Str(text)) => text,
        _ => node.to_string(),
    }
}

fn node_text(node: &Node) -> String {
    match &node.kind {
        NodeKind::Identifier(name) => name.clone(),
        NodeKind::String { .. } => string_text(node),
        _ => node.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml(text: &str) -> String {
        Reader::new().parse_str(text).expect("reads").to_xml()
    }

    #[test]
    fn element_names_may_be_strings() {
        assert_eq!(xml("{\"my-tag\" x}"), "<my-tag>x</my-tag>");
    }

    #[test]
    fn whitespace_before_the_name_is_ignored() {
        assert_eq!(xml("{ a [k=v]  text}"), r#"<a k="v">text</a>"#);
    }

    #[test]
    fn comments_are_not_content() {
        assert_eq!(xml("{p one # note\n two}"), "<p>one \n two</p>");
    }

    #[test]
    fn square_brackets_after_content_are_text() {
        assert_eq!(xml("{a x [1 2]}"), "<a>x [1 2]</a>");
    }

    #[test]
    fn exec_forms_are_elements_without_exec() {
        assert_eq!(xml("{a {$ 1 + 2}}"), "<a><$>1 + 2</$></a>");
    }

    #[test]
    fn exec_attribute_without_exec_is_rejected() {
        let err = Reader::new().parse_str("{a [b={$ 1}]}").expect_err("no exec");
        assert!(matches!(err.kind, ErrorKind::Data(ref m) if m == "Expected attribute value"));
    }

    #[test]
    fn evaluations_share_a_context() {
        let root = Reader::with_exec()
            .parse_str("{a {$ n = 20 n} {b {$ n + 1}}}")
            .expect("reads");
        assert_eq!(root.to_xml(), "<a>20<b>21</b></a>");
    }

    #[test]
    fn non_elements_are_rejected() {
        assert!(Reader::new().parse_str("[a]").is_err());
        assert!(Reader::new().parse_str("{}").is_err());
        assert!(Reader::new().parse_str("{[a]}").is_err());
        assert!(Reader::new().parse_str("").is_err());
        assert!(Reader::new().parse_str("{a} {b}").is_err());
        assert!(Reader::new().parse_str("{a [b]}").is_err());
    }
}
