//! Syntax node model.
//!
//! Every syntactic element is a [`Node`]: trivia (whitespace, comments,
//! unknown runs), atoms (identifiers, operators, string and number
//! literals), bracketed sequences, and binary operations produced by the
//! operator parser. The same model is used as the data representation of
//! quoted code, so macros receive and return values of this type.

use std::fmt;
use std::rc::Rc;

use makrell_foundation::Span;

/// A syntax node with its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// What kind of node this is.
    pub kind: NodeKind,
    /// Source location of this node.
    pub span: Span,
}

/// The closed set of node variants.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// A run of whitespace.
    Whitespace(String),
    /// A line or block comment, including its delimiters.
    Comment(String),
    /// A character run no other lexer rule accepts.
    Unknown(String),
    /// An identifier.
    Identifier(String),
    /// An operator symbol.
    Operator(String),
    /// A string literal. `value` keeps its surrounding quotes.
    String {
        /// Literal text including quotes.
        value: String,
        /// Trailing bare-word suffix tag, possibly empty.
        suffix: String,
    },
    /// A numeric literal.
    Number {
        /// Literal text.
        value: String,
        /// Trailing bare-word suffix tag, possibly empty.
        suffix: String,
    },
    /// A bracketed (or bare) sequence of child nodes.
    Sequence(Sequence),
    /// A binary operation produced by the operator parser.
    BinOp {
        /// Left operand.
        left: Box<Node>,
        /// Operator symbol.
        op: String,
        /// Right operand.
        right: Box<Node>,
    },
}

/// Bracket kind of a [`Sequence`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    /// A bare list (the top level of a unit, or a synthetic body).
    NoBrackets,
    /// `( ... )`
    Round,
    /// `[ ... ]`
    Square,
    /// `{ ... }`
    Curly,
}

impl SequenceKind {
    /// Returns the kind opened by the given bracket character.
    #[must_use]
    pub const fn from_open(c: char) -> Option<Self> {
        match c {
            '(' => Some(Self::Round),
            '[' => Some(Self::Square),
            '{' => Some(Self::Curly),
            _ => None,
        }
    }

    /// Returns the kind closed by the given bracket character.
    #[must_use]
    pub const fn from_close(c: char) -> Option<Self> {
        match c {
            ')' => Some(Self::Round),
            ']' => Some(Self::Square),
            '}' => Some(Self::Curly),
            _ => None,
        }
    }

    /// Opening and closing characters, if bracketed.
    #[must_use]
    pub const fn delimiters(self) -> Option<(char, char)> {
        match self {
            Self::NoBrackets => None,
            Self::Round => Some(('(', ')')),
            Self::Square => Some(('[', ']')),
            Self::Curly => Some(('{', '}')),
        }
    }

    /// The variant name used for quoting and runtime type tests.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoBrackets => "Sequence",
            Self::Round => "RoundBrackets",
            Self::Square => "SquareBrackets",
            Self::Curly => "CurlyBrackets",
        }
    }
}

/// Children of a composite node.
///
/// `nodes` is the semantic child list; it may still contain trivia, which
/// consumers drop with [`regular`]. `original` is the child list exactly as
/// it appeared in the source and is used to reconstruct source text. It is
/// `None` for synthesized sequences, which render their children separated
/// by single spaces instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    /// Bracket kind.
    pub kind: SequenceKind,
    /// Semantic children.
    pub nodes: Rc<Vec<Node>>,
    /// Children as written, when the sequence came from source text.
    pub original: Option<Rc<Vec<Node>>>,
}

impl Node {
    /// Creates a node.
    #[must_use]
    pub const fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Creates an identifier node.
    #[must_use]
    pub fn identifier(name: impl Into<String>, span: Span) -> Self {
        Self::new(NodeKind::Identifier(name.into()), span)
    }

    /// Creates an operator node.
    #[must_use]
    pub fn operator(symbol: impl Into<String>, span: Span) -> Self {
        Self::new(NodeKind::Operator(symbol.into()), span)
    }

    /// Creates a string literal node. `value` must include its quotes.
    #[must_use]
    pub fn string(value: impl Into<String>, suffix: impl Into<String>, span: Span) -> Self {
        Self::new(
            NodeKind::String {
                value: value.into(),
                suffix: suffix.into(),
            },
            span,
        )
    }

    /// Creates a numeric literal node.
    #[must_use]
    pub fn number(value: impl Into<String>, suffix: impl Into<String>, span: Span) -> Self {
        Self::new(
            NodeKind::Number {
                value: value.into(),
                suffix: suffix.into(),
            },
            span,
        )
    }

    /// Creates a synthesized sequence with no separately retained original text.
    #[must_use]
    pub fn sequence(kind: SequenceKind, nodes: Vec<Node>, span: Span) -> Self {
        Self::new(
            NodeKind::Sequence(Sequence {
                kind,
                nodes: Rc::new(nodes),
                original: None,
            }),
            span,
        )
    }

    /// Creates a binary operation spanning both operands.
    #[must_use]
    pub fn binop(left: Node, op: impl Into<String>, right: Node) -> Self {
        let span = left.span.to(right.span);
        Self::new(
            NodeKind::BinOp {
                left: Box::new(left),
                op: op.into(),
                right: Box::new(right),
            },
            span,
        )
    }

    /// Returns true for whitespace, comments and unknown runs.
    #[must_use]
    pub const fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Whitespace(_) | NodeKind::Comment(_) | NodeKind::Unknown(_)
        )
    }

    /// Returns true for nodes that take part in semantic analysis.
    #[must_use]
    pub const fn is_regular(&self) -> bool {
        !self.is_trivia()
    }

    /// Returns the identifier name, if this is an identifier.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if this is the identifier `name`.
    #[must_use]
    pub fn is_identifier(&self, name: &str) -> bool {
        self.as_identifier() == Some(name)
    }

    /// Returns the operator symbol, if this is an operator.
    #[must_use]
    pub fn as_operator(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    /// Returns the sequence, if this is a composite node.
    #[must_use]
    pub const fn as_sequence(&self) -> Option<&Sequence> {
        match &self.kind {
            NodeKind::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Returns the sequence if it has the given bracket kind.
    #[must_use]
    pub fn as_sequence_of(&self, kind: SequenceKind) -> Option<&Sequence> {
        self.as_sequence().filter(|seq| seq.kind == kind)
    }

    /// Returns the operands if this is a binary operation with operator `op`.
    #[must_use]
    pub fn as_binop(&self, op: &str) -> Option<(&Node, &Node)> {
        match &self.kind {
            NodeKind::BinOp {
                left,
                op: symbol,
                right,
            } if symbol == op => Some((left, right)),
            _ => None,
        }
    }

    /// Returns true if this is a curly-bracket node headed by identifier `head`.
    #[must_use]
    pub fn is_curly_headed_by(&self, head: &str) -> bool {
        self.as_sequence_of(SequenceKind::Curly)
            .and_then(|seq| seq.nodes.iter().find(|n| n.is_regular()))
            .is_some_and(|first| first.is_identifier(head))
    }

    /// The variant name, as used by quoting and runtime type tests.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Whitespace(_) => "Whitespace",
            NodeKind::Comment(_) => "Comment",
            NodeKind::Unknown(_) => "Unknown",
            NodeKind::Identifier(_) => "Identifier",
            NodeKind::Operator(_) => "Operator",
            NodeKind::String { .. } => "String",
            NodeKind::Number { .. } => "Number",
            NodeKind::Sequence(seq) => seq.kind.name(),
            NodeKind::BinOp { .. } => "BinOp",
        }
    }

    /// Returns a copy of this node with every span in the tree replaced.
    #[must_use]
    pub fn with_span_deep(&self, span: Span) -> Self {
        let kind = match &self.kind {
            NodeKind::Sequence(seq) => NodeKind::Sequence(Sequence {
                kind: seq.kind,
                nodes: Rc::new(seq.nodes.iter().map(|n| n.with_span_deep(span)).collect()),
                original: seq
                    .original
                    .as_ref()
                    .map(|o| Rc::new(o.iter().map(|n| n.with_span_deep(span)).collect())),
            }),
            NodeKind::BinOp { left, op, right } => NodeKind::BinOp {
                left: Box::new(left.with_span_deep(span)),
                op: op.clone(),
                right: Box::new(right.with_span_deep(span)),
            },
            other => other.clone(),
        };
        Self { kind, span }
    }
}

impl Sequence {
    /// The regular children of this sequence.
    #[must_use]
    pub fn regular(&self) -> Vec<Node> {
        regular(&self.nodes)
    }

    /// Source text of the children, without the enclosing brackets.
    #[must_use]
    pub fn original_text(&self) -> String {
        match &self.original {
            Some(original) => original.iter().map(ToString::to_string).collect(),
            None => self
                .nodes
                .iter()
                .filter(|n| n.is_regular())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Whitespace(text)
            | NodeKind::Comment(text)
            | NodeKind::Unknown(text)
            | NodeKind::Identifier(text)
            | NodeKind::Operator(text) => f.write_str(text),
            NodeKind::String { value, suffix } | NodeKind::Number { value, suffix } => {
                write!(f, "{value}{suffix}")
            }
            NodeKind::Sequence(seq) => match seq.kind.delimiters() {
                Some((open, close)) => write!(f, "{open}{}{close}", seq.original_text()),
                None => f.write_str(&seq.original_text()),
            },
            NodeKind::BinOp { left, op, right } => write!(f, "{left} {op} {right}"),
        }
    }
}

/// Returns the regular (non-trivia) nodes, preserving order.
#[must_use]
pub fn regular(nodes: &[Node]) -> Vec<Node> {
    nodes.iter().filter(|n| n.is_regular()).cloned().collect()
}

/// Returns the regular nodes, also filtering trivia inside every composite.
#[must_use]
pub fn regular_deep(nodes: &[Node]) -> Vec<Node> {
    nodes
        .iter()
        .filter(|n| n.is_regular())
        .map(regular_node)
        .collect()
}

fn regular_node(node: &Node) -> Node {
    let kind = match &node.kind {
        NodeKind::Sequence(seq) => NodeKind::Sequence(Sequence {
            kind: seq.kind,
            nodes: Rc::new(regular_deep(&seq.nodes)),
            original: seq.original.clone(),
        }),
        NodeKind::BinOp { left, op, right } => NodeKind::BinOp {
            left: Box::new(regular_node(left)),
            op: op.clone(),
            right: Box::new(regular_node(right)),
        },
        other => other.clone(),
    };
    Node::new(kind, node.span)
}

/// Strips any number of enclosing single-child round brackets.
#[must_use]
pub fn deparen(node: &Node) -> &Node {
    let mut current = node;
    while let Some(seq) = current.as_sequence_of(SequenceKind::Round) {
        let mut children = seq.nodes.iter().filter(|n| n.is_regular());
        match (children.next(), children.next()) {
            (Some(only), None) => current = only,
            _ => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp() -> Span {
        Span::at_start()
    }

    #[test]
    fn regular_drops_trivia_and_keeps_order() {
        let nodes = vec![
            Node::identifier("a", sp()),
            Node::new(NodeKind::Whitespace(" ".into()), sp()),
            Node::new(NodeKind::Comment("# hi".into()), sp()),
            Node::operator("+", sp()),
            Node::new(NodeKind::Unknown("^".into()), sp()),
            Node::number("2", "", sp()),
        ];
        let reg = regular(&nodes);
        let names: Vec<String> = reg.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["a", "+", "2"]);
    }

    #[test]
    fn synthetic_sequence_renders_space_separated() {
        let node = Node::sequence(
            SequenceKind::Curly,
            vec![Node::identifier("f", sp()), Node::number("1", "", sp())],
            sp(),
        );
        assert_eq!(node.to_string(), "{f 1}");
    }

    #[test]
    fn binop_display_and_span() {
        let left = Node::identifier("a", Span::new(0, 1, (1, 1), (1, 2)));
        let right = Node::identifier("b", Span::new(4, 5, (1, 5), (1, 6)));
        let node = Node::binop(left, "+", right);
        assert_eq!(node.to_string(), "a + b");
        assert_eq!((node.span.start, node.span.end), (0, 5));
    }

    #[test]
    fn curly_head_detection_skips_trivia() {
        let node = Node::sequence(
            SequenceKind::Curly,
            vec![
                Node::new(NodeKind::Whitespace(" ".into()), sp()),
                Node::identifier("catch", sp()),
            ],
            sp(),
        );
        assert!(node.is_curly_headed_by("catch"));
        assert!(!node.is_curly_headed_by("finally"));
    }

    #[test]
    fn deparen_strips_single_child_rounds() {
        let inner = Node::identifier("x", sp());
        let wrapped = Node::sequence(
            SequenceKind::Round,
            vec![Node::sequence(SequenceKind::Round, vec![inner.clone()], sp())],
            sp(),
        );
        assert_eq!(deparen(&wrapped), &inner);
    }

    #[test]
    fn variant_names() {
        assert_eq!(Node::identifier("x", sp()).variant_name(), "Identifier");
        assert_eq!(
            Node::sequence(SequenceKind::Square, vec![], sp()).variant_name(),
            "SquareBrackets"
        );
    }
}
