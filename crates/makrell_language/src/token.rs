//! Token types for Makrell source.
//!
//! Tokens are the output of the lexer and input to the bracket-tree
//! builder. Every token except the bracket delimiters maps directly onto a
//! [`Node`] variant.

use makrell_foundation::Span;

use crate::node::{Node, NodeKind, SequenceKind};

/// A token from lexical analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The type and value of this token.
    pub kind: TokenKind,
    /// Source location of this token.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns the text this token covers in the given source.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }

    /// Converts an atom or trivia token into its node.
    ///
    /// Returns `None` for bracket delimiters, which only exist as tokens.
    #[must_use]
    pub fn into_node(self) -> Option<Node> {
        let kind = match self.kind {
            TokenKind::Whitespace(text) => NodeKind::Whitespace(text),
            TokenKind::Comment(text) => NodeKind::Comment(text),
            TokenKind::Unknown(text) => NodeKind::Unknown(text),
            TokenKind::Identifier(name) => NodeKind::Identifier(name),
            TokenKind::Operator(op) => NodeKind::Operator(op),
            TokenKind::String { value, suffix } => NodeKind::String { value, suffix },
            TokenKind::Number { value, suffix } => NodeKind::Number { value, suffix },
            TokenKind::Open(_) | TokenKind::Close(_) => return None,
        };
        Some(Node::new(kind, self.span))
    }
}

/// Token types for Makrell source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// A run of whitespace.
    Whitespace(String),
    /// `# ...` or `/* ... */`
    Comment(String),
    /// An unrecognized character run.
    Unknown(String),
    /// An identifier like `foo` or `$left`.
    Identifier(String),
    /// An operator run like `+` or `->`.
    Operator(String),
    /// A string literal with its quotes, and a suffix tag.
    String {
        /// Literal text including quotes.
        value: String,
        /// Suffix tag, possibly empty.
        suffix: String,
    },
    /// A numeric literal and a suffix tag.
    Number {
        /// Literal text.
        value: String,
        /// Suffix tag, possibly empty.
        suffix: String,
    },
    /// `(`, `[` or `{`
    Open(SequenceKind),
    /// `)`, `]` or `}`
    Close(SequenceKind),
}

impl TokenKind {
    /// Returns true if this token kind never takes part in parsing.
    #[must_use]
    pub const fn is_trivia(&self) -> bool {
        matches!(
            self,
            Self::Whitespace(_) | Self::Comment(_) | Self::Unknown(_)
        )
    }

    /// Returns a human-readable name for this token kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Whitespace(_) => "whitespace",
            Self::Comment(_) => "comment",
            Self::Unknown(_) => "unknown",
            Self::Identifier(_) => "identifier",
            Self::Operator(_) => "operator",
            Self::String { .. } => "string",
            Self::Number { .. } => "number",
            Self::Open(_) => "opening bracket",
            Self::Close(_) => "closing bracket",
        }
    }
}
