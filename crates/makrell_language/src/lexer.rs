//! Lexer for Makrell source.
//!
//! The lexer scans source text with an ordered list of rules. At each
//! offset the first rule that matches wins, so the order of [`RULES`] is
//! part of the grammar: identifiers are tried before the catch-all unknown
//! rule, strings and numbers before operators, and so on.

use std::sync::LazyLock;

use makrell_foundation::{Error, Result, Span};
use regex::{Captures, Regex};

use crate::node::SequenceKind;
use crate::token::{Token, TokenKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rule {
    Whitespace,
    LineComment,
    BlockComment,
    Identifier,
    String,
    Number,
    Open,
    Close,
    Operator,
    Unknown,
}

/// Lexer rules in priority order. Every pattern is anchored at the start.
static RULES: LazyLock<Vec<(Rule, Regex)>> = LazyLock::new(|| {
    [
        (Rule::Whitespace, r"^\s+"),
        (Rule::LineComment, r"^#[^\n]*"),
        (Rule::BlockComment, r"^(?s)/\*.*?\*/"),
        (Rule::Identifier, r"^[\p{L}_$][\p{L}\p{N}_$]*"),
        (Rule::String, r#"^(?s)("(?:\\.|[^"\\])*")([\p{L}\p{N}_]*)"#),
        (
            Rule::Number,
            r"^(-?[0-9]+(?:\.[0-9]+)?(?:[eE][-+]?[0-9]+)?)([\p{L}\p{N}_]*)",
        ),
        (Rule::Open, r"^[(\[{]"),
        (Rule::Close, r"^[)\]}]"),
        (Rule::Operator, r#"^[[\p{Sm}\p{So}\p{Pd}\p{Po}]--["'#$]]+"#),
        (Rule::Unknown, r#"^[^"'{}()\[\]\s]+"#),
    ]
    .into_iter()
    .map(|(rule, pattern)| {
        (
            rule,
            Regex::new(pattern).expect("lexer rule patterns are valid"),
        )
    })
    .collect()
});

/// Lexer for Makrell source code.
///
/// The lexer iterates through source text and produces tokens, including
/// whitespace and comments.
pub struct Lexer<'src> {
    /// Source text being tokenized.
    source: &'src str,
    /// Current byte offset in source.
    position: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    column: u32,
    /// Set once a lexical error has been reported.
    failed: bool,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source.
    #[must_use]
    pub const fn new(source: &'src str) -> Self {
        Self {
            source,
            position: 0,
            line: 1,
            column: 1,
            failed: false,
        }
    }

    /// Returns the next token, `None` at end of input.
    ///
    /// # Errors
    /// Returns a lexical error when no rule matches at the current offset.
    pub fn next_token(&mut self) -> Option<Result<Token>> {
        if self.failed || self.position >= self.source.len() {
            return None;
        }
        let rest = &self.source[self.position..];
        let start = self.position;
        let start_pos = (self.line, self.column);

        for (rule, regex) in RULES.iter() {
            let Some(caps) = regex.captures(rest) else {
                continue;
            };
            let text = caps.get(0).map_or("", |m| m.as_str());
            if text.is_empty() {
                continue;
            }
            let kind = token_kind(*rule, &caps, text);
            self.advance(text);
            let span = Span::new(start, self.position, start_pos, (self.line, self.column));
            return Some(Ok(Token::new(kind, span)));
        }

        self.failed = true;
        let span = Span::new(start, start, start_pos, start_pos);
        Some(Err(Error::lex(self.line, self.column).at(span)))
    }

    /// Tokenizes all source and returns a vector of tokens.
    ///
    /// Whitespace and comments are included in the output.
    ///
    /// # Errors
    /// Fails on the first offset where no rule matches.
    pub fn tokenize(source: &str) -> Result<Vec<Token>> {
        Lexer::new(source).collect()
    }

    fn advance(&mut self, text: &str) {
        self.position += text.len();
        match text.rfind('\n') {
            Some(last) => {
                let newlines = text.bytes().filter(|&b| b == b'\n').count();
                self.line += u32::try_from(newlines).unwrap_or(u32::MAX);
                self.column = char_count(&text[last + 1..]) + 1;
            }
            None => self.column += char_count(text),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Tokenizes source text.
///
/// # Errors
/// Fails when some offset matches no lexer rule.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::tokenize(source)
}

fn char_count(text: &str) -> u32 {
    u32::try_from(text.chars().count()).unwrap_or(u32::MAX)
}

fn group(caps: &Captures<'_>, index: usize) -> String {
    caps.get(index)
        .map_or_else(String::new, |m| m.as_str().to_string())
}

fn token_kind(rule: Rule, caps: &Captures<'_>, text: &str) -> TokenKind {
    match rule {
        Rule::Whitespace => TokenKind::Whitespace(text.to_string()),
        Rule::LineComment | Rule::BlockComment => TokenKind::Comment(text.to_string()),
        Rule::Identifier => TokenKind::Identifier(text.to_string()),
        Rule::String => TokenKind::String {
            value: group(caps, 1),
            suffix: group(caps, 2),
        },
        Rule::Number => TokenKind::Number {
            value: group(caps, 1),
            suffix: group(caps, 2),
        },
        Rule::Open => text
            .chars()
            .next()
            .and_then(SequenceKind::from_open)
            .map_or_else(|| TokenKind::Unknown(text.to_string()), TokenKind::Open),
        Rule::Close => text
            .chars()
            .next()
            .and_then(SequenceKind::from_close)
            .map_or_else(|| TokenKind::Unknown(text.to_string()), TokenKind::Close),
        Rule::Operator => TokenKind::Operator(text.to_string()),
        Rule::Unknown => TokenKind::Unknown(text.to_string()),
    }
}
