//! Syntax highlighting for the REPL.
//!
//! Lines are colored token by token with the language lexer. A line the
//! lexer rejects (an unterminated string, say) is shown uncolored.

use std::borrow::Cow;

use makrell_language::codegen::{PLACEHOLDER, SPECIAL_FORMS};
use makrell_language::lexer::tokenize;
use makrell_language::token::TokenKind;

const RESET: &str = "\x1b[0m";

/// Highlighter for Makrell source.
#[derive(Debug, Default)]
pub struct MakrellHighlighter;

impl MakrellHighlighter {
    /// Creates a new highlighter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Highlights a line of input.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let Ok(tokens) = tokenize(line) else {
            return Cow::Borrowed(line);
        };
        let mut result = String::with_capacity(line.len() * 2);
        for token in &tokens {
            let text = token.text(line);
            match color(&token.kind) {
                Some(code) => {
                    result.push_str(code);
                    result.push_str(text);
                    result.push_str(RESET);
                }
                None => result.push_str(text),
            }
        }
        Cow::Owned(result)
    }
}

fn color(kind: &TokenKind) -> Option<&'static str> {
    Some(match kind {
        TokenKind::Comment(_) => "\x1b[2;3m",
        TokenKind::String { .. } => "\x1b[33m",
        TokenKind::Number { .. } => "\x1b[35m",
        TokenKind::Operator(_) => "\x1b[36m",
        TokenKind::Unknown(_) => "\x1b[31m",
        TokenKind::Identifier(name) => match name.as_str() {
            "true" | "false" | "null" => "\x1b[35m",
            PLACEHOLDER => "\x1b[2m",
            name if name.starts_with('$') => "\x1b[34m",
            name if SPECIAL_FORMS.contains(&name) => "\x1b[1;34m",
            _ => return None,
        },
        TokenKind::Whitespace(_) | TokenKind::Open(_) | TokenKind::Close(_) => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn highlighting_keeps_text() {
        let line = "{fun f [x] x + 1} # add one";
        let highlighted = MakrellHighlighter::new().highlight(line, 0);
        assert_eq!(strip(&highlighted), line);
    }

    #[test]
    fn literals_and_keywords_are_colored() {
        let highlighted = MakrellHighlighter::new().highlight("{if true \"a\" 2}", 0);
        assert!(highlighted.contains("\x1b[1;34mif"));
        assert!(highlighted.contains("\x1b[33m\"a\""));
        assert!(highlighted.contains("\x1b[35m2"));
    }

    #[test]
    fn unlexable_lines_are_left_alone() {
        let line = "x = \"open";
        assert!(matches!(MakrellHighlighter::new().highlight(line, 0), Cow::Borrowed(_)));
    }
}
