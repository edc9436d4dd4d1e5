//! Input for the REPL.
//!
//! [`Repl`](crate::Repl) pulls lines through [`LineEditor`], so tests can
//! drive it with scripted input. [`RustylineEditor`] is the terminal editor:
//! it completes special forms and builtins, hints from history, colors
//! tokens and keeps reading until [`is_complete`] accepts the buffer.

use std::borrow::Cow;

use makrell_foundation::{Error, ErrorKind, Result};
use makrell_language::codegen::SPECIAL_FORMS;
use makrell_language::{Diagnostics, parse_source};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Context, Editor, Helper};

use crate::highlight::MakrellHighlighter;

const HISTORY_SIZE: usize = 1000;

/// Builtins and prelude names offered for completion next to the special
/// forms.
const BUILTIN_NAMES: &[&str] = &[
    "print", "len", "str", "repr", "int", "float", "bool", "list", "tuple", "range", "map",
    "filter", "zip", "enumerate", "sum", "min", "max", "abs", "sorted", "reversed", "any", "all",
    "isinstance", "type", "getattr", "setattr", "hasattr", "iter", "next", "round", "ord", "chr",
    "regular", "operator_parse", "literal_value", "gensym", "node_name", "true", "false", "null",
];

/// What a [`LineEditor`] produced.
#[derive(Debug)]
pub enum ReadResult {
    /// A line of text, without its newline.
    Line(String),
    /// The user interrupted input (Ctrl+C).
    Interrupted,
    /// Input is exhausted (Ctrl+D, or the end of a script).
    Eof,
}

/// A source of REPL input lines.
pub trait LineEditor {
    /// Reads one line after showing `prompt`.
    ///
    /// # Errors
    ///
    /// Fails when the underlying input cannot be read.
    fn read_line(&mut self, prompt: &str) -> Result<ReadResult>;

    /// Reads a line that continues an unfinished form.
    ///
    /// # Errors
    ///
    /// As for [`LineEditor::read_line`].
    fn read_continuation(&mut self, prompt: &str) -> Result<ReadResult> {
        self.read_line(prompt)
    }

    /// Remembers a submitted entry.
    fn add_history(&mut self, line: &str);
}

/// Whether `input` can be submitted: no string literal is left open and the
/// parser does not report an unclosed bracket. Mismatched brackets count as
/// complete so that the compiler reports them.
#[must_use]
pub fn is_complete(input: &str) -> bool {
    if ends_in_string(input) {
        return false;
    }
    let mut diagnostics = Diagnostics::new();
    match parse_source(input, &mut diagnostics) {
        Ok(_) => !diagnostics.is_incomplete(),
        Err(err) => !err.is_incomplete_input(),
    }
}

fn ends_in_string(input: &str) -> bool {
    let mut chars = input.chars();
    let mut open = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => open = !open,
            '\\' if open => {
                chars.next();
            }
            '#' if !open => {
                if chars.by_ref().all(|c| c != '\n') {
                    break;
                }
            }
            _ => {}
        }
    }
    open
}

fn editor_error(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::Internal(err.to_string()))
}

/// Prefix completion over a sorted name list.
struct NameCompleter {
    names: Vec<&'static str>,
}

impl NameCompleter {
    fn new() -> Self {
        let mut names: Vec<&'static str> = SPECIAL_FORMS.iter().chain(BUILTIN_NAMES).copied().collect();
        names.sort_unstable();
        names.dedup();
        Self { names }
    }

    /// The start of the word under the cursor and the names extending it.
    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let before = &line[..pos];
        let start = before
            .char_indices()
            .rev()
            .find(|&(_, c)| c.is_whitespace() || "()[]{}".contains(c))
            .map_or(0, |(i, c)| i + c.len_utf8());
        let word = &before[start..];
        if word.is_empty() {
            return (start, Vec::new());
        }
        let pairs = self
            .names
            .iter()
            .filter(|name| name.starts_with(word))
            .map(|&name| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect();
        (start, pairs)
    }
}

#[derive(Helper)]
struct MakrellHelper {
    names: NameCompleter,
    history: HistoryHinter,
    colors: MakrellHighlighter,
}

impl Completer for MakrellHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.names.candidates(line, pos))
    }
}

impl Hinter for MakrellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.history.hint(line, pos, ctx)
    }
}

impl Validator for MakrellHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        Ok(if input.trim_start().starts_with(':') || is_complete(input) {
            ValidationResult::Valid(None)
        } else {
            ValidationResult::Incomplete
        })
    }
}

impl Highlighter for MakrellHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.colors.highlight(line, pos)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, default: bool) -> Cow<'b, str> {
        if default {
            Cow::Owned(format!("\x1b[1;32m{prompt}\x1b[0m"))
        } else {
            Cow::Borrowed(prompt)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[2m{hint}\x1b[0m"))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

/// The interactive terminal editor.
pub struct RustylineEditor {
    editor: Editor<MakrellHelper, DefaultHistory>,
}

impl RustylineEditor {
    /// Opens the terminal editor with Makrell completion and highlighting.
    ///
    /// # Errors
    ///
    /// Fails when the terminal cannot be set up.
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .auto_add_history(false)
            .max_history_size(HISTORY_SIZE)
            .map_err(editor_error)?
            .build();
        let mut editor = Editor::with_config(config).map_err(editor_error)?;
        editor.set_helper(Some(MakrellHelper {
            names: NameCompleter::new(),
            history: HistoryHinter::new(),
            colors: MakrellHighlighter::new(),
        }));
        Ok(Self { editor })
    }
}

impl LineEditor for RustylineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadResult> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadResult::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadResult::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadResult::Eof),
            Err(err) => Err(editor_error(err)),
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_input_is_complete() {
        assert!(is_complete("{f 1 2}"));
        assert!(is_complete("x = [1 2 3]"));
        assert!(is_complete(""));
    }

    #[test]
    fn open_brackets_are_incomplete() {
        assert!(!is_complete("{fun f [x]"));
        assert!(!is_complete("{f [1 2]"));
    }

    #[test]
    fn brackets_in_strings_and_comments_are_ignored() {
        assert!(is_complete("x = \"{[(\""));
        assert!(is_complete("x = 1 # {"));
        assert!(is_complete("x = 1 # \"\ny = 2"));
    }

    #[test]
    fn open_strings_are_incomplete() {
        assert!(!is_complete("x = \"abc"));
        assert!(is_complete("x = \"a\\\"b\""));
    }

    #[test]
    fn stray_closers_are_left_to_the_compiler() {
        assert!(is_complete("{f 1}}"));
    }

    #[test]
    fn completion_matches_prefixes() {
        let completer = NameCompleter::new();
        let (start, pairs) = completer.candidates("{whe", 4);
        assert_eq!(start, 1);
        assert!(pairs.iter().any(|p| p.replacement == "when"));
        assert!(pairs.iter().all(|p| p.replacement.starts_with("whe")));
        assert!(completer.candidates("x ", 2).1.is_empty());
    }
}
