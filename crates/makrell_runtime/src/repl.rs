//! Read-eval-print loop over a [`Session`].

use std::io::{self, Write};

use makrell_foundation::{Error, ErrorKind, Result};
use makrell_language::diagnostics::{Diagnostic, Severity};

use crate::editor::{LineEditor, ReadResult, RustylineEditor, is_complete};
use crate::session::{Evaluation, Session, SessionConfig};

const HELP: &str = "\
Enter Makrell code; open brackets continue on the next line.

Commands:
    :help          Show this help
    :emit          Toggle showing the generated program of each input
    :emit CODE     Show the program CODE compiles to without running it
    :quit          Leave the REPL (also Ctrl+D)";

/// What the REPL does after one input.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    /// Show this text (possibly empty) and read the next input.
    Continue(String),
    /// Leave the loop.
    Quit,
}

/// An interactive Makrell prompt.
///
/// Definitions, macros and operators entered at one prompt stay visible at
/// the next, since every input runs in the same [`Session`].
pub struct Repl<E: LineEditor = RustylineEditor> {
    editor: E,
    session: Session,
    banner: bool,
    prompt: String,
    more_prompt: String,
}

impl Repl<RustylineEditor> {
    /// A terminal REPL over a fresh session.
    ///
    /// # Errors
    ///
    /// Fails when the terminal or the session cannot be set up.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let editor = RustylineEditor::new()?;
        Ok(Self::with_editor(editor, Session::new(config)?))
    }
}

impl<E: LineEditor> Repl<E> {
    /// A REPL reading from `editor`.
    pub fn with_editor(editor: E, session: Session) -> Self {
        Self {
            editor,
            session,
            banner: true,
            prompt: "mr> ".into(),
            more_prompt: "... ".into(),
        }
    }

    /// Skips the version banner.
    #[must_use]
    pub const fn without_banner(mut self) -> Self {
        self.banner = false;
        self
    }

    /// Replaces the `mr> ` prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// The session inputs run in.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// See [`Repl::session`].
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Reads and answers inputs until `:quit` or the end of input.
    ///
    /// # Errors
    ///
    /// Fails only when the editor cannot read; evaluation errors are shown.
    pub fn run(&mut self) -> Result<()> {
        if self.banner {
            print_banner();
        }
        while let Some(input) = self.read_input()? {
            if input.trim().is_empty() {
                continue;
            }
            self.editor.add_history(&input);
            let Response::Continue(text) = self.respond(&input) else {
                break;
            };
            if !text.is_empty() {
                println!("{text}");
            }
        }
        println!();
        Ok(())
    }

    /// Handles one complete input: a command or code to evaluate.
    pub fn respond(&mut self, input: &str) -> Response {
        if let Some(command) = input.trim().strip_prefix(':') {
            return self.command(command);
        }
        Response::Continue(match self.session.eval(input) {
            Ok(evaluation) => format_evaluation(&evaluation),
            Err(err) => format_error(&err),
        })
    }

    fn command(&mut self, command: &str) -> Response {
        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, rest)| (name, rest.trim()));
        Response::Continue(match (name, rest) {
            ("q" | "quit", _) => return Response::Quit,
            ("h" | "help", _) => HELP.to_string(),
            ("emit", "") => {
                let emit = !self.session.emits();
                self.session.set_emit(emit);
                format!("emit {}", if emit { "on" } else { "off" })
            }
            ("emit", code) => match self.session.emit(code) {
                Ok(program) => program,
                Err(err) => format_error(&err),
            },
            _ => format_error(&Error::new(ErrorKind::Syntax(format!(
                "unknown command :{name}, try :help"
            )))),
        })
    }

    /// Reads lines until they form a complete input. `None` means the
    /// editor had nothing left before the first line.
    fn read_input(&mut self) -> Result<Option<String>> {
        let mut lines: Vec<String> = Vec::new();
        loop {
            let read = if lines.is_empty() {
                self.editor.read_line(&self.prompt)?
            } else {
                self.editor.read_continuation(&self.more_prompt)?
            };
            match read {
                ReadResult::Line(line) => {
                    lines.push(line);
                    let input = lines.join("\n");
                    if input.trim_start().starts_with(':') || is_complete(&input) {
                        return Ok(Some(input));
                    }
                }
                ReadResult::Interrupted if lines.is_empty() => return Ok(Some(String::new())),
                ReadResult::Interrupted => {
                    println!("\n(cancelled)");
                    return Ok(Some(String::new()));
                }
                ReadResult::Eof if lines.is_empty() => return Ok(None),
                ReadResult::Eof => return Ok(Some(lines.join("\n"))),
            }
        }
    }
}

/// Renders a diagnostic with its severity and position.
#[must_use]
pub fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    let color = match diagnostic.severity {
        Severity::Error => "\x1b[31m",
        Severity::Warning => "\x1b[33m",
        _ => "\x1b[36m",
    };
    format!("{color}{diagnostic}\x1b[0m")
}

/// Renders a fatal error.
#[must_use]
pub fn format_error(error: &Error) -> String {
    format!("\x1b[31mError: {error}\x1b[0m")
}

fn format_evaluation(evaluation: &Evaluation) -> String {
    let mut lines = Vec::new();
    if let Some(program) = &evaluation.program {
        lines.push(format!("\x1b[2m{program}\x1b[0m"));
    }
    lines.extend(evaluation.diagnostics.iter().map(format_diagnostic));
    if !evaluation.value.is_none() {
        lines.push(format!("\x1b[1m{}\x1b[0m", evaluation.value.repr()));
    }
    lines.join("\n")
}

fn print_banner() {
    println!("\x1b[1;36mMakrell\x1b[0m {}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for commands, Ctrl+D to exit.\n");
    let _ = io::stdout().flush();
}
