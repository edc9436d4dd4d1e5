//! The fatal error type shared by every Makrell crate.
//!
//! Every error here is fatal: it aborts the operation that produced it.
//! Recoverable problems are reported as diagnostics by the language crate
//! instead.

use std::fmt;

use thiserror::Error;

use crate::span::Span;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal error: what went wrong, where, and in which unit.
#[derive(Debug, Error)]
#[error("{kind}{}", position_suffix(.span.as_ref()))]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Where in the source the error was detected, if known.
    pub span: Option<Span>,
    /// Unit name and expansion frames, when known.
    pub context: Option<ErrorContext>,
}

fn position_suffix(span: Option<&Span>) -> String {
    span.map(|s| format!(" at {s}")).unwrap_or_default()
}

impl Error {
    /// An error of `kind` with no position.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            span: None,
            context: None,
        }
    }

    /// Attaches a source span, keeping an existing one.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Replaces the unit and frame context.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a lexical error at the given position.
    #[must_use]
    pub fn lex(line: u32, column: u32) -> Self {
        Self::new(ErrorKind::Lex { line, column })
    }

    /// Creates an arity error for a special form.
    #[must_use]
    pub fn arity(form: impl Into<String>, count: usize) -> Self {
        Self::new(ErrorKind::Arity {
            form: form.into(),
            count,
        })
    }

    /// Creates a syntax error.
    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax(message.into()))
    }

    /// Creates an unknown operator error.
    #[must_use]
    pub fn unknown_operator(op: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownOperator(op.into()))
    }

    /// Creates an unsupported-construct error.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if the error reports input that ended too early.
    ///
    /// Interactive front ends use this to ask for more lines.
    #[must_use]
    pub fn is_incomplete_input(&self) -> bool {
        matches!(self.kind, ErrorKind::IncompleteInput(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io(err.to_string()))
    }
}

/// Every kind of fatal error, matched on by callers and tests.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// No lexer rule matches at some offset.
    #[error("unrecognized character sequence at {line}:{column}")]
    Lex {
        /// Line of the offending character.
        line: u32,
        /// Column of the offending character.
        column: u32,
    },

    /// A closing bracket does not match the innermost open composite.
    #[error("unmatched closing bracket {found} for {open}")]
    UnmatchedBracket {
        /// The closing bracket character.
        found: char,
        /// Name of the composite that was open.
        open: String,
    },

    /// Input ended while brackets were still open.
    #[error("incomplete input: {0}")]
    IncompleteInput(String),

    /// Unbalanced braces inside an interpolated string.
    #[error("unbalanced brace in interpolated string {0}")]
    Interpolation(String),

    /// Wrong number of arguments to a special form.
    #[error("invalid number of arguments to {form}: {count}")]
    Arity {
        /// The special form.
        form: String,
        /// Number of arguments given.
        count: usize,
    },

    /// Operator symbol with no built-in or registered meaning.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// Left side of `->` is neither an identifier nor a list of identifiers.
    #[error("invalid left side of ->: {0}")]
    InvalidLambdaParams(String),

    /// Structurally invalid syntax.
    #[error("invalid syntax: {0}")]
    Syntax(String),

    /// A `try` form has a body statement after its handlers.
    #[error("invalid statement after {clause} in try")]
    TryClauseOrder {
        /// The last clause seen (`catch`, `else` or `finally`).
        clause: String,
    },

    /// Literal text that cannot be converted under its suffix.
    #[error("invalid {suffix} literal: {text}")]
    InvalidLiteral {
        /// The literal text.
        text: String,
        /// The suffix tag.
        suffix: String,
    },

    /// A combination of constructs the language does not define.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An included file could not be read.
    #[error("cannot include {path}: {message}")]
    Include {
        /// Path as written in the source.
        path: String,
        /// Underlying failure.
        message: String,
    },

    /// A dotted module name could not be resolved.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Code run during compilation failed.
    #[error("meta evaluation failed: {0}")]
    Meta(String),

    /// An exception escaped the running program.
    #[error("{class}: {message}")]
    Uncaught {
        /// Exception class name.
        class: String,
        /// Exception message.
        message: String,
    },

    /// Macro results kept expanding into further macro calls.
    #[error("macro expansion depth exceeded (max {0})")]
    ExpansionDepth(usize),

    /// Compilation recorded error diagnostics.
    #[error("compilation failed: {0}")]
    Diagnostics(String),

    /// Invalid data-notation document.
    #[error("data notation: {0}")]
    Data(String),

    /// A compiled-unit cache entry could not be written or read.
    #[error("compiled unit cache: {0}")]
    Cache(String),

    /// I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// A broken invariant inside the implementation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// The compilation unit and frames an error passed through.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Source file or unit name.
    pub source: Option<String>,
    /// Macro expansion or call frames, innermost last.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// No unit and no frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Pushes a frame, innermost last.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "in {source}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
