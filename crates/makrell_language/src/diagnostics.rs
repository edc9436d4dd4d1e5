//! Recoverable compilation problems.
//!
//! A [`Diagnostics`] sink accumulates severity-tagged, position-tagged
//! items for the lifetime of one compilation. Unlike fatal errors they do
//! not stop compilation of sibling nodes, so an editor can show every
//! problem in a document at once.

use std::fmt;

use makrell_foundation::{Error, Span};

/// Diagnostic severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// A hint.
    Hint = 0,
    /// Informational.
    Info = 1,
    /// A warning.
    Warning = 2,
    /// An error; compilation of the unit fails at the end.
    Error = 3,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hint => "hint",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Numeric diagnostic codes.
pub mod codes {
    /// Any problem without a more specific code.
    pub const OTHER: u32 = 0;
    /// Input ended with brackets still open.
    pub const INCOMPLETE_INPUT: u32 = 1;
}

/// One diagnostic item. Never mutated after being recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Numeric code, see [`codes`].
    pub code: u32,
    /// Human-readable message.
    pub message: String,
    /// Position of the offending node, if known.
    pub span: Option<Span>,
}

impl Diagnostic {
    /// Converts a fatal error into an error-severity diagnostic.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        let code = if error.is_incomplete_input() {
            codes::INCOMPLETE_INPUT
        } else {
            codes::OTHER
        };
        Self {
            severity: Severity::Error,
            code,
            message: error.kind.to_string(),
            span: error.span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(span) = self.span {
            write!(f, " at {span}")?;
        }
        Ok(())
    }
}

/// Accumulator of diagnostics for one compilation.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn add(&mut self, severity: Severity, code: u32, message: impl Into<String>, span: Option<Span>) {
        self.items.push(Diagnostic {
            severity,
            code,
            message: message.into(),
            span,
        });
    }

    /// Records an error.
    pub fn error(&mut self, code: u32, message: impl Into<String>, span: Option<Span>) {
        self.add(Severity::Error, code, message, span);
    }

    /// Records a warning.
    pub fn warning(&mut self, code: u32, message: impl Into<String>, span: Option<Span>) {
        self.add(Severity::Warning, code, message, span);
    }

    /// Records an informational message.
    pub fn info(&mut self, code: u32, message: impl Into<String>, span: Option<Span>) {
        self.add(Severity::Info, code, message, span);
    }

    /// Records a hint.
    pub fn hint(&mut self, code: u32, message: impl Into<String>, span: Option<Span>) {
        self.add(Severity::Hint, code, message, span);
    }

    /// All items in the order they were recorded.
    #[must_use]
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Number of recorded items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if any error-severity item was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Returns true if the input ended with brackets still open.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.items
            .iter()
            .any(|d| d.code == codes::INCOMPLETE_INPUT)
    }

    /// Error-severity items joined into one message.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Drops items recorded after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Moves every item of `other` into this sink.
    pub fn extend(&mut self, other: Self) {
        self.items.extend(other.items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use makrell_foundation::ErrorKind;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Hint < Severity::Info);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(Severity::Error as u8, 3);
    }

    #[test]
    fn has_errors_only_for_error_severity() {
        let mut diag = Diagnostics::new();
        diag.warning(codes::OTHER, "careful", None);
        diag.hint(codes::OTHER, "psst", None);
        assert!(!diag.has_errors());
        diag.error(codes::OTHER, "broken", None);
        assert!(diag.has_errors());
        assert_eq!(diag.len(), 3);
    }

    #[test]
    fn incomplete_input_code() {
        let mut diag = Diagnostics::new();
        assert!(!diag.is_incomplete());
        diag.error(codes::INCOMPLETE_INPUT, "Unmatched opening bracket", None);
        assert!(diag.is_incomplete());
    }

    #[test]
    fn display_includes_position() {
        let mut diag = Diagnostics::new();
        diag.error(
            codes::OTHER,
            "No arguments to if.",
            Some(Span::new(0, 3, (4, 2), (4, 5))),
        );
        assert_eq!(diag.items()[0].to_string(), "error: No arguments to if. at 4:2");
        assert_eq!(diag.error_summary(), "error: No arguments to if. at 4:2");
    }

    #[test]
    fn fatal_errors_convert_to_diagnostics() {
        let err = Error::new(ErrorKind::UnknownOperator("<=>".into()))
            .at(Span::new(1, 4, (1, 2), (1, 5)));
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code, codes::OTHER);
        assert_eq!(diag.message, "unknown operator: <=>");
        assert_eq!(diag.span.map(|s| s.column), Some(2));
    }
}
