//! Trace output formatters.

use super::record::{TraceEvent, TraceRecord};

/// Renders trace records as text.
pub trait TraceFormatter {
    /// Renders one record without a trailing newline.
    fn format(&self, record: &TraceRecord) -> String;

    /// Renders records joined by newlines.
    fn format_many(&self, records: &[&TraceRecord]) -> String {
        let lines: Vec<String> = records.iter().map(|r| self.format(r)).collect();
        lines.join("\n")
    }
}

/// One line per record, indented two spaces per meta level.
#[derive(Clone, Copy, Debug, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    /// Creates a human-readable formatter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TraceFormatter for HumanFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        format!("{:indent$}{}", "", record.event, indent = record.depth * 2)
    }
}

/// One JSON object per record.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Creates a JSON formatter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn escape_string(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }
}

impl TraceFormatter for JsonFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let esc = Self::escape_string;
        let data = match &record.event {
            TraceEvent::PreludeLoaded { nodes } => format!("\"nodes\":{nodes}"),
            TraceEvent::MetaBlockRun { nodes, recorded } => {
                format!("\"nodes\":{nodes},\"recorded\":{recorded}")
            }
            TraceEvent::MacroDefined { name } => format!("\"name\":\"{}\"", esc(name)),
            TraceEvent::MacroExpanded { name, produced } => {
                format!("\"name\":\"{}\",\"produced\":{produced}", esc(name))
            }
            TraceEvent::OperatorDefined {
                symbol,
                level,
                right_assoc,
            } => format!(
                "\"symbol\":\"{}\",\"level\":{level},\"right_assoc\":{right_assoc}",
                esc(symbol)
            ),
            TraceEvent::MacroModuleImported { module, blocks } => {
                format!("\"module\":\"{}\",\"blocks\":{blocks}", esc(module))
            }
            TraceEvent::DiagnosticRecorded { message } => {
                format!("\"message\":\"{}\"", esc(message))
            }
            TraceEvent::IncludeExpanded { path, nodes } => {
                format!("\"path\":\"{}\",\"nodes\":{nodes}", esc(path))
            }
        };
        format!(
            "{{\"id\":{},\"depth\":{},\"timestamp_ns\":{},\"type\":\"{}\",{data}}}",
            record.id,
            record.depth,
            record.timestamp_ns,
            record.event_type()
        )
    }
}
