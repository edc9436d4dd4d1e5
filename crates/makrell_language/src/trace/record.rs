//! Trace event and record types.

use std::fmt;

/// Events recorded while a compilation context runs.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// The bootstrap prelude finished loading.
    PreludeLoaded {
        /// Number of top-level prelude nodes.
        nodes: usize,
    },

    /// A block of nodes ran through the meta engine.
    MetaBlockRun {
        /// Number of nodes in the block.
        nodes: usize,
        /// Whether the block is recorded for importers.
        recorded: bool,
    },

    /// A macro became available.
    MacroDefined {
        /// Macro name.
        name: String,
    },

    /// A macro call was expanded.
    MacroExpanded {
        /// Macro name.
        name: String,
        /// Number of nodes the expansion produced.
        produced: usize,
    },

    /// An operator was added to the precedence table.
    OperatorDefined {
        /// Operator symbol.
        symbol: String,
        /// Precedence level.
        level: i32,
        /// Whether the operator groups to the right.
        right_assoc: bool,
    },

    /// Meta blocks of another unit were replayed.
    MacroModuleImported {
        /// Dotted module name.
        module: String,
        /// Number of replayed blocks.
        blocks: usize,
    },

    /// A recoverable diagnostic was recorded.
    DiagnosticRecorded {
        /// Rendered diagnostic.
        message: String,
    },

    /// A file was included.
    IncludeExpanded {
        /// Path as written in the source.
        path: String,
        /// Number of spliced nodes.
        nodes: usize,
    },
}

impl TraceEvent {
    /// Returns the event type name, used for filtering.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::PreludeLoaded { .. } => "prelude-loaded",
            Self::MetaBlockRun { .. } => "meta-block-run",
            Self::MacroDefined { .. } => "macro-defined",
            Self::MacroExpanded { .. } => "macro-expanded",
            Self::OperatorDefined { .. } => "operator-defined",
            Self::MacroModuleImported { .. } => "macro-module-imported",
            Self::DiagnosticRecorded { .. } => "diagnostic-recorded",
            Self::IncludeExpanded { .. } => "include-expanded",
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreludeLoaded { nodes } => write!(f, "prelude loaded ({nodes} nodes)"),
            Self::MetaBlockRun { nodes, recorded } => {
                write!(f, "meta block ({nodes} nodes)")?;
                if *recorded {
                    f.write_str(" recorded")?;
                }
                Ok(())
            }
            Self::MacroDefined { name } => write!(f, "macro {name} defined"),
            Self::MacroExpanded { name, produced } => {
                write!(f, "macro {name} expanded to {produced} nodes")
            }
            Self::OperatorDefined {
                symbol,
                level,
                right_assoc,
            } => {
                let assoc = if *right_assoc { "right" } else { "left" };
                write!(f, "operator {symbol} defined at {level} ({assoc})")
            }
            Self::MacroModuleImported { module, blocks } => {
                write!(f, "replayed {blocks} meta blocks from {module}")
            }
            Self::DiagnosticRecorded { message } => write!(f, "diagnostic: {message}"),
            Self::IncludeExpanded { path, nodes } => write!(f, "included {path} ({nodes} nodes)"),
        }
    }
}

/// A recorded event with its sequence number.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    /// Sequence number, unique within one tracer.
    pub id: u64,
    /// Meta nesting depth when the event was recorded.
    pub depth: usize,
    /// Nanoseconds since the tracer was created.
    pub timestamp_ns: u64,
    /// The event.
    pub event: TraceEvent,
}

impl TraceRecord {
    /// Creates a record.
    #[must_use]
    pub const fn new(id: u64, depth: usize, timestamp_ns: u64, event: TraceEvent) -> Self {
        Self {
            id,
            depth,
            timestamp_ns,
            event,
        }
    }

    /// Returns the event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names() {
        let event = TraceEvent::OperatorDefined {
            symbol: ">>".into(),
            level: 100,
            right_assoc: false,
        };
        assert_eq!(event.event_type(), "operator-defined");
        assert_eq!(event.to_string(), "operator >> defined at 100 (left)");
    }

    #[test]
    fn record_reports_event_type() {
        let record = TraceRecord::new(3, 1, 0, TraceEvent::MacroDefined { name: "unless".into() });
        assert_eq!(record.event_type(), "macro-defined");
        assert_eq!(record.depth, 1);
    }
}
