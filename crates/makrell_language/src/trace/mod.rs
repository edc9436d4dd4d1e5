//! Tracing of compile-time activity.
//!
//! A [`Tracer`] belongs to one [`Context`](crate::Context) and records what
//! its meta engine does: the prelude loading, meta blocks running, macros
//! and operators being defined, macro calls expanding, `importm` replaying
//! another unit and includes splicing files. Records carry the meta
//! nesting depth at which they happened. A disabled tracer drops events
//! before building a record.

pub mod buffer;
pub mod format;
pub mod record;

pub use buffer::TraceBuffer;
pub use format::{HumanFormatter, JsonFormatter, TraceFormatter};
pub use record::{TraceEvent, TraceRecord};

use std::io::{self, Write};
use std::time::Instant;

/// Records kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Where trace output is sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceOutput {
    /// Records stay in the buffer.
    #[default]
    Buffer,
    /// Each record is also written to stderr as it happens.
    Stderr,
}

/// Rendering of trace records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceFormat {
    /// Indented lines, see [`HumanFormatter`].
    #[default]
    Human,
    /// One object per line, see [`JsonFormatter`].
    Json,
}

/// Tracer settings, carried by [`ContextConfig`](crate::ContextConfig).
#[derive(Clone, Debug, Default)]
pub struct TracerConfig {
    /// Whether events are recorded at all.
    pub enabled: bool,
    /// Records kept before the oldest are dropped; zero means
    /// [`DEFAULT_CAPACITY`].
    pub capacity: usize,
    /// Output target.
    pub output: TraceOutput,
    /// Output format.
    pub format: TraceFormat,
    /// Event type names to keep; `None` keeps every event.
    pub only: Option<Vec<String>>,
}

impl TracerConfig {
    /// A disabled configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns recording on.
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Keeps at most `capacity` records.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Echoes records to stderr.
    #[must_use]
    pub fn to_stderr(mut self) -> Self {
        self.output = TraceOutput::Stderr;
        self
    }

    /// Renders records as JSON.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.format = TraceFormat::Json;
        self
    }

    /// Keeps only events whose [`TraceEvent::event_type`] is listed.
    #[must_use]
    pub fn only<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(event_types.into_iter().map(Into::into).collect());
        self
    }

    fn keeps(&self, event: &TraceEvent) -> bool {
        self.only
            .as_ref()
            .is_none_or(|types| types.iter().any(|t| t == event.event_type()))
    }
}

/// Records trace events for one compilation context.
#[derive(Debug)]
pub struct Tracer {
    config: TracerConfig,
    buffer: TraceBuffer,
    started: Instant,
}

impl Tracer {
    /// Creates a tracer.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        let capacity = match config.capacity {
            0 => DEFAULT_CAPACITY,
            n => n,
        };
        Self {
            config,
            buffer: TraceBuffer::new(capacity),
            started: Instant::now(),
        }
    }

    /// Whether events are recorded.
    #[must_use]
    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Records `event` at meta depth `depth`.
    #[inline]
    pub fn record(&mut self, depth: usize, event: TraceEvent) {
        if self.config.enabled && self.config.keeps(&event) {
            self.push(depth, event);
        }
    }

    fn push(&mut self, depth: usize, event: TraceEvent) {
        let elapsed = u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.buffer.push(depth, elapsed, event);
        if self.config.output == TraceOutput::Stderr {
            if let Some(record) = self.buffer.last() {
                let _ = writeln!(io::stderr(), "{}", self.format_record(record));
            }
        }
    }

    /// Formats one record in the configured format.
    #[must_use]
    pub fn format_record(&self, record: &TraceRecord) -> String {
        match self.config.format {
            TraceFormat::Human => HumanFormatter::new().format(record),
            TraceFormat::Json => JsonFormatter::new().format(record),
        }
    }

    /// Every buffered record, one per line.
    #[must_use]
    pub fn render(&self) -> String {
        let records: Vec<&TraceRecord> = self.buffer.iter().collect();
        match self.config.format {
            TraceFormat::Human => HumanFormatter::new().format_many(&records),
            TraceFormat::Json => JsonFormatter::new().format_many(&records),
        }
    }

    /// The record buffer.
    #[must_use]
    pub const fn buffer(&self) -> &TraceBuffer {
        &self.buffer
    }

    /// Removes and returns the buffered records.
    pub fn take(&mut self) -> Vec<TraceRecord> {
        self.buffer.drain()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(TracerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defined(name: &str) -> TraceEvent {
        TraceEvent::MacroDefined { name: name.into() }
    }

    #[test]
    fn nothing_is_recorded_by_default() {
        let mut tracer = Tracer::default();
        tracer.record(0, TraceEvent::PreludeLoaded { nodes: 1 });
        assert!(!tracer.is_enabled());
        assert!(tracer.buffer().is_empty());
    }

    #[test]
    fn capacity_bounds_the_buffer() {
        let mut tracer = Tracer::new(TracerConfig::new().enabled().with_capacity(2));
        for name in ["a", "b", "c"] {
            tracer.record(0, defined(name));
        }
        let kept: Vec<TraceEvent> = tracer.take().into_iter().map(|r| r.event).collect();
        assert_eq!(kept, [defined("b"), defined("c")]);
        assert!(tracer.buffer().is_empty());
    }

    #[test]
    fn only_listed_event_types_are_kept() {
        let mut tracer = Tracer::new(TracerConfig::new().enabled().only(["macro-defined"]));
        tracer.record(0, TraceEvent::PreludeLoaded { nodes: 1 });
        tracer.record(1, defined("m"));
        assert_eq!(tracer.render(), "  macro m defined");
    }

    #[test]
    fn json_rendering() {
        let mut tracer = Tracer::new(TracerConfig::new().enabled().json());
        tracer.record(0, defined("m"));
        assert!(tracer.render().starts_with("{\"id\":0"));
    }

    #[test]
    fn contexts_trace_meta_activity() {
        let config = crate::ContextConfig::new()
            .without_prelude()
            .with_tracer(TracerConfig::new().enabled().only(["operator-defined", "macro-defined"]));
        let mut ctx = crate::Context::with_config(config).expect("context");
        ctx.compile_source("{def operator <+> 110 $left + $right} {macro m [ns] ns}")
            .expect("compiles");
        let types: Vec<&str> = ctx.tracer().buffer().iter().map(TraceRecord::event_type).collect();
        assert_eq!(types, ["operator-defined", "macro-defined"]);
    }
}
