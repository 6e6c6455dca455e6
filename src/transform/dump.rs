//! Diagnostic taps
//!
//! A [`DumpTap`] forwards every line it sees to a [`DiagnosticSink`] and
//! returns the line untouched. Sink failures (including panics) are logged and
//! swallowed so observation can never break the data path.

use super::LineTransform;
use crate::error::TransformResult;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Label used when none is given.
pub const DEFAULT_DUMP_LABEL: &str = "[DUMP]";

/// Receives labelled copies of lines flowing through a [`DumpTap`].
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, label: &str, line_no: usize, text: &str);
}

/// Emits each line as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, label: &str, line_no: usize, text: &str) {
        tracing::info!(target: "linepipe::dump", label, line = line_no, "{}", text);
    }
}

/// Prints `{label}{text}` to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn emit(&self, label: &str, line_no: usize, text: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = writeln!(handle, "{label}{text}") {
            tracing::warn!("Failed to dump line {} to stdout: {}", line_no, e);
        }
    }
}

/// One captured emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    pub label: String,
    pub line_no: usize,
    pub text: String,
}

/// Keeps every emission in memory; cheap to clone, clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<DumpEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DumpEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured texts, in emission order.
    pub fn texts(&self) -> Vec<String> {
        self.entries().into_iter().map(|entry| entry.text).collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, label: &str, line_no: usize, text: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DumpEntry {
                label: label.to_string(),
                line_no,
                text: text.to_string(),
            });
    }
}

/// Pass-through transform that copies each line to a diagnostic sink.
#[derive(Clone)]
pub struct DumpTap {
    label: String,
    sink: Arc<dyn DiagnosticSink>,
}

impl DumpTap {
    pub fn new(sink: impl DiagnosticSink + 'static) -> Self {
        Self {
            label: DEFAULT_DUMP_LABEL.to_string(),
            sink: Arc::new(sink),
        }
    }

    /// Tap that logs through `tracing`.
    pub fn tracing() -> Self {
        Self::new(TracingSink)
    }

    /// Tap that prints to stdout.
    pub fn stdout() -> Self {
        Self::new(StdoutSink)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for DumpTap {
    fn default() -> Self {
        Self::tracing()
    }
}

impl std::fmt::Debug for DumpTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpTap").field("label", &self.label).finish()
    }
}

impl LineTransform for DumpTap {
    fn apply(&self, line_no: usize, line: &str) -> TransformResult<String> {
        let emitted = panic::catch_unwind(AssertUnwindSafe(|| {
            self.sink.emit(&self.label, line_no, line)
        }));
        if emitted.is_err() {
            tracing::warn!("Diagnostic sink panicked on line {}; continuing", line_no);
        }
        Ok(line.to_owned())
    }
}
