//! Debug sink for scanner diagnostics
//!
//! Callers that embed the scanner can ask for a plain-text trace of what it is
//! doing without installing a `tracing` subscriber. Every line is also emitted
//! as a `tracing` debug event.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Shared writer that debug lines go to
pub type DebugSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Prefixed line logger writing to an optional [`DebugSink`]
#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<DebugSink>,
    prefix: String,
}

impl Logger {
    /// Logger writing to `writer` with prefix `a:b:...`
    pub fn new(writer: Box<dyn Write + Send>, parts: &[&str]) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(writer))),
            prefix: parts.join(":"),
        }
    }

    /// Logger that discards everything except the `tracing` event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Child logger sharing the sink, with `part` appended to the prefix
    pub fn extend(&self, part: &str) -> Self {
        let prefix = if self.prefix.is_empty() {
            part.to_string()
        } else {
            format!("{}:{}", self.prefix, part)
        };
        Self {
            sink: self.sink.clone(),
            prefix,
        }
    }

    /// Whether lines reach a writer
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Write one line
    pub fn log(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "confscan::debug", prefix = %self.prefix, "{}", args);

        let Some(sink) = &self.sink else {
            return;
        };
        // a poisoned writer only means another thread panicked mid-line
        let mut writer = match sink.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "[{}] {}", self.prefix, args);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("prefix", &self.prefix)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
