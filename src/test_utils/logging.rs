//! Log capture for asserting on fusion diagnostics.
//!
//! Capture is scoped to the calling thread via `with_default`, so tests running
//! in parallel do not see each other's events.

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::prelude::*;

/// A captured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    #[must_use]
    pub fn new(level: Level, target: &str, message: &str) -> Self {
        Self {
            level,
            target: target.to_string(),
            message: message.to_string(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.push((key.to_string(), value.to_string()));
        self
    }

    /// Value of a structured field, if recorded.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Layer appending every event to shared storage.
pub struct CaptureLayer {
    storage: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLayer {
    pub const fn new(storage: Arc<Mutex<Vec<LogEntry>>>) -> Self {
        Self { storage }
    }
}

impl<S> tracing_subscriber::Layer<S> for CaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        struct Visitor<'a> {
            message: &'a mut String,
            fields: &'a mut Vec<(String, String)>,
        }

        impl tracing::field::Visit for Visitor<'_> {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    *self.message = value.to_string();
                } else {
                    self.fields.push((field.name().to_string(), value.to_string()));
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let value_str = format!("{value:?}");
                if field.name() == "message" {
                    *self.message = value_str;
                } else {
                    self.fields.push((field.name().to_string(), value_str));
                }
            }
        }

        let metadata = event.metadata();
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut Visitor {
            message: &mut message,
            fields: &mut fields,
        });

        let mut entry = LogEntry::new(*metadata.level(), metadata.target(), &message);
        entry.fields = fields;

        if let Ok(mut storage) = self.storage.lock() {
            storage.push(entry);
        }
    }
}

/// Run `f` with a capturing subscriber at `level` and return its output and the logs.
pub fn capture_logs<R>(level: Level, f: impl FnOnce() -> R) -> (R, Vec<LogEntry>) {
    let storage = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .with(CaptureLayer::new(Arc::clone(&storage)));

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = storage.lock().map(|s| s.clone()).unwrap_or_default();
    (result, logs)
}

/// Format logs for display on assertion failure.
#[must_use]
pub fn format_logs(logs: &[LogEntry]) -> String {
    if logs.is_empty() {
        return String::from("No logs captured");
    }

    let mut output = format!("Captured {} log entries:\n", logs.len());
    for entry in logs {
        output.push_str(&format!(
            "[{}] {}: {}\n",
            entry.level, entry.target, entry.message
        ));
        for (key, value) in &entry.fields {
            output.push_str(&format!("    {key} = {value}\n"));
        }
    }
    output
}

/// Assert that captured logs contain an entry with the given level and message fragment.
#[macro_export]
macro_rules! assert_log_contains {
    ($logs:expr, $level:expr, $message:expr) => {{
        let logs: &[$crate::test_utils::logging::LogEntry] = &$logs;
        let found = logs
            .iter()
            .any(|e| e.level == $level && e.message.contains($message));
        assert!(
            found,
            "Expected log with level {} containing '{}'\n{}",
            $level,
            $message,
            $crate::test_utils::logging::format_logs(logs)
        );
    }};
}

/// Assert that some captured message matches a regex.
#[macro_export]
macro_rules! assert_log_matches {
    ($logs:expr, $pattern:expr) => {{
        let logs: &[$crate::test_utils::logging::LogEntry] = &$logs;
        let pattern = regex::Regex::new($pattern).expect("Invalid regex pattern");
        let found = logs.iter().any(|e| pattern.is_match(&e.message));
        assert!(
            found,
            "Expected log matching pattern '{}'\n{}",
            $pattern,
            $crate::test_utils::logging::format_logs(logs)
        );
    }};
}

/// Assert that no captured entry is at WARN level.
#[macro_export]
macro_rules! assert_no_warnings {
    ($logs:expr) => {{
        let logs: &[$crate::test_utils::logging::LogEntry] = &$logs;
        assert!(
            !logs.iter().any(|e| e.level == tracing::Level::WARN),
            "Expected no warnings but found some:\n{}",
            $crate::test_utils::logging::format_logs(logs)
        );
    }};
}
