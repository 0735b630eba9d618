use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Destination for operational log events raised by the lookup pipeline.
///
/// Calls are fire-and-forget: an implementation must swallow its own failures.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, payload: Value);
}

/// Forwards events to `tracing`.
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, payload: Value) {
        match level {
            LogLevel::Info => tracing::info!(target: "whois_gateway::events", %payload),
            LogLevel::Warning => tracing::warn!(target: "whois_gateway::events", %payload),
            LogLevel::Error => tracing::error!(target: "whois_gateway::events", %payload),
        }
    }
}

/// Keeps events in memory.
#[derive(Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<(LogLevel, Value)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, Value)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, payload: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, payload));
        }
    }
}
