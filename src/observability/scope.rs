//! ObservationScope for automatic begin/outcome logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs exactly one outcome: `_COMPLETE`, `_REJECTED`, `_FAILED` or
//!   `_CANCELLED`
//! - Logs `{name}_INCOMPLETE` on drop when no outcome was recorded, which
//!   happens when the owning future is dropped mid-flight

use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that logs begin and outcome events with shared fields
///
/// ```ignore
/// let scope = ObservationScope::new("FIND", vec![("table", "user".into())]);
/// // ... do work ...
/// scope.complete(&[("rows", "10")]);
/// ```
pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    finished: bool,
    timer: Timer,
}

impl ObservationScope {
    pub fn new(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            finished: false,
            timer: Timer::new(),
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finish(Severity::Info, "COMPLETE", extra);
    }

    /// Request refused before any work ran
    pub fn reject(mut self, code: &str, message: &str) {
        self.finish(Severity::Warn, "REJECTED", &[("code", code), ("message", message)]);
    }

    pub fn fail(mut self, code: &str, message: &str) {
        self.finish(Severity::Error, "FAILED", &[("code", code), ("message", message)]);
    }

    pub fn cancel(mut self) {
        self.finish(Severity::Warn, "CANCELLED", &[]);
    }

    fn finish(&mut self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.timer.elapsed_ms();
        let mut fields: Vec<(&str, &str)> = extra.to_vec();
        fields.push(("elapsed_ms", elapsed.as_str()));
        self.emit(severity, suffix, &fields);
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        if !Logger::enabled(severity) {
            return;
        }
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend_from_slice(extra);
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without outcome")],
            );
        }
    }
}

/// A simple duration timer for logging elapsed time
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
