//! Observability for find requests
//!
//! - Structured logging (JSON lines)
//! - Monotonic query metrics
//! - Lifecycle event tracing
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes a result
//! 2. Deterministic output
//! 3. No background threads
//!
//! # Usage
//!
//! ```ignore
//! use aeroquery::observability::{log_event, Event, ObservationScope};
//!
//! log_event(Event::CatalogLoaded, &[("tables", "3")]);
//!
//! let scope = ObservationScope::new("FIND", vec![("table", "user".into())]);
//! scope.complete(&[("rows", "10")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, QueryMetrics};
pub use scope::{ObservationScope, Timer};

/// Logs an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
