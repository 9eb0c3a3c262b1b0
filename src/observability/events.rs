//! Observable events
//!
//! Events are explicit and typed. Each carries the severity it is logged at.
//! The find lifecycle (`FIND_BEGIN` and its outcome) is logged through
//! `ObservationScope`.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Queries issued
    RootQuery,
    CountQuery,
    DeepQuery,
    /// Deep path with no parent keys; no query issued
    DeepSkipped,

    // Explain
    ExplainBegin,
    ExplainComplete,

    // Startup
    CatalogLoaded,
    ConfigLoaded,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RootQuery => "ROOT_QUERY",
            Event::CountQuery => "COUNT_QUERY",
            Event::DeepQuery => "DEEP_QUERY",
            Event::DeepSkipped => "DEEP_SKIPPED",
            Event::ExplainBegin => "EXPLAIN_BEGIN",
            Event::ExplainComplete => "EXPLAIN_COMPLETE",
            Event::CatalogLoaded => "CATALOG_LOADED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::RootQuery | Event::CountQuery | Event::DeepQuery | Event::DeepSkipped => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::RootQuery,
            Event::CountQuery,
            Event::DeepQuery,
            Event::DeepSkipped,
            Event::ExplainBegin,
            Event::ExplainComplete,
            Event::CatalogLoaded,
            Event::ConfigLoaded,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::DeepQuery.severity(), Severity::Trace);
        assert_eq!(Event::DeepSkipped.severity(), Severity::Trace);
        assert_eq!(Event::ExplainComplete.severity(), Severity::Info);
    }
}
