//! Observability for revstore
//!
//! Structured JSON logs keyed by a typed [`Event`], and atomic counters in
//! [`MetricsRegistry`]. Both are synchronous and never fail the caller.
//!
//! ```ignore
//! use revstore::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::RenderComplete, &[("title", "Foobar")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_renders();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event at its own severity.
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields at its own severity.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_does_not_panic() {
        log_event(Event::BootStart);
        log_event_with_fields(Event::ConfigLoaded, &[("data_dir", "/tmp/revstore")]);
    }
}
