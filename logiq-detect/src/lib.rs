//! # LogIQ Detection
//!
//! Streaming anomaly detection over mined log templates.
//!
//! Template events are bucketed into fixed windows; a per-stream baseline
//! learns normal volume from the first non-empty windows and then flags
//! two kinds of deviation:
//!
//! - **FREQUENCY**: a window count above `mean + k * effective_std`
//! - **PATTERN**: the first occurrence of a template not seen while learning
//!
//! ## Quick Start
//!
//! ```rust
//! use logiq_detect::{AnomalyEngine, DetectConfig, TemplateEvent, WindowAggregator};
//!
//! let config = DetectConfig::default();
//! let aggregator = WindowAggregator::from_config(&config);
//! let mut engine = AnomalyEngine::new(config);
//!
//! let mut events = Vec::new();
//! for window in 0..5u64 {
//!     for i in 0..10u64 {
//!         events.push(TemplateEvent::from_template("Request <*> served", window * 5_000 + i));
//!     }
//! }
//! for i in 0..45u64 {
//!     events.push(TemplateEvent::from_template("Request <*> served", 25_000 + i));
//! }
//!
//! let mut anomalies = Vec::new();
//! for snapshot in aggregator.aggregate(&events) {
//!     anomalies.extend(engine.evaluate(&snapshot).unwrap().records);
//! }
//! assert_eq!(anomalies.len(), 1);
//! assert_eq!(anomalies[0].severity, 35.0);
//! ```
//!
//! ## Modules
//!
//! - [`window`]: Window keys, snapshots and the aggregator
//! - [`baseline`]: Rolling history, thresholds and the learning state machine
//! - [`seen`]: Seen-template set
//! - [`anomaly`]: Anomaly records
//! - [`engine`]: Per-window evaluation
//! - [`monitor`]: Per-stream poll step with bounded retry
//! - [`io`]: Event source and anomaly sink boundaries
//! - [`snapshot`]: Engine state export/import
//! - [`config`]: Configuration

pub mod anomaly;
pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod monitor;
pub mod seen;
pub mod snapshot;
pub mod window;

pub use anomaly::{AnomalyKind, AnomalyRecord};
pub use baseline::{BaselineModel, BaselinePhase, LearnOutcome, RollingHistory, Threshold};
pub use config::{DetectConfig, DetectionMode};
pub use engine::{AnomalyEngine, WindowReport};
pub use error::{DetectError, Result, SinkError, SourceError};
pub use io::{AnomalySink, EventSource, MemoryEventStore, MemorySink};
pub use monitor::{StreamMonitor, TickOutcome};
pub use seen::SeenTemplateSet;
pub use snapshot::EngineSnapshot;
pub use window::{TemplateCount, TemplateEvent, WindowAggregator, WindowKey, WindowSnapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_end_to_end_through_store() {
        let store = MemoryEventStore::new();
        let sink = MemorySink::new();
        let mut config = DetectConfig::default();
        config.poll.retry.delay_ms = 1;
        let mut monitor = StreamMonitor::new("api", config).unwrap();

        monitor.tick(&store, &sink, 5_000);
        for window in 1..=5u64 {
            for i in 0..10 {
                store.push(TemplateEvent::from_template("ok", window * 5_000 + i));
            }
            monitor.tick(&store, &sink, (window + 1) * 5_000);
        }
        assert_eq!(monitor.phase(), BaselinePhase::Active);
        assert!(sink.is_empty());
    }
}
