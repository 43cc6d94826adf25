// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Boundaries to the event store and the anomaly store.

mod memory;

pub use memory::{MemoryEventStore, MemorySink};

use crate::anomaly::AnomalyRecord;
use crate::error::{SinkError, SourceError};
use crate::window::TemplateEvent;

/// Pull interface over stored template events.
pub trait EventSource {
    /// Events with `from_ms <= timestamp_ms < to_ms`.
    ///
    /// An empty result is a quiet range, not an error.
    fn fetch(&self, from_ms: u64, to_ms: u64) -> Result<Vec<TemplateEvent>, SourceError>;
}

/// Append interface for detected anomalies.
///
/// Implementations must tolerate the same record being appended twice
/// after a retried write.
pub trait AnomalySink {
    fn append(&self, record: &AnomalyRecord) -> Result<(), SinkError>;
}

impl<T: EventSource + ?Sized> EventSource for &T {
    fn fetch(&self, from_ms: u64, to_ms: u64) -> Result<Vec<TemplateEvent>, SourceError> {
        (**self).fetch(from_ms, to_ms)
    }
}

impl<T: AnomalySink + ?Sized> AnomalySink for &T {
    fn append(&self, record: &AnomalyRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }
}

impl<T: AnomalySink + ?Sized> AnomalySink for Box<T> {
    fn append(&self, record: &AnomalyRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }
}
