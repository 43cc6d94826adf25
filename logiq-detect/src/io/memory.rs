// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! In-memory event store and sink.

use super::{AnomalySink, EventSource};
use crate::anomaly::AnomalyRecord;
use crate::error::{SinkError, SourceError};
use crate::window::TemplateEvent;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Time-ordered buffer of recent events for one stream.
///
/// Producers push from any thread; the monitor fetches ranges and prunes
/// events that fell out of the lookback.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<VecDeque<TemplateEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TemplateEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event, keeping the buffer ordered by timestamp.
    pub fn push(&self, event: TemplateEvent) {
        let mut events = self.lock();
        let position = events
            .iter()
            .rposition(|e| e.timestamp_ms <= event.timestamp_ms)
            .map_or(0, |i| i + 1);
        events.insert(position, event);
    }

    /// Drop events older than `cutoff_ms`; returns how many were removed.
    pub fn prune_before(&self, cutoff_ms: u64) -> usize {
        let mut events = self.lock();
        let before = events.len();
        while events
            .front()
            .map_or(false, |e| e.timestamp_ms < cutoff_ms)
        {
            events.pop_front();
        }
        before - events.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl EventSource for MemoryEventStore {
    fn fetch(&self, from_ms: u64, to_ms: u64) -> Result<Vec<TemplateEvent>, SourceError> {
        let events = self.lock();
        Ok(events
            .iter()
            .skip_while(|e| e.timestamp_ms < from_ms)
            .take_while(|e| e.timestamp_ms < to_ms)
            .cloned()
            .collect())
    }
}

/// Sink collecting records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AnomalyRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AnomalyRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnomalySink for MemorySink {
    fn append(&self, record: &AnomalyRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
