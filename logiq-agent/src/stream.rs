// LogIQ Agent - Per-stream monitor loop
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Per-stream monitor loop and the status it publishes.

use crate::ingest::{now_ms, IngestState};
use crate::metrics::update_stream_metrics;
use logiq_detect::{AnomalySink, MemoryEventStore, StreamMonitor, TickOutcome};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Detection state of one stream, refreshed after every tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamStatus {
    pub phase: String,
    pub learning_progress: f64,
    pub windows_evaluated: u64,
    pub anomalies: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_window: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_window_logs: Option<u64>,
    pub baseline_mean: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub seen_templates: usize,
    pub pending_records: usize,
    pub dropped_records: u64,
    pub buffered_events: usize,
}

impl StreamStatus {
    pub fn from_monitor(monitor: &StreamMonitor, store: &MemoryEventStore) -> Self {
        let engine = monitor.engine();
        let baseline = engine.baseline();
        Self {
            phase: monitor.phase().as_str().to_string(),
            learning_progress: baseline.progress(),
            windows_evaluated: engine.windows_evaluated(),
            anomalies: engine.anomalies_emitted(),
            last_window: monitor.last_evaluated().map(|key| key.as_secs()),
            last_window_logs: monitor.last_report().map(|report| report.total),
            baseline_mean: baseline.history().mean(),
            threshold: baseline.threshold().ok().map(|t| t.threshold),
            seen_templates: engine.seen().len(),
            pending_records: monitor.pending_len(),
            dropped_records: monitor.dropped_records(),
            buffered_events: store.len(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == logiq_detect::BaselinePhase::Active.as_str()
    }
}

/// Everything the HTTP handlers know about a stream.
pub struct StreamHandle {
    pub name: String,
    pub path: PathBuf,
    pub ingest: Arc<IngestState>,
    pub status: Arc<RwLock<StreamStatus>>,
}

/// Drives one stream's [`StreamMonitor`] on the poll interval.
pub struct MonitorTask {
    monitor: StreamMonitor,
    store: Arc<MemoryEventStore>,
    sink: Arc<dyn AnomalySink + Send + Sync>,
    status: Arc<RwLock<StreamStatus>>,
    poll_interval: Duration,
}

impl MonitorTask {
    pub fn new(
        monitor: StreamMonitor,
        store: Arc<MemoryEventStore>,
        sink: Arc<dyn AnomalySink + Send + Sync>,
    ) -> Self {
        let poll_interval = monitor.engine().config().poll_interval();
        let status = StreamStatus::from_monitor(&monitor, &store);
        Self {
            monitor,
            store,
            sink,
            status: Arc::new(RwLock::new(status)),
            poll_interval,
        }
    }

    pub fn status(&self) -> Arc<RwLock<StreamStatus>> {
        Arc::clone(&self.status)
    }

    /// One tick: evaluate, prune the store and refresh metrics.
    pub fn step(&mut self, now_ms: u64) -> (TickOutcome, StreamStatus) {
        let outcome = self.monitor.tick(&*self.store, &*self.sink, now_ms);

        let pruned = self
            .store
            .prune_before(self.monitor.retention_cutoff_ms(now_ms));
        if pruned > 0 {
            debug!("[{}] pruned {} events", self.monitor.name(), pruned);
        }

        update_stream_metrics(&self.monitor, &outcome);

        let status = StreamStatus::from_monitor(&self.monitor, &self.store);
        (outcome, status)
    }

    /// Tick forever on the poll interval.
    pub async fn run(mut self) {
        info!(
            "[{}] monitor started, polling every {:?}",
            self.monitor.name(),
            self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // Sink writes and retry backoff block the worker thread
            let (_, status) = tokio::task::block_in_place(|| self.step(now_ms()));
            *self.status.write().await = status;
        }
    }
}
