// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! StreamMonitor - one poll-loop step for one monitored stream.
//!
//! Each tick fetches the windows closed since the previous tick, runs them
//! through the engine in order and delivers the resulting records. A tick
//! never blocks longer than the retry budget of its two I/O calls.

use crate::anomaly::AnomalyRecord;
use crate::baseline::BaselinePhase;
use crate::config::DetectConfig;
use crate::engine::{AnomalyEngine, WindowReport};
use crate::error::Result;
use crate::io::{AnomalySink, EventSource};
use crate::window::{WindowAggregator, WindowKey};
use logiq::{with_retry_transient, RetryStrategy, Retryable};
use std::collections::VecDeque;

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Closed windows were evaluated.
    Evaluated {
        windows: usize,
        anomalies: usize,
        /// Records still waiting for the sink.
        undelivered: usize,
    },
    /// No window closed since the last tick.
    Idle,
    /// The event source failed; the same windows are retried next tick.
    Skipped { reason: String },
}

/// Per-stream pipeline: aggregator, engine and pending deliveries.
pub struct StreamMonitor {
    name: String,
    aggregator: WindowAggregator,
    engine: AnomalyEngine,
    retry: RetryStrategy,
    pending: VecDeque<AnomalyRecord>,
    max_pending: usize,
    last_evaluated: Option<WindowKey>,
    last_report: Option<WindowReport>,
    dropped_records: u64,
}

impl StreamMonitor {
    pub fn new(name: impl Into<String>, config: DetectConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            aggregator: WindowAggregator::from_config(&config),
            retry: config.retry_strategy(),
            max_pending: config.poll.max_pending_records.max(1),
            engine: AnomalyEngine::new(config),
            pending: VecDeque::new(),
            last_evaluated: None,
            last_report: None,
            dropped_records: 0,
        })
    }

    /// Evaluate every window closed at `now_ms` that has not been seen yet.
    pub fn tick<S, K>(&mut self, source: &S, sink: &K, now_ms: u64) -> TickOutcome
    where
        S: EventSource + ?Sized,
        K: AnomalySink + ?Sized,
    {
        let Some(closed) = self.aggregator.closed_window(now_ms) else {
            return TickOutcome::Idle;
        };

        let size = self.aggregator.window_size_secs();
        let oldest = self.aggregator.lookback_start(now_ms);
        let from = match self.last_evaluated {
            Some(last) => {
                let next = last.next(size);
                if next < oldest {
                    log::warn!(
                        "[{}] windows {}..{} fell out of the lookback, not evaluated",
                        self.name,
                        next,
                        oldest
                    );
                }
                next.max(oldest)
            }
            None => closed,
        };

        if from > closed {
            self.flush(sink);
            return TickOutcome::Idle;
        }

        let to_exclusive = closed.next(size);
        let fetched = with_retry_transient(&self.retry, || {
            source.fetch(from.start_ms(), to_exclusive.start_ms())
        });
        let events = match fetched {
            Ok(events) => events,
            Err(e) => {
                log::warn!(
                    "[{}] event source failed, skipping windows {}..={}: {}",
                    self.name,
                    from,
                    closed,
                    e
                );
                self.flush(sink);
                return TickOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let windows = self.aggregator.windows_between(from, to_exclusive, &events);
        let mut anomalies = 0;
        for window in &windows {
            let was_learning = self.engine.phase() == BaselinePhase::Learning;
            match self.engine.evaluate(window) {
                Ok(report) => {
                    if was_learning && report.phase == BaselinePhase::Active {
                        log::info!(
                            "[{}] baseline active at window {}, {} known templates",
                            self.name,
                            window.key,
                            self.engine.seen().len()
                        );
                    }
                    for record in &report.records {
                        log::info!("[{}] {}", self.name, record.description);
                        self.enqueue(record.clone());
                    }
                    anomalies += report.records.len();
                    self.last_report = Some(report);
                }
                Err(e) => log::error!("[{}] window {} not evaluated: {}", self.name, window.key, e),
            }
            self.last_evaluated = Some(window.key);
        }

        let undelivered = self.flush(sink);
        TickOutcome::Evaluated {
            windows: windows.len(),
            anomalies,
            undelivered,
        }
    }

    fn enqueue(&mut self, record: AnomalyRecord) {
        while self.pending.len() >= self.max_pending {
            if let Some(dropped) = self.pending.pop_front() {
                self.dropped_records += 1;
                log::error!(
                    "[{}] pending queue full, dropping record: {}",
                    self.name,
                    dropped.description
                );
            }
        }
        self.pending.push_back(record);
    }

    /// Deliver queued records; returns how many remain queued.
    fn flush<K: AnomalySink + ?Sized>(&mut self, sink: &K) -> usize {
        while let Some(record) = self.pending.pop_front() {
            match with_retry_transient(&self.retry, || sink.append(&record)) {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    log::warn!(
                        "[{}] anomaly sink unavailable, {} records kept for next tick: {} ({})",
                        self.name,
                        self.pending.len() + 1,
                        record.description,
                        e
                    );
                    self.pending.push_front(record);
                    break;
                }
                Err(e) => {
                    self.dropped_records += 1;
                    log::error!(
                        "[{}] anomaly sink rejected record: {} ({})",
                        self.name,
                        record.description,
                        e
                    );
                }
            }
        }
        self.pending.len()
    }

    /// Events older than this are outside every future tick's range.
    pub fn retention_cutoff_ms(&self, now_ms: u64) -> u64 {
        let oldest = self.aggregator.lookback_start(now_ms);
        match self.last_evaluated {
            Some(last) => last.next(self.aggregator.window_size_secs()).max(oldest).start_ms(),
            None => oldest.start_ms(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &AnomalyEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AnomalyEngine {
        &mut self.engine
    }

    pub fn phase(&self) -> BaselinePhase {
        self.engine.phase()
    }

    pub fn last_evaluated(&self) -> Option<WindowKey> {
        self.last_evaluated
    }

    pub fn last_report(&self) -> Option<&WindowReport> {
        self.last_report.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dropped_records(&self) -> u64 {
        self.dropped_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemoryEventStore, MemorySink};
    use crate::window::TemplateEvent;

    fn config() -> DetectConfig {
        let mut config = DetectConfig::default();
        config.poll.retry.delay_ms = 1;
        config
    }

    #[test]
    fn test_idle_before_first_window_closes() {
        let mut monitor = StreamMonitor::new("svc", config()).unwrap();
        let store = MemoryEventStore::new();
        let sink = MemorySink::new();
        assert_eq!(monitor.tick(&store, &sink, 3_000), TickOutcome::Idle);
    }

    #[test]
    fn test_first_tick_evaluates_latest_closed_window() {
        let mut monitor = StreamMonitor::new("svc", config()).unwrap();
        let store = MemoryEventStore::new();
        for ts in [1_000, 6_000, 7_000] {
            store.push(TemplateEvent::from_template("ping", ts));
        }
        let sink = MemorySink::new();

        let outcome = monitor.tick(&store, &sink, 12_000);
        assert_eq!(
            outcome,
            TickOutcome::Evaluated {
                windows: 1,
                anomalies: 0,
                undelivered: 0
            }
        );
        assert_eq!(monitor.last_evaluated(), Some(WindowKey(5)));
        assert_eq!(monitor.engine().baseline().history().values(), vec![2]);

        // Same window is not evaluated twice
        assert_eq!(monitor.tick(&store, &sink, 13_000), TickOutcome::Idle);
    }

    #[test]
    fn test_catch_up_covers_missed_windows() {
        let mut monitor = StreamMonitor::new("svc", config()).unwrap();
        let store = MemoryEventStore::new();
        let sink = MemorySink::new();
        monitor.tick(&store, &sink, 6_000);
        assert_eq!(monitor.last_evaluated(), Some(WindowKey(0)));

        match monitor.tick(&store, &sink, 26_000) {
            TickOutcome::Evaluated { windows, .. } => assert_eq!(windows, 4),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(monitor.last_evaluated(), Some(WindowKey(20)));
    }

    #[test]
    fn test_retention_cutoff() {
        let mut monitor = StreamMonitor::new("svc", config()).unwrap();
        let store = MemoryEventStore::new();
        let sink = MemorySink::new();
        monitor.tick(&store, &sink, 300_000);
        // Next window to evaluate starts at 300s
        assert_eq!(monitor.retention_cutoff_ms(300_000), 300_000);
        // Lookback start wins once it passes the next window
        assert_eq!(monitor.retention_cutoff_ms(1_000_000), 880_000);
    }
}
