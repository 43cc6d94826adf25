// LogIQ Agent - Log file ingestion
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Log file ingestion.
//!
//! Reads one log file line by line, mines every line through the shared
//! [`TemplateMiner`] and pushes the resulting template events, stamped with
//! wall-clock time, into the stream's event store.

use crate::error::AgentError;
use crate::metrics::record_line;
use chrono::Utc;
use logiq::TemplateMiner;
use logiq_detect::{MemoryEventStore, TemplateEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep;
use tracing::{debug, info};

/// Delay between EOF checks while following a file.
const FOLLOW_POLL: Duration = Duration::from_millis(250);

/// Configuration for one ingested file.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub path: PathBuf,
    /// Lines per second (0 = as fast as possible).
    pub rate: f64,
    /// Keep reading appended lines after EOF.
    pub follow: bool,
}

/// Progress of an ingest task.
#[derive(Debug, Default)]
pub struct IngestState {
    /// Lines read from the file.
    pub lines_read: AtomicU64,
    /// Lines that produced a template.
    pub lines_parsed: AtomicU64,
    /// Whether the task is reading.
    pub running: AtomicBool,
    /// Whether the file was read to the end without `follow`.
    pub finished: AtomicBool,
}

/// Feeds one file into one stream's event store.
pub struct Ingestor {
    stream: String,
    config: IngestConfig,
    miner: Arc<TemplateMiner>,
    store: Arc<MemoryEventStore>,
    state: Arc<IngestState>,
}

impl Ingestor {
    pub fn new(
        stream: impl Into<String>,
        config: IngestConfig,
        miner: Arc<TemplateMiner>,
        store: Arc<MemoryEventStore>,
    ) -> Self {
        Self {
            stream: stream.into(),
            config,
            miner,
            store,
            state: Arc::new(IngestState::default()),
        }
    }

    pub fn state(&self) -> Arc<IngestState> {
        Arc::clone(&self.state)
    }

    /// Read the file until EOF, or forever with `follow`.
    pub async fn run(&self) -> Result<(), AgentError> {
        let file = File::open(&self.config.path).await?;
        let mut reader = BufReader::new(file);
        let mut line: Vec<u8> = Vec::new();
        let pause = (self.config.rate > 0.0).then(|| Duration::from_secs_f64(1.0 / self.config.rate));

        self.state.running.store(true, Ordering::SeqCst);
        info!(
            "[{}] ingesting {} (rate={}, follow={})",
            self.stream,
            self.config.path.display(),
            self.config.rate,
            self.config.follow
        );

        loop {
            let read = match reader.read_until(b'\n', &mut line).await {
                Ok(read) => read,
                Err(e) => {
                    self.state.running.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
            };

            if read == 0 || (self.config.follow && line.last() != Some(&b'\n')) {
                if !self.config.follow {
                    break;
                }
                // Partial line stays buffered until the writer finishes it
                sleep(FOLLOW_POLL).await;
                continue;
            }

            // Invalid UTF-8 is mined with replacement characters
            self.ingest_line(&String::from_utf8_lossy(&line), now_ms());
            line.clear();

            if let Some(pause) = pause {
                sleep(pause).await;
            }
        }

        self.state.running.store(false, Ordering::SeqCst);
        self.state.finished.store(true, Ordering::SeqCst);
        info!(
            "[{}] reached end of {} after {} lines",
            self.stream,
            self.config.path.display(),
            self.state.lines_read.load(Ordering::SeqCst)
        );
        Ok(())
    }

    /// Mine one line and store its event.
    pub fn ingest_line(&self, line: &str, timestamp_ms: u64) -> Option<TemplateEvent> {
        self.state.lines_read.fetch_add(1, Ordering::SeqCst);
        let parsed = self.miner.parse(line.trim_end_matches(['\r', '\n']));
        let Some(template_id) = parsed.template_id else {
            record_line(&self.stream, true);
            return None;
        };

        record_line(&self.stream, false);
        self.state.lines_parsed.fetch_add(1, Ordering::SeqCst);
        debug!("[{}] {} -> {}", self.stream, template_id, parsed.template);

        let event = TemplateEvent::new(template_id, parsed.template, timestamp_ms);
        self.store.push(event.clone());
        Some(event)
    }
}

/// Wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
