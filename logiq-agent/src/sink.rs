// LogIQ Agent - Anomaly sinks
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Anomaly sinks: CSV file, log output, and a fan-out over both.

use crate::error::AgentError;
use crate::metrics::{record_anomaly, record_sink_failure};
use chrono::{TimeZone, Utc};
use logiq_detect::{AnomalyRecord, AnomalySink, SinkError};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// One CSV row.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    timestamp: String,
    stream: &'a str,
    kind: &'static str,
    window_start: String,
    template_id: String,
    observed: u64,
    expected: f64,
    severity: f64,
    description: &'a str,
}

fn format_ms(timestamp_ms: u64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms as i64)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Appends records to a CSV file shared by every stream.
#[derive(Clone)]
pub struct CsvSink {
    stream: String,
    writer: Arc<Mutex<csv::Writer<File>>>,
}

impl CsvSink {
    /// Open (or create) the file; the header is written only to an empty file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let is_empty = file.metadata()?.len() == 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);
        Ok(Self {
            stream: String::new(),
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    /// Handle writing to the same file under another stream label.
    pub fn for_stream(&self, stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl AnomalySink for CsvSink {
    fn append(&self, record: &AnomalyRecord) -> Result<(), SinkError> {
        let row = CsvRow {
            timestamp: format_ms(record.timestamp_ms),
            stream: &self.stream,
            kind: record.kind.as_str(),
            window_start: format_ms(record.window.start_ms()),
            template_id: record
                .template_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            observed: record.observed,
            expected: record.expected,
            severity: record.severity,
            description: &record.description,
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writer
            .serialize(&row)
            .map_err(|e| match e.kind() {
                csv::ErrorKind::Io(_) => SinkError::Unavailable(e.to_string()),
                _ => SinkError::Rejected(e.to_string()),
            })
            .and_then(|_| {
                writer
                    .flush()
                    .map_err(|e| SinkError::Unavailable(e.to_string()))
            });

        if result.is_err() {
            record_sink_failure("csv");
        }
        result
    }
}

/// Logs each delivered record and counts it.
pub struct LogSink {
    stream: String,
}

impl LogSink {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
        }
    }
}

impl AnomalySink for LogSink {
    fn append(&self, record: &AnomalyRecord) -> Result<(), SinkError> {
        warn!(
            stream = %self.stream,
            kind = record.kind.as_str(),
            window = record.window.as_secs(),
            severity = record.severity,
            "{}",
            record.description
        );
        record_anomaly(&self.stream, record.kind);
        Ok(())
    }
}

/// Delivers each record to every inner sink.
///
/// Every sink is attempted; the first failure is returned so the monitor
/// requeues the record, which may repeat it on the sinks that succeeded.
pub struct FanoutSink {
    sinks: Vec<Box<dyn AnomalySink + Send + Sync>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl AnomalySink + Send + Sync + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Default for FanoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalySink for FanoutSink {
    fn append(&self, record: &AnomalyRecord) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.append(record) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logiq::TemplateId;
    use logiq_detect::{Threshold, WindowKey};

    fn spike() -> AnomalyRecord {
        let threshold = Threshold {
            mean: 10.0,
            std: 0.0,
            effective_std: 1.0,
            threshold: 14.0,
        };
        AnomalyRecord::rate_spike(WindowKey(1_700_000_000), 1_700_000_005_000, 45, &threshold)
    }

    fn pattern() -> AnomalyRecord {
        AnomalyRecord::new_template(
            WindowKey(1_700_000_000),
            1_700_000_005_000,
            TemplateId::of("Disk <*> full, retrying"),
            "Disk <*> full, retrying",
            1,
            180,
        )
    }

    struct FailingSink;

    impl AnomalySink for FailingSink {
        fn append(&self, _record: &AnomalyRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("down".into()))
        }
    }

    #[test]
    fn test_csv_sink_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomalies.csv");

        let sink = CsvSink::open(&path).unwrap().for_stream("auth");
        sink.append(&spike()).unwrap();
        sink.append(&pattern()).unwrap();
        drop(sink);

        // Reopening appends without a second header
        let sink = CsvSink::open(&path).unwrap().for_stream("db");
        sink.append(&spike()).unwrap();
        drop(sink);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "timestamp");
        assert_eq!(&headers[2], "kind");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][1], "auth");
        assert_eq!(&rows[0][2], "FREQUENCY");
        assert_eq!(&rows[1][2], "PATTERN");
        assert_eq!(&rows[1][8], "[PATTERN] New template: Disk <*> full, retrying");
        assert_eq!(&rows[2][1], "db");
    }

    #[test]
    fn test_fanout_reports_failure_after_trying_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let fanout = FanoutSink::new()
            .with(FailingSink)
            .with(CsvSink::open(&path).unwrap().for_stream("api"));
        assert_eq!(fanout.sinks.len(), 2);

        let result = fanout.append(&spike());
        assert_eq!(result, Err(SinkError::Unavailable("down".into())));

        let rows = csv::Reader::from_path(&path).unwrap().records().count();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_log_sink_accepts() {
        assert!(LogSink::new("api").append(&pattern()).is_ok());
    }
}
