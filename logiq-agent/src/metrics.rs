// LogIQ Agent - Prometheus metrics definitions
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Prometheus metrics for the agent.
//!
//! Every per-stream metric is labeled with the stream name (the file stem
//! of the tailed log).

use lazy_static::lazy_static;
use logiq_detect::{AnomalyKind, BaselinePhase, StreamMonitor, TickOutcome};
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Encoder, Gauge, GaugeVec,
    TextEncoder,
};

lazy_static! {
    // ============================================================
    // Template Mining
    // ============================================================

    /// Lines mined into a template.
    pub static ref LINES_PARSED_TOTAL: CounterVec = register_counter_vec!(
        "logiq_lines_parsed_total",
        "Log lines assigned a template",
        &["stream"]
    ).unwrap();

    /// Lines without any token.
    pub static ref LINES_BLANK_TOTAL: CounterVec = register_counter_vec!(
        "logiq_lines_blank_total",
        "Log lines skipped because the message was empty",
        &["stream"]
    ).unwrap();

    /// Distinct templates known to the shared miner.
    pub static ref TEMPLATES_KNOWN: Gauge = register_gauge!(
        "logiq_templates_known",
        "Distinct templates discovered by the miner"
    ).unwrap();

    // ============================================================
    // Baseline
    // ============================================================

    /// 1 when the baseline is active, 0 while learning.
    pub static ref BASELINE_ACTIVE: GaugeVec = register_gauge_vec!(
        "logiq_baseline_active",
        "Baseline state (1=active, 0=learning)",
        &["stream"]
    ).unwrap();

    /// Learning progress (0.0 to 1.0).
    pub static ref BASELINE_PROGRESS: GaugeVec = register_gauge_vec!(
        "logiq_baseline_progress",
        "Baseline learning progress (0-1)",
        &["stream"]
    ).unwrap();

    /// Mean of the rolling window history.
    pub static ref BASELINE_MEAN: GaugeVec = register_gauge_vec!(
        "logiq_baseline_mean_logs",
        "Mean logs per window in the rolling history",
        &["stream"]
    ).unwrap();

    /// Current frequency threshold.
    pub static ref BASELINE_THRESHOLD: GaugeVec = register_gauge_vec!(
        "logiq_baseline_threshold_logs",
        "Logs per window above which a frequency anomaly is raised",
        &["stream"]
    ).unwrap();

    // ============================================================
    // Windows and Anomalies
    // ============================================================

    /// Windows evaluated by the monitor loop.
    pub static ref WINDOWS_EVALUATED_TOTAL: CounterVec = register_counter_vec!(
        "logiq_windows_evaluated_total",
        "Closed windows evaluated",
        &["stream"]
    ).unwrap();

    /// Log count of the last evaluated window.
    pub static ref WINDOW_LOGS: GaugeVec = register_gauge_vec!(
        "logiq_window_logs",
        "Logs in the last evaluated window",
        &["stream"]
    ).unwrap();

    /// Ticks skipped after the event source failed.
    pub static ref TICKS_SKIPPED_TOTAL: CounterVec = register_counter_vec!(
        "logiq_ticks_skipped_total",
        "Monitor ticks skipped because events could not be fetched",
        &["stream"]
    ).unwrap();

    /// Anomalies detected, by kind.
    pub static ref ANOMALIES_TOTAL: CounterVec = register_counter_vec!(
        "logiq_anomalies_total",
        "Anomalies detected",
        &["stream", "kind"]
    ).unwrap();

    /// Records waiting for redelivery.
    pub static ref PENDING_RECORDS: GaugeVec = register_gauge_vec!(
        "logiq_pending_records",
        "Anomaly records waiting for the sink",
        &["stream"]
    ).unwrap();

    /// Failed sink writes, by sink.
    pub static ref SINK_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "logiq_sink_failures_total",
        "Failed anomaly sink writes",
        &["sink"]
    ).unwrap();
}

/// Count one mined (or blank) line.
pub fn record_line(stream: &str, blank: bool) {
    if blank {
        LINES_BLANK_TOTAL.with_label_values(&[stream]).inc();
    } else {
        LINES_PARSED_TOTAL.with_label_values(&[stream]).inc();
    }
}

pub fn set_templates_known(count: usize) {
    TEMPLATES_KNOWN.set(count as f64);
}

/// Count one anomaly.
pub fn record_anomaly(stream: &str, kind: AnomalyKind) {
    ANOMALIES_TOTAL
        .with_label_values(&[stream, kind.as_str()])
        .inc();
}

pub fn record_sink_failure(sink: &str) {
    SINK_FAILURES_TOTAL.with_label_values(&[sink]).inc();
}

/// Update per-stream gauges after a monitor tick.
pub fn update_stream_metrics(monitor: &StreamMonitor, outcome: &TickOutcome) {
    let stream = monitor.name();
    let baseline = monitor.engine().baseline();

    match outcome {
        TickOutcome::Evaluated { windows, .. } => {
            WINDOWS_EVALUATED_TOTAL
                .with_label_values(&[stream])
                .inc_by(*windows as f64);
        }
        TickOutcome::Skipped { .. } => {
            TICKS_SKIPPED_TOTAL.with_label_values(&[stream]).inc();
        }
        TickOutcome::Idle => {}
    }

    let active = baseline.phase() == BaselinePhase::Active;
    BASELINE_ACTIVE
        .with_label_values(&[stream])
        .set(if active { 1.0 } else { 0.0 });
    BASELINE_PROGRESS
        .with_label_values(&[stream])
        .set(baseline.progress());
    BASELINE_MEAN
        .with_label_values(&[stream])
        .set(baseline.history().mean());
    if let Ok(threshold) = baseline.threshold() {
        BASELINE_THRESHOLD
            .with_label_values(&[stream])
            .set(threshold.threshold);
    }
    if let Some(report) = monitor.last_report() {
        WINDOW_LOGS
            .with_label_values(&[stream])
            .set(report.total as f64);
    }
    PENDING_RECORDS
        .with_label_values(&[stream])
        .set(monitor.pending_len() as f64);
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logiq_detect::{DetectConfig, MemoryEventStore, MemorySink};

    #[test]
    fn test_encode_metrics() {
        record_line("auth", false);
        record_line("auth", true);
        set_templates_known(3);
        record_anomaly("auth", AnomalyKind::Pattern);

        let output = encode_metrics();
        assert!(output.contains("logiq_lines_parsed_total"));
        assert!(output.contains("logiq_templates_known 3"));
        assert!(output.contains("kind=\"PATTERN\""));
    }

    #[test]
    fn test_update_stream_metrics() {
        let mut monitor = StreamMonitor::new("metrics-test", DetectConfig::default()).unwrap();
        let outcome = monitor.tick(&MemoryEventStore::new(), &MemorySink::new(), 12_000);
        update_stream_metrics(&monitor, &outcome);

        let output = encode_metrics();
        assert!(output.contains("logiq_baseline_active{stream=\"metrics-test\"} 0"));
        assert!(output.contains("logiq_windows_evaluated_total{stream=\"metrics-test\"} 1"));
    }
}
