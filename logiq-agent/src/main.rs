// LogIQ Agent - Log tailing agent with anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! # LogIQ Agent
//!
//! Tails log files, mines their lines into templates with one shared miner
//! and runs an anomaly monitor per file. Anomalies go to the log and,
//! optionally, to a CSV file; metrics and status are served over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Monitor two services, following appended lines
//! logiq-agent --file logs/auth.log --file logs/payment.log --follow
//!
//! # Replay a file at 200 lines/sec with per-template detection
//! logiq-agent --file app.log --rate 200 --mode per_template --anomalies-csv anomalies.csv
//! ```

mod error;
mod ingest;
mod metrics;
mod sink;
mod stream;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use error::AgentError;
use ingest::{IngestConfig, Ingestor};
use logiq::{TemplateId, TemplateMiner};
use logiq_detect::{AnomalySink, DetectConfig, DetectionMode, MemoryEventStore, StreamMonitor};
use metrics::{encode_metrics, set_templates_known};
use serde::Serialize;
use sink::{CsvSink, FanoutSink, LogSink};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use stream::{MonitorTask, StreamHandle, StreamStatus};
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// LogIQ log anomaly agent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file to monitor (repeatable, one stream per file)
    #[arg(short, long = "file", required = true)]
    files: Vec<PathBuf>,

    /// JSON detection config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// Lines per second per file (0 = as fast as possible)
    #[arg(short, long, default_value = "0")]
    rate: f64,

    /// Keep reading lines appended after EOF
    #[arg(long)]
    follow: bool,

    /// Append anomalies to this CSV file
    #[arg(long)]
    anomalies_csv: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Window size in seconds
    #[arg(long)]
    window_size: Option<u64>,

    /// Poll interval in seconds
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Sigma multiplier for the frequency threshold
    #[arg(long)]
    sigma: Option<f64>,

    /// Non-empty windows to learn before detecting
    #[arg(long)]
    learning_windows: Option<u32>,

    /// Detection mode (global_rate or per_template)
    #[arg(long)]
    mode: Option<DetectionMode>,
}

impl Args {
    /// Load the config file (or defaults) and apply command-line overrides.
    fn detect_config(&self) -> Result<DetectConfig, AgentError> {
        let mut config = match &self.config {
            Some(path) => DetectConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => DetectConfig::default(),
        };

        if let Some(size) = self.window_size {
            config.window.window_size_secs = size;
        }
        if let Some(poll) = self.poll_interval {
            config.poll.poll_interval_secs = poll;
        }
        if let Some(sigma) = self.sigma {
            config.baseline.sigma_multiplier = sigma;
        }
        if let Some(count) = self.learning_windows {
            config.baseline.learning_window_count = count;
        }
        if let Some(mode) = self.mode {
            config.anomaly.mode = mode;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Stream names from file stems, suffixed when two files share a stem.
fn stream_names(files: &[PathBuf]) -> Vec<String> {
    let mut used = HashSet::new();
    files
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "stream".to_string());
            let mut name = stem.clone();
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{}-{}", stem, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// Application state shared across handlers.
struct AppState {
    miner: Arc<TemplateMiner>,
    streams: Vec<StreamHandle>,
    start_time: Instant,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("LogIQ Agent v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AgentError> {
    let config = args.detect_config()?;
    info!(
        "Detection: mode={}, window={}s, poll={}s, learning={} windows, sigma={}",
        config.anomaly.mode,
        config.window.window_size_secs,
        config.poll.poll_interval_secs,
        config.baseline.learning_window_count,
        config.baseline.sigma_multiplier
    );

    let miner = Arc::new(TemplateMiner::with_config(config.miner_config())?);
    let csv = match &args.anomalies_csv {
        Some(path) => {
            info!("Writing anomalies to {}", path.display());
            Some(CsvSink::open(path)?)
        }
        None => None,
    };

    let mut streams = Vec::new();
    for (path, name) in args.files.iter().zip(stream_names(&args.files)) {
        let store = Arc::new(MemoryEventStore::new());

        let ingestor = Ingestor::new(
            name.clone(),
            IngestConfig {
                path: path.clone(),
                rate: args.rate,
                follow: args.follow,
            },
            Arc::clone(&miner),
            Arc::clone(&store),
        );
        let ingest = ingestor.state();
        let ingest_name = name.clone();
        tokio::spawn(async move {
            if let Err(e) = ingestor.run().await {
                error!("[{}] ingest stopped: {}", ingest_name, e);
            }
        });

        let mut sink = FanoutSink::new().with(LogSink::new(name.clone()));
        if let Some(csv) = &csv {
            sink = sink.with(csv.for_stream(name.clone()));
        }
        let sink: Arc<dyn AnomalySink + Send + Sync> = Arc::new(sink);

        let monitor = StreamMonitor::new(name.clone(), config.clone())?;
        let task = MonitorTask::new(monitor, store, sink);
        let status = task.status();
        tokio::spawn(task.run());

        info!("Stream {} <- {}", name, path.display());
        streams.push(StreamHandle {
            name,
            path: path.clone(),
            ingest,
            status,
        });
    }

    let state = Arc::new(AppState {
        miner,
        streams,
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/templates", get(templates_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>LogIQ Agent</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>LogIQ Agent</h1>
    <p>Online log template mining and anomaly detection.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Ready once every baseline is active</div>
        <div class="endpoint"><a href="/status">/status</a> - Per-stream status (JSON)</div>
        <div class="endpoint"><a href="/templates">/templates</a> - Mined templates (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>logiq_lines_parsed_total</code> - Lines assigned a template</li>
        <li><code>logiq_templates_known</code> - Distinct templates</li>
        <li><code>logiq_baseline_active</code> - Baseline state (1=active)</li>
        <li><code>logiq_baseline_threshold_logs</code> - Frequency threshold</li>
        <li><code>logiq_window_logs</code> - Logs in the last window</li>
        <li><code>logiq_anomalies_total</code> - Anomalies by stream and kind</li>
        <li><code>logiq_sink_failures_total</code> - Failed anomaly writes</li>
    </ul>
</body>
</html>"#,
    )
}

/// Refresh scrape-time gauges and encode every metric.
fn scrape_metrics(miner: &TemplateMiner) -> String {
    set_templates_known(miner.template_count());
    encode_metrics()
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let miner = Arc::clone(&state.miner);
    // Counting templates walks the whole tree
    let metrics = tokio::task::block_in_place(|| scrape_metrics(&miner));
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    for stream in &state.streams {
        if !stream.status.read().await.is_active() {
            return (StatusCode::SERVICE_UNAVAILABLE, "Learning");
        }
    }
    (StatusCode::OK, "Ready")
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    templates: usize,
    streams: Vec<StreamResponse>,
}

/// One stream in the status response.
#[derive(Serialize)]
struct StreamResponse {
    name: String,
    path: String,
    lines_read: u64,
    lines_parsed: u64,
    ingesting: bool,
    finished: bool,
    #[serde(flatten)]
    detection: StreamStatus,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let mut streams = Vec::with_capacity(state.streams.len());
    for stream in &state.streams {
        streams.push(StreamResponse {
            name: stream.name.clone(),
            path: stream.path.display().to_string(),
            lines_read: stream.ingest.lines_read.load(Ordering::SeqCst),
            lines_parsed: stream.ingest.lines_parsed.load(Ordering::SeqCst),
            ingesting: stream.ingest.running.load(Ordering::SeqCst),
            finished: stream.ingest.finished.load(Ordering::SeqCst),
            detection: stream.status.read().await.clone(),
        });
    }

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        templates: state.miner.template_count(),
        streams,
    })
}

/// One mined template.
#[derive(Debug, Serialize)]
struct TemplateEntry {
    id: TemplateId,
    template: String,
    count: u64,
}

/// Miner stats, most frequent first.
fn template_entries(miner: &TemplateMiner) -> Vec<TemplateEntry> {
    let mut entries: Vec<TemplateEntry> = miner
        .stats()
        .into_iter()
        .map(|(template, count)| TemplateEntry {
            id: TemplateId::of(&template),
            template,
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.template.cmp(&b.template)));
    entries
}

/// Templates handler - returns the miner's templates as JSON.
async fn templates_handler(State(state): State<Arc<AppState>>) -> Json<Vec<TemplateEntry>> {
    let miner = Arc::clone(&state.miner);
    // Full tree traversal
    let entries = tokio::task::block_in_place(|| template_entries(&miner));
    Json(entries)
}
