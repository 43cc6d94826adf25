// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Detection configuration.

use crate::error::{DetectError, Result};
use logiq::{MinerConfig, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Master configuration for one monitored stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Windowing settings.
    pub window: WindowConfig,

    /// Poll loop and I/O retry settings.
    pub poll: PollConfig,

    /// Baseline learning and threshold settings.
    pub baseline: BaselineConfig,

    /// Anomaly classification settings.
    pub anomaly: AnomalyConfig,

    /// Template miner settings.
    pub miner: MinerSettings,
}

/// Windowing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Width of one window in seconds.
    pub window_size_secs: u64,

    /// How far back the aggregator looks for late or missed windows.
    pub lookback_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size_secs: 5,
            lookback_secs: 120,
        }
    }
}

/// Poll loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Interval between two ticks of the monitor loop.
    pub poll_interval_secs: u64,

    /// Retry policy for the event source and anomaly sink.
    pub retry: RetryConfig,

    /// Undelivered anomaly records kept for redelivery on later ticks.
    pub max_pending_records: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            retry: RetryConfig::default(),
            max_pending_records: 1024,
        }
    }
}

/// Fixed-delay retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 200,
        }
    }
}

/// Baseline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Non-empty windows required before the baseline becomes active.
    pub learning_window_count: u32,

    /// Capacity of the rolling history (oldest value evicted first).
    pub history_capacity: usize,

    /// Sigma multiplier `k` in `threshold = mean + k * effective_std`.
    pub sigma_multiplier: f64,

    /// Absolute lower bound for the effective standard deviation.
    pub min_std_floor_abs: f64,

    /// Lower bound for the effective standard deviation relative to the mean.
    pub min_std_floor_ratio: f64,

    /// Per-template mode: templates with a lower historical mean are never
    /// checked for frequency anomalies.
    pub noise_threshold_mean: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            learning_window_count: 5,
            history_capacity: 10,
            sigma_multiplier: 4.0,
            min_std_floor_abs: 1.0,
            min_std_floor_ratio: 0.05,
            noise_threshold_mean: 10.0,
        }
    }
}

/// Which counts the frequency check compares against the baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Total events per window against one global history.
    #[default]
    GlobalRate,
    /// Events per template per window against per-template histories.
    PerTemplate,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::GlobalRate => "global_rate",
            DetectionMode::PerTemplate => "per_template",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "global_rate" | "global" => Ok(DetectionMode::GlobalRate),
            "per_template" | "template" => Ok(DetectionMode::PerTemplate),
            other => Err(DetectError::InvalidConfig(format!(
                "unknown detection mode: {}",
                other
            ))),
        }
    }
}

/// Anomaly classification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Frequency check granularity.
    pub mode: DetectionMode,

    /// Report first occurrences of templates unseen during learning.
    pub pattern_detection: bool,

    /// Template text longer than this is truncated in descriptions.
    pub description_max_len: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::GlobalRate,
            pattern_detection: true,
            description_max_len: 180,
        }
    }
}

/// Template miner settings shared by every stream of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerSettings {
    pub max_tree_depth: usize,
}

impl Default for MinerSettings {
    fn default() -> Self {
        Self {
            max_tree_depth: logiq::DEFAULT_MAX_DEPTH,
        }
    }
}

impl DetectConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DetectError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values the detector cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(DetectError::InvalidConfig(msg.to_string()));

        if self.window.window_size_secs == 0 {
            return invalid("window_size_secs must be positive");
        }
        if self.window.lookback_secs < self.window.window_size_secs {
            return invalid("lookback_secs must cover at least one window");
        }
        if self.poll.poll_interval_secs == 0 {
            return invalid("poll_interval_secs must be positive");
        }
        if self.baseline.learning_window_count == 0 {
            return invalid("learning_window_count must be positive");
        }
        if self.baseline.history_capacity < self.baseline.learning_window_count as usize {
            return invalid("history_capacity must hold every learning window");
        }
        if !self.baseline.sigma_multiplier.is_finite() || self.baseline.sigma_multiplier <= 0.0 {
            return invalid("sigma_multiplier must be a positive number");
        }
        if !(self.baseline.min_std_floor_abs >= 0.0 && self.baseline.min_std_floor_ratio >= 0.0) {
            return invalid("std floors must be non-negative");
        }
        if !(self.baseline.noise_threshold_mean >= 0.0) {
            return invalid("noise_threshold_mean must be non-negative");
        }
        self.miner_config()
            .validate()
            .map_err(|e| DetectError::InvalidConfig(e.to_string()))
    }

    /// Miner configuration derived from these settings.
    pub fn miner_config(&self) -> MinerConfig {
        MinerConfig {
            max_depth: self.miner.max_tree_depth,
        }
    }

    /// Retry strategy for the event source and anomaly sink.
    pub fn retry_strategy(&self) -> RetryStrategy {
        RetryStrategy::fixed(
            self.poll.retry.max_retries,
            Duration::from_millis(self.poll.retry.delay_ms),
        )
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.poll_interval_secs)
    }
}
