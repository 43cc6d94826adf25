// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Anomaly records handed to sinks.

use crate::baseline::Threshold;
use crate::window::WindowKey;
use logiq::TemplateId;
use serde::{Deserialize, Serialize};

/// Class of a detected deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyKind {
    /// Observed volume above the baseline threshold.
    Frequency,
    /// First occurrence of a template not seen before.
    Pattern,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::Frequency => "FREQUENCY",
            AnomalyKind::Pattern => "PATTERN",
        }
    }
}

/// One detected deviation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub kind: AnomalyKind,
    /// Detection time (ms since epoch).
    pub timestamp_ms: u64,
    /// Window the deviation was observed in.
    pub window: WindowKey,
    /// Affected template; `None` for a global rate spike.
    pub template_id: Option<TemplateId>,
    pub template: Option<String>,
    /// Observed count in the window.
    pub observed: u64,
    /// Threshold the count was compared against (0 for PATTERN).
    pub expected: f64,
    pub mean: f64,
    pub effective_std: f64,
    /// `(observed - mean) / effective_std`; 0 for PATTERN.
    pub severity: f64,
    pub description: String,
}

impl AnomalyRecord {
    /// Global window total above the threshold.
    pub fn rate_spike(
        window: WindowKey,
        timestamp_ms: u64,
        observed: u64,
        threshold: &Threshold,
    ) -> Self {
        Self {
            kind: AnomalyKind::Frequency,
            timestamp_ms,
            window,
            template_id: None,
            template: None,
            observed,
            expected: threshold.threshold,
            mean: threshold.mean,
            effective_std: threshold.effective_std,
            severity: threshold.severity(observed),
            description: format!(
                "[FREQUENCY] Spike: {} logs/window (Threshold: {:.0})",
                observed, threshold.threshold
            ),
        }
    }

    /// One template's window count above its own threshold.
    pub fn template_spike(
        window: WindowKey,
        timestamp_ms: u64,
        template_id: TemplateId,
        template: impl Into<String>,
        observed: u64,
        threshold: &Threshold,
    ) -> Self {
        Self {
            kind: AnomalyKind::Frequency,
            timestamp_ms,
            window,
            template_id: Some(template_id),
            template: Some(template.into()),
            observed,
            expected: threshold.threshold,
            mean: threshold.mean,
            effective_std: threshold.effective_std,
            severity: threshold.severity(observed),
            description: format!(
                "[FREQUENCY] Template {} spike: {} logs/window (Mean: {:.2}, StdDev: {:.2}, Threshold: {:.2})",
                template_id, observed, threshold.mean, threshold.std, threshold.threshold
            ),
        }
    }

    /// First sighting of a template after learning.
    pub fn new_template(
        window: WindowKey,
        timestamp_ms: u64,
        template_id: TemplateId,
        template: impl Into<String>,
        observed: u64,
        max_description_len: usize,
    ) -> Self {
        let template = template.into();
        let description = format!(
            "[PATTERN] New template: {}",
            truncate(&template, max_description_len)
        );
        Self {
            kind: AnomalyKind::Pattern,
            timestamp_ms,
            window,
            template_id: Some(template_id),
            template: Some(template),
            observed,
            expected: 0.0,
            mean: 0.0,
            effective_std: 0.0,
            severity: 0.0,
            description,
        }
    }

    pub fn is_frequency(&self) -> bool {
        self.kind == AnomalyKind::Frequency
    }

    pub fn is_pattern(&self) -> bool {
        self.kind == AnomalyKind::Pattern
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Cut `text` to `max_len` characters, ending in `...` when shortened.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_len.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
