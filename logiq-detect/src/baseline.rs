// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Baseline learning and thresholds.

use crate::config::BaselineConfig;
use crate::error::{DetectError, Result};
use crate::window::WindowSnapshot;
use logiq::TemplateId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Bounded history of per-window counts; the oldest value is evicted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingHistory {
    capacity: usize,
    values: VecDeque<u64>,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: u64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<u64>() as f64 / self.values.len() as f64
    }

    /// Sample standard deviation (n - 1 denominator); 0 below two values.
    pub fn sample_std(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self
            .values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum();
        (sum_sq / (n - 1) as f64).sqrt()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values from oldest to newest.
    pub fn values(&self) -> Vec<u64> {
        self.values.iter().copied().collect()
    }
}

/// Threshold derived from a history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub mean: f64,
    pub std: f64,
    pub effective_std: f64,
    pub threshold: f64,
}

impl Threshold {
    /// `mean + k * max(std, floor_abs, mean * floor_ratio)`.
    pub fn from_history(history: &RollingHistory, config: &BaselineConfig) -> Self {
        let mean = history.mean();
        let std = history.sample_std();
        let effective_std = std
            .max(config.min_std_floor_abs)
            .max(mean * config.min_std_floor_ratio);
        Self {
            mean,
            std,
            effective_std,
            threshold: mean + config.sigma_multiplier * effective_std,
        }
    }

    /// Strictly above the threshold.
    pub fn exceeded_by(&self, observed: u64) -> bool {
        observed as f64 > self.threshold
    }

    /// Distance from the mean in effective deviations.
    pub fn severity(&self, observed: u64) -> f64 {
        let delta = observed as f64 - self.mean;
        if self.effective_std > 0.0 {
            delta / self.effective_std
        } else {
            // Both floors configured to zero on a flat history
            delta
        }
    }
}

/// Baseline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselinePhase {
    Learning,
    Active,
}

impl BaselinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselinePhase::Learning => "LEARNING",
            BaselinePhase::Active => "ACTIVE",
        }
    }
}

/// What [`BaselineModel::learn`] did with a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    /// Quiet window, or the baseline is already active.
    Skipped,
    /// Window recorded; `progress` non-empty windows learned so far.
    Recorded { progress: u32 },
    /// Window recorded and the learning budget is now full.
    Activated,
}

/// Rolling traffic baseline for one stream.
#[derive(Debug, Clone)]
pub struct BaselineModel {
    config: BaselineConfig,
    phase: BaselinePhase,
    learned_windows: u32,
    history: RollingHistory,
    template_histories: BTreeMap<TemplateId, RollingHistory>,
}

impl BaselineModel {
    pub fn new(config: BaselineConfig) -> Self {
        Self {
            history: RollingHistory::new(config.history_capacity),
            config,
            phase: BaselinePhase::Learning,
            learned_windows: 0,
            template_histories: BTreeMap::new(),
        }
    }

    /// Rebuild a model from exported state.
    pub fn restore(
        config: BaselineConfig,
        phase: BaselinePhase,
        learned_windows: u32,
        history: &[u64],
        template_histories: &BTreeMap<TemplateId, Vec<u64>>,
    ) -> Self {
        let mut model = Self::new(config);
        model.phase = phase;
        model.learned_windows = learned_windows;
        for &value in history {
            model.history.push(value);
        }
        for (id, values) in template_histories {
            for &value in values {
                model.record_template(*id, value);
            }
        }
        model
    }

    /// Feed a window while learning.
    pub fn learn(&mut self, snapshot: &WindowSnapshot) -> LearnOutcome {
        if self.phase == BaselinePhase::Active || snapshot.is_empty() {
            return LearnOutcome::Skipped;
        }

        self.history.push(snapshot.total);
        for (id, count) in &snapshot.templates {
            self.record_template(*id, count.count);
        }
        self.learned_windows += 1;

        if self.learned_windows >= self.config.learning_window_count {
            self.phase = BaselinePhase::Active;
            log::info!(
                "baseline established after {} windows: mean={:.2} std={:.2} templates={}",
                self.learned_windows,
                self.history.mean(),
                self.history.sample_std(),
                self.template_histories.len()
            );
            LearnOutcome::Activated
        } else {
            LearnOutcome::Recorded {
                progress: self.learned_windows,
            }
        }
    }

    /// Global threshold; only meaningful once active.
    pub fn threshold(&self) -> Result<Threshold> {
        self.ensure_active()?;
        Ok(Threshold::from_history(&self.history, &self.config))
    }

    /// Threshold for one template, or `None` when it has no history or
    /// its mean is under the noise floor.
    pub fn template_threshold(&self, id: &TemplateId) -> Result<Option<Threshold>> {
        self.ensure_active()?;
        let threshold = self
            .template_histories
            .get(id)
            .filter(|h| !h.is_empty() && h.mean() >= self.config.noise_threshold_mean)
            .map(|h| Threshold::from_history(h, &self.config));
        Ok(threshold)
    }

    /// Append a non-anomalous window total.
    pub fn record(&mut self, count: u64) {
        self.history.push(count);
    }

    /// Append a non-anomalous per-template count.
    pub fn record_template(&mut self, id: TemplateId, count: u64) {
        let capacity = self.config.history_capacity;
        self.template_histories
            .entry(id)
            .or_insert_with(|| RollingHistory::new(capacity))
            .push(count);
    }

    fn ensure_active(&self) -> Result<()> {
        match self.phase {
            BaselinePhase::Active => Ok(()),
            BaselinePhase::Learning => Err(DetectError::BaselineNotReady),
        }
    }

    pub fn phase(&self) -> BaselinePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == BaselinePhase::Active
    }

    /// Fraction of the learning budget filled, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let required = self.config.learning_window_count.max(1);
        (self.learned_windows.min(required) as f64) / required as f64
    }

    pub fn learned_windows(&self) -> u32 {
        self.learned_windows
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    pub fn template_history(&self, id: &TemplateId) -> Option<&RollingHistory> {
        self.template_histories.get(id)
    }

    pub fn template_histories(&self) -> &BTreeMap<TemplateId, RollingHistory> {
        &self.template_histories
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }
}
