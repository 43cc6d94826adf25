// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! AnomalyEngine - per-window evaluation against the baseline.

use crate::anomaly::AnomalyRecord;
use crate::baseline::{BaselineModel, BaselinePhase, LearnOutcome, Threshold};
use crate::config::{DetectConfig, DetectionMode};
use crate::error::{DetectError, Result};
use crate::seen::SeenTemplateSet;
use crate::snapshot::{EngineSnapshot, SNAPSHOT_VERSION};
use crate::window::{WindowKey, WindowSnapshot};

/// Result of evaluating one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub window: WindowKey,
    /// Phase after the window was applied.
    pub phase: BaselinePhase,
    /// Logs in the window.
    pub total: u64,
    /// Global threshold the window was compared against (active only).
    pub threshold: Option<Threshold>,
    pub records: Vec<AnomalyRecord>,
    /// Whether any history received this window's counts.
    pub baseline_updated: bool,
}

/// Baseline, seen set and classification for one stream.
pub struct AnomalyEngine {
    config: DetectConfig,
    baseline: BaselineModel,
    seen: SeenTemplateSet,
    windows_evaluated: u64,
    anomalies_emitted: u64,
}

impl AnomalyEngine {
    pub fn new(config: DetectConfig) -> Self {
        Self {
            baseline: BaselineModel::new(config.baseline.clone()),
            config,
            seen: SeenTemplateSet::new(),
            windows_evaluated: 0,
            anomalies_emitted: 0,
        }
    }

    /// Apply one closed window: learn from it or classify it.
    pub fn evaluate(&mut self, snapshot: &WindowSnapshot) -> Result<WindowReport> {
        self.windows_evaluated += 1;

        let report = match self.baseline.phase() {
            BaselinePhase::Learning => self.learn(snapshot),
            BaselinePhase::Active => self.classify(snapshot)?,
        };

        self.anomalies_emitted += report.records.len() as u64;
        Ok(report)
    }

    fn learn(&mut self, snapshot: &WindowSnapshot) -> WindowReport {
        let outcome = self.baseline.learn(snapshot);
        match outcome {
            LearnOutcome::Skipped => {
                log::debug!("window {}: no logs, waiting for traffic", snapshot.key);
            }
            LearnOutcome::Recorded { progress } => {
                log::debug!(
                    "window {}: learning {}/{} ({} logs)",
                    snapshot.key,
                    progress,
                    self.config.baseline.learning_window_count,
                    snapshot.total
                );
            }
            LearnOutcome::Activated => {}
        }

        if outcome != LearnOutcome::Skipped {
            for id in snapshot.distinct_templates() {
                self.seen.learn(id);
            }
        }

        WindowReport {
            window: snapshot.key,
            phase: self.baseline.phase(),
            total: snapshot.total,
            threshold: None,
            records: Vec::new(),
            baseline_updated: outcome != LearnOutcome::Skipped,
        }
    }

    fn classify(&mut self, snapshot: &WindowSnapshot) -> Result<WindowReport> {
        let timestamp_ms = snapshot.key.end_ms(self.config.window.window_size_secs);
        let threshold = self.baseline.threshold()?;
        let mut records = Vec::new();
        let mut baseline_updated = false;

        match self.config.anomaly.mode {
            DetectionMode::GlobalRate => {
                if threshold.exceeded_by(snapshot.total) {
                    records.push(AnomalyRecord::rate_spike(
                        snapshot.key,
                        timestamp_ms,
                        snapshot.total,
                        &threshold,
                    ));
                } else {
                    self.baseline.record(snapshot.total);
                    baseline_updated = true;
                }
            }
            DetectionMode::PerTemplate => {
                // Global history only feeds status reporting here
                self.baseline.record(snapshot.total);
                baseline_updated = true;

                for (id, entry) in &snapshot.templates {
                    match self.baseline.template_threshold(id)? {
                        Some(t) if t.exceeded_by(entry.count) => {
                            records.push(AnomalyRecord::template_spike(
                                snapshot.key,
                                timestamp_ms,
                                *id,
                                entry.template.clone(),
                                entry.count,
                                &t,
                            ));
                        }
                        _ => self.baseline.record_template(*id, entry.count),
                    }
                }
            }
        }

        if self.config.anomaly.pattern_detection {
            for (id, entry) in &snapshot.templates {
                if self.seen.observe(*id) {
                    records.push(AnomalyRecord::new_template(
                        snapshot.key,
                        timestamp_ms,
                        *id,
                        entry.template.clone(),
                        entry.count,
                        self.config.anomaly.description_max_len,
                    ));
                }
            }
        }

        log::debug!(
            "window {}: {} logs, threshold {:.2}, {} anomalies",
            snapshot.key,
            snapshot.total,
            threshold.threshold,
            records.len()
        );

        Ok(WindowReport {
            window: snapshot.key,
            phase: BaselinePhase::Active,
            total: snapshot.total,
            threshold: Some(threshold),
            records,
            baseline_updated,
        })
    }

    pub fn phase(&self) -> BaselinePhase {
        self.baseline.phase()
    }

    pub fn baseline(&self) -> &BaselineModel {
        &self.baseline
    }

    pub fn seen(&self) -> &SeenTemplateSet {
        &self.seen
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    pub fn windows_evaluated(&self) -> u64 {
        self.windows_evaluated
    }

    pub fn anomalies_emitted(&self) -> u64 {
        self.anomalies_emitted
    }

    /// Export baseline and seen set.
    pub fn export_state(&self) -> EngineSnapshot {
        EngineSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            phase: self.baseline.phase(),
            learned_windows: self.baseline.learned_windows(),
            history: self.baseline.history().values(),
            template_histories: self
                .baseline
                .template_histories()
                .iter()
                .map(|(id, h)| (*id, h.values()))
                .collect(),
            seen: self.seen.iter().copied().collect(),
        }
    }

    /// Replace baseline and seen set with exported state.
    pub fn import_state(&mut self, snapshot: &EngineSnapshot) -> Result<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DetectError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.phase == BaselinePhase::Active && snapshot.history.is_empty() {
            return Err(DetectError::Snapshot(
                "active snapshot without history".to_string(),
            ));
        }

        self.baseline = BaselineModel::restore(
            self.config.baseline.clone(),
            snapshot.phase,
            snapshot.learned_windows,
            &snapshot.history,
            &snapshot.template_histories,
        );
        self.seen = snapshot.seen.iter().copied().collect();
        log::info!(
            "engine state imported: phase={} history={} seen={}",
            snapshot.phase.as_str(),
            snapshot.history.len(),
            self.seen.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyKind;
    use crate::window::TemplateEvent;
    use approx::assert_relative_eq;
    use logiq::TemplateId;

    fn window(index: u64, counts: &[(&str, u64)]) -> WindowSnapshot {
        let key = WindowKey(index * 5);
        let mut snapshot = WindowSnapshot::empty(key);
        for (template, count) in counts {
            for _ in 0..*count {
                snapshot.add(&TemplateEvent::from_template(*template, key.start_ms()));
            }
        }
        snapshot
    }

    fn trained(config: DetectConfig) -> AnomalyEngine {
        let mut engine = AnomalyEngine::new(config);
        for i in 0..5 {
            engine.evaluate(&window(i, &[("Request <*> served", 10)])).unwrap();
        }
        assert_eq!(engine.phase(), BaselinePhase::Active);
        engine
    }

    #[test]
    fn test_learning_emits_nothing() {
        let mut engine = AnomalyEngine::new(DetectConfig::default());
        let report = engine.evaluate(&window(0, &[("a", 500)])).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.phase, BaselinePhase::Learning);
        assert!(report.baseline_updated);
        assert!(engine.seen().contains(&TemplateId::of("a")));
    }

    #[test]
    fn test_global_spike() {
        let mut engine = trained(DetectConfig::default());
        let report = engine.evaluate(&window(5, &[("Request <*> served", 45)])).unwrap();

        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.kind, AnomalyKind::Frequency);
        assert_relative_eq!(record.expected, 14.0);
        assert_relative_eq!(record.severity, 35.0);
        assert!(!report.baseline_updated);
        assert_eq!(engine.baseline().history().len(), 5);
    }

    #[test]
    fn test_normal_window_extends_history() {
        let mut engine = trained(DetectConfig::default());
        let report = engine.evaluate(&window(5, &[("Request <*> served", 12)])).unwrap();
        assert!(report.records.is_empty());
        assert!(report.baseline_updated);
        assert_eq!(engine.baseline().history().values(), vec![10, 10, 10, 10, 10, 12]);
    }

    #[test]
    fn test_pattern_disabled() {
        let mut config = DetectConfig::default();
        config.anomaly.pattern_detection = false;
        let mut engine = trained(config);
        let report = engine.evaluate(&window(5, &[("Disk <*> full", 1)])).unwrap();
        assert!(report.records.is_empty());
    }

    #[test]
    fn test_pattern_records_sorted_by_id() {
        let mut engine = trained(DetectConfig::default());
        let report = engine
            .evaluate(&window(5, &[("Disk <*> full", 1), ("Cache miss", 1), ("OOM killed", 1)]))
            .unwrap();
        let ids: Vec<_> = report.records.iter().filter_map(|r| r.template_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_per_template_spike() {
        let mut config = DetectConfig::default();
        config.anomaly.mode = DetectionMode::PerTemplate;
        let mut engine = trained(config);

        let report = engine.evaluate(&window(5, &[("Request <*> served", 40)])).unwrap();
        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.template_id, Some(TemplateId::of("Request <*> served")));
        assert_relative_eq!(record.severity, 30.0);
        // Flagged count stays out of the template history
        let history = engine
            .baseline()
            .template_history(&TemplateId::of("Request <*> served"))
            .unwrap();
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn test_export_import_state() {
        let engine = trained(DetectConfig::default());
        let state = engine.export_state();

        let mut fresh = AnomalyEngine::new(DetectConfig::default());
        fresh.import_state(&state).unwrap();
        assert_eq!(fresh.phase(), BaselinePhase::Active);
        assert_eq!(fresh.export_state(), state);

        // Known template is not new after import
        let report = fresh.evaluate(&window(9, &[("Request <*> served", 11)])).unwrap();
        assert!(report.records.is_empty());
    }

    #[test]
    fn test_counters() {
        let mut engine = trained(DetectConfig::default());
        engine.evaluate(&window(5, &[("Request <*> served", 45)])).unwrap();
        assert_eq!(engine.windows_evaluated(), 6);
        assert_eq!(engine.anomalies_emitted(), 1);
    }
}
