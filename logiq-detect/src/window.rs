// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Fixed-size time windows over template events.

use crate::config::DetectConfig;
use logiq::TemplateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Start of a window in epoch seconds, floored to the window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey(pub u64);

impl WindowKey {
    /// `floor(epoch_secs / size) * size`.
    pub fn for_timestamp_ms(timestamp_ms: u64, window_size_secs: u64) -> Self {
        let size = window_size_secs.max(1);
        let secs = timestamp_ms / 1000;
        Self(secs / size * size)
    }

    /// The window immediately after this one.
    pub fn next(self, window_size_secs: u64) -> Self {
        Self(self.0 + window_size_secs.max(1))
    }

    /// Epoch seconds of the window start.
    pub fn as_secs(self) -> u64 {
        self.0
    }

    /// First millisecond inside the window.
    pub fn start_ms(self) -> u64 {
        self.0 * 1000
    }

    /// First millisecond after the window.
    pub fn end_ms(self, window_size_secs: u64) -> u64 {
        self.next(window_size_secs).start_ms()
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One mined line, as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEvent {
    pub template_id: TemplateId,
    pub template: String,
    pub timestamp_ms: u64,
}

impl TemplateEvent {
    pub fn new(template_id: TemplateId, template: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            template_id,
            template: template.into(),
            timestamp_ms,
        }
    }

    /// Build an event straight from a template string.
    pub fn from_template(template: impl Into<String>, timestamp_ms: u64) -> Self {
        let template = template.into();
        Self {
            template_id: TemplateId::of(&template),
            template,
            timestamp_ms,
        }
    }
}

/// Occurrences of one template within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCount {
    pub template: String,
    pub count: u64,
}

/// Counts for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub key: WindowKey,
    pub total: u64,
    /// Per-template counts, ordered by template ID.
    pub templates: BTreeMap<TemplateId, TemplateCount>,
}

impl WindowSnapshot {
    /// A quiet window.
    pub fn empty(key: WindowKey) -> Self {
        Self {
            key,
            total: 0,
            templates: BTreeMap::new(),
        }
    }

    /// Count one event into this window.
    pub fn add(&mut self, event: &TemplateEvent) {
        self.total += 1;
        self.templates
            .entry(event.template_id)
            .or_insert_with(|| TemplateCount {
                template: event.template.clone(),
                count: 0,
            })
            .count += 1;
    }

    /// Distinct template IDs, ascending.
    pub fn distinct_templates(&self) -> impl Iterator<Item = TemplateId> + '_ {
        self.templates.keys().copied()
    }

    pub fn count_for(&self, id: &TemplateId) -> u64 {
        self.templates.get(id).map_or(0, |c| c.count)
    }

    pub fn template_text(&self, id: &TemplateId) -> Option<&str> {
        self.templates.get(id).map(|c| c.template.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Buckets template events into fixed windows.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    window_size_secs: u64,
    lookback_secs: u64,
}

impl WindowAggregator {
    pub fn new(window_size_secs: u64, lookback_secs: u64) -> Self {
        let window_size_secs = window_size_secs.max(1);
        Self {
            window_size_secs,
            lookback_secs: lookback_secs.max(window_size_secs),
        }
    }

    pub fn from_config(config: &DetectConfig) -> Self {
        Self::new(config.window.window_size_secs, config.window.lookback_secs)
    }

    pub fn window_size_secs(&self) -> u64 {
        self.window_size_secs
    }

    pub fn lookback_secs(&self) -> u64 {
        self.lookback_secs
    }

    /// Window containing a timestamp.
    pub fn key_for(&self, timestamp_ms: u64) -> WindowKey {
        WindowKey::for_timestamp_ms(timestamp_ms, self.window_size_secs)
    }

    /// Counts grouped by `(template, window)`.
    pub fn bucket_counts<'a, I>(&self, events: I) -> BTreeMap<(TemplateId, WindowKey), u64>
    where
        I: IntoIterator<Item = &'a TemplateEvent>,
    {
        let mut buckets = BTreeMap::new();
        for event in events {
            let key = self.key_for(event.timestamp_ms);
            *buckets.entry((event.template_id, key)).or_insert(0) += 1;
        }
        buckets
    }

    /// One snapshot per window that has events, ascending by key.
    pub fn aggregate<'a, I>(&self, events: I) -> Vec<WindowSnapshot>
    where
        I: IntoIterator<Item = &'a TemplateEvent>,
    {
        let mut windows: BTreeMap<WindowKey, WindowSnapshot> = BTreeMap::new();
        for event in events {
            let key = self.key_for(event.timestamp_ms);
            windows
                .entry(key)
                .or_insert_with(|| WindowSnapshot::empty(key))
                .add(event);
        }
        windows.into_values().collect()
    }

    /// Every window in `[from, to_exclusive)`, quiet windows included.
    ///
    /// Events outside the range are ignored.
    pub fn windows_between<'a, I>(
        &self,
        from: WindowKey,
        to_exclusive: WindowKey,
        events: I,
    ) -> Vec<WindowSnapshot>
    where
        I: IntoIterator<Item = &'a TemplateEvent>,
    {
        let mut windows = Vec::new();
        let mut key = from;
        while key < to_exclusive {
            windows.push(WindowSnapshot::empty(key));
            key = key.next(self.window_size_secs);
        }

        for event in events {
            let key = self.key_for(event.timestamp_ms);
            if key < from || key >= to_exclusive {
                continue;
            }
            let index = ((key.0 - from.0) / self.window_size_secs) as usize;
            if let Some(window) = windows.get_mut(index) {
                window.add(event);
            }
        }
        windows
    }

    /// Latest window that has fully elapsed at `now_ms`.
    pub fn closed_window(&self, now_ms: u64) -> Option<WindowKey> {
        let current = self.key_for(now_ms);
        current.0.checked_sub(self.window_size_secs).map(WindowKey)
    }

    /// Oldest window still inside the lookback at `now_ms`.
    pub fn lookback_start(&self, now_ms: u64) -> WindowKey {
        self.key_for(now_ms.saturating_sub(self.lookback_secs * 1000))
    }
}
