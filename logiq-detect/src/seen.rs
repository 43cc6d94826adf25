// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Templates considered normal for the current run.

use logiq::TemplateId;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenTemplateSet {
    ids: BTreeSet<TemplateId>,
}

impl SeenTemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unconditionally (learning phase).
    pub fn learn(&mut self, id: TemplateId) {
        self.ids.insert(id);
    }

    /// Insert and report whether this is the first sighting.
    pub fn observe(&mut self, id: TemplateId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &TemplateId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateId> {
        self.ids.iter()
    }
}

impl FromIterator<TemplateId> for SeenTemplateSet {
    fn from_iter<I: IntoIterator<Item = TemplateId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
