// LogIQ - Online log template mining
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Incremental template mining over a bounded-depth prefix tree
//!
//! Each masked token selects one level of the tree. A line follows exact
//! token children first, then a wildcard child; the first level with
//! neither grows a new node that becomes the line's template. Nodes are
//! never merged or removed, so a template assignment is never revised.

use crate::error::{LogiqError, Result};
use crate::template::{extract_message, extract_parameters, mask_tokens, TemplateId, WILDCARD};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Configuration for the template miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerConfig {
    /// Maximum number of tree levels a line descends.
    ///
    /// Tokens beyond this depth never influence clustering.
    pub max_depth: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::DEFAULT_MAX_DEPTH,
        }
    }
}

impl MinerConfig {
    /// Check the configuration for unusable values
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(LogiqError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A node of the prefix tree
#[derive(Debug, Default)]
struct TemplateNode {
    children: HashMap<String, TemplateNode>,
    /// Set once by the first line that terminates here.
    template: Option<String>,
    count: u64,
}

impl TemplateNode {
    fn collect_stats(&self, stats: &mut HashMap<String, u64>) {
        if let Some(template) = &self.template {
            // Several nodes can hold the same template text
            *stats.entry(template.clone()).or_insert(0) += self.count;
        }
        for child in self.children.values() {
            child.collect_stats(stats);
        }
    }

    fn node_count(&self) -> usize {
        1 + self.children.values().map(|c| c.node_count()).sum::<usize>()
    }
}

/// Result of parsing one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Fingerprint of `template`; `None` for blank input.
    pub template_id: Option<TemplateId>,
    /// Template text, tokens joined by single spaces.
    pub template: String,
    /// Concrete values found at wildcard positions, in order.
    pub parameters: Vec<String>,
}

impl ParsedLine {
    /// Sentinel returned for lines without any tokens.
    pub fn empty() -> Self {
        Self {
            template_id: None,
            template: String::new(),
            parameters: Vec::new(),
        }
    }

    /// Whether this is the blank-input sentinel.
    pub fn is_empty(&self) -> bool {
        self.template_id.is_none()
    }
}

/// Online template miner, shareable across threads.
///
/// Tree mutation is serialized behind a single write lock; [`stats`](Self::stats)
/// takes the read side so diagnostics only block parsing for the traversal.
#[derive(Debug)]
pub struct TemplateMiner {
    root: RwLock<TemplateNode>,
    config: MinerConfig,
}

impl TemplateMiner {
    /// Create a miner with the default depth.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(TemplateNode::default()),
            config: MinerConfig::default(),
        }
    }

    /// Create a miner with a custom configuration.
    pub fn with_config(config: MinerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: RwLock::new(TemplateNode::default()),
            config,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Parse a raw line into its template, template ID and parameters.
    ///
    /// Malformed input never fails: a line without the expected prefix is
    /// mined whole, and a line without tokens yields [`ParsedLine::empty`].
    pub fn parse(&self, line: &str) -> ParsedLine {
        let message = extract_message(line);
        let tokens: Vec<&str> = message.split_whitespace().collect();
        if tokens.is_empty() {
            return ParsedLine::empty();
        }

        let masked = mask_tokens(&tokens);
        let template = {
            // The tree is append-only, so a writer that panicked cannot
            // have left it inconsistent.
            let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
            Self::descend(&mut root, &masked, self.config.max_depth)
        };

        let template_tokens: Vec<&str> = template.split(' ').collect();
        let parameters = extract_parameters(&tokens, &template_tokens);

        ParsedLine {
            template_id: Some(TemplateId::of(&template)),
            template,
            parameters,
        }
    }

    /// Walk (and grow) the tree for a masked token sequence, returning the
    /// template of the node the line lands on.
    fn descend(root: &mut TemplateNode, masked: &[&str], max_depth: usize) -> String {
        let mut node = root;

        for &token in masked.iter().take(max_depth) {
            let key = if node.children.contains_key(token) {
                token
            } else if node.children.contains_key(WILDCARD) {
                WILDCARD
            } else {
                let template = masked.join(" ");
                #[cfg(feature = "logging")]
                log::debug!("new template: {}", template);
                node.children.insert(
                    token.to_string(),
                    TemplateNode {
                        children: HashMap::new(),
                        template: Some(template.clone()),
                        count: 1,
                    },
                );
                return template;
            };

            node = node.children.entry(key.to_string()).or_default();
        }

        node.count += 1;
        node.template
            .get_or_insert_with(|| masked.join(" "))
            .clone()
    }

    /// Occurrence count per template string.
    ///
    /// Full traversal under the read lock; meant for diagnostics.
    pub fn stats(&self) -> HashMap<String, u64> {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = HashMap::new();
        root.collect_stats(&mut stats);
        stats
    }

    /// Number of distinct templates discovered so far.
    pub fn template_count(&self) -> usize {
        self.stats().len()
    }

    /// Number of tree nodes, root included.
    pub fn node_count(&self) -> usize {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        root.node_count()
    }
}

impl Default for TemplateMiner {
    fn default() -> Self {
        Self::new()
    }
}
