//! # LogIQ - Online Log Template Mining
//!
//! Clusters a continuous stream of free-text log lines into recurring
//! message templates, without any offline training pass.
//!
//! ## Key Features
//!
//! - **Incremental**: every line is assigned a template as it arrives
//! - **Number masking**: lines differing only in numeric tokens share a template
//! - **Stable IDs**: a template's ID is a pure fingerprint of its text
//! - **Thread-safe**: one miner can be fed from many services at once
//!
//! ## Quick Start
//!
//! ```rust
//! use logiq::TemplateMiner;
//!
//! let miner = TemplateMiner::new();
//!
//! let a = miner.parse("[2024-05-01 12:00:00] [INFO] auth: User 42 logged in");
//! let b = miner.parse("[2024-05-01 12:00:01] [INFO] auth: User 9981 logged in");
//!
//! assert_eq!(a.template, "auth: User <*> logged in");
//! assert_eq!(a.template_id, b.template_id);
//! assert_eq!(b.parameters, vec!["9981"]);
//! ```
//!
//! ## Modules
//!
//! - [`miner`]: Prefix-tree template miner
//! - [`template`]: Template IDs, masking and message extraction
//! - [`recovery`]: Bounded retry strategies for I/O boundaries
//! - [`error`]: Error types

// Modules
pub mod error;
pub mod miner;
pub mod recovery;
pub mod template;

// Re-exports for convenient access
pub use error::{LogiqError, Result};
pub use miner::{MinerConfig, ParsedLine, TemplateMiner};
pub use recovery::{with_retry_transient, RetryStrategy, Retryable};
pub use template::{TemplateId, WILDCARD};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default maximum tree depth
pub const DEFAULT_MAX_DEPTH: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_depth_matches_config() {
        assert_eq!(MinerConfig::default().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_basic_parse() {
        let miner = TemplateMiner::new();
        let parsed = miner.parse("[t] [WARN] cache: Evicted 17 entries");
        assert_eq!(parsed.template, "cache: Evicted <*> entries");
        assert_eq!(parsed.template_id, Some(TemplateId::of("cache: Evicted <*> entries")));
    }
}
