// LogIQ - Online log template mining
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Bounded retry for I/O boundaries
//!
//! Every strategy has a finite number of attempts, so a caller can never
//! block forever on an unreachable event source or anomaly sink.

use std::time::Duration;

/// Errors that can say whether a retry may succeed
pub trait Retryable {
    /// True when the failure is expected to clear on its own
    /// (connection refused, timeout, lock contention).
    fn is_transient(&self) -> bool;
}

/// Retry strategy for operations
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetryStrategy {
    /// No retries
    #[default]
    None,
    /// Fixed number of retries with constant delay
    Fixed {
        /// Maximum number of retry attempts
        max_retries: u32,
        /// Delay between retries
        delay: Duration,
    },
}

impl RetryStrategy {
    /// Delay before retry `attempt` (0-indexed), or None once exhausted
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Fixed { max_retries, delay } if attempt < *max_retries => Some(*delay),
            _ => None,
        }
    }

    /// Get maximum number of retries
    pub fn max_retries(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Fixed { max_retries, .. } => *max_retries,
        }
    }

    /// Worst-case time spent sleeping before giving up
    pub fn total_budget(&self) -> Duration {
        (0..self.max_retries())
            .filter_map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }

    /// Create a fixed retry strategy
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self::Fixed { max_retries, delay }
    }
}

/// Execute an operation, retrying only transient failures
///
/// A permanent error is returned on first sight; a transient one is
/// retried until the strategy runs out.
///
/// # Example
///
/// ```
/// use logiq::recovery::{with_retry_transient, RetryStrategy, Retryable};
/// use std::time::Duration;
///
/// #[derive(Debug, PartialEq)]
/// struct Busy;
///
/// impl Retryable for Busy {
///     fn is_transient(&self) -> bool {
///         true
///     }
/// }
///
/// let strategy = RetryStrategy::fixed(3, Duration::from_millis(1));
/// let mut calls = 0;
/// let result = with_retry_transient(&strategy, || {
///     calls += 1;
///     if calls < 3 { Err(Busy) } else { Ok(calls) }
/// });
/// assert_eq!(result, Ok(3));
/// ```
pub fn with_retry_transient<T, E, F>(strategy: &RetryStrategy, mut operation: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => match strategy.delay_for_attempt(attempt) {
                Some(delay) => {
                    #[cfg(feature = "logging")]
                    log::debug!("transient failure, retry {} in {:?}", attempt + 1, delay);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                None => return Err(e),
            },
        }
    }
}
