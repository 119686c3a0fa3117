//! Retry and backoff policy for failed fragment work.
//!
//! Implements bounded retries with exponential backoff for load, key and
//! append failures. A retry tracker follows one fragment at a time; it is
//! reset whenever the controller moves on to a different fragment.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::error::{LoadError, StreamError};
use crate::media::FragmentKey;

/// Retry strategy for failed operations
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    ExponentialBackoff {
        base_delay: Duration,
        max_delay: Duration,
    },
    /// Retry with fixed delay
    FixedDelay { delay: Duration },
    /// Do not retry
    NoRetry,
}

/// Categorizes errors for choosing a retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network failures and timeouts
    Network,
    /// Payload could not be parsed; retried once quickly in case of truncation
    Parse,
    /// Decryption key unavailable
    Key,
    /// Buffer full; retried after a flush
    BufferQuota,
    /// Errors that should not be retried
    Fatal,
}

impl RetryStrategy {
    /// Calculate delay for the given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::ExponentialBackoff {
                base_delay,
                max_delay,
            } => {
                let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
                base_delay.saturating_mul(factor).min(*max_delay)
            }
            Self::FixedDelay { delay } => *delay,
            Self::NoRetry => Duration::ZERO,
        }
    }
}

impl ErrorCategory {
    /// Determine error category from a stream error
    pub fn from_stream_error(error: &StreamError) -> Self {
        match error {
            StreamError::Load(LoadError::Parse { .. }) => Self::Parse,
            StreamError::Load(_) => Self::Network,
            StreamError::Key(_) => Self::Key,
            StreamError::BufferAppend(append) if append.is_recoverable() => Self::BufferQuota,
            _ => Self::Fatal,
        }
    }

    /// Get appropriate retry strategy for this error category
    pub fn retry_strategy(self, config: &RetryConfig) -> RetryStrategy {
        match self {
            Self::Network | Self::Key => RetryStrategy::ExponentialBackoff {
                base_delay: config.base_delay,
                max_delay: config.max_delay,
            },
            Self::Parse => RetryStrategy::FixedDelay {
                delay: config.base_delay,
            },
            Self::BufferQuota => RetryStrategy::FixedDelay {
                delay: config.base_delay.min(config.max_delay),
            },
            Self::Fatal => RetryStrategy::NoRetry,
        }
    }
}

/// What to do after a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Try the same fragment again after the delay
    Retry { attempt: u32, delay: Duration },
    /// Stop retrying this fragment
    GiveUp { attempts: u32 },
}

/// Tracks retry attempts for the fragment currently being worked on
#[derive(Debug, Clone)]
pub struct FragmentRetryTracker {
    pub fragment: FragmentKey,
    pub attempt_count: u32,
    pub first_failure: Instant,
    pub last_category: ErrorCategory,
}

impl FragmentRetryTracker {
    /// Create new retry tracker for a fragment
    pub fn new(fragment: FragmentKey, category: ErrorCategory) -> Self {
        Self {
            fragment,
            attempt_count: 0,
            first_failure: Instant::now(),
            last_category: category,
        }
    }

    /// Record a failure and decide whether another attempt is allowed.
    pub fn record_failure(&mut self, error: &StreamError, config: &RetryConfig) -> RetryDecision {
        self.attempt_count += 1;
        self.last_category = ErrorCategory::from_stream_error(error);

        let strategy = self.last_category.retry_strategy(config);
        if strategy == RetryStrategy::NoRetry || self.attempt_count > config.max_attempts {
            return RetryDecision::GiveUp {
                attempts: self.attempt_count,
            };
        }

        RetryDecision::Retry {
            attempt: self.attempt_count,
            delay: strategy.calculate_delay(self.attempt_count),
        }
    }

    /// Time spent retrying so far
    pub fn elapsed(&self) -> Duration {
        self.first_failure.elapsed()
    }
}
