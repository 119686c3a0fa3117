//! Centralized configuration for Cuetide.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

use crate::CuetideError;
use crate::media::BufferType;

/// Central configuration for all Cuetide components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct CuetideConfig {
    pub stream: StreamConfig,
    pub retry: RetryConfig,
    pub simulation: SimulationConfig,
}

/// Fragment scheduling configuration.
///
/// Controls how often the controller ticks, how far ahead of the playback
/// position it buffers, and how long a fragment load may take.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Interval of the recurring scheduling tick
    pub tick_interval: Duration,
    /// Seconds of content to buffer ahead of the playback position
    pub max_buffer_length: f64,
    /// Slack when matching a position to a fragment boundary, in seconds
    pub fragment_lookup_tolerance: f64,
    /// Upper bound for a single fragment load
    pub fragment_load_timeout: Duration,
    /// Buffer channel fragments are appended to
    pub buffer_type: BufferType,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            max_buffer_length: 30.0,
            fragment_lookup_tolerance: 0.25,
            fragment_load_timeout: Duration::from_secs(20),
            buffer_type: BufferType::Subtitle,
        }
    }
}

/// Retry policy for failed loads and appends.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first failure before giving up on a fragment
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub base_delay: Duration,
    /// Cap for the backoff delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(64),
        }
    }
}

/// Simulation mode configuration for testing and development.
///
/// Configures the simulated collaborators used by the simulator crate and
/// the CLI.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Deterministic seed for reproducible simulations
    pub deterministic_seed: Option<u64>,
    /// Simulated fragment fetch latency in milliseconds
    pub network_latency_ms: u64,
    /// Probability that a fragment load fails (0.0 to 1.0)
    pub load_failure_rate: f64,
    /// Probability that a key load fails (0.0 to 1.0)
    pub key_failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            network_latency_ms: 50,
            load_failure_rate: 0.0,
            key_failure_rate: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            deterministic_seed: Some(42),
            network_latency_ms: 0,
            load_failure_rate: 0.0,
            key_failure_rate: 0.0,
        }
    }
}

impl CuetideConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("CUETIDE_TICK_INTERVAL_MS") {
            config.stream.tick_interval = Duration::from_millis(ms);
        }

        if let Some(seconds) = env_parse::<f64>("CUETIDE_MAX_BUFFER_LENGTH") {
            config.stream.max_buffer_length = seconds;
        }

        if let Some(ms) = env_parse::<u64>("CUETIDE_LOAD_TIMEOUT_MS") {
            config.stream.fragment_load_timeout = Duration::from_millis(ms);
        }

        if let Some(attempts) = env_parse::<u32>("CUETIDE_MAX_RETRIES") {
            config.retry.max_attempts = attempts;
        }

        if let Some(ms) = env_parse::<u64>("CUETIDE_RETRY_DELAY_MS") {
            config.retry.base_delay = Duration::from_millis(ms);
        }

        if let Some(seed) = env_parse::<u64>("CUETIDE_SIMULATION_SEED") {
            config.simulation.deterministic_seed = Some(seed);
        }

        config
    }

    /// Checks that all values are usable.
    ///
    /// # Errors
    ///
    /// - `CuetideError::Configuration` - Zero tick interval, non-positive
    ///   buffer length, negative tolerance, or failure rates outside [0, 1]
    pub fn validate(&self) -> Result<(), CuetideError> {
        if self.stream.tick_interval.is_zero() {
            return Err(configuration("tick interval must be greater than zero"));
        }
        if !(self.stream.max_buffer_length > 0.0) {
            return Err(configuration("max buffer length must be positive"));
        }
        if !(self.stream.fragment_lookup_tolerance >= 0.0) {
            return Err(configuration("fragment lookup tolerance must not be negative"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(configuration("retry base delay exceeds max delay"));
        }
        for (name, rate) in [
            ("load failure rate", self.simulation.load_failure_rate),
            ("key failure rate", self.simulation.key_failure_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(configuration(&format!("{name} must be within [0, 1]")));
            }
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

fn configuration(reason: &str) -> CuetideError {
    CuetideError::Configuration {
        reason: reason.to_string(),
    }
}
