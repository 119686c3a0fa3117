//! Cuetide Simulation Framework - Deterministic collaborators for the stream engine.
//!
//! Provides simulated implementations of every collaborator the stream
//! engine consumes, driven by JSON scenario files and a seeded RNG so that
//! failure-injecting sessions replay identically.
//!
//! # Example
//!
//! ```rust,no_run
//! use cuetide_core::config::CuetideConfig;
//! use cuetide_sim::{Scenario, SessionOptions, run_session};
//!
//! # async fn demo() -> Result<(), cuetide_sim::SimulationError> {
//! let mut config = CuetideConfig::default();
//! config.simulation.deterministic_seed = Some(7);
//!
//! let report = run_session(&Scenario::sample(), &config, &SessionOptions::default()).await?;
//! println!("Buffered {} fragments", report.fragments_buffered.len());
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod loader;
pub mod playback;
pub mod rng;
pub mod scenario;
pub mod session;

use cuetide_core::{CuetideError, StreamError};

pub use buffer::{BufferStats, BufferedCues, InMemoryMediaBuffer};
pub use loader::{SimulatedFragmentLoader, SimulatedKeyLoader, webvtt_payload};
pub use playback::SimulatedPlayback;
pub use rng::DeterministicRng;
pub use scenario::{Scenario, TrackSpec};
pub use session::{SessionOptions, SessionReport, run_session};

/// Errors raised while loading scenarios or running sessions.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Invalid scenario: {reason}")]
    Scenario { reason: String },

    #[error("Scenario file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream engine error: {0}")]
    Stream(#[from] StreamError),
}

impl From<SimulationError> for CuetideError {
    fn from(error: SimulationError) -> Self {
        match error {
            SimulationError::Scenario { reason } => CuetideError::Scenario { reason },
            SimulationError::Io(e) => CuetideError::Io(e),
            SimulationError::Json(e) => CuetideError::Scenario {
                reason: e.to_string(),
            },
            SimulationError::Stream(e) => CuetideError::Stream(e),
        }
    }
}
