//! Cuetide Core - Fragment scheduling for timed-text media tracks
//!
//! This crate provides the building blocks for streaming subtitle tracks
//! alongside a playing video: track selection, fragment scheduling and
//! buffering, retry policy, and an async engine that drives the scheduler
//! against pluggable loaders and media buffers.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod fragment_tracker;
pub mod media;
pub mod scheduler;
pub mod track_registry;
pub mod tracing_setup;
pub mod traits;

// Re-export main types for convenient access
pub use config::CuetideConfig;
pub use controller::{State, StreamController, StreamEvent, StreamRequest};
pub use engine::{Collaborators, StreamEngineHandle, spawn_stream_engine};
pub use error::{
    BufferAppendError, KeyError, LoadError, StreamError, StreamResult, TrackSelectionError,
};
pub use fragment_tracker::{FragmentState, FragmentTracker};
pub use media::{
    BufferType, Fragment, FragmentKey, TimeRange, Track, TrackAttributes, TrackDetails, TrackId,
};
pub use scheduler::TickScheduler;
pub use traits::{FragmentLoader, KeyLoader, MediaBuffer, PlaybackClock};

/// Errors that can bubble up from any Cuetide subsystem.
#[derive(Debug, thiserror::Error)]
pub enum CuetideError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Scenario error: {reason}")]
    Scenario { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CuetideError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            CuetideError::Stream(e) => match e {
                StreamError::TrackSelection(TrackSelectionError::InvalidTrack { id }) => {
                    format!("Subtitle track {id} does not exist")
                }
                StreamError::TrackSelection(TrackSelectionError::NoTracks) => {
                    "No subtitle tracks available".to_string()
                }
                StreamError::RetriesExhausted { fragment, attempts } => {
                    format!("Could not load subtitle fragment {fragment} after {attempts} attempts")
                }
                StreamError::EngineShutdown => "Subtitle engine is not running".to_string(),
                _ => "Subtitle streaming error occurred".to_string(),
            },
            CuetideError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            CuetideError::Scenario { reason } => format!("Invalid scenario: {reason}"),
            CuetideError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CuetideError::Configuration { .. }
                | CuetideError::Scenario { .. }
                | CuetideError::Stream(StreamError::TrackSelection(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, CuetideError>;
