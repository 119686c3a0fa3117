//! Error taxonomy for fragment scheduling.

use std::time::Duration;

use crate::media::{BufferType, FragmentKey, TrackId};

/// Errors selecting a track. Always recoverable: the controller falls back
/// to having no active track.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackSelectionError {
    #[error("Track {id} does not exist")]
    InvalidTrack { id: TrackId },

    #[error("No tracks available")]
    NoTracks,
}

/// Network or parse failure for a fragment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("Network error loading {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Timed out after {timeout:?} loading {url}")]
    Timeout { url: String, timeout: Duration },

    #[error("Failed to parse fragment {sn}: {reason}")]
    Parse { sn: u64, reason: String },

    #[error("Load aborted")]
    Aborted,
}

/// Decryption key could not be resolved.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeyError {
    #[error("Key {uri} unavailable: {reason}")]
    Unavailable { uri: String, reason: String },

    #[error("Unsupported encryption method: {method}")]
    UnsupportedMethod { method: String },
}

/// Media buffer rejected an append or flush.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BufferAppendError {
    #[error("{buffer_type} buffer is full")]
    QuotaExceeded { buffer_type: BufferType },

    #[error("{buffer_type} buffer rejected data: {reason}")]
    Rejected {
        buffer_type: BufferType,
        reason: String,
    },
}

impl BufferAppendError {
    /// Quota failures can be resolved by flushing and retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BufferAppendError::QuotaExceeded { .. })
    }
}

/// Errors surfaced by the stream controller and engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    #[error("Track selection error: {0}")]
    TrackSelection(#[from] TrackSelectionError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Buffer append error: {0}")]
    BufferAppend(#[from] BufferAppendError),

    #[error("Fragment {fragment} failed after {attempts} attempts")]
    RetriesExhausted { fragment: FragmentKey, attempts: u32 },

    #[error("Invalid track details: {reason}")]
    InvalidDetails { reason: String },

    #[error("Stream engine has shut down")]
    EngineShutdown,
}

pub type StreamResult<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_recoverable() {
        let quota = BufferAppendError::QuotaExceeded {
            buffer_type: BufferType::Subtitle,
        };
        let rejected = BufferAppendError::Rejected {
            buffer_type: BufferType::Subtitle,
            reason: "bad cue".to_string(),
        };
        assert!(quota.is_recoverable());
        assert!(!rejected.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error: StreamError = LoadError::Network {
            url: "sub/0.vtt".to_string(),
            reason: "connection reset".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "Load error: Network error loading sub/0.vtt: connection reset"
        );
    }
}
