//! Collaborator interfaces consumed by the stream engine.
//!
//! The controller never performs I/O itself. Fragment fetching, key
//! resolution and buffer appends go through these traits so production
//! transports and simulated ones are interchangeable.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{BufferAppendError, KeyError, LoadError};
use crate::media::{BufferType, DecryptKey, Fragment, ParsedFragment, TimeRange};

/// Fetches raw fragment payloads.
#[async_trait]
pub trait FragmentLoader: Send + Sync {
    /// Loads the payload of a fragment.
    ///
    /// # Errors
    ///
    /// - `LoadError::Network` - Transport failure
    /// - `LoadError::Timeout` - Transport gave up waiting
    async fn load(&self, fragment: &Fragment) -> Result<Bytes, LoadError>;
}

/// Resolves decryption keys for encrypted fragments.
#[async_trait]
pub trait KeyLoader: Send + Sync {
    /// Resolves the key referenced by the fragment's decrypt data.
    ///
    /// # Errors
    ///
    /// - `KeyError::Unavailable` - Key could not be fetched
    /// - `KeyError::UnsupportedMethod` - Encryption method not supported
    async fn load_key(&self, fragment: &Fragment) -> Result<DecryptKey, KeyError>;
}

/// Media buffer the parsed payloads are appended to.
#[async_trait]
pub trait MediaBuffer: Send + Sync {
    /// Appends a parsed fragment.
    ///
    /// # Errors
    ///
    /// - `BufferAppendError::QuotaExceeded` - Buffer full, flush and retry
    /// - `BufferAppendError::Rejected` - Data refused, not recoverable
    async fn append(
        &self,
        buffer_type: BufferType,
        payload: ParsedFragment,
    ) -> Result<(), BufferAppendError>;

    /// Removes buffered content within `range`.
    ///
    /// # Errors
    ///
    /// - `BufferAppendError::Rejected` - Buffer could not be flushed
    async fn flush(&self, buffer_type: BufferType, range: TimeRange)
    -> Result<(), BufferAppendError>;
}

/// Synchronous source of the current playback position.
pub trait PlaybackClock: Send + Sync {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;
}
