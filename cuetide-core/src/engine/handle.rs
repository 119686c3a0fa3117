//! Handle for communicating with the stream engine actor.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::commands::StreamEngineCommand;
use crate::controller::ControllerSnapshot;
use crate::error::StreamError;
use crate::media::{Track, TrackDetails, TrackId};
use crate::traits::PlaybackClock;

/// Cloneable handle to a running stream engine.
///
/// Each method forwards one player event to the actor and resolves once the
/// controller has applied it, so a caller observing `snapshot()` afterwards
/// sees the effect of the event.
#[derive(Clone)]
pub struct StreamEngineHandle {
    sender: mpsc::Sender<StreamEngineCommand>,
}

impl StreamEngineHandle {
    /// Creates a new handle with the given command sender.
    pub fn new(sender: mpsc::Sender<StreamEngineCommand>) -> Self {
        Self { sender }
    }

    /// Binds the playback clock and starts the controller.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor is no longer running
    pub async fn media_attached(&self, clock: Arc<dyn PlaybackClock>) -> Result<(), StreamError> {
        self.request(|responder| StreamEngineCommand::MediaAttached { clock, responder })
            .await
    }

    /// Stops scheduling and releases track state.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor is no longer running
    pub async fn media_detaching(&self) -> Result<(), StreamError> {
        self.request(|responder| StreamEngineCommand::MediaDetaching { responder })
            .await
    }

    /// Replaces the track list.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor is no longer running
    pub async fn tracks_updated(&self, tracks: Vec<Track>) -> Result<(), StreamError> {
        self.request(|responder| StreamEngineCommand::TracksUpdated { tracks, responder })
            .await
    }

    /// Selects the active track. Unknown ids deselect rather than fail.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor is no longer running
    pub async fn switch_track(&self, id: TrackId) -> Result<(), StreamError> {
        self.request(|responder| StreamEngineCommand::TrackSwitch { id, responder })
            .await
    }

    /// Delivers loaded details for a track.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor is no longer running
    pub async fn track_details_loaded(
        &self,
        id: TrackId,
        details: Arc<TrackDetails>,
    ) -> Result<(), StreamError> {
        self.request(|responder| StreamEngineCommand::TrackDetailsLoaded {
            id,
            details,
            responder,
        })
        .await
    }

    /// Signals a seek; read the new position from the bound clock first.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor is no longer running
    pub async fn media_seeking(&self) -> Result<(), StreamError> {
        self.request(|responder| StreamEngineCommand::MediaSeeking { responder })
            .await
    }

    /// Returns the controller's current state.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor is no longer running
    pub async fn snapshot(&self) -> Result<ControllerSnapshot, StreamError> {
        self.request(|responder| StreamEngineCommand::GetSnapshot { responder })
            .await
    }

    /// Stops the actor. In-flight collaborator work is abandoned.
    ///
    /// # Errors
    /// - `StreamError::EngineShutdown` - Actor already stopped
    pub async fn shutdown(&self) -> Result<(), StreamError> {
        self.request(|responder| StreamEngineCommand::Shutdown { responder })
            .await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> StreamEngineCommand,
    ) -> Result<T, StreamError> {
        let (responder, rx) = oneshot::channel();

        self.sender
            .send(command(responder))
            .await
            .map_err(|_| StreamError::EngineShutdown)?;

        rx.await.map_err(|_| StreamError::EngineShutdown)
    }
}
