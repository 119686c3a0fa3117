//! Command definitions for the stream engine actor.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::controller::{ControllerSnapshot, LoadTicket};
use crate::error::{BufferAppendError, KeyError, LoadError};
use crate::media::{DecryptKey, TimeRange, Track, TrackDetails, TrackId};
use crate::traits::PlaybackClock;

/// Commands processed by the stream engine actor.
///
/// Player events carry a responder that is signalled once the controller has
/// applied them. Completions of collaborator work are posted by the actor's
/// own tasks and carry the ticket they were issued with.
pub enum StreamEngineCommand {
    /// Media element attached; binds the playback clock.
    MediaAttached {
        clock: Arc<dyn PlaybackClock>,
        responder: oneshot::Sender<()>,
    },
    /// Media element detaching; releases all state.
    MediaDetaching { responder: oneshot::Sender<()> },
    /// Track list replaced.
    TracksUpdated {
        tracks: Vec<Track>,
        responder: oneshot::Sender<()>,
    },
    /// Active track switch request.
    TrackSwitch {
        id: TrackId,
        responder: oneshot::Sender<()>,
    },
    /// Details for a track finished loading.
    TrackDetailsLoaded {
        id: TrackId,
        details: Arc<TrackDetails>,
        responder: oneshot::Sender<()>,
    },
    /// Playback position jumped.
    MediaSeeking { responder: oneshot::Sender<()> },
    /// Read the controller's current state.
    GetSnapshot {
        responder: oneshot::Sender<ControllerSnapshot>,
    },
    /// Stop the actor.
    Shutdown { responder: oneshot::Sender<()> },
    /// Internal: fragment load finished.
    FragmentLoaded {
        ticket: LoadTicket,
        result: Result<Bytes, LoadError>,
    },
    /// Internal: key load finished.
    KeyLoaded {
        ticket: LoadTicket,
        result: Result<DecryptKey, KeyError>,
    },
    /// Internal: append finished.
    BufferAppended {
        ticket: LoadTicket,
        result: Result<(), BufferAppendError>,
    },
    /// Internal: flush finished.
    BufferFlushed {
        ticket: LoadTicket,
        range: TimeRange,
        result: Result<(), BufferAppendError>,
    },
    /// Internal: retry backoff elapsed.
    RetryElapsed { ticket: LoadTicket },
}
