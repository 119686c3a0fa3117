//! Work the controller hands to its driver, and notifications it emits.

use std::time::Duration;

use serde::Serialize;

use super::State;
use crate::error::StreamError;
use crate::media::{BufferType, Fragment, FragmentKey, ParsedFragment, TimeRange, TrackId};

/// Identifies the target of an asynchronous operation.
///
/// Every completion is delivered back with its ticket; the controller
/// applies it only if the ticket still matches the active session, track
/// and fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub track: TrackId,
    pub fragment: FragmentKey,
}

/// Asynchronous work requested by the controller.
#[derive(Debug, Clone)]
pub enum StreamRequest {
    /// Fetch a fragment payload.
    LoadFragment { ticket: LoadTicket, fragment: Fragment },
    /// Resolve the decryption key for a fragment.
    LoadKey { ticket: LoadTicket, fragment: Fragment },
    /// Append parsed data to the media buffer.
    Append {
        ticket: LoadTicket,
        buffer_type: BufferType,
        payload: ParsedFragment,
    },
    /// Remove buffered content to make room before a retry.
    Flush {
        ticket: LoadTicket,
        buffer_type: BufferType,
        range: TimeRange,
    },
    /// Wake the controller after a backoff delay.
    ScheduleRetry { ticket: LoadTicket, delay: Duration },
    /// Forward a notification to observers.
    Notify(StreamEvent),
}

/// Notifications emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    StateChanged { from: State, to: State },
    FragmentLoading { fragment: FragmentKey },
    FragmentBuffered { fragment: FragmentKey, range: TimeRange },
    /// Fragment abandoned after exhausting retries; scheduling moved past it.
    FragmentSkipped { fragment: FragmentKey, error: StreamError },
    /// Unrecoverable condition; scheduling has stopped.
    Fatal { error: StreamError },
}

/// Serializable view of the controller's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub state: State,
    pub active_track: TrackId,
    pub armed: bool,
    pub track_count: usize,
    pub frag_current: Option<FragmentKey>,
    pub frag_previous: Option<FragmentKey>,
    pub buffered: Vec<TimeRange>,
}
