//! Track list storage and track-switch arbitration.
//!
//! The registry holds the ordered track list exactly as handed in; ids are
//! positional indices into it. The switch arbiter owns the active selection
//! and decides when the scheduling tick is armed or disarmed, so that each
//! transition invokes the scheduler at most once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::TrackSelectionError;
use crate::media::{Track, TrackDetails, TrackId};
use crate::scheduler::TickScheduler;

/// Ordered list of selectable tracks.
#[derive(Debug, Default, Clone)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    /// Replaces the whole track list. The active selection is not touched.
    pub fn update_tracks(&mut self, tracks: Vec<Track>) {
        debug!(count = tracks.len(), "Track list updated");
        self.tracks = tracks;
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id.as_index()?)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(id.as_index()?)
    }

    /// Details of a track, if the track exists and has loaded them.
    pub fn details(&self, id: TrackId) -> Option<&Arc<TrackDetails>> {
        self.get(id)?.details.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Resolves an id to a track in the current list.
    ///
    /// # Errors
    ///
    /// - `TrackSelectionError::NoTracks` - Registry is empty
    /// - `TrackSelectionError::InvalidTrack` - Id is negative or out of range
    pub fn resolve(&self, id: TrackId) -> Result<&Track, TrackSelectionError> {
        if self.tracks.is_empty() {
            return Err(TrackSelectionError::NoTracks);
        }
        self.get(id).ok_or(TrackSelectionError::InvalidTrack { id })
    }
}

/// Result of a track switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Track has details; scheduling is armed.
    Scheduling { changed: bool },
    /// Track exists but its details have not loaded yet.
    AwaitingDetails { changed: bool },
    /// Explicit deselection (`TrackId::NONE`).
    Deselected,
}

/// Result of a track-details-loaded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailsOutcome {
    /// Details attached to the active track; `replaced` when it had some.
    Attached { replaced: bool },
    /// Event did not concern the active track and was dropped.
    Ignored,
}

/// Owns the active track selection and the armed flag of the scheduler.
#[derive(Debug)]
pub struct SwitchArbiter {
    active: TrackId,
    armed: bool,
    interval: Duration,
}

impl SwitchArbiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            active: TrackId::NONE,
            armed: false,
            interval,
        }
    }

    pub fn active(&self) -> TrackId {
        self.active
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Switches the active track.
    ///
    /// A track with details arms scheduling unless already armed. Deselection,
    /// an empty registry or an unknown id disarm scheduling and clear the
    /// selection. A known track without details keeps the selection and
    /// stops ticking until its details arrive.
    ///
    /// # Errors
    ///
    /// - `TrackSelectionError::NoTracks` - Registry is empty
    /// - `TrackSelectionError::InvalidTrack` - Id does not resolve to a track
    pub fn switch_track(
        &mut self,
        registry: &TrackRegistry,
        id: TrackId,
        scheduler: &mut dyn TickScheduler,
    ) -> Result<SwitchOutcome, TrackSelectionError> {
        let previous = self.active;

        if id.is_none() {
            self.deselect(scheduler);
            return Ok(SwitchOutcome::Deselected);
        }

        let track = match registry.resolve(id) {
            Ok(track) => track,
            Err(error) => {
                self.deselect(scheduler);
                return Err(error);
            }
        };

        self.active = id;
        let changed = previous != id;
        if track.details.is_some() {
            self.arm(scheduler);
            Ok(SwitchOutcome::Scheduling { changed })
        } else {
            self.disarm(scheduler);
            Ok(SwitchOutcome::AwaitingDetails { changed })
        }
    }

    /// Attaches details to the active track and arms scheduling.
    ///
    /// Events for any other id, or for an id not in the registry, are
    /// dropped without side effects.
    pub fn details_loaded(
        &mut self,
        registry: &mut TrackRegistry,
        id: TrackId,
        details: Arc<TrackDetails>,
        scheduler: &mut dyn TickScheduler,
    ) -> DetailsOutcome {
        if id != self.active {
            trace!(track = %id, active = %self.active, "Ignoring details for inactive track");
            return DetailsOutcome::Ignored;
        }
        let Some(track) = registry.get_mut(id) else {
            trace!(track = %id, "Ignoring details for unknown track");
            return DetailsOutcome::Ignored;
        };

        let replaced = track.details.replace(details).is_some();
        self.arm(scheduler);
        DetailsOutcome::Attached { replaced }
    }

    /// Clears the selection and stops scheduling.
    pub fn deselect(&mut self, scheduler: &mut dyn TickScheduler) {
        self.active = TrackId::NONE;
        self.armed = false;
        scheduler.disarm();
    }

    fn arm(&mut self, scheduler: &mut dyn TickScheduler) {
        if !self.armed {
            scheduler.arm(self.interval);
            self.armed = true;
        }
    }

    fn disarm(&mut self, scheduler: &mut dyn TickScheduler) {
        if self.armed {
            scheduler.disarm();
            self.armed = false;
        }
    }
}
