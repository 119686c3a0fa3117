//! Fragment stream controller.
//!
//! A synchronous state machine that decides, on every scheduling tick,
//! whether to wait for a track, request the next fragment, resolve its key,
//! parse it, append it, or recover from a failure. It performs no I/O: work
//! is queued as [`StreamRequest`]s and completions are fed back through the
//! `on_*` handlers, each guarded by a [`LoadTicket`] so results for a track
//! or session that is no longer current are discarded.

mod reconciler;
pub mod requests;
pub mod retry;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

pub use requests::{ControllerSnapshot, LoadTicket, StreamEvent, StreamRequest};
pub use retry::{ErrorCategory, FragmentRetryTracker, RetryDecision, RetryStrategy};

use crate::config::{CuetideConfig, RetryConfig, StreamConfig};
use crate::error::{BufferAppendError, KeyError, LoadError, StreamError};
use crate::fragment_tracker::{FragmentState, FragmentTracker};
use crate::media::{
    DecryptKey, Fragment, ParsedFragment, TimeRange, Track, TrackDetails, TrackId,
};
use crate::scheduler::TickScheduler;
use crate::track_registry::{DetailsOutcome, SwitchArbiter, SwitchOutcome, TrackRegistry};
use crate::traits::PlaybackClock;

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Stopped,
    Idle,
    WaitingTrack,
    FragmentLoading,
    KeyLoading,
    Parsing,
    Appending,
    BufferFlushing,
    Error,
}

impl State {
    /// States with an asynchronous operation outstanding.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            State::FragmentLoading
                | State::KeyLoading
                | State::Parsing
                | State::Appending
                | State::BufferFlushing
        )
    }
}

/// Scheduling state machine for one buffer type.
pub struct StreamController<S: TickScheduler> {
    config: StreamConfig,
    retry_config: RetryConfig,
    scheduler: S,
    registry: TrackRegistry,
    arbiter: SwitchArbiter,
    tracker: FragmentTracker,
    state: State,
    clock: Option<Arc<dyn PlaybackClock>>,
    frag_current: Option<Fragment>,
    frag_previous: Option<Fragment>,
    /// Payload held while its key is resolved.
    pending_payload: Option<Bytes>,
    /// Set when playback jumped away from `frag_current` while it was in
    /// flight; its completion must not anchor the next fragment choice.
    seeked_during_load: bool,
    retry: Option<FragmentRetryTracker>,
    /// Fragment to re-request once the backoff has elapsed.
    retry_fragment: Option<Fragment>,
    /// Bumped on media detach; completions from older sessions are stale.
    generation: u64,
    requests: Vec<StreamRequest>,
}

impl<S: TickScheduler> StreamController<S> {
    /// Creates a stopped controller.
    pub fn new(config: &CuetideConfig, scheduler: S) -> Self {
        Self {
            config: config.stream.clone(),
            retry_config: config.retry.clone(),
            scheduler,
            registry: TrackRegistry::new(),
            arbiter: SwitchArbiter::new(config.stream.tick_interval),
            tracker: FragmentTracker::new(),
            state: State::Stopped,
            clock: None,
            frag_current: None,
            frag_previous: None,
            pending_payload: None,
            seeked_during_load: false,
            retry: None,
            retry_fragment: None,
            generation: 0,
            requests: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn tracks(&self) -> &[Track] {
        self.registry.tracks()
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn fragment_tracker(&self) -> &FragmentTracker {
        &self.tracker
    }

    pub fn active_track(&self) -> TrackId {
        self.arbiter.active()
    }

    pub fn frag_current(&self) -> Option<&Fragment> {
        self.frag_current.as_ref()
    }

    pub fn frag_previous(&self) -> Option<&Fragment> {
        self.frag_previous.as_ref()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Takes all queued requests, oldest first.
    pub fn drain_requests(&mut self) -> Vec<StreamRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state,
            active_track: self.arbiter.active(),
            armed: self.arbiter.is_armed(),
            track_count: self.registry.len(),
            frag_current: self.frag_current.as_ref().map(Fragment::key),
            frag_previous: self.frag_previous.as_ref().map(Fragment::key),
            buffered: self.tracker.buffered_ranges(self.config.buffer_type),
        }
    }

    /// Binds the playback position source and enters `Idle`.
    pub fn on_media_attached(&mut self, clock: Arc<dyn PlaybackClock>) {
        debug!("Media attached");
        self.clock = Some(clock);
        self.set_state(State::Idle);
    }

    /// Stops scheduling and releases all track and fragment state.
    pub fn on_media_detaching(&mut self) {
        debug!(generation = self.generation, "Media detaching");
        self.arbiter.deselect(&mut self.scheduler);
        self.generation += 1;
        self.clock = None;
        self.registry.clear();
        self.tracker.clear();
        self.frag_current = None;
        self.frag_previous = None;
        self.clear_pending_work();
        self.set_state(State::Stopped);
    }

    /// Replaces the track list.
    ///
    /// When the new list differs in its presentation attributes, buffered
    /// state is reset since ids may now point at different renditions.
    pub fn on_tracks_updated(&mut self, tracks: Vec<Track>) {
        let identical = tracks.len() == self.registry.len()
            && tracks
                .iter()
                .zip(self.registry.tracks())
                .all(|(new, old)| new.attrs == old.attrs);

        self.registry.update_tracks(tracks);

        if !identical {
            self.tracker.remove_fragments(self.config.buffer_type);
            self.frag_previous = None;
            self.retry = None;
            self.retry_fragment = None;
        }
    }

    /// Switches the active track.
    pub fn on_track_switch(&mut self, id: TrackId) {
        let previous = self.arbiter.active();
        let outcome = self
            .arbiter
            .switch_track(&self.registry, id, &mut self.scheduler);

        if self.arbiter.active() != previous {
            self.reset_for_new_track();
        }

        match outcome {
            Ok(SwitchOutcome::Scheduling { changed }) => {
                debug!(track = %id, changed, "Switched to track");
                if self.state == State::WaitingTrack {
                    self.set_state(State::Idle);
                }
            }
            Ok(SwitchOutcome::AwaitingDetails { .. }) => {
                debug!(track = %id, "Switched to track without details");
                self.wait_for_track();
            }
            Ok(SwitchOutcome::Deselected) => {
                debug!("Track deselected");
                self.wait_for_track();
            }
            Err(error) => {
                debug!(track = %id, %error, "Track switch resolved to no active track");
                self.wait_for_track();
            }
        }
    }

    /// Attaches freshly loaded details if they belong to the active track.
    pub fn on_track_details_loaded(&mut self, id: TrackId, details: Arc<TrackDetails>) {
        let outcome = self.arbiter.details_loaded(
            &mut self.registry,
            id,
            details.clone(),
            &mut self.scheduler,
        );

        let DetailsOutcome::Attached { replaced } = outcome else {
            return;
        };
        debug!(track = %id, fragments = details.fragments().len(), replaced, "Track details attached");

        if replaced {
            self.tracker
                .remove_track_fragments(self.config.buffer_type, id);
            let previous_gone = self
                .frag_previous
                .as_ref()
                .is_some_and(|prev| details.fragment_by_sn(prev.sn).is_none());
            if previous_gone {
                self.frag_previous = None;
            }
        }

        if self.state == State::WaitingTrack {
            self.set_state(State::Idle);
        }
    }

    /// Scheduling tick. Only acts when nothing is in flight, so repeated
    /// ticks never issue a second request for the same fragment.
    pub fn tick(&mut self) {
        match self.state {
            State::Idle | State::WaitingTrack => self.schedule_next(),
            State::Stopped => trace!("Tick while stopped"),
            state => trace!(?state, "Tick while busy"),
        }
    }

    /// Completion of a fragment load.
    pub fn on_fragment_loaded(&mut self, ticket: LoadTicket, result: Result<Bytes, LoadError>) {
        if !self.is_current(&ticket, State::FragmentLoading) {
            debug!(fragment = %ticket.fragment, "Discarding stale fragment load");
            return;
        }
        let Some(fragment) = self.frag_current.clone() else {
            return;
        };

        match result {
            Err(error) => self.handle_failure(error.into()),
            Ok(data) if fragment.is_encrypted() => {
                self.pending_payload = Some(data);
                self.set_state(State::KeyLoading);
                self.requests
                    .push(StreamRequest::LoadKey { ticket, fragment });
            }
            Ok(data) => self.parse_and_append(ticket, fragment, data, None),
        }
    }

    /// Completion of a key load.
    pub fn on_key_loaded(&mut self, ticket: LoadTicket, result: Result<DecryptKey, KeyError>) {
        if !self.is_current(&ticket, State::KeyLoading) {
            debug!(fragment = %ticket.fragment, "Discarding stale key load");
            return;
        }
        let Some(fragment) = self.frag_current.clone() else {
            return;
        };

        match result {
            Err(error) => {
                self.pending_payload = None;
                self.handle_failure(error.into());
            }
            Ok(key) => match self.pending_payload.take() {
                Some(data) => self.parse_and_append(ticket, fragment, data, Some(key)),
                None => self.handle_failure(LoadError::Aborted.into()),
            },
        }
    }

    /// Completion of a buffer append.
    pub fn on_buffer_appended(
        &mut self,
        ticket: LoadTicket,
        result: Result<(), BufferAppendError>,
    ) {
        if !self.is_current(&ticket, State::Appending) {
            debug!(fragment = %ticket.fragment, "Discarding stale append");
            return;
        }
        let Some(fragment) = self.frag_current.clone() else {
            return;
        };

        match result {
            Ok(()) => {
                let buffer_type = self.config.buffer_type;
                self.tracker
                    .record_progress(&fragment, buffer_type, FragmentState::Ok);
                debug!(fragment = %ticket.fragment, start = fragment.start, end = fragment.end(), "Fragment buffered");
                self.requests.push(StreamRequest::Notify(StreamEvent::FragmentBuffered {
                    fragment: ticket.fragment,
                    range: fragment.time_range(),
                }));
                self.advance_past(fragment);
                self.retry = None;
                self.retry_fragment = None;
                self.set_state(State::Idle);
            }
            Err(error) => self.handle_failure(error.into()),
        }
    }

    /// Completion of a buffer flush issued before an append retry.
    pub fn on_buffer_flushed(
        &mut self,
        ticket: LoadTicket,
        range: TimeRange,
        result: Result<(), BufferAppendError>,
    ) {
        if !self.is_current(&ticket, State::BufferFlushing) {
            debug!(fragment = %ticket.fragment, "Discarding stale flush");
            return;
        }

        match result {
            Ok(()) => {
                self.tracker.remove_range(self.config.buffer_type, range);
                self.set_state(State::Idle);
            }
            Err(error) => self.fail(error.into()),
        }
    }

    /// Backoff elapsed for a failed fragment.
    pub fn on_retry_elapsed(&mut self, ticket: LoadTicket) {
        let matches_retry = self
            .retry_fragment
            .as_ref()
            .is_some_and(|fragment| fragment.key() == ticket.fragment);
        if ticket.generation != self.generation
            || self.state != State::Error
            || !matches_retry
            || ticket.track != self.arbiter.active()
        {
            trace!(fragment = %ticket.fragment, "Ignoring stale retry");
            return;
        }

        self.set_state(State::Idle);
        self.schedule_next();
    }

    fn schedule_next(&mut self) {
        let Some(clock) = self.clock.clone() else {
            return;
        };
        let active = self.arbiter.active();
        let Some(details) = self.registry.details(active).cloned() else {
            trace!(track = %active, "No track to schedule");
            self.set_state(State::WaitingTrack);
            return;
        };
        if self.state == State::WaitingTrack {
            self.set_state(State::Idle);
        }

        let position = clock.current_time();
        match self.next_fragment(&details, position) {
            Some(fragment) => self.load_fragment(fragment),
            None => trace!(track = %active, position, "Nothing to load"),
        }
    }

    /// Chooses the next fragment: a pending retry, the successor of
    /// `frag_previous`, or the fragment at the playback position. Already
    /// buffered fragments are skipped up to the look-ahead horizon.
    fn next_fragment(&self, details: &TrackDetails, position: f64) -> Option<Fragment> {
        let active = self.arbiter.active();

        if let Some(retry) = &self.retry_fragment
            && retry.track == active
        {
            return Some(retry.clone());
        }

        let tolerance = self.config.fragment_lookup_tolerance;
        let horizon = position + self.config.max_buffer_length;
        let chained = self
            .frag_previous
            .as_ref()
            .filter(|prev| prev.track == active && details.fragment_by_sn(prev.sn).is_some())
            .and_then(|prev| details.fragment_after(prev.sn))
            .filter(|next| next.end() > position && next.start < horizon);

        let mut candidate = match chained {
            Some(next) => next,
            None => details.fragment_at(position, tolerance)?,
        };

        let buffer_type = self.config.buffer_type;
        loop {
            if candidate.start >= horizon {
                return None;
            }
            if !self.tracker.is_time_buffered(buffer_type, candidate.midpoint()) {
                return Some(candidate.clone());
            }
            trace!(sn = candidate.sn, "Fragment already buffered");
            candidate = details.fragment_after(candidate.sn)?;
        }
    }

    fn load_fragment(&mut self, fragment: Fragment) {
        let ticket = self.ticket_for(&fragment);
        debug!(fragment = %ticket.fragment, start = fragment.start, url = %fragment.url, "Loading fragment");

        self.tracker
            .record_progress(&fragment, self.config.buffer_type, FragmentState::NotLoaded);
        self.frag_current = Some(fragment.clone());
        self.seeked_during_load = false;
        self.set_state(State::FragmentLoading);
        self.requests
            .push(StreamRequest::Notify(StreamEvent::FragmentLoading {
                fragment: ticket.fragment,
            }));
        self.requests
            .push(StreamRequest::LoadFragment { ticket, fragment });
    }

    fn parse_and_append(
        &mut self,
        ticket: LoadTicket,
        fragment: Fragment,
        data: Bytes,
        key: Option<DecryptKey>,
    ) {
        self.set_state(State::Parsing);

        let text = match String::from_utf8(data.to_vec()) {
            Ok(text) => text,
            Err(error) => {
                self.handle_failure(
                    LoadError::Parse {
                        sn: fragment.sn,
                        reason: error.to_string(),
                    }
                    .into(),
                );
                return;
            }
        };

        let buffer_type = self.config.buffer_type;
        self.tracker
            .record_progress(&fragment, buffer_type, FragmentState::Appending);
        self.set_state(State::Appending);
        self.requests.push(StreamRequest::Append {
            ticket,
            buffer_type,
            payload: ParsedFragment {
                fragment,
                text,
                key,
            },
        });
    }

    /// Applies the retry policy to a failure of the current fragment.
    fn handle_failure(&mut self, error: StreamError) {
        let Some(fragment) = self.frag_current.clone() else {
            return;
        };
        let key = fragment.key();
        let buffer_type = self.config.buffer_type;
        self.tracker.remove_fragment(&key, buffer_type);

        let category = ErrorCategory::from_stream_error(&error);
        if self.retry.as_ref().is_none_or(|retry| retry.fragment != key) {
            self.retry = Some(FragmentRetryTracker::new(key, category));
        }
        let decision = self
            .retry
            .get_or_insert_with(|| FragmentRetryTracker::new(key, category))
            .record_failure(&error, &self.retry_config);
        let ticket = self.ticket_for(&fragment);

        match decision {
            RetryDecision::Retry { attempt, delay } => {
                warn!(fragment = %key, attempt, ?delay, %error, "Fragment failed, retrying");
                self.retry_fragment = Some(fragment);

                if category == ErrorCategory::BufferQuota {
                    let position = self.current_position().unwrap_or(0.0);
                    let range = TimeRange::new(0.0, position.max(0.0));
                    self.set_state(State::BufferFlushing);
                    self.requests.push(StreamRequest::Flush {
                        ticket,
                        buffer_type,
                        range,
                    });
                } else {
                    self.set_state(State::Error);
                    self.requests
                        .push(StreamRequest::ScheduleRetry { ticket, delay });
                }
            }
            RetryDecision::GiveUp { attempts } => {
                let elapsed = self
                    .retry
                    .take()
                    .map(|retry| retry.elapsed())
                    .unwrap_or_default();
                self.retry_fragment = None;

                let fallback = self.registry.len() > 1;
                if category == ErrorCategory::Fatal || !fallback {
                    debug!(fragment = %key, attempts, ?elapsed, "Giving up on fragment");
                    let error = if category == ErrorCategory::Fatal {
                        error
                    } else {
                        StreamError::RetriesExhausted {
                            fragment: key,
                            attempts,
                        }
                    };
                    self.fail(error);
                } else {
                    warn!(fragment = %key, attempts, ?elapsed, %error, "Skipping fragment after retries");
                    self.requests
                        .push(StreamRequest::Notify(StreamEvent::FragmentSkipped {
                            fragment: key,
                            error,
                        }));
                    self.advance_past(fragment);
                    self.set_state(State::Idle);
                }
            }
        }
    }

    /// Surfaces a fatal error and stops scheduling.
    fn fail(&mut self, error: StreamError) {
        error!(%error, "Fatal stream error");
        self.arbiter.deselect(&mut self.scheduler);
        self.clear_pending_work();
        self.set_state(State::Error);
        self.requests
            .push(StreamRequest::Notify(StreamEvent::Fatal { error }));
    }

    /// Parks the controller until a track with details is active.
    fn wait_for_track(&mut self) {
        if self.state != State::Stopped && !self.state.is_busy() {
            self.set_state(State::WaitingTrack);
        }
    }

    fn reset_for_new_track(&mut self) {
        self.tracker.remove_fragments(self.config.buffer_type);
        self.frag_previous = None;
        self.frag_current = None;
        self.clear_pending_work();
        if self.state.is_busy() || self.state == State::Error {
            self.set_state(State::Idle);
        }
    }

    /// Records `fragment` as done and anchors the next choice on it, unless
    /// a seek has since moved playback elsewhere.
    fn advance_past(&mut self, fragment: Fragment) {
        if std::mem::take(&mut self.seeked_during_load) {
            debug!(sn = fragment.sn, "Playback moved during load, not chaining");
            return;
        }
        self.frag_previous = Some(fragment);
    }

    fn clear_pending_work(&mut self) {
        self.pending_payload = None;
        self.seeked_during_load = false;
        self.retry = None;
        self.retry_fragment = None;
    }

    fn is_current(&self, ticket: &LoadTicket, expected: State) -> bool {
        ticket.generation == self.generation
            && self.state == expected
            && ticket.track == self.arbiter.active()
            && self
                .frag_current
                .as_ref()
                .is_some_and(|fragment| fragment.key() == ticket.fragment)
    }

    fn ticket_for(&self, fragment: &Fragment) -> LoadTicket {
        LoadTicket {
            generation: self.generation,
            track: fragment.track,
            fragment: fragment.key(),
        }
    }

    fn current_position(&self) -> Option<f64> {
        self.clock.as_ref().map(|clock| clock.current_time())
    }

    fn set_state(&mut self, to: State) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!(?from, ?to, track = %self.arbiter.active(), "State transition");
        self.state = to;
        self.requests
            .push(StreamRequest::Notify(StreamEvent::StateChanged { from, to }));
    }
}
