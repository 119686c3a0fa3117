//! Position reconciliation on seeks.
//!
//! After a seek the fragment chain anchored at `frag_previous` no longer
//! says anything about where buffering should resume. If the new position
//! lies outside the current fragment, the chain is dropped so the next
//! scheduling decision searches from the playback position instead.

use tracing::debug;

use super::{State, StreamController};
use crate::scheduler::TickScheduler;

impl<S: TickScheduler> StreamController<S> {
    /// Handles a seek or position jump.
    pub fn on_media_seeking(&mut self) {
        let Some(position) = self.current_position() else {
            // Without a position source there is nothing to chain from.
            self.frag_previous = None;
            return;
        };

        let within_current = self
            .frag_current
            .as_ref()
            .is_some_and(|fragment| fragment.time_range().contains(position));

        if !within_current {
            debug!(position, "Seeked outside current fragment");
            self.frag_previous = None;

            let retry_elsewhere = self
                .retry_fragment
                .as_ref()
                .is_some_and(|fragment| !fragment.time_range().contains(position));
            if retry_elsewhere && self.state == State::Error {
                self.retry = None;
                self.retry_fragment = None;
                self.set_state(State::Idle);
            }

            // An in-flight load keeps its fragment so the result still lands.
            if self.state.is_busy() {
                self.seeked_during_load = true;
            } else {
                self.frag_current = None;
            }
        }

        if matches!(self.state, State::Idle | State::WaitingTrack) {
            self.tick();
        }
    }
}
