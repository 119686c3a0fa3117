//! Per-fragment load and buffer state.
//!
//! Tracks, per fragment and buffer type, whether a fragment has been
//! requested, is being appended, or is fully buffered, and answers coverage
//! queries for the scheduler. Only `Ok` entries count as buffered; a fragment
//! whose append is still in flight never does.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::media::{BufferType, Fragment, FragmentKey, TimeRange, TrackId};

/// Load status of a tracked fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FragmentState {
    /// Requested or known, but no data in the buffer yet
    NotLoaded,
    /// Data handed to the buffer, append not yet confirmed
    Appending,
    /// Fully buffered
    Ok,
}

/// Tracker entry for one (fragment, buffer type) pair.
#[derive(Debug, Clone)]
pub struct TrackedFragment {
    pub key: FragmentKey,
    pub buffer_type: BufferType,
    pub state: FragmentState,
    pub range: TimeRange,
}

/// Records fragment progress and answers "is time T buffered?" queries.
#[derive(Debug, Default)]
pub struct FragmentTracker {
    entries: HashMap<(FragmentKey, BufferType), TrackedFragment>,
}

impl FragmentTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Upserts the state of a fragment for a buffer type.
    ///
    /// Recording `Ok` evicts any other `Ok` entry of the same buffer type
    /// whose range overlaps this fragment, so buffered ranges never overlap.
    pub fn record_progress(
        &mut self,
        fragment: &Fragment,
        buffer_type: BufferType,
        state: FragmentState,
    ) {
        let key = fragment.key();
        let range = fragment.time_range();

        if state == FragmentState::Ok {
            let evicted: Vec<_> = self
                .entries
                .iter()
                .filter(|((other, bt), entry)| {
                    *bt == buffer_type
                        && *other != key
                        && entry.state == FragmentState::Ok
                        && entry.range.overlaps(&range)
                })
                .map(|(id, _)| *id)
                .collect();
            for id in evicted {
                debug!(fragment = %id.0, buffer = %buffer_type, "Evicting overlapped fragment");
                self.entries.remove(&id);
            }
        }

        trace!(fragment = %key, buffer = %buffer_type, ?state, "Fragment progress");
        self.entries.insert(
            (key, buffer_type),
            TrackedFragment {
                key,
                buffer_type,
                state,
                range,
            },
        );
    }

    /// Current state of a fragment, `NotLoaded` if untracked.
    pub fn state(&self, key: &FragmentKey, buffer_type: BufferType) -> FragmentState {
        self.entries
            .get(&(*key, buffer_type))
            .map(|entry| entry.state)
            .unwrap_or(FragmentState::NotLoaded)
    }

    /// Whether `time` falls inside any `Ok` entry for the buffer type.
    pub fn is_time_buffered(&self, buffer_type: BufferType, time: f64) -> bool {
        self.entries.values().any(|entry| {
            entry.buffer_type == buffer_type
                && entry.state == FragmentState::Ok
                && entry.range.contains(time)
        })
    }

    /// Drops all tracking state for a buffer type.
    pub fn remove_fragments(&mut self, buffer_type: BufferType) {
        let before = self.entries.len();
        self.entries.retain(|(_, bt), _| *bt != buffer_type);
        debug!(
            buffer = %buffer_type,
            removed = before - self.entries.len(),
            "Removed tracked fragments"
        );
    }

    /// Drops tracking state of one track for a buffer type.
    pub fn remove_track_fragments(&mut self, buffer_type: BufferType, track: TrackId) {
        self.entries
            .retain(|(key, bt), _| !(*bt == buffer_type && key.track == track));
    }

    /// Drops a single fragment's entry.
    pub fn remove_fragment(&mut self, key: &FragmentKey, buffer_type: BufferType) {
        self.entries.remove(&(*key, buffer_type));
    }

    /// Drops every entry of the buffer type overlapping a flushed range.
    pub fn remove_range(&mut self, buffer_type: BufferType, range: TimeRange) {
        self.entries
            .retain(|(_, bt), entry| !(*bt == buffer_type && entry.range.overlaps(&range)));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Merged `Ok` ranges for a buffer type, sorted by start.
    pub fn buffered_ranges(&self, buffer_type: BufferType) -> Vec<TimeRange> {
        let mut ranges: Vec<TimeRange> = self
            .entries
            .values()
            .filter(|entry| entry.buffer_type == buffer_type && entry.state == FragmentState::Ok)
            .map(|entry| entry.range)
            .collect();
        ranges.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
