//! In-memory media buffer with an optional capacity.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use cuetide_core::error::BufferAppendError;
use cuetide_core::media::{BufferType, ParsedFragment, TimeRange, TrackId};
use cuetide_core::traits::MediaBuffer;
use parking_lot::Mutex;
use serde::Serialize;

/// One appended fragment as held by the buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferedCues {
    pub track: TrackId,
    pub sn: u64,
    pub range: TimeRange,
    pub cue_count: usize,
    pub encrypted: bool,
}

/// Counters describing everything the buffer has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferStats {
    pub appends: u64,
    pub quota_rejections: u64,
    pub flushes: u64,
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct BufferState {
    /// Keyed by start time in milliseconds.
    cues: BTreeMap<u64, BufferedCues>,
    scripted: VecDeque<BufferAppendError>,
    stats: BufferStats,
}

/// Media buffer that stores appended subtitle fragments in memory.
///
/// With a capacity set, an append that would hold more than `capacity`
/// seconds of content fails with `QuotaExceeded`, as a browser source
/// buffer does when full.
#[derive(Debug)]
pub struct InMemoryMediaBuffer {
    capacity: Option<f64>,
    state: Mutex<BufferState>,
}

impl InMemoryMediaBuffer {
    pub fn new(capacity: Option<f64>) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            state: Mutex::new(BufferState::default()),
        })
    }

    /// Makes the next append fail with `error`.
    pub fn fail_next_append(&self, error: BufferAppendError) {
        self.state.lock().scripted.push_back(error);
    }

    /// Buffered fragments ordered by start time.
    pub fn contents(&self) -> Vec<BufferedCues> {
        self.state.lock().cues.values().cloned().collect()
    }

    pub fn buffered_seconds(&self) -> f64 {
        self.state
            .lock()
            .cues
            .values()
            .map(|cues| cues.range.duration())
            .sum()
    }

    pub fn cue_count(&self) -> usize {
        self.state.lock().cues.values().map(|c| c.cue_count).sum()
    }

    pub fn stats(&self) -> BufferStats {
        self.state.lock().stats.clone()
    }
}

fn start_key(time: f64) -> u64 {
    (time.max(0.0) * 1000.0).round() as u64
}

#[async_trait]
impl MediaBuffer for InMemoryMediaBuffer {
    async fn append(
        &self,
        buffer_type: BufferType,
        payload: ParsedFragment,
    ) -> Result<(), BufferAppendError> {
        let mut state = self.state.lock();
        if let Some(error) = state.scripted.pop_front() {
            if matches!(error, BufferAppendError::QuotaExceeded { .. }) {
                state.stats.quota_rejections += 1;
            }
            return Err(error);
        }

        if !payload.text.starts_with("WEBVTT") {
            return Err(BufferAppendError::Rejected {
                buffer_type,
                reason: format!("fragment {} is not WebVTT", payload.fragment.sn),
            });
        }

        let range = payload.fragment.time_range();
        let key = start_key(range.start);
        let held: f64 = state
            .cues
            .iter()
            .filter(|(start, _)| **start != key)
            .map(|(_, cues)| cues.range.duration())
            .sum();
        if let Some(capacity) = self.capacity
            && held + range.duration() > capacity
        {
            state.stats.quota_rejections += 1;
            tracing::debug!(held, capacity, sn = payload.fragment.sn, "Simulated buffer full");
            return Err(BufferAppendError::QuotaExceeded { buffer_type });
        }

        state.stats.appends += 1;
        state.cues.insert(
            key,
            BufferedCues {
                track: payload.fragment.track,
                sn: payload.fragment.sn,
                range,
                cue_count: payload.text.matches(" --> ").count(),
                encrypted: payload.key.is_some(),
            },
        );
        Ok(())
    }

    async fn flush(
        &self,
        _buffer_type: BufferType,
        range: TimeRange,
    ) -> Result<(), BufferAppendError> {
        let mut state = self.state.lock();
        let before = state.cues.len();
        state.cues.retain(|_, cues| !cues.range.overlaps(&range));
        let evicted = (before - state.cues.len()) as u64;

        state.stats.flushes += 1;
        state.stats.evicted += evicted;
        tracing::debug!(start = range.start, end = range.end, evicted, "Simulated buffer flush");
        Ok(())
    }
}
