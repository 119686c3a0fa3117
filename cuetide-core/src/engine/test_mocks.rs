//! Mock collaborators for testing the controller and engine.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{BufferAppendError, KeyError, LoadError};
use crate::media::{
    BufferType, DecryptData, DecryptKey, Fragment, ParsedFragment, PlaylistLevelType, TimeRange,
    Track, TrackAttributes, TrackDetails, TrackId,
};
use crate::scheduler::TickScheduler;
use crate::traits::{FragmentLoader, KeyLoader, MediaBuffer, PlaybackClock};

// Test timing constants
const MOCK_NETWORK_DELAY_MS: u64 = 5;

/// Scheduler that counts arm/disarm invocations.
#[derive(Debug, Default, Clone)]
pub struct CountingScheduler {
    pub arm_calls: usize,
    pub disarm_calls: usize,
    pub interval: Option<Duration>,
}

impl TickScheduler for CountingScheduler {
    fn arm(&mut self, interval: Duration) {
        self.arm_calls += 1;
        self.interval = Some(interval);
    }

    fn disarm(&mut self) {
        self.disarm_calls += 1;
        self.interval = None;
    }
}

/// Playback clock whose position is set by the test.
#[derive(Debug, Default)]
pub struct ManualClock {
    position: Mutex<f64>,
}

impl ManualClock {
    pub fn new(position: f64) -> Arc<Self> {
        Arc::new(Self {
            position: Mutex::new(position),
        })
    }

    pub fn set(&self, position: f64) {
        *self.position.lock() = position;
    }
}

impl PlaybackClock for ManualClock {
    fn current_time(&self) -> f64 {
        *self.position.lock()
    }
}

/// Builds contiguous subtitle details for a track.
pub fn subtitle_details(track: TrackId, count: u64, duration: f64) -> Arc<TrackDetails> {
    let fragments = (0..count)
        .map(|sn| {
            Fragment::new(
                PlaylistLevelType::Subtitle,
                track,
                sn,
                sn as f64 * duration,
                duration,
                format!("https://cdn.example.com/subs/{track}/{sn}.vtt"),
            )
        })
        .collect();
    Arc::new(TrackDetails::new(format!("https://cdn.example.com/subs/{track}.m3u8"), fragments)
        .expect("generated fragments are contiguous"))
}

/// Like `subtitle_details`, with every fragment encrypted.
pub fn encrypted_details(track: TrackId, count: u64, duration: f64) -> Arc<TrackDetails> {
    let fragments = subtitle_details(track, count, duration)
        .fragments()
        .iter()
        .cloned()
        .map(|fragment| {
            fragment.with_decrypt(DecryptData {
                method: "AES-128".to_string(),
                uri: "https://keys.example.com/k1".to_string(),
                iv: None,
            })
        })
        .collect();
    Arc::new(TrackDetails::new("https://cdn.example.com/enc.m3u8", fragments)
        .expect("generated fragments are contiguous"))
}

/// Track list with the given per-track details.
pub fn track_list(details: Vec<Option<Arc<TrackDetails>>>) -> Vec<Track> {
    details
        .into_iter()
        .enumerate()
        .map(|(index, details)| {
            let id = TrackId(index as i32);
            let attrs = TrackAttributes {
                name: format!("Track {index}"),
                language: Some(format!("l{index}")),
                default: index == 0,
            };
            Track {
                id,
                attrs,
                details,
            }
        })
        .collect()
}

/// Fragment loader returning WebVTT text, with scripted failures.
#[derive(Debug, Default)]
pub struct MockFragmentLoader {
    failures: Mutex<HashMap<u64, VecDeque<LoadError>>>,
    loaded: Mutex<Vec<Fragment>>,
}

impl MockFragmentLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next load of sequence number `sn` fail with `error`.
    pub fn fail_next(&self, sn: u64, error: LoadError) {
        self.failures.lock().entry(sn).or_default().push_back(error);
    }

    pub fn loaded(&self) -> Vec<Fragment> {
        self.loaded.lock().clone()
    }
}

#[async_trait]
impl FragmentLoader for MockFragmentLoader {
    async fn load(&self, fragment: &Fragment) -> Result<Bytes, LoadError> {
        tokio::time::sleep(Duration::from_millis(MOCK_NETWORK_DELAY_MS)).await;
        self.loaded.lock().push(fragment.clone());

        if let Some(error) = self
            .failures
            .lock()
            .get_mut(&fragment.sn)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        let body = format!(
            "WEBVTT\n\n00:00:{:06.3} --> 00:00:{:06.3}\nCue {}\n",
            fragment.start, fragment.end(), fragment.sn
        );
        Ok(Bytes::from(body))
    }
}

/// Key loader returning a fixed key, optionally failing.
#[derive(Debug, Default)]
pub struct MockKeyLoader {
    fail: Mutex<bool>,
    requests: Mutex<usize>,
}

impl MockKeyLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock()
    }
}

#[async_trait]
impl KeyLoader for MockKeyLoader {
    async fn load_key(&self, fragment: &Fragment) -> Result<DecryptKey, KeyError> {
        *self.requests.lock() += 1;
        let uri = fragment
            .decrypt
            .as_ref()
            .map(|decrypt| decrypt.uri.clone())
            .unwrap_or_default();

        if *self.fail.lock() {
            return Err(KeyError::Unavailable {
                uri,
                reason: "mock failure".to_string(),
            });
        }
        Ok(DecryptKey {
            uri,
            key: Bytes::from_static(&[7u8; 16]),
            iv: None,
        })
    }
}

/// Media buffer recording appended payloads.
#[derive(Debug, Default)]
pub struct MockMediaBuffer {
    appended: Mutex<Vec<ParsedFragment>>,
    flushed: Mutex<Vec<TimeRange>>,
    scripted: Mutex<VecDeque<BufferAppendError>>,
}

impl MockMediaBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next append fail with `error`.
    pub fn fail_next_append(&self, error: BufferAppendError) {
        self.scripted.lock().push_back(error);
    }

    pub fn appended(&self) -> Vec<ParsedFragment> {
        self.appended.lock().clone()
    }

    pub fn flushed(&self) -> Vec<TimeRange> {
        self.flushed.lock().clone()
    }
}

#[async_trait]
impl MediaBuffer for MockMediaBuffer {
    async fn append(
        &self,
        _buffer_type: BufferType,
        payload: ParsedFragment,
    ) -> Result<(), BufferAppendError> {
        if let Some(error) = self.scripted.lock().pop_front() {
            return Err(error);
        }
        self.appended.lock().push(payload);
        Ok(())
    }

    async fn flush(
        &self,
        _buffer_type: BufferType,
        range: TimeRange,
    ) -> Result<(), BufferAppendError> {
        self.flushed.lock().push(range);
        Ok(())
    }
}
