//! Track and fragment data model.
//!
//! Tracks are the selectable renditions handed in by the playlist layer;
//! fragments are the independently loadable pieces of a track's timeline.
//! Both are validated when they cross into the core so the scheduler can rely
//! on ordered, non-overlapping fragment lists.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Positional identifier of a track inside the current track list.
///
/// `TrackId::NONE` (-1) is the "no active track" selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub i32);

impl TrackId {
    /// Selection value meaning no track is active.
    pub const NONE: TrackId = TrackId(-1);

    /// Creates TrackId from a raw integer id.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the list index this id points at, if it is non-negative.
    pub fn as_index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// Returns true for the `NONE` selection.
    pub fn is_none(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playlist level a fragment was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistLevelType {
    Main,
    Audio,
    Subtitle,
}

/// Media buffer channel a fragment's payload is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferType {
    Audio,
    Video,
    Subtitle,
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferType::Audio => write!(f, "audio"),
            BufferType::Video => write!(f, "video"),
            BufferType::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Half-open time range `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Creates a range from start and end in seconds.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether `time` falls within `[start, end)`.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    /// Whether the two ranges share any interior point.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Presentation attributes of a track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAttributes {
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// Encryption parameters for a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptData {
    /// Encryption method, e.g. `AES-128`.
    pub method: String,
    /// Location of the key.
    pub uri: String,
    #[serde(default)]
    pub iv: Option<[u8; 16]>,
}

/// Key material resolved for an encrypted fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptKey {
    pub uri: String,
    pub key: Bytes,
    pub iv: Option<[u8; 16]>,
}

/// Identity of a fragment: the (track, level type, sequence number) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentKey {
    pub level_type: PlaylistLevelType,
    pub track: TrackId,
    pub sn: u64,
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}#{}", self.level_type, self.track, self.sn)
    }
}

/// One independently loadable segment of a track's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub level_type: PlaylistLevelType,
    pub track: TrackId,
    pub sn: u64,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub url: String,
    #[serde(default)]
    pub decrypt: Option<DecryptData>,
}

impl Fragment {
    pub fn new(
        level_type: PlaylistLevelType,
        track: TrackId,
        sn: u64,
        start: f64,
        duration: f64,
        url: impl Into<String>,
    ) -> Self {
        Self {
            level_type,
            track,
            sn,
            start,
            duration,
            url: url.into(),
            decrypt: None,
        }
    }

    /// Marks the fragment as encrypted with the given parameters.
    pub fn with_decrypt(mut self, decrypt: DecryptData) -> Self {
        self.decrypt = Some(decrypt);
        self
    }

    pub fn key(&self) -> FragmentKey {
        FragmentKey {
            level_type: self.level_type,
            track: self.track,
            sn: self.sn,
        }
    }

    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end())
    }

    /// Midpoint of the fragment, used for coverage checks that must tolerate
    /// small boundary drift between playlist refreshes.
    pub fn midpoint(&self) -> f64 {
        self.start + self.duration / 2.0
    }

    pub fn is_encrypted(&self) -> bool {
        self.decrypt.is_some()
    }
}

/// Fragment-list metadata for one track.
///
/// Fragments are ordered by sequence number and start time; sequence
/// numbers are contiguous so the fragment following `sn` is `sn + 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDetails {
    pub url: String,
    fragments: Vec<Fragment>,
}

impl TrackDetails {
    /// Validates and wraps a fragment list.
    ///
    /// # Errors
    ///
    /// - `StreamError::InvalidDetails` - Non-contiguous sequence numbers,
    ///   negative durations, or fragments out of start-time order
    pub fn new(url: impl Into<String>, fragments: Vec<Fragment>) -> Result<Self, StreamError> {
        for fragment in &fragments {
            if fragment.duration.is_nan() || fragment.duration < 0.0 || !fragment.start.is_finite() {
                return Err(StreamError::InvalidDetails {
                    reason: format!("fragment {} has invalid timing", fragment.sn),
                });
            }
        }
        for pair in fragments.windows(2) {
            if pair[1].sn != pair[0].sn + 1 {
                return Err(StreamError::InvalidDetails {
                    reason: format!(
                        "sequence numbers not contiguous: {} followed by {}",
                        pair[0].sn, pair[1].sn
                    ),
                });
            }
            if pair[1].start < pair[0].start {
                return Err(StreamError::InvalidDetails {
                    reason: format!("fragment {} starts before its predecessor", pair[1].sn),
                });
            }
        }

        Ok(Self {
            url: url.into(),
            fragments,
        })
    }

    /// Details with no fragments yet.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fragments: Vec::new(),
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Sequence number of the first fragment.
    pub fn start_sn(&self) -> Option<u64> {
        self.fragments.first().map(|f| f.sn)
    }

    /// Total playable duration covered by the fragment list.
    pub fn total_duration(&self) -> f64 {
        match (self.fragments.first(), self.fragments.last()) {
            (Some(first), Some(last)) => last.end() - first.start,
            _ => 0.0,
        }
    }

    pub fn fragment_by_sn(&self, sn: u64) -> Option<&Fragment> {
        let start = self.start_sn()?;
        let index = usize::try_from(sn.checked_sub(start)?).ok()?;
        self.fragments.get(index)
    }

    /// The fragment immediately following `sn` in playback order.
    pub fn fragment_after(&self, sn: u64) -> Option<&Fragment> {
        self.fragment_by_sn(sn.checked_add(1)?)
    }

    /// Finds the fragment covering `position`.
    ///
    /// A position within `tolerance` of a fragment's end belongs to the next
    /// fragment. Positions before the first fragment select the first one;
    /// positions past the last fragment select nothing.
    pub fn fragment_at(&self, position: f64, tolerance: f64) -> Option<&Fragment> {
        let first = self.fragments.first()?;
        if position < first.start {
            return Some(first);
        }

        // Index of the first fragment whose end lies beyond the lookup point.
        let index = self
            .fragments
            .partition_point(|fragment| fragment.end() - tolerance <= position);

        // A position inside a timeline gap resolves to the fragment after it.
        self.fragments.get(index)
    }
}

/// A selectable rendition with its fragment-list metadata.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub attrs: TrackAttributes,
    /// Absent until the track's playlist has been loaded.
    pub details: Option<Arc<TrackDetails>>,
}

impl Track {
    pub fn new(id: TrackId, attrs: TrackAttributes) -> Self {
        Self {
            id,
            attrs,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Arc<TrackDetails>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Loaded fragment data ready to be appended to a media buffer.
#[derive(Debug, Clone)]
pub struct ParsedFragment {
    pub fragment: Fragment,
    /// Decoded text of the fragment.
    pub text: String,
    pub key: Option<DecryptKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(count: u64, duration: f64) -> TrackDetails {
        let fragments = (0..count)
            .map(|sn| {
                Fragment::new(
                    PlaylistLevelType::Subtitle,
                    TrackId(0),
                    sn,
                    sn as f64 * duration,
                    duration,
                    format!("sub/{sn}.vtt"),
                )
            })
            .collect();
        TrackDetails::new("sub.m3u8", fragments).unwrap()
    }

    #[test]
    fn test_track_id_index() {
        assert_eq!(TrackId(3).as_index(), Some(3));
        assert_eq!(TrackId::NONE.as_index(), None);
        assert!(TrackId::NONE.is_none());
    }

    #[test]
    fn test_fragment_at_position() {
        let details = details(5, 10.0);
        assert_eq!(details.fragment_at(0.0, 0.25).unwrap().sn, 0);
        assert_eq!(details.fragment_at(15.0, 0.25).unwrap().sn, 1);
        assert_eq!(details.fragment_at(49.0, 0.25).unwrap().sn, 4);
        assert!(details.fragment_at(50.0, 0.25).is_none());
    }

    #[test]
    fn test_fragment_at_tolerance_selects_next() {
        let details = details(5, 10.0);
        // 19.9 is within the 0.25s tolerance of fragment 1's end.
        assert_eq!(details.fragment_at(19.9, 0.25).unwrap().sn, 2);
        assert_eq!(details.fragment_at(19.5, 0.25).unwrap().sn, 1);
    }

    #[test]
    fn test_fragment_at_before_first() {
        let fragments = vec![Fragment::new(
            PlaylistLevelType::Subtitle,
            TrackId(0),
            7,
            100.0,
            10.0,
            "a.vtt",
        )];
        let details = TrackDetails::new("", fragments).unwrap();
        assert_eq!(details.fragment_at(3.0, 0.25).unwrap().sn, 7);
    }

    #[test]
    fn test_fragment_after_uses_sequence_numbers() {
        let details = details(3, 4.0);
        assert_eq!(details.fragment_after(0).unwrap().sn, 1);
        assert!(details.fragment_after(2).is_none());
        assert!(details.fragment_by_sn(99).is_none());
    }

    #[test]
    fn test_details_rejects_gapped_sequence() {
        let fragments = vec![
            Fragment::new(PlaylistLevelType::Subtitle, TrackId(0), 0, 0.0, 4.0, "a"),
            Fragment::new(PlaylistLevelType::Subtitle, TrackId(0), 2, 4.0, 4.0, "b"),
        ];
        let result = TrackDetails::new("", fragments);
        assert!(matches!(result, Err(StreamError::InvalidDetails { .. })));
    }

    #[test]
    fn test_details_rejects_negative_duration() {
        let fragments = vec![Fragment::new(
            PlaylistLevelType::Subtitle,
            TrackId(0),
            0,
            0.0,
            -1.0,
            "a",
        )];
        assert!(TrackDetails::new("", fragments).is_err());
    }

    #[test]
    fn test_time_range_overlap() {
        let a = TimeRange::new(0.0, 10.0);
        assert!(a.overlaps(&TimeRange::new(9.0, 12.0)));
        assert!(!a.overlaps(&TimeRange::new(10.0, 12.0)));
        assert!(a.contains(0.0));
        assert!(!a.contains(10.0));
    }
}
