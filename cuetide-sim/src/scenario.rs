//! JSON scenario files describing a simulated presentation.

use std::path::Path;
use std::sync::Arc;

use cuetide_core::media::{
    DecryptData, Fragment, PlaylistLevelType, Track, TrackAttributes, TrackDetails, TrackId,
};
use serde::{Deserialize, Serialize};

use crate::SimulationError;

const DEFAULT_ENCRYPTION_METHOD: &str = "AES-128";

/// A presentation with its subtitle tracks and simulated environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Prefix for generated playlist, fragment and key URLs
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Playback seconds advanced per wall-clock second
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
    /// Media buffer capacity in seconds of content; unlimited when absent
    #[serde(default)]
    pub buffer_capacity: Option<f64>,
    /// Delay before a selected track's details arrive
    #[serde(default)]
    pub playlist_latency_ms: u64,
    pub tracks: Vec<TrackSpec>,
}

/// One subtitle rendition in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub default: bool,
    pub fragment_count: u64,
    pub fragment_duration: f64,
    #[serde(default)]
    pub encrypted: bool,
    /// Encryption method advertised in the decrypt data
    #[serde(default)]
    pub encryption_method: Option<String>,
}

fn default_base_url() -> String {
    "https://cdn.example.com".to_string()
}

fn default_playback_rate() -> f64 {
    1.0
}

impl Scenario {
    /// Parses and validates a scenario from JSON text.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Json` - Malformed JSON or missing fields
    /// - `SimulationError::Scenario` - Values that cannot describe a presentation
    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads a scenario file.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Io` - File could not be read
    /// - `SimulationError::Json` - Malformed JSON or missing fields
    /// - `SimulationError::Scenario` - Values that cannot describe a presentation
    pub fn load(path: &Path) -> Result<Self, SimulationError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Built-in two-language scenario used when no file is given.
    pub fn sample() -> Self {
        Self {
            name: "sample".to_string(),
            base_url: default_base_url(),
            playback_rate: 4.0,
            buffer_capacity: None,
            playlist_latency_ms: 20,
            tracks: vec![
                TrackSpec {
                    name: "English".to_string(),
                    language: Some("en".to_string()),
                    default: true,
                    fragment_count: 100,
                    fragment_duration: 6.0,
                    encrypted: false,
                    encryption_method: None,
                },
                TrackSpec {
                    name: "Deutsch".to_string(),
                    language: Some("de".to_string()),
                    default: false,
                    fragment_count: 100,
                    fragment_duration: 6.0,
                    encrypted: true,
                    encryption_method: None,
                },
            ],
        }
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Scenario` - No tracks, empty or non-finite
    ///   durations, or a non-positive playback rate or capacity
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.tracks.is_empty() {
            return Err(invalid("scenario has no tracks"));
        }
        if !(self.playback_rate.is_finite() && self.playback_rate > 0.0) {
            return Err(invalid("playback_rate must be positive"));
        }
        if let Some(capacity) = self.buffer_capacity
            && !(capacity.is_finite() && capacity > 0.0)
        {
            return Err(invalid("buffer_capacity must be positive"));
        }
        for (index, track) in self.tracks.iter().enumerate() {
            if !(track.fragment_duration.is_finite() && track.fragment_duration > 0.0) {
                return Err(invalid(&format!(
                    "track {index} fragment_duration must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Track list as published to the engine, without details.
    pub fn tracks(&self) -> Vec<Track> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                Track::new(
                    TrackId(index as i32),
                    TrackAttributes {
                        name: spec.name.clone(),
                        language: spec.language.clone(),
                        default: spec.default,
                    },
                )
            })
            .collect()
    }

    /// Fragment list for one track.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Scenario` - Id does not name a track
    pub fn details(&self, id: TrackId) -> Result<Arc<TrackDetails>, SimulationError> {
        let spec = id
            .as_index()
            .and_then(|index| self.tracks.get(index))
            .ok_or_else(|| invalid(&format!("track {id} is not part of the scenario")))?;

        let track_url = format!("{}/subs/{}", self.base_url, id);
        let fragments = (0..spec.fragment_count)
            .map(|sn| {
                let fragment = Fragment::new(
                    PlaylistLevelType::Subtitle,
                    id,
                    sn,
                    sn as f64 * spec.fragment_duration,
                    spec.fragment_duration,
                    format!("{track_url}/{sn}.vtt"),
                );
                if spec.encrypted {
                    fragment.with_decrypt(DecryptData {
                        method: spec
                            .encryption_method
                            .clone()
                            .unwrap_or_else(|| DEFAULT_ENCRYPTION_METHOD.to_string()),
                        uri: format!("{}/keys/{}.key", self.base_url, id),
                        iv: None,
                    })
                } else {
                    fragment
                }
            })
            .collect();

        let details = TrackDetails::new(format!("{track_url}/index.m3u8"), fragments)?;
        Ok(Arc::new(details))
    }

    /// Presentation length of the longest track, in seconds.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(|track| track.fragment_count as f64 * track.fragment_duration)
            .fold(0.0, f64::max)
    }
}

fn invalid(reason: &str) -> SimulationError {
    SimulationError::Scenario {
        reason: reason.to_string(),
    }
}
