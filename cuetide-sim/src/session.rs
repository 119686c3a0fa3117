//! End-to-end simulated playback sessions.

use std::time::Duration;

use cuetide_core::StreamEvent;
use cuetide_core::config::CuetideConfig;
use cuetide_core::controller::{ControllerSnapshot, State};
use cuetide_core::engine::{Collaborators, spawn_stream_engine};
use cuetide_core::media::TrackId;
use cuetide_core::traits::PlaybackClock;
use serde::Serialize;
use tokio::time::{Instant, sleep_until};

use crate::SimulationError;
use crate::buffer::{BufferStats, InMemoryMediaBuffer};
use crate::loader::{SimulatedFragmentLoader, SimulatedKeyLoader};
use crate::playback::SimulatedPlayback;
use crate::rng::DeterministicRng;
use crate::scenario::Scenario;

/// What to do during a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Track selected once media is attached
    pub track: TrackId,
    /// Position to seek to halfway through the session
    pub seek: Option<f64>,
    /// Wall-clock (tokio) length of the session
    pub duration: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            track: TrackId(0),
            seek: None,
            duration: Duration::from_secs(5),
        }
    }
}

/// Outcome of a simulated session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub scenario: String,
    pub seed: u64,
    pub track: TrackId,
    pub final_position: f64,
    /// Sequence numbers in the order they were buffered
    pub fragments_buffered: Vec<u64>,
    pub fragments_skipped: Vec<u64>,
    pub state_transitions: usize,
    pub entered_error: usize,
    pub fatal: Option<String>,
    pub load_requests: u64,
    pub load_failures: u64,
    pub key_requests: u64,
    pub cues_buffered: usize,
    pub buffer: BufferStats,
    pub controller: ControllerSnapshot,
}

#[derive(Debug, Default)]
struct EventLog {
    buffered: Vec<u64>,
    skipped: Vec<u64>,
    transitions: usize,
    entered_error: usize,
    fatal: Option<String>,
}

impl EventLog {
    fn record(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::StateChanged { to, .. } => {
                self.transitions += 1;
                if to == State::Error {
                    self.entered_error += 1;
                }
            }
            StreamEvent::FragmentLoading { .. } => {}
            StreamEvent::FragmentBuffered { fragment, .. } => self.buffered.push(fragment.sn),
            StreamEvent::FragmentSkipped { fragment, .. } => self.skipped.push(fragment.sn),
            StreamEvent::Fatal { error } => self.fatal = Some(error.to_string()),
        }
    }
}

/// Runs one playback session of `scenario` against simulated collaborators.
///
/// Media is attached, the track list published and `options.track`
/// selected; its details arrive after the scenario's playlist latency.
/// The session ends after `options.duration` or on a fatal error.
///
/// # Errors
///
/// - `SimulationError::Scenario` - Invalid scenario or unknown track
/// - `SimulationError::Stream` - Engine stopped unexpectedly
pub async fn run_session(
    scenario: &Scenario,
    config: &CuetideConfig,
    options: &SessionOptions,
) -> Result<SessionReport, SimulationError> {
    scenario.validate()?;
    let details = scenario.details(options.track)?;

    let seed = config
        .simulation
        .deterministic_seed
        .unwrap_or_else(rand::random);
    let mut rng = DeterministicRng::from_seed(seed);
    let loader = SimulatedFragmentLoader::new(&config.simulation, rng.fork());
    let key_loader = SimulatedKeyLoader::new(&config.simulation, rng.fork());
    let buffer = InMemoryMediaBuffer::new(scenario.buffer_capacity);
    let playback = SimulatedPlayback::start(0.0, scenario.playback_rate, scenario.duration());

    tracing::info!(
        scenario = %scenario.name,
        seed,
        track = %options.track,
        "Starting simulated session"
    );

    let (handle, mut events) = spawn_stream_engine(
        config.clone(),
        Collaborators {
            loader: loader.clone(),
            key_loader: key_loader.clone(),
            buffer: buffer.clone(),
        },
    );

    handle.media_attached(playback.clone()).await?;
    handle.tracks_updated(scenario.tracks()).await?;
    handle.switch_track(options.track).await?;

    let started = Instant::now();
    let deadline = started + options.duration;
    let mut details_at = Some(started + Duration::from_millis(scenario.playlist_latency_ms));
    let mut seek = options
        .seek
        .map(|position| (started + options.duration / 2, position));
    let mut log = EventLog::default();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                log.record(event);
                if log.fatal.is_some() {
                    break;
                }
            }
            _ = sleep_until(details_at.unwrap_or(deadline)), if details_at.is_some() => {
                details_at = None;
                handle.track_details_loaded(options.track, details.clone()).await?;
            }
            _ = sleep_until(seek.map_or(deadline, |(at, _)| at)), if seek.is_some() => {
                if let Some((_, position)) = seek.take() {
                    tracing::info!(position, "Seeking");
                    playback.seek(position);
                    handle.media_seeking().await?;
                }
            }
            _ = sleep_until(deadline) => break,
        }
    }

    let controller = handle.snapshot().await?;
    handle.shutdown().await?;

    Ok(SessionReport {
        scenario: scenario.name.clone(),
        seed,
        track: options.track,
        final_position: playback.current_time(),
        fragments_buffered: log.buffered,
        fragments_skipped: log.skipped,
        state_transitions: log.transitions,
        entered_error: log.entered_error,
        fatal: log.fatal,
        load_requests: loader.requests(),
        load_failures: loader.failures(),
        key_requests: key_loader.requests(),
        cues_buffered: buffer.cue_count(),
        buffer: buffer.stats(),
        controller,
    })
}
