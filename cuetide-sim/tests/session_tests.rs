//! End-to-end sessions against the simulated collaborators.
//!
//! All tests run on tokio's paused clock, so playback, ticks, latency and
//! retry backoff advance virtually and sessions finish immediately.

use std::time::Duration;

use cuetide_core::config::{CuetideConfig, SimulationConfig};
use cuetide_core::controller::State;
use cuetide_core::media::TrackId;
use cuetide_sim::{Scenario, SessionOptions, SimulationError, TrackSpec, run_session};

fn config() -> CuetideConfig {
    CuetideConfig {
        simulation: SimulationConfig::deterministic_testing(),
        ..CuetideConfig::default()
    }
}

fn single_track(capacity: Option<f64>) -> Scenario {
    Scenario {
        name: "single".to_string(),
        base_url: "https://cdn.example.com".to_string(),
        playback_rate: 4.0,
        buffer_capacity: capacity,
        playlist_latency_ms: 0,
        tracks: vec![TrackSpec {
            name: "English".to_string(),
            language: Some("en".to_string()),
            default: true,
            fragment_count: 50,
            fragment_duration: 6.0,
            encrypted: false,
            encryption_method: None,
        }],
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_buffers_in_order() {
    let report = run_session(&Scenario::sample(), &config(), &SessionOptions::default())
        .await
        .unwrap();

    assert!(report.fatal.is_none());
    assert_eq!(report.seed, 42);
    assert_eq!(report.fragments_buffered.first(), Some(&0));
    assert!(report.fragments_buffered.windows(2).all(|w| w[1] == w[0] + 1));
    assert!(report.cues_buffered > 0);
    assert_eq!(report.key_requests, 0);
    assert_eq!(report.controller.active_track, TrackId(0));
}

#[tokio::test(start_paused = true)]
async fn test_buffer_stays_within_look_ahead() {
    let report = run_session(&Scenario::sample(), &config(), &SessionOptions::default())
        .await
        .unwrap();

    let horizon = report.final_position + 30.0;
    let last = *report.fragments_buffered.last().unwrap();
    assert!((last as f64) * 6.0 < horizon);
}

#[tokio::test(start_paused = true)]
async fn test_encrypted_track_resolves_keys() {
    let options = SessionOptions {
        track: TrackId(1),
        ..SessionOptions::default()
    };

    let report = run_session(&Scenario::sample(), &config(), &options)
        .await
        .unwrap();

    assert!(report.fatal.is_none());
    assert!(!report.fragments_buffered.is_empty());
    assert!(report.key_requests >= report.fragments_buffered.len() as u64);
}

#[tokio::test(start_paused = true)]
async fn test_seek_moves_buffering() {
    let options = SessionOptions {
        seek: Some(300.0),
        ..SessionOptions::default()
    };

    let report = run_session(&Scenario::sample(), &config(), &options)
        .await
        .unwrap();

    assert!(report.fragments_buffered.contains(&50));
    assert!(
        report
            .controller
            .buffered
            .iter()
            .any(|range| range.contains(300.0))
    );
    assert!(report.final_position >= 300.0);
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_replays_identically() {
    let mut config = config();
    config.simulation.load_failure_rate = 0.3;
    config.simulation.deterministic_seed = Some(1234);

    let first = run_session(&Scenario::sample(), &config, &SessionOptions::default())
        .await
        .unwrap();
    let second = run_session(&Scenario::sample(), &config, &SessionOptions::default())
        .await
        .unwrap();

    assert_eq!(first.fragments_buffered, second.fragments_buffered);
    assert_eq!(first.load_failures, second.load_failures);
    assert_eq!(first.load_requests, second.load_requests);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_cdn_is_fatal_without_fallback() {
    let mut config = config();
    config.simulation.load_failure_rate = 1.0;
    let options = SessionOptions {
        duration: Duration::from_secs(60),
        ..SessionOptions::default()
    };

    let report = run_session(&single_track(None), &config, &options)
        .await
        .unwrap();

    assert!(report.fatal.is_some());
    assert!(report.fragments_buffered.is_empty());
    assert_eq!(report.load_failures, report.load_requests);
    assert_eq!(report.controller.state, State::Error);
    assert!(!report.controller.armed);
}

#[tokio::test(start_paused = true)]
async fn test_full_buffer_is_flushed() {
    let options = SessionOptions {
        duration: Duration::from_secs(10),
        ..SessionOptions::default()
    };

    let report = run_session(&single_track(Some(24.0)), &config(), &options)
        .await
        .unwrap();

    assert!(report.fatal.is_none());
    assert!(report.buffer.quota_rejections > 0);
    assert!(report.buffer.flushes > 0);
    assert!(report.buffer.evicted > 0);
    assert!(report.fragments_buffered.len() > 4);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_track_rejected() {
    let options = SessionOptions {
        track: TrackId(5),
        ..SessionOptions::default()
    };

    let result = run_session(&Scenario::sample(), &config(), &options).await;

    assert!(matches!(result, Err(SimulationError::Scenario { .. })));
}
