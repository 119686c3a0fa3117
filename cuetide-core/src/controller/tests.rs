use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::engine::test_mocks::{
    CountingScheduler, ManualClock, encrypted_details, subtitle_details, track_list,
};
use crate::media::{BufferType, PlaylistLevelType};

struct Fixture {
    controller: StreamController<CountingScheduler>,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new() -> Self {
        let mut config = CuetideConfig::default();
        config.retry.max_attempts = 2;
        config.retry.base_delay = Duration::from_millis(100);
        Self::with_config(config)
    }

    fn with_config(config: CuetideConfig) -> Self {
        let clock = ManualClock::new(0.0);
        let mut controller = StreamController::new(&config, CountingScheduler::default());
        controller.on_media_attached(clock.clone());
        Self { controller, clock }
    }

    /// Two tracks, track 0 with ten 10s fragments; track 0 active.
    fn playing() -> Self {
        let mut fixture = Self::new();
        fixture.controller.on_tracks_updated(track_list(vec![
            Some(subtitle_details(TrackId(0), 10, 10.0)),
            Some(subtitle_details(TrackId(1), 10, 10.0)),
        ]));
        fixture.controller.on_track_switch(TrackId(0));
        fixture.controller.drain_requests();
        fixture
    }

    fn tick_for_load(&mut self) -> (LoadTicket, Fragment) {
        self.controller.tick();
        take_load(&mut self.controller).expect("tick should request a fragment")
    }

    /// Drives one unencrypted fragment from request to buffered.
    fn buffer_next(&mut self) -> Fragment {
        let (ticket, fragment) = self.tick_for_load();
        self.controller
            .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n")));
        let (append_ticket, _) = take_append(&mut self.controller).expect("append requested");
        self.controller.on_buffer_appended(append_ticket, Ok(()));
        fragment
    }
}

fn take_load(controller: &mut StreamController<CountingScheduler>) -> Option<(LoadTicket, Fragment)> {
    controller
        .drain_requests()
        .into_iter()
        .find_map(|request| match request {
            StreamRequest::LoadFragment { ticket, fragment } => Some((ticket, fragment)),
            _ => None,
        })
}

fn take_append(
    controller: &mut StreamController<CountingScheduler>,
) -> Option<(LoadTicket, ParsedFragment)> {
    controller
        .drain_requests()
        .into_iter()
        .find_map(|request| match request {
            StreamRequest::Append {
                ticket, payload, ..
            } => Some((ticket, payload)),
            _ => None,
        })
}

fn events(requests: &[StreamRequest]) -> Vec<StreamEvent> {
    requests
        .iter()
        .filter_map(|request| match request {
            StreamRequest::Notify(event) => Some(event.clone()),
            _ => None,
        })
        .collect()
}

fn load_error() -> LoadError {
    LoadError::Network {
        url: "sub.vtt".to_string(),
        reason: "connection reset".to_string(),
    }
}

#[test]
fn test_media_attach_enters_idle() {
    let fixture = Fixture::new();
    assert_eq!(fixture.controller.state(), State::Idle);
}

#[test]
fn test_tracks_updated_replaces_list() {
    let mut fixture = Fixture::new();
    let input = track_list(vec![Some(Arc::new(TrackDetails::empty(""))), None]);

    fixture.controller.on_tracks_updated(input.clone());

    let tracks = fixture.controller.tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].id, input[0].id);
    assert_eq!(tracks[0].attrs, input[0].attrs);
    assert!(Arc::ptr_eq(
        tracks[0].details.as_ref().unwrap(),
        input[0].details.as_ref().unwrap()
    ));
    assert!(tracks[1].details.is_none());
}

#[test]
fn test_switch_with_details_arms_once() {
    let mut fixture = Fixture::new();
    fixture.controller.on_tracks_updated(track_list(vec![
        Some(Arc::new(TrackDetails::empty(""))),
        None,
    ]));

    fixture.controller.on_track_switch(TrackId(0));
    fixture.controller.on_track_switch(TrackId(0));

    assert_eq!(fixture.controller.scheduler().arm_calls, 1);
    assert_eq!(fixture.controller.scheduler().disarm_calls, 0);
}

#[test]
fn test_switch_with_no_tracks_disarms() {
    let mut fixture = Fixture::new();
    fixture.controller.on_tracks_updated(track_list(vec![
        Some(Arc::new(TrackDetails::empty(""))),
        None,
    ]));
    fixture.controller.on_track_switch(TrackId(0));

    fixture.controller.on_tracks_updated(Vec::new());
    fixture.controller.on_track_switch(TrackId(0));

    assert_eq!(fixture.controller.scheduler().disarm_calls, 1);
    assert_eq!(fixture.controller.scheduler().arm_calls, 1);
    assert_eq!(fixture.controller.active_track(), TrackId::NONE);
}

#[test]
fn test_switch_to_none_disarms() {
    let mut fixture = Fixture::new();
    fixture.controller.on_tracks_updated(track_list(vec![
        Some(Arc::new(TrackDetails::empty(""))),
        None,
    ]));
    fixture.controller.on_track_switch(TrackId(0));

    fixture.controller.on_track_switch(TrackId::NONE);

    assert_eq!(fixture.controller.scheduler().disarm_calls, 1);
    assert_eq!(fixture.controller.active_track(), TrackId::NONE);
}

#[test]
fn test_details_for_current_track_attached() {
    let mut fixture = Fixture::new();
    fixture
        .controller
        .on_tracks_updated(track_list(vec![Some(Arc::new(TrackDetails::empty(""))), None]));
    fixture.controller.on_track_switch(TrackId(1));

    let details = Arc::new(TrackDetails::empty("foo"));
    fixture
        .controller
        .on_track_details_loaded(TrackId(1), details.clone());

    let attached = fixture.controller.tracks()[1].details.as_ref().unwrap();
    assert!(Arc::ptr_eq(attached, &details));
    assert_eq!(fixture.controller.scheduler().arm_calls, 1);
}

#[test]
fn test_details_for_other_track_ignored() {
    let mut fixture = Fixture::new();
    fixture
        .controller
        .on_tracks_updated(track_list(vec![None, None]));
    fixture.controller.on_track_switch(TrackId(1));

    let details = Arc::new(TrackDetails::empty("foo"));
    fixture
        .controller
        .on_track_details_loaded(TrackId(0), details);

    assert!(fixture.controller.tracks()[0].details.is_none());
    assert_eq!(fixture.controller.scheduler().arm_calls, 0);
}

#[test]
fn test_details_with_empty_registry_ignored() {
    let mut fixture = Fixture::new();

    fixture
        .controller
        .on_track_details_loaded(TrackId(0), Arc::new(TrackDetails::empty("foo")));

    assert!(fixture.controller.tracks().is_empty());
    assert_eq!(fixture.controller.scheduler().arm_calls, 0);
    assert_eq!(fixture.controller.scheduler().disarm_calls, 0);
}

#[test]
fn test_seeking_away_clears_frag_previous() {
    let mut fixture = Fixture::new();
    fixture.controller.frag_current = Some(Fragment::new(
        PlaylistLevelType::Main,
        TrackId(0),
        0,
        1000.0,
        10.0,
        "",
    ));
    fixture.controller.frag_previous = Some(Fragment::new(
        PlaylistLevelType::Main,
        TrackId(0),
        0,
        0.0,
        0.0,
        "",
    ));

    fixture.controller.on_media_seeking();

    assert!(fixture.controller.frag_previous().is_none());
}

#[test]
fn test_seeking_within_current_keeps_frag_previous() {
    let mut fixture = Fixture::playing();
    let first = fixture.buffer_next();
    let (_, second) = fixture.tick_for_load();
    fixture.clock.set(second.start + 1.0);

    fixture.controller.on_media_seeking();

    assert_eq!(fixture.controller.frag_previous().unwrap().sn, first.sn);
    assert_eq!(fixture.controller.frag_current().unwrap().sn, second.sn);
}

#[test]
fn test_seek_during_load_keeps_in_flight_result() {
    let mut fixture = Fixture::playing();
    fixture.buffer_next();
    let (ticket, loading) = fixture.tick_for_load();

    fixture.clock.set(75.0);
    fixture.controller.on_media_seeking();
    assert!(fixture.controller.frag_previous().is_none());
    assert_eq!(fixture.controller.frag_current().unwrap().sn, loading.sn);

    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n")));
    let (append_ticket, _) = take_append(&mut fixture.controller).unwrap();
    fixture.controller.on_buffer_appended(append_ticket, Ok(()));

    // The successor of `loading` ends before the new position.
    let (_, next) = fixture.tick_for_load();
    assert_eq!(next.sn, 7);
}

#[test]
fn test_backward_seek_during_load_restarts_at_position() {
    let mut fixture = Fixture::playing();
    fixture.clock.set(50.0);
    fixture.controller.on_media_seeking();
    let (ticket, loading) = take_load(&mut fixture.controller).unwrap();
    assert_eq!(loading.sn, 5);

    fixture.clock.set(0.0);
    fixture.controller.on_media_seeking();
    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n")));
    let (append_ticket, _) = take_append(&mut fixture.controller).unwrap();
    fixture.controller.on_buffer_appended(append_ticket, Ok(()));

    assert!(fixture.controller.frag_previous().is_none());
    let (_, next) = fixture.tick_for_load();
    assert_eq!(next.sn, 0);
}

#[test]
fn test_chain_beyond_look_ahead_falls_back_to_position() {
    let mut fixture = Fixture::playing();
    for _ in 0..3 {
        fixture.buffer_next();
    }

    // New details drop the buffered state but keep the chain at sn 2.
    fixture
        .controller
        .on_track_details_loaded(TrackId(0), subtitle_details(TrackId(0), 10, 10.0));
    assert_eq!(fixture.controller.frag_previous().unwrap().sn, 2);

    let (_, next) = fixture.tick_for_load();
    assert_eq!(next.sn, 0);
}

#[test]
fn test_seek_without_clock_clears_frag_previous() {
    let mut fixture = Fixture::playing();
    fixture.buffer_next();
    fixture.controller.clock = None;

    fixture.controller.on_media_seeking();

    assert!(fixture.controller.frag_previous().is_none());
}

#[test]
fn test_tick_without_active_track_waits() {
    let mut fixture = Fixture::new();
    fixture
        .controller
        .on_tracks_updated(track_list(vec![Some(subtitle_details(TrackId(0), 3, 10.0))]));

    fixture.controller.tick();

    assert_eq!(fixture.controller.state(), State::WaitingTrack);
    assert!(take_load(&mut fixture.controller).is_none());
}

#[test]
fn test_deselecting_track_waits() {
    let mut fixture = Fixture::playing();

    fixture.controller.on_track_switch(TrackId::NONE);
    assert_eq!(fixture.controller.state(), State::WaitingTrack);

    fixture.controller.on_track_switch(TrackId(0));
    assert_eq!(fixture.controller.state(), State::Idle);

    fixture.controller.on_track_switch(TrackId(9));
    assert_eq!(fixture.controller.state(), State::WaitingTrack);
}

#[test]
fn test_repeated_tick_issues_single_load() {
    let mut fixture = Fixture::playing();

    fixture.controller.tick();
    fixture.controller.tick();

    let loads = fixture
        .controller
        .drain_requests()
        .into_iter()
        .filter(|request| matches!(request, StreamRequest::LoadFragment { .. }))
        .count();
    assert_eq!(loads, 1);
    assert_eq!(fixture.controller.state(), State::FragmentLoading);
}

#[test]
fn test_fragment_lifecycle_chains_next_fragment() {
    let mut fixture = Fixture::playing();

    let (ticket, fragment) = fixture.tick_for_load();
    assert_eq!(fragment.sn, 0);

    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n\nhello")));
    assert_eq!(fixture.controller.state(), State::Appending);
    assert_eq!(
        fixture
            .controller
            .fragment_tracker()
            .state(&fragment.key(), BufferType::Subtitle),
        FragmentState::Appending
    );
    assert!(!fixture
        .controller
        .fragment_tracker()
        .is_time_buffered(BufferType::Subtitle, 5.0));

    let (append_ticket, payload) = take_append(&mut fixture.controller).unwrap();
    assert_eq!(payload.text, "WEBVTT\n\nhello");
    fixture.controller.on_buffer_appended(append_ticket, Ok(()));

    assert_eq!(fixture.controller.state(), State::Idle);
    assert!(fixture
        .controller
        .fragment_tracker()
        .is_time_buffered(BufferType::Subtitle, 5.0));
    assert_eq!(fixture.controller.frag_previous().unwrap().sn, 0);

    let (_, next) = fixture.tick_for_load();
    assert_eq!(next.sn, 1);
}

#[test]
fn test_encrypted_fragment_waits_for_key() {
    let mut fixture = Fixture::new();
    fixture
        .controller
        .on_tracks_updated(track_list(vec![Some(encrypted_details(TrackId(0), 3, 6.0))]));
    fixture.controller.on_track_switch(TrackId(0));

    let (ticket, fragment) = fixture.tick_for_load();
    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n")));

    assert_eq!(fixture.controller.state(), State::KeyLoading);
    let requests = fixture.controller.drain_requests();
    let key_ticket = requests
        .iter()
        .find_map(|request| match request {
            StreamRequest::LoadKey { ticket, fragment: f } if f.sn == fragment.sn => Some(*ticket),
            _ => None,
        })
        .unwrap();

    let key = DecryptKey {
        uri: "https://keys.example.com/k1".to_string(),
        key: Bytes::from_static(&[1u8; 16]),
        iv: None,
    };
    fixture.controller.on_key_loaded(key_ticket, Ok(key.clone()));

    assert_eq!(fixture.controller.state(), State::Appending);
    let (_, payload) = take_append(&mut fixture.controller).unwrap();
    assert_eq!(payload.key, Some(key));
}

#[test]
fn test_buffered_fragment_is_not_requested_again() {
    let mut fixture = Fixture::playing();
    fixture.buffer_next();
    fixture.controller.frag_previous = None;

    // Position 0 is covered by fragment 0, so the scheduler moves on.
    let (_, fragment) = fixture.tick_for_load();
    assert_eq!(fragment.sn, 1);
}

#[test]
fn test_look_ahead_bounds_scheduling() {
    let mut fixture = Fixture::playing();
    for expected in 0..3 {
        assert_eq!(fixture.buffer_next().sn, expected);
    }

    // Fragment 3 starts at 30s, the edge of the 30s look-ahead.
    fixture.controller.tick();
    assert!(take_load(&mut fixture.controller).is_none());
    assert_eq!(fixture.controller.state(), State::Idle);

    fixture.clock.set(5.0);
    let (_, fragment) = fixture.tick_for_load();
    assert_eq!(fragment.sn, 3);
}

#[test]
fn test_stale_load_after_track_switch_is_discarded() {
    let mut fixture = Fixture::playing();
    let (old_ticket, _) = fixture.tick_for_load();

    fixture.controller.on_track_switch(TrackId(1));
    assert_eq!(fixture.controller.state(), State::Idle);

    let (_, new_fragment) = fixture.tick_for_load();
    assert_eq!(new_fragment.track, TrackId(1));

    fixture
        .controller
        .on_fragment_loaded(old_ticket, Ok(Bytes::from_static(b"WEBVTT\n")));

    assert_eq!(fixture.controller.state(), State::FragmentLoading);
    assert!(take_append(&mut fixture.controller).is_none());
    assert_eq!(fixture.controller.frag_current().unwrap().track, TrackId(1));
}

#[test]
fn test_detach_discards_in_flight_work() {
    let mut fixture = Fixture::playing();
    let (ticket, _) = fixture.tick_for_load();

    fixture.controller.on_media_detaching();
    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n")));

    assert_eq!(fixture.controller.state(), State::Stopped);
    assert!(fixture.controller.tracks().is_empty());
    assert!(fixture.controller.frag_current().is_none());
    assert!(take_append(&mut fixture.controller).is_none());
    assert_eq!(fixture.controller.scheduler().disarm_calls, 1);
}

#[test]
fn test_load_failure_retries_same_fragment() {
    let mut fixture = Fixture::playing();
    let (ticket, fragment) = fixture.tick_for_load();

    fixture
        .controller
        .on_fragment_loaded(ticket, Err(load_error()));

    assert_eq!(fixture.controller.state(), State::Error);
    let requests = fixture.controller.drain_requests();
    let (retry_ticket, delay) = requests
        .iter()
        .find_map(|request| match request {
            StreamRequest::ScheduleRetry { ticket, delay } => Some((*ticket, *delay)),
            _ => None,
        })
        .unwrap();
    assert_eq!(delay, Duration::from_millis(100));

    fixture.controller.tick();
    assert!(take_load(&mut fixture.controller).is_none());

    fixture.controller.on_retry_elapsed(retry_ticket);
    let (_, retried) = take_load(&mut fixture.controller).unwrap();
    assert_eq!(retried.key(), fragment.key());
}

#[test]
fn test_exhausted_retries_without_fallback_are_fatal() {
    let mut fixture = Fixture::new();
    fixture
        .controller
        .on_tracks_updated(track_list(vec![Some(subtitle_details(TrackId(0), 4, 10.0))]));
    fixture.controller.on_track_switch(TrackId(0));

    let (mut ticket, _) = fixture.tick_for_load();
    for _ in 0..2 {
        fixture
            .controller
            .on_fragment_loaded(ticket, Err(load_error()));
        fixture.controller.on_retry_elapsed(ticket);
        let (next_ticket, _) = take_load(&mut fixture.controller).unwrap();
        ticket = next_ticket;
    }
    fixture
        .controller
        .on_fragment_loaded(ticket, Err(load_error()));
    let requests = fixture.controller.drain_requests();

    assert_eq!(fixture.controller.state(), State::Error);
    assert!(events(&requests).iter().any(|event| matches!(
        event,
        StreamEvent::Fatal {
            error: StreamError::RetriesExhausted { attempts: 3, .. }
        }
    )));
    assert_eq!(fixture.controller.active_track(), TrackId::NONE);
    assert_eq!(fixture.controller.scheduler().disarm_calls, 1);
}

#[test]
fn test_exhausted_retries_with_fallback_skip_fragment() {
    let mut fixture = Fixture::playing();
    let (mut ticket, failed) = fixture.tick_for_load();
    for _ in 0..2 {
        fixture
            .controller
            .on_fragment_loaded(ticket, Err(load_error()));
        fixture.controller.on_retry_elapsed(ticket);
        ticket = take_load(&mut fixture.controller).unwrap().0;
    }
    fixture
        .controller
        .on_fragment_loaded(ticket, Err(load_error()));

    let requests = fixture.controller.drain_requests();
    assert!(events(&requests).iter().any(|event| matches!(
        event,
        StreamEvent::FragmentSkipped { fragment, .. } if *fragment == failed.key()
    )));
    assert_eq!(fixture.controller.state(), State::Idle);

    let (_, next) = fixture.tick_for_load();
    assert_eq!(next.sn, failed.sn + 1);
}

#[test]
fn test_quota_exceeded_flushes_then_retries() {
    let mut fixture = Fixture::playing();
    fixture.clock.set(4.0);
    let (ticket, fragment) = fixture.tick_for_load();
    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n")));
    let (append_ticket, _) = take_append(&mut fixture.controller).unwrap();

    fixture.controller.on_buffer_appended(
        append_ticket,
        Err(BufferAppendError::QuotaExceeded {
            buffer_type: BufferType::Subtitle,
        }),
    );

    assert_eq!(fixture.controller.state(), State::BufferFlushing);
    let requests = fixture.controller.drain_requests();
    let (flush_ticket, range) = requests
        .iter()
        .find_map(|request| match request {
            StreamRequest::Flush { ticket, range, .. } => Some((*ticket, *range)),
            _ => None,
        })
        .unwrap();
    assert_eq!(range, TimeRange::new(0.0, 4.0));

    fixture.controller.on_buffer_flushed(flush_ticket, range, Ok(()));
    assert_eq!(fixture.controller.state(), State::Idle);

    let (_, retried) = fixture.tick_for_load();
    assert_eq!(retried.key(), fragment.key());
}

#[test]
fn test_rejected_append_is_fatal() {
    let mut fixture = Fixture::playing();
    let (ticket, _) = fixture.tick_for_load();
    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(b"WEBVTT\n")));
    let (append_ticket, _) = take_append(&mut fixture.controller).unwrap();

    fixture.controller.on_buffer_appended(
        append_ticket,
        Err(BufferAppendError::Rejected {
            buffer_type: BufferType::Subtitle,
            reason: "malformed".to_string(),
        }),
    );

    let requests = fixture.controller.drain_requests();
    assert!(events(&requests).iter().any(|event| matches!(
        event,
        StreamEvent::Fatal {
            error: StreamError::BufferAppend(BufferAppendError::Rejected { .. })
        }
    )));
    assert_eq!(fixture.controller.state(), State::Error);
}

#[test]
fn test_invalid_utf8_is_parse_failure() {
    let mut fixture = Fixture::playing();
    let (ticket, _) = fixture.tick_for_load();

    fixture
        .controller
        .on_fragment_loaded(ticket, Ok(Bytes::from_static(&[0xff, 0xfe, 0x00])));

    assert_eq!(fixture.controller.state(), State::Error);
    let requests = fixture.controller.drain_requests();
    assert!(requests
        .iter()
        .any(|request| matches!(request, StreamRequest::ScheduleRetry { .. })));
}

#[test]
fn test_waiting_track_until_details_arrive() {
    let mut fixture = Fixture::new();
    fixture
        .controller
        .on_tracks_updated(track_list(vec![None]));
    fixture.controller.on_track_switch(TrackId(0));

    assert_eq!(fixture.controller.state(), State::WaitingTrack);
    fixture.controller.tick();
    assert!(take_load(&mut fixture.controller).is_none());

    fixture
        .controller
        .on_track_details_loaded(TrackId(0), subtitle_details(TrackId(0), 3, 10.0));
    assert_eq!(fixture.controller.state(), State::Idle);
    assert_eq!(fixture.controller.scheduler().arm_calls, 1);

    let (_, fragment) = fixture.tick_for_load();
    assert_eq!(fragment.sn, 0);
}

#[test]
fn test_details_replacement_invalidates_tracker() {
    let mut fixture = Fixture::playing();
    fixture.buffer_next();
    assert!(fixture
        .controller
        .fragment_tracker()
        .is_time_buffered(BufferType::Subtitle, 5.0));

    fixture
        .controller
        .on_track_details_loaded(TrackId(0), subtitle_details(TrackId(0), 10, 10.0));

    assert!(!fixture
        .controller
        .fragment_tracker()
        .is_time_buffered(BufferType::Subtitle, 5.0));
    // Sequence number 0 still exists, so the chain is kept.
    assert_eq!(fixture.controller.frag_previous().unwrap().sn, 0);
}

#[test]
fn test_changed_track_list_resets_buffered_state() {
    let mut fixture = Fixture::playing();
    fixture.buffer_next();

    let mut tracks = track_list(vec![Some(subtitle_details(TrackId(0), 10, 10.0))]);
    tracks[0].attrs.language = Some("fr".to_string());
    fixture.controller.on_tracks_updated(tracks);

    assert!(fixture.controller.fragment_tracker().is_empty());
    assert!(fixture.controller.frag_previous().is_none());
}

#[test]
fn test_snapshot_reports_progress() {
    let mut fixture = Fixture::playing();
    fixture.buffer_next();
    fixture.buffer_next();

    let snapshot = fixture.controller.snapshot();
    assert_eq!(snapshot.state, State::Idle);
    assert_eq!(snapshot.active_track, TrackId(0));
    assert!(snapshot.armed);
    assert_eq!(snapshot.buffered, vec![TimeRange::new(0.0, 20.0)]);
    assert_eq!(snapshot.frag_previous.map(|key| key.sn), Some(1));
}

#[test]
fn test_snapshot_serializes_to_json() {
    let fixture = Fixture::playing();

    let json = serde_json::to_value(fixture.controller.snapshot()).unwrap();

    assert_eq!(json["state"], "IDLE");
    assert_eq!(json["active_track"], 0);
    assert_eq!(json["armed"], true);
    assert!(json["frag_previous"].is_null());
}
