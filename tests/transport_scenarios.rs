//! Transport Scenarios
//!
//! Playback coordination driven from store state with virtual handles.

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;

use cadenza::config::EditorConfig;
use cadenza::engine::{SampleBuffer, TickOutcome, TransportController, TransportState};
use cadenza::state::{RepeatRegion, TrackStore};

fn seconds(n: usize) -> SampleBuffer {
    SampleBuffer::silent(2, n * 100, 100).unwrap()
}

#[test]
fn test_solo_then_stop_resets_everything() {
    let mut store = TrackStore::default();
    let a = store.add_track("A", Some(seconds(10)));
    let b = store.add_track("B", Some(seconds(10)));
    store.set_soloed(b, true).unwrap();

    let mut transport = TransportController::from_config(&EditorConfig::default());
    transport.play_all(store.tracks());
    assert!(!transport.is_track_playing(a));
    assert!(transport.is_track_playing(b));

    transport.advance(1.5);
    assert_abs_diff_eq!(transport.position(), 1.5);

    transport.stop_all();
    assert_eq!(transport.state(), TransportState::Stopped);
    assert_eq!(transport.track_position(a), Some(0.0));
    assert_eq!(transport.track_position(b), Some(0.0));
}

#[test]
fn test_repeat_region_loops_when_end_is_reached() {
    let mut store = TrackStore::default();
    let a = store.add_track("A", Some(seconds(10)));
    let b = store.add_track("B", Some(seconds(12)));
    store
        .set_repeat_region(Some(RepeatRegion::new(5.0, 8.0).unwrap()))
        .unwrap();

    let mut transport = TransportController::from_config(&EditorConfig::default());
    transport.play_all(store.tracks());
    transport.seek_all(7.5);
    assert!(matches!(
        transport.tick(store.repeat_region()),
        TickOutcome::Advanced(_)
    ));

    let mut looped = false;
    for _ in 0..20 {
        transport.advance(0.05);
        if transport.tick(store.repeat_region()) == (TickOutcome::Looped { to: 5.0 }) {
            looped = true;
            break;
        }
        assert!(transport.position() < 8.0);
    }
    assert!(looped);
    assert_abs_diff_eq!(transport.track_position(a).unwrap(), 5.0, epsilon = 1e-9);
    assert_abs_diff_eq!(transport.track_position(b).unwrap(), 5.0, epsilon = 1e-9);
    assert!(transport.is_track_playing(a));
}

#[test]
fn test_cleared_region_stops_looping() {
    let mut store = TrackStore::default();
    store.add_track("A", Some(seconds(10)));
    store
        .set_repeat_region(Some(RepeatRegion::new(1.0, 2.0).unwrap()))
        .unwrap();
    store.set_repeat_region(None).unwrap();

    let mut transport = TransportController::with_virtual_playback(0.01);
    transport.play_all(store.tracks());
    transport.seek_all(1.9);
    transport.tick(store.repeat_region());
    transport.advance(0.5);
    assert!(matches!(
        transport.tick(store.repeat_region()),
        TickOutcome::Advanced(p) if p > 2.0
    ));

    store.undo();
    assert!(store.repeat_region().is_some());
}

#[test]
fn test_transport_follows_store_edits() {
    let mut store = TrackStore::default();
    let a = store.add_track("A", Some(seconds(10)));
    let mut transport = TransportController::with_virtual_playback(0.01);
    transport.sync_tracks(store.tracks());
    transport.seek_all(4.0);

    let b = store.split_track(a, 6.0).unwrap();
    transport.sync_tracks(store.tracks());
    assert_eq!(transport.len(), 2);
    assert_abs_diff_eq!(transport.track_position(a).unwrap(), 4.0, epsilon = 1e-9);
    assert_eq!(transport.track_position(b), Some(0.0));

    store.remove_track(b).unwrap();
    transport.sync_tracks(store.tracks());
    assert_eq!(transport.len(), 1);
}

#[test]
fn test_seek_past_short_track() {
    let mut store = TrackStore::default();
    let long = store.add_track("Long", Some(seconds(10)));
    let short = store.add_track("Short", Some(seconds(2)));
    let mut transport = TransportController::with_virtual_playback(0.01);
    transport.play_all(store.tracks());
    transport.seek_all(6.0);

    assert_abs_diff_eq!(transport.track_position(long).unwrap(), 6.0, epsilon = 1e-9);
    assert_abs_diff_eq!(transport.track_position(short).unwrap(), 2.0, epsilon = 1e-9);
}
