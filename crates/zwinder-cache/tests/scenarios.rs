//! End-to-end scenarios for the state cache.
//!
//! Each scenario drives the public surface the way the movie editor does:
//! linear capture, dedup, backward seeks with gap refill, invalidation
//! after an input edit, reserved-frame management, and a full save/load
//! cycle.

use std::io::{Cursor, Write};

use zwinder_cache::{CacheConfig, CacheError, RingConfig, StateManager};

fn editor_config() -> CacheConfig {
    CacheConfig {
        current: RingConfig::new(4, 1),
        recent: RingConfig::new(2, 1),
        gap: RingConfig::new(2, 1),
        ancient_interval: 10,
    }
}

fn engaged(config: CacheConfig) -> StateManager {
    let mut cache = StateManager::new(config, Box::new(|_| false));
    cache.engage(&[0x00]);
    cache
}

fn capture(cache: &mut StateManager, frame: u32) {
    #[allow(clippy::cast_possible_truncation)]
    let mut source = move |sink: &mut dyn Write| sink.write_all(&[frame as u8]);
    cache.capture(frame, &mut source, false).unwrap();
}

/// Linear run used as the starting point by most scenarios.
fn after_linear_run() -> StateManager {
    let mut cache = engaged(editor_config());
    for frame in 1..=10 {
        capture(&mut cache, frame);
    }
    cache
}

// ── Scenario 1: Linear capture ──

#[test]
fn test_linear_capture() {
    let cache = after_linear_run();

    // Four head entries, two recent, the frame-0 anchor; frames 1..=4
    // decayed entirely (they sit below the ancient interval, where frame 0
    // already anchors the timeline).
    assert_eq!(cache.count(), 7);
    assert_eq!(cache.last(), 10);
    assert_eq!(
        cache.frames().collect::<Vec<_>>(),
        vec![0, 5, 6, 7, 8, 9, 10]
    );

    let (frame, data) = cache.get_closest(6).unwrap();
    assert_eq!((frame, data.as_ref()), (6, [0x06].as_ref()));

    // Every query at or past an existing frame resolves.
    for query in 0..=30 {
        let (frame, _) = cache.get_closest(query).unwrap();
        assert!(frame <= query);
    }
}

// ── Scenario 2: Dedup ──

#[test]
fn test_capture_of_existing_frame_is_a_noop() {
    let mut cache = after_linear_run();
    let count = cache.count();

    capture(&mut cache, 5);
    assert_eq!(cache.count(), count);
    assert_eq!(cache.state_at(5).as_ref(), &[0x05]);
}

// ── Scenario 3: Backward seek, then replay over the edit ──

#[test]
fn test_replay_after_invalidation_advances_the_head() {
    let mut cache = after_linear_run();

    // Seeking backward and re-capturing a still-covered frame: no-op.
    capture(&mut cache, 5);
    assert!(cache.has_state(5));

    // An edit at frame 4 drops everything after it.
    assert!(cache.invalidate_after(4));
    assert!(!cache.has_state(5));

    // Replaying frame 5 now advances the head again.
    capture(&mut cache, 5);
    assert!(cache.has_state(5));
    assert_eq!(cache.last(), 5);
    assert_eq!(cache.get_closest(5).unwrap().0, 5);
}

// ── Scenario 4: True gap behind the head ──

#[test]
fn test_gap_refill_behind_the_head() {
    let mut cache = after_linear_run();

    // Nothing newer than 10 exists, so this invalidation reports false.
    assert!(!cache.invalidate_after(10));

    // Jump the head forward, leaving a hole at 11..=14.
    capture(&mut cache, 15);
    assert_eq!(cache.last(), 15);

    // Replaying into the hole stores a gap state.
    capture(&mut cache, 12);
    assert!(cache.has_state(12));
    assert_eq!(cache.get_closest(14).unwrap().0, 12);
}

// ── Scenario 5: Invalidation ──

#[test]
fn test_invalidate_after_an_input_edit() {
    let mut cache = after_linear_run();

    assert!(cache.invalidate_after(3));
    for frame in 4..=10 {
        assert!(!cache.has_state(frame), "frame {frame} should be gone");
    }
    assert!(cache.has_state(0));

    // Frames 1..=3 had already decayed during the linear run, so the
    // anchor is all that remains.
    assert_eq!(cache.last(), 0);
    assert_eq!(cache.count(), 1);

    // Idempotent: a second pass removes nothing.
    assert!(!cache.invalidate_after(3));
}

// ── Scenario 6: The frame-0 anchor cannot be evicted ──

#[test]
fn test_evict_reserved_zero_fails() {
    let mut cache = after_linear_run();
    let count = cache.count();

    assert!(matches!(
        cache.evict_reserved(0),
        Err(CacheError::ReservedZero)
    ));
    assert!(cache.has_state(0));
    assert_eq!(cache.count(), count);
}

// ── Scenario 7: Save / load round-trip ──

#[test]
fn test_save_load_round_trip() {
    let mut cache = after_linear_run();
    let mut branch = |sink: &mut dyn Write| sink.write_all(b"branch point");
    cache.capture_reserved(25, &mut branch).unwrap();

    let mut blob: Vec<u8> = Vec::new();
    cache.save(&mut blob).unwrap();

    let restored = StateManager::load(
        &mut Cursor::new(blob),
        editor_config(),
        Box::new(|_| false),
    )
    .unwrap();

    assert_eq!(
        restored.frames().collect::<Vec<_>>(),
        cache.frames().collect::<Vec<_>>()
    );
    assert_eq!(restored.count(), cache.count());
    assert_eq!(restored.last(), cache.last());
    for frame in cache.frames() {
        assert_eq!(
            restored.state_at(frame).as_ref(),
            cache.state_at(frame).as_ref(),
            "payload mismatch at frame {frame}"
        );
    }
}

// ── Scenario 8: Markers and branch points stay pinned ──

#[test]
fn test_caller_reserved_frames_survive_decay() {
    let mut cache = StateManager::new(editor_config(), Box::new(|frame| frame % 25 == 0));
    cache.engage(&[0x00]);
    for frame in 1..=100 {
        capture(&mut cache, frame);
    }

    for marker in [25, 50, 75, 100] {
        assert!(cache.has_state(marker), "marker {marker} decayed");
    }

    // A marker ahead of the head counts as the last state.
    let mut branch = |sink: &mut dyn Write| sink.write_all(b"future branch");
    cache.capture_reserved(500, &mut branch).unwrap();
    assert_eq!(cache.last(), 500);
}

// ── Scenario 9: Ancient anchors keep the distant past reachable ──

#[test]
fn test_distant_past_stays_reachable() {
    let mut config = editor_config();
    config.ancient_interval = 8;
    let mut cache = engaged(config);
    for frame in 1..=200 {
        capture(&mut cache, frame);
    }

    // The head region is dense; the deep past is thinner but never empty:
    // any query lands on an anchor no more than two intervals away.
    for query in (0..=200).step_by(10) {
        let (frame, _) = cache.get_closest(query).unwrap();
        assert!(
            query - frame <= 2 * config.ancient_interval,
            "query {query} resolved to distant frame {frame}"
        );
    }
}
