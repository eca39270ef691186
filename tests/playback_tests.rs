// Tests for the playback scheduler: gapless anchoring on the output clock,
// cursor behavior, and barge-in cancellation.

use std::sync::Arc;

use voicelink::audio::codec;
use voicelink::{ManualSink, PlaybackScheduler};

const RATE: u32 = 24000;
const EPS: f64 = 1e-9;

fn pcm_seconds(seconds: f64) -> Vec<u8> {
    let samples = (seconds * f64::from(RATE)).round() as usize;
    codec::pack_pcm16(&vec![0.0f32; samples])
}

fn scheduler() -> (Arc<ManualSink>, PlaybackScheduler) {
    let sink = Arc::new(ManualSink::new(RATE));
    let scheduler = PlaybackScheduler::new(Arc::clone(&sink) as Arc<dyn voicelink::OutputSink>);
    (sink, scheduler)
}

#[test]
fn test_back_to_back_chunks_play_gaplessly() {
    let (sink, mut scheduler) = scheduler();

    // Fresh session: real time t0 = 2.0, cursor = 0.
    sink.set_time(2.0);
    scheduler.schedule(&pcm_seconds(0.5));
    scheduler.schedule(&pcm_seconds(0.3));
    scheduler.schedule(&pcm_seconds(0.4));

    let starts: Vec<f64> = sink.scheduled().iter().map(|b| b.start).collect();
    assert!((starts[0] - 2.0).abs() < EPS);
    assert!((starts[1] - 2.5).abs() < EPS);
    assert!((starts[2] - 2.8).abs() < EPS);
    assert!((scheduler.cursor() - 3.2).abs() < EPS);
}

#[test]
fn test_cursor_is_non_decreasing_without_cancellation() {
    let (sink, mut scheduler) = scheduler();

    let mut last = scheduler.cursor();
    for (t, dur) in [(0.0, 0.1), (0.05, 0.2), (1.0, 0.05), (0.5, 0.3)] {
        sink.set_time(t);
        scheduler.schedule(&pcm_seconds(dur));
        assert!(scheduler.cursor() >= last);
        last = scheduler.cursor();
    }
}

#[test]
fn test_playback_anchors_to_real_time_after_gap() {
    let (sink, mut scheduler) = scheduler();

    sink.set_time(1.0);
    scheduler.schedule(&pcm_seconds(0.2)); // ends at 1.2

    // A long pause: real time moves past the cursor.
    sink.set_time(10.0);
    scheduler.schedule(&pcm_seconds(0.2));

    let starts: Vec<f64> = sink.scheduled().iter().map(|b| b.start).collect();
    assert!((starts[1] - 10.0).abs() < EPS, "must not start in the past");
}

#[test]
fn test_cancel_all_empties_active_set_and_resets_cursor() {
    let (sink, mut scheduler) = scheduler();

    sink.set_time(3.0);
    scheduler.schedule(&pcm_seconds(0.5));
    scheduler.schedule(&pcm_seconds(0.5));
    assert_eq!(scheduler.active_count(), 2);

    scheduler.cancel_all();
    assert_eq!(scheduler.active_count(), 0);
    assert_eq!(scheduler.cursor(), 0.0);
    assert!(sink.scheduled().iter().all(|b| b.handle.is_cancelled()));

    // Next chunk anchors to current real time, not the stale cursor.
    sink.set_time(5.0);
    scheduler.schedule(&pcm_seconds(0.1));
    let last = sink.scheduled().last().unwrap().clone();
    assert!((last.start - 5.0).abs() < EPS);
}

#[test]
fn test_cancel_all_with_no_active_handles_is_safe() {
    let (_sink, mut scheduler) = scheduler();
    scheduler.cancel_all();
    scheduler.cancel_all();
    assert_eq!(scheduler.active_count(), 0);
}

#[test]
fn test_completed_handles_leave_the_active_set() {
    let (sink, mut scheduler) = scheduler();

    scheduler.schedule(&pcm_seconds(0.1));
    sink.finish(0); // natural completion

    scheduler.schedule(&pcm_seconds(0.1));
    assert_eq!(scheduler.active_count(), 1);
}

#[test]
fn test_empty_chunk_schedules_nothing() {
    let (sink, mut scheduler) = scheduler();
    scheduler.schedule(&[]);
    assert!(sink.scheduled().is_empty());
    assert_eq!(scheduler.cursor(), 0.0);
}
