//! End-to-end transport scenarios driven by a manual clock.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use streamclock::clock::ManualClock;
use streamclock::constants::DEFAULT_AUDIO_LATENCY_USECS;
use streamclock::interpolator::state::TransportState;
use streamclock::interpolator::Interpolator;

fn interpolator() -> (Arc<ManualClock>, Interpolator) {
    let clock = Arc::new(ManualClock::new());
    let interpolator = Interpolator::with_clock(clock.clone());
    (clock, interpolator)
}

/// Drive steady 20 ms posts every 20 ms of clock until the loop settles.
fn run_steady(clock: &ManualClock, interpolator: &Interpolator, cycles: usize) {
    for _ in 0..cycles {
        clock.advance(20_000);
        interpolator.post_buffer(20_000);
    }
}

#[test]
fn cold_start() {
    let (_clock, interpolator) = interpolator();
    assert_eq!(interpolator.get_stream_usecs(), 0);

    interpolator.post_buffer(20_000);
    assert_eq!(interpolator.state(), TransportState::Rolling);
    assert_eq!(interpolator.time_factor(), 1.0);

    let t = interpolator.get_stream_usecs();
    let read = interpolator.read_pointer();
    assert_eq!(read, 20_000);
    assert!(t >= read - DEFAULT_AUDIO_LATENCY_USECS && t <= read);
}

#[test]
fn steady_state_convergence() {
    let (clock, interpolator) = interpolator();
    interpolator.set_latency(80_000);

    interpolator.post_buffer(20_000);
    run_steady(&clock, &interpolator, 40);

    let tf = interpolator.time_factor();
    assert!((tf - 1.0).abs() < 0.01, "time factor settled at {}", tf);

    // After settling, each cycle advances the reported time by one frame.
    let mut previous = interpolator.get_stream_usecs();
    for _ in 0..5 {
        run_steady(&clock, &interpolator, 1);
        let current = interpolator.get_stream_usecs();
        let step = current - previous;
        assert!(
            (step - 20_000).abs() <= 1_000,
            "cycle advanced by {} instead of ~20000",
            step
        );
        previous = current;
    }
}

#[test]
fn underrun_stops_the_clock() {
    let (clock, interpolator) = interpolator();
    interpolator.set_latency(80_000);
    interpolator.post_buffer(20_000);
    run_steady(&clock, &interpolator, 40);

    let write = interpolator.read_pointer();
    clock.advance(2 * 80_000);
    let t = interpolator.get_stream_usecs();

    assert_eq!(t, write);
    assert_eq!(interpolator.state(), TransportState::Stopped);
    assert_eq!(interpolator.time_factor(), 0.0);
    assert_eq!(interpolator.anomaly_counters().underruns, 1);

    // Recovery goes back through the startup branch.
    clock.advance(20_000);
    interpolator.post_buffer(20_000);
    assert_eq!(interpolator.state(), TransportState::Rolling);
    assert_eq!(interpolator.time_factor(), 1.0);
}

#[test]
fn overrun_snaps_forward_and_keeps_rolling() {
    let (clock, interpolator) = interpolator();
    interpolator.post_buffer(20_000);
    run_steady(&clock, &interpolator, 40);

    // A 200 ms burst arrives within a 20 ms window. The burst itself is
    // aggregated; the next regular cycle sees the write pointer leap and
    // saturates the loop.
    clock.advance(20_000);
    interpolator.post_buffer(200_000);
    clock.advance(20_000);
    interpolator.post_buffer(20_000);

    assert_eq!(interpolator.state(), TransportState::Rolling);
    assert_eq!(interpolator.time_factor(), 2.0);
    assert_eq!(interpolator.anomaly_counters().overruns, 1);

    let snapshot = interpolator.snapshot();
    // Epoch snapped to one latency behind the folded write pointer.
    let read = snapshot.read_pointer - snapshot.usecs_queued;
    let t = interpolator.get_stream_usecs();
    assert!(t >= read - snapshot.latency_usecs);
    assert!(t <= snapshot.read_pointer);
}

#[test]
fn pause_resume_preserves_position() {
    let (clock, interpolator) = interpolator();
    interpolator.set_latency(80_000);
    interpolator.post_buffer(20_000);
    run_steady(&clock, &interpolator, 40);

    clock.advance(10_000);
    let held = interpolator.get_stream_usecs();
    interpolator.pause(false);
    assert!(interpolator.is_paused());

    clock.advance(1_000_000);
    assert_eq!(interpolator.get_stream_usecs(), held);

    interpolator.resume();
    // Still paused until the next buffer arrives.
    assert!(interpolator.is_paused());
    assert_eq!(interpolator.get_stream_usecs(), held);

    clock.advance(20_000);
    interpolator.post_buffer(20_000);
    assert!(interpolator.is_rolling());
    assert_eq!(interpolator.time_factor(), 1.0);

    clock.advance(10_000);
    let resumed = interpolator.get_stream_usecs();
    assert!(resumed >= held);
    assert!(resumed - held <= 40_000, "resume jumped by {}", resumed - held);
}

#[test]
fn seek_while_rolling_tracks_new_position() {
    let (clock, interpolator) = interpolator();
    interpolator.post_buffer(20_000);
    run_steady(&clock, &interpolator, 10);

    interpolator.seek(5_000_000);
    assert!(interpolator.is_rolling());

    let t = interpolator.get_stream_usecs();
    assert!(t >= 5_000_000 - DEFAULT_AUDIO_LATENCY_USECS && t <= 5_000_000);

    // Subsequent cycles converge onto the new timeline.
    let mut elapsed = 0;
    for _ in 0..40 {
        clock.advance(20_000);
        interpolator.post_buffer(20_000);
        elapsed += 20_000;
    }
    let settled = interpolator.get_stream_usecs();
    let target = 5_000_000 + elapsed - DEFAULT_AUDIO_LATENCY_USECS;
    assert!(
        (settled - target).abs() < 30_000,
        "settled at {} instead of ~{}",
        settled,
        target
    );
    assert!((interpolator.time_factor() - 1.0).abs() < 0.05);
}

#[test]
fn jittered_cadence_stays_monotonic() {
    let (clock, interpolator) = interpolator();
    interpolator.set_latency(80_000);
    interpolator.post_buffer(20_000);
    run_steady(&clock, &interpolator, 20);

    // Callback cadence wobbles ±5% around the posted frame duration, well
    // within the loop's stable tracking range.
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut previous = interpolator.get_stream_usecs();
    for _ in 0..500 {
        let wobble = rng.gen_range(-1_000..=1_000);
        clock.advance(20_000 + wobble);
        interpolator.post_buffer(20_000);

        let current = interpolator.get_stream_usecs();
        assert!(current >= previous, "{} fell below {}", current, previous);
        previous = current;

        let snapshot = interpolator.snapshot();
        assert!(snapshot.time_factor >= 0.5 && snapshot.time_factor <= 2.0);
        assert!(current <= snapshot.read_pointer);
    }
    assert_eq!(interpolator.anomaly_counters().underruns, 0);
    assert_eq!(interpolator.anomaly_counters().overruns, 0);
}
