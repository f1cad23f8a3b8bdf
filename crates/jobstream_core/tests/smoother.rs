use std::time::Duration;

use jobstream_core::{update, Effect, Frame, JobState, Msg, ProgressSmoother, SmootherSettings};

fn ticks_in(window: Duration, interval: Duration) -> u32 {
    (window.as_millis() / interval.as_millis()) as u32
}

#[test]
fn simulation_reaches_but_never_exceeds_ceiling_in_three_seconds() {
    let settings = SmootherSettings::default();
    let mut smoother = ProgressSmoother::new(settings.clone());

    let ticks = ticks_in(Duration::from_secs(3), settings.simulation_interval);
    for _ in 0..ticks {
        assert!(smoother.simulation_tick());
        assert!(smoother.display_value() <= settings.simulation_ceiling);
    }
    assert_eq!(smoother.display_percent(), 12);

    // Idle for much longer: still capped.
    for _ in 0..100 {
        smoother.simulation_tick();
    }
    assert_eq!(smoother.display_value(), settings.simulation_ceiling);
}

#[test]
fn first_real_event_retires_simulation() {
    let mut smoother = ProgressSmoother::default();
    for _ in 0..4 {
        smoother.simulation_tick();
    }
    assert!(smoother.is_simulating());
    assert!(smoother.observe_target(30.0));
    assert!(!smoother.is_simulating());
    assert!(!smoother.simulation_tick());
    assert!(!smoother.observe_target(40.0));
}

#[test]
fn display_eases_toward_target_and_snaps() {
    let mut smoother = ProgressSmoother::default();
    smoother.observe_target(50.0);

    let first = {
        smoother.animation_tick();
        smoother.display_value()
    };
    assert!((first - 4.0).abs() < 1e-9, "8% of a 50 point gap, got {first}");

    let mut ticks = 1;
    while smoother.animation_tick() {
        ticks += 1;
        assert!(ticks < 1_000, "animation never settled");
    }
    assert_eq!(smoother.display_value(), 50.0);
    assert!(smoother.is_settled());
    assert_eq!(smoother.display_percent(), 50);
}

#[test]
fn display_never_decreases_on_jumpy_targets() {
    let mut smoother = ProgressSmoother::default();
    for _ in 0..10 {
        smoother.simulation_tick();
    }
    let mut previous = smoother.display_value();

    for target in [5.0, 40.0, 35.0, 20.0, 60.0, 55.0, 100.0, 80.0] {
        smoother.observe_target(target);
        for _ in 0..25 {
            smoother.animation_tick();
            let now = smoother.display_value();
            assert!(now >= previous, "{now} < {previous} after target {target}");
            assert!((0.0..=100.0).contains(&now));
            previous = now;
        }
    }
}

#[test]
fn targets_are_clamped() {
    let mut smoother = ProgressSmoother::default();
    smoother.observe_target(250.0);
    assert_eq!(smoother.target(), 100.0);
    while smoother.animation_tick() {}
    assert_eq!(smoother.display_percent(), 100);

    let mut smoother = ProgressSmoother::default();
    smoother.observe_target(-5.0);
    assert_eq!(smoother.target(), 0.0);
}

#[test]
fn streaming_job_display_is_monotonic_through_update() {
    let (mut state, _) = update(JobState::new("job-1"), Msg::Connected);
    for _ in 0..5 {
        state = update(state, Msg::SimulationTick).0;
    }
    let mut previous = state.view().display_percent;

    for pct in [40, 35, 38, 10, 70] {
        let frame = Frame::new("progress", format!(r#"{{"step":"convert","percent":{pct}}}"#));
        state = update(state, Msg::FrameReceived(frame)).0;
        for _ in 0..30 {
            state = update(state, Msg::AnimationTick).0;
            let shown = state.view().display_percent;
            assert!(shown >= previous, "{shown} < {previous}");
            previous = shown;
        }
    }
    assert_eq!(state.last_known_percent(), 70.0);
}

#[test]
fn simulation_tick_after_real_event_asks_to_stop() {
    let (state, _) = update(JobState::new("job-1"), Msg::Connected);
    let frame = Frame::new("progress", r#"{"step":"fetch","percent":5}"#);
    let (state, _) = update(state, Msg::FrameReceived(frame));
    let (_, effects) = update(state, Msg::SimulationTick);
    assert_eq!(effects, vec![Effect::StopSimulation]);
}
