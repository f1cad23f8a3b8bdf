use std::sync::Once;

use jobstream_core::{
    update, Effect, FailureOrigin, FileRecord, Frame, FrameDecoder, JobPhase, JobState, Manifest,
    ManifestState, Msg, Status, CONNECTION_LOST_MESSAGE, CONNECT_FAILED_MESSAGE,
    DEGRADED_STREAM_THRESHOLD,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(jobstream_logging::initialize_for_tests);
}

fn streaming(job_id: &str) -> JobState {
    let (state, effects) = update(JobState::new(job_id), Msg::Connected);
    assert!(effects.is_empty());
    assert_eq!(state.status(), Status::Streaming);
    state
}

/// Runs raw wire bytes through the decoder and the update function.
fn feed(mut state: JobState, wire: &str) -> (JobState, Vec<Effect>) {
    let mut decoder = FrameDecoder::new();
    let mut effects = Vec::new();
    for frame in decoder.push(wire.as_bytes()) {
        let (next, produced) = update(state, Msg::FrameReceived(frame));
        state = next;
        effects.extend(produced);
    }
    (state, effects)
}

#[test]
fn connected_moves_connecting_to_streaming() {
    init_logging();
    let state = JobState::new("job-1");
    assert_eq!(state.status(), Status::Connecting);
    let mut state = streaming("job-1");
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn connect_failure_is_terminal_error() {
    init_logging();
    let (state, effects) = update(
        JobState::new("job-1"),
        Msg::ConnectFailed {
            reason: "http status 502".into(),
        },
    );
    assert_eq!(state.status(), Status::Error);
    assert_eq!(state.error_message(), Some(CONNECT_FAILED_MESSAGE));
    assert!(matches!(
        state.phase(),
        JobPhase::Error {
            origin: FailureOrigin::Connect,
            ..
        }
    ));
    assert_eq!(effects, vec![Effect::CloseStream]);

    // Absorbing: a late handshake does not revive the job.
    let (state, effects) = update(state, Msg::Connected);
    assert_eq!(state.status(), Status::Error);
    assert!(effects.is_empty());
}

#[test]
fn single_progress_frame_updates_percent_and_log() {
    init_logging();
    let (state, effects) = feed(
        streaming("job-1"),
        "event: progress\ndata: {\"step\":\"fetch\",\"percent\":10}\n\n",
    );
    assert_eq!(state.status(), Status::Streaming);
    assert_eq!(state.last_known_percent(), 10.0);
    assert_eq!(state.event_log().len(), 1);
    assert_eq!(effects, vec![Effect::StopSimulation]);
}

#[test]
fn only_first_progress_stops_simulation() {
    init_logging();
    let (state, effects) = feed(
        streaming("job-1"),
        concat!(
            "event: progress\ndata: {\"step\":\"fetch\",\"pct\":5}\n\n",
            "event: progress\ndata: {\"step\":\"fetch\",\"pct\":15}\n\n",
        ),
    );
    assert_eq!(effects, vec![Effect::StopSimulation]);
    assert_eq!(state.last_known_percent(), 15.0);
    assert_eq!(state.event_log().len(), 2);
}

#[test]
fn complete_transitions_to_done_and_requests_manifest_once() {
    init_logging();
    let (state, effects) = feed(
        streaming("job-42"),
        concat!(
            "event: progress\ndata: {\"step\":\"convert\",\"percent\":60}\n\n",
            "event: complete\ndata: {\"total_files\":5,\"avg_confidence\":0.9}\n\n",
        ),
    );
    assert_eq!(state.status(), Status::Done);
    assert_eq!(
        effects,
        vec![
            Effect::StopSimulation,
            Effect::CloseStream,
            Effect::FetchManifest {
                job_id: "job-42".to_string()
            },
        ]
    );
    let completion = state.completion().expect("completion present");
    assert_eq!(completion.summary.total_files, Some(5));
    assert_eq!(completion.manifest, ManifestState::Pending);
    assert_eq!(state.manifest_requests(), 1);
    assert_eq!(state.error_message(), None);
}

#[test]
fn frames_after_complete_change_nothing() {
    init_logging();
    let (state, _) = feed(
        streaming("job-1"),
        "event: complete\ndata: {\"total_files\":1}\n\n",
    );
    let before = state.clone();

    let (state, effects) = feed(
        state,
        concat!(
            "event: progress\ndata: {\"step\":\"assemble\",\"percent\":99}\n\n",
            "event: error\ndata: {\"message\":\"late\"}\n\n",
            "event: complete\ndata: {\"total_files\":2}\n\n",
        ),
    );
    assert!(effects.is_empty());
    assert_eq!(state, before);
    assert_eq!(state.manifest_requests(), 1);

    let (state, effects) = update(state, Msg::StreamEnded);
    assert!(effects.is_empty());
    assert_eq!(state.status(), Status::Done);
}

#[test]
fn error_frame_sets_message_verbatim() {
    init_logging();
    let (state, effects) = feed(
        streaming("job-1"),
        "event: error\ndata: {\"message\":\"bad repo\"}\n\n",
    );
    assert_eq!(state.status(), Status::Error);
    assert_eq!(state.error_message(), Some("bad repo"));
    assert_eq!(effects, vec![Effect::CloseStream]);

    let (state, effects) = feed(state, "event: error\ndata: {\"message\":\"again\"}\n\n");
    assert!(effects.is_empty());
    assert_eq!(state.error_message(), Some("bad repo"));
}

#[test]
fn error_frame_without_message_uses_default() {
    init_logging();
    let (state, _) = feed(streaming("job-1"), "event: error\ndata: {}\n\n");
    assert_eq!(state.error_message(), Some(jobstream_core::DEFAULT_FAILURE_MESSAGE));
}

#[test]
fn end_of_stream_without_frames_is_connection_loss() {
    init_logging();
    let (state, effects) = update(streaming("job-1"), Msg::StreamEnded);
    assert_eq!(state.status(), Status::Error);
    assert_eq!(state.error_message(), Some(CONNECTION_LOST_MESSAGE));
    assert!(matches!(
        state.phase(),
        JobPhase::Error {
            origin: FailureOrigin::ConnectionLost,
            ..
        }
    ));
    assert_eq!(effects, vec![Effect::CloseStream]);
}

#[test]
fn transport_failure_mid_stream_is_connection_loss() {
    init_logging();
    let (state, _) = feed(
        streaming("job-1"),
        "event: progress\ndata: {\"step\":\"fetch\",\"percent\":10}\n\n",
    );
    let (state, _) = update(
        state,
        Msg::TransportFailed {
            reason: "connection reset".into(),
        },
    );
    assert_eq!(state.error_message(), Some(CONNECTION_LOST_MESSAGE));
    assert_eq!(state.event_log().len(), 1);
}

#[test]
fn malformed_frames_are_dropped_without_state_change() {
    init_logging();
    let (state, effects) = feed(
        streaming("job-1"),
        concat!(
            "event: progress\ndata: {broken\n\n",
            "event: telemetry\ndata: {\"cpu\":3}\n\n",
            "event: progress\ndata: {\"percent\":3}\n\n",
        ),
    );
    assert!(effects.is_empty());
    assert_eq!(state.status(), Status::Streaming);
    assert!(state.event_log().is_empty());
    assert_eq!(state.last_known_percent(), 0.0);
    // The unknown kind is skipped without counting as a drop.
    assert_eq!(state.dropped_frames(), 2);
}

#[test]
fn consecutive_drops_flag_degraded_until_next_event() {
    init_logging();
    let mut state = streaming("job-1");
    for _ in 0..DEGRADED_STREAM_THRESHOLD {
        let (next, _) = update(state, Msg::FrameReceived(Frame::new("progress", "nope")));
        state = next;
    }
    assert!(state.view().degraded);
    assert_eq!(state.status(), Status::Streaming);

    let (state, _) = feed(
        state,
        "event: progress\ndata: {\"step\":\"fetch\",\"percent\":1}\n\n",
    );
    assert!(!state.view().degraded);
    assert_eq!(state.dropped_frames(), u64::from(DEGRADED_STREAM_THRESHOLD));
}

#[test]
fn manifest_failure_keeps_job_done() {
    init_logging();
    let (state, _) = feed(streaming("job-1"), "event: complete\ndata: {}\n\n");
    let (state, effects) = update(state, Msg::ManifestFetched(Err("http status 404".into())));
    assert!(effects.is_empty());
    assert_eq!(state.status(), Status::Done);
    assert_eq!(
        state.completion().map(|c| &c.manifest),
        Some(&ManifestState::Unavailable {
            reason: "http status 404".into()
        })
    );
    assert_eq!(state.view().manifest, None);

    // No later result can fill it in.
    let (state, _) = update(state, Msg::ManifestFetched(Ok(Manifest::default())));
    assert!(matches!(
        state.completion().map(|c| &c.manifest),
        Some(ManifestState::Unavailable { .. })
    ));
}

#[test]
fn manifest_success_is_stored_once() {
    init_logging();
    let (state, _) = feed(streaming("job-1"), "event: complete\ndata: {\"total_files\":1}\n\n");
    let manifest = Manifest {
        files: vec![FileRecord {
            path: "app.jac".into(),
            original: "print(1)".into(),
            converted: "with entry { print(1); }".into(),
            confidence: 0.92,
            validated: true,
        }],
        readme: "# app".into(),
        demo_script: "jac run app.jac".into(),
    };
    let (state, _) = update(state, Msg::ManifestFetched(Ok(manifest.clone())));
    assert_eq!(state.view().manifest, Some(manifest));
}

#[test]
fn manifest_before_completion_is_ignored() {
    init_logging();
    let (state, _) = update(streaming("job-1"), Msg::ManifestFetched(Ok(Manifest::default())));
    assert_eq!(state.status(), Status::Streaming);
    assert_eq!(state.completion(), None);
}
