use jobstream_logging::{job_debug, job_info, job_trace, job_warn};

use crate::dispatch::dispatch;
use crate::state::{Completion, FailureOrigin, ManifestState, CONNECTION_LOST_MESSAGE};
use crate::{Effect, Frame, JobPhase, JobState, Msg, StreamEvent, CONNECT_FAILED_MESSAGE};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: JobState, msg: Msg) -> (JobState, Vec<Effect>) {
    let effects = match msg {
        Msg::Connected => {
            if matches!(state.phase(), JobPhase::Connecting) {
                job_info!("job {} stream connected", state.job_id());
                state.set_phase(JobPhase::Streaming);
            }
            Vec::new()
        }
        Msg::ConnectFailed { reason } => {
            if matches!(state.phase(), JobPhase::Connecting) {
                job_warn!("job {} stream connect failed: {}", state.job_id(), reason);
                state.fail(FailureOrigin::Connect, CONNECT_FAILED_MESSAGE);
                vec![Effect::CloseStream]
            } else {
                Vec::new()
            }
        }
        Msg::FrameReceived(frame) => apply_frame(&mut state, frame),
        Msg::TransportFailed { reason } => lose_connection(&mut state, &reason),
        Msg::StreamEnded => lose_connection(&mut state, "stream ended before a terminal event"),
        Msg::ManifestFetched(result) => {
            let manifest = match result {
                Ok(manifest) => ManifestState::Loaded(manifest),
                Err(reason) => {
                    job_warn!("job {} manifest unavailable: {}", state.job_id(), reason);
                    ManifestState::Unavailable { reason }
                }
            };
            if !state.set_manifest(manifest) {
                job_debug!("job {} ignoring manifest outside pending completion", state.job_id());
            }
            Vec::new()
        }
        Msg::AnimationTick => {
            state.tick_animation();
            Vec::new()
        }
        Msg::SimulationTick => {
            if state.tick_simulation() {
                Vec::new()
            } else {
                vec![Effect::StopSimulation]
            }
        }
    };

    (state, effects)
}

fn apply_frame(state: &mut JobState, frame: Frame) -> Vec<Effect> {
    if !matches!(state.phase(), JobPhase::Streaming) {
        job_trace!(
            "job {} ignoring `{}` frame in {:?}",
            state.job_id(),
            frame.event,
            state.status()
        );
        return Vec::new();
    }

    let event = match dispatch(&frame) {
        Ok(Some(event)) => event,
        Ok(None) => {
            job_trace!("job {} skipping unknown event `{}`", state.job_id(), frame.event);
            return Vec::new();
        }
        Err(err) => {
            state.record_drop();
            job_debug!(
                "job {} dropped frame ({} consecutive): {}",
                state.job_id(),
                state.consecutive_drops(),
                err
            );
            return Vec::new();
        }
    };

    state.reset_drops();
    match event {
        StreamEvent::Progress(progress) => {
            if state.record_progress(progress) {
                vec![Effect::StopSimulation]
            } else {
                Vec::new()
            }
        }
        StreamEvent::Complete(summary) => {
            job_info!("job {} complete", state.job_id());
            let job_id = state.job_id().to_string();
            state.set_phase(JobPhase::Done(Completion {
                summary,
                manifest: ManifestState::Pending,
            }));
            state.note_manifest_request();
            vec![Effect::CloseStream, Effect::FetchManifest { job_id }]
        }
        StreamEvent::Error(error) => {
            let message = error.display_message().to_string();
            job_info!("job {} failed: {}", state.job_id(), message);
            state.fail(FailureOrigin::Server, message);
            vec![Effect::CloseStream]
        }
    }
}

fn lose_connection(state: &mut JobState, reason: &str) -> Vec<Effect> {
    match state.phase() {
        JobPhase::Connecting => {
            job_warn!("job {} stream never opened: {}", state.job_id(), reason);
            state.fail(FailureOrigin::Connect, CONNECT_FAILED_MESSAGE);
            vec![Effect::CloseStream]
        }
        JobPhase::Streaming => {
            job_warn!("job {} lost connection: {}", state.job_id(), reason);
            state.fail(FailureOrigin::ConnectionLost, CONNECTION_LOST_MESSAGE);
            vec![Effect::CloseStream]
        }
        JobPhase::Done(_) | JobPhase::Error { .. } => Vec::new(),
    }
}
