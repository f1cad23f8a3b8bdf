use crate::event::{JobSummary, Manifest, ProgressEvent};
use crate::smoother::{ProgressSmoother, SmootherSettings};
use crate::view_model::JobView;

pub type JobId = String;

/// Message shown when the stream cannot be opened.
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to stream";
/// Message shown when an open stream drops before a terminal event.
pub const CONNECTION_LOST_MESSAGE: &str = "Lost connection to server. Please try again.";

/// Flat lifecycle status, the only thing a renderer needs to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Connecting,
    Streaming,
    Done,
    Error,
}

/// Where a terminal failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The stream could not be established.
    Connect,
    /// The stream broke or closed after it was established.
    ConnectionLost,
    /// The server sent an `error` event.
    Server,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManifestState {
    Pending,
    Loaded(Manifest),
    /// Retrieval failed; the job stays done but has no manifest.
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub summary: JobSummary,
    pub manifest: ManifestState,
}

/// Lifecycle with the data each state owns.
///
/// `Done` and `Error` are absorbing.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPhase {
    Connecting,
    Streaming,
    Done(Completion),
    Error {
        origin: FailureOrigin,
        message: String,
    },
}

impl JobPhase {
    pub fn status(&self) -> Status {
        match self {
            JobPhase::Connecting => Status::Connecting,
            JobPhase::Streaming => Status::Streaming,
            JobPhase::Done(_) => Status::Done,
            JobPhase::Error { .. } => Status::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Done(_) | JobPhase::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobState {
    job_id: JobId,
    phase: JobPhase,
    last_known_percent: f64,
    event_log: Vec<ProgressEvent>,
    smoother: ProgressSmoother,
    dropped_frames: u64,
    consecutive_drops: u32,
    manifest_requests: u32,
    dirty: bool,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new(JobId::new())
    }
}

impl JobState {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self::with_smoother(job_id, SmootherSettings::default())
    }

    pub fn with_smoother(job_id: impl Into<JobId>, settings: SmootherSettings) -> Self {
        Self {
            job_id: job_id.into(),
            phase: JobPhase::Connecting,
            last_known_percent: 0.0,
            event_log: Vec::new(),
            smoother: ProgressSmoother::new(settings),
            dropped_frames: 0,
            consecutive_drops: 0,
            manifest_requests: 0,
            dirty: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn phase(&self) -> &JobPhase {
        &self.phase
    }

    pub fn status(&self) -> Status {
        self.phase.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn last_known_percent(&self) -> f64 {
        self.last_known_percent
    }

    /// Every progress event received, oldest first.
    pub fn event_log(&self) -> &[ProgressEvent] {
        &self.event_log
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            JobPhase::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn completion(&self) -> Option<&Completion> {
        match &self.phase {
            JobPhase::Done(completion) => Some(completion),
            _ => None,
        }
    }

    pub fn smoother(&self) -> &ProgressSmoother {
        &self.smoother
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn consecutive_drops(&self) -> u32 {
        self.consecutive_drops
    }

    /// How many times a manifest fetch has been requested for this job.
    pub fn manifest_requests(&self) -> u32 {
        self.manifest_requests
    }

    pub fn view(&self) -> JobView {
        JobView::from_state(self)
    }

    /// Returns whether anything visible changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_phase(&mut self, phase: JobPhase) {
        self.phase = phase;
        self.mark_dirty();
    }

    pub(crate) fn fail(&mut self, origin: FailureOrigin, message: impl Into<String>) {
        self.set_phase(JobPhase::Error {
            origin,
            message: message.into(),
        });
    }

    /// Applies a progress event; returns `true` if it was the first one.
    pub(crate) fn record_progress(&mut self, event: ProgressEvent) -> bool {
        self.last_known_percent = crate::smoother::clamp_percent(event.percent);
        let first = self.smoother.observe_target(event.percent);
        self.event_log.push(event);
        self.mark_dirty();
        first
    }

    pub(crate) fn record_drop(&mut self) {
        self.dropped_frames += 1;
        self.consecutive_drops = self.consecutive_drops.saturating_add(1);
        if self.consecutive_drops == crate::view_model::DEGRADED_STREAM_THRESHOLD {
            self.mark_dirty();
        }
    }

    pub(crate) fn reset_drops(&mut self) {
        if self.consecutive_drops >= crate::view_model::DEGRADED_STREAM_THRESHOLD {
            self.mark_dirty();
        }
        self.consecutive_drops = 0;
    }

    pub(crate) fn note_manifest_request(&mut self) {
        self.manifest_requests += 1;
    }

    pub(crate) fn set_manifest(&mut self, manifest: ManifestState) -> bool {
        match &mut self.phase {
            JobPhase::Done(completion) if completion.manifest == ManifestState::Pending => {
                completion.manifest = manifest;
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    /// Runs one animation frame; marks dirty only when the rounded value moved.
    pub(crate) fn tick_animation(&mut self) -> bool {
        let before = self.smoother.display_percent();
        let animating = self.smoother.animation_tick();
        if self.smoother.display_percent() != before {
            self.mark_dirty();
        }
        animating
    }

    pub(crate) fn tick_simulation(&mut self) -> bool {
        let before = self.smoother.display_percent();
        let simulating = self.smoother.simulation_tick();
        if self.smoother.display_percent() != before {
            self.mark_dirty();
        }
        simulating
    }
}
