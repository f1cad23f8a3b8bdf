use crate::event::{ConfidenceTier, Manifest, ProgressEvent};
use crate::state::{JobPhase, JobState, ManifestState, Status};

/// Number of progress events shown in the live log.
pub const RECENT_LOG_WINDOW: usize = 30;
/// Consecutive dropped frames after which the stream is reported as degraded.
pub const DEGRADED_STREAM_THRESHOLD: u32 = 5;
/// Files below this confidence are counted as needing review.
pub const NEEDS_REVIEW_BELOW: f64 = 0.75;

const CONNECTING_LABEL: &str = "Connecting to agent...";

/// Human label for a pipeline step; unknown steps render by name.
pub fn step_label(step: &str) -> &str {
    match step {
        "fetch" => "Fetching repo files",
        "analyze" => "Analyzing file roles",
        "plan" => "Building OSP mapping plan",
        "convert" => "Converting to Jac",
        "assemble" => "Assembling output",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobView {
    pub job_id: String,
    pub status: Status,
    pub error_message: Option<String>,
    pub step_label: String,
    pub display_percent: u8,
    pub last_known_percent: u8,
    pub current_file: Option<CurrentFileView>,
    pub step_counts: Vec<StepCount>,
    pub recent_log: Vec<LogLineView>,
    pub event_count: usize,
    pub summary: Option<SummaryView>,
    pub manifest: Option<Manifest>,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentFileView {
    pub file: String,
    pub confidence_percent: Option<u8>,
    pub tier: Option<ConfidenceTier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCount {
    pub step: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLineView {
    pub step: String,
    pub file: Option<String>,
    pub role: Option<String>,
    pub confidence_percent: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryView {
    pub files_converted: u64,
    pub avg_confidence_percent: u8,
    pub needs_review: usize,
    pub validated: usize,
}

impl JobView {
    pub(crate) fn from_state(state: &JobState) -> Self {
        let log = state.event_log();
        let last = log.last();
        let manifest = state.completion().and_then(|c| match &c.manifest {
            ManifestState::Loaded(manifest) => Some(manifest.clone()),
            ManifestState::Pending | ManifestState::Unavailable { .. } => None,
        });

        let summary = match state.phase() {
            JobPhase::Done(completion) => Some(summarize(completion, manifest.as_ref())),
            _ => None,
        };

        Self {
            job_id: state.job_id().to_string(),
            status: state.status(),
            error_message: state.error_message().map(ToOwned::to_owned),
            step_label: last
                .map(|ev| step_label(&ev.step).to_string())
                .unwrap_or_else(|| CONNECTING_LABEL.to_string()),
            display_percent: state.smoother().display_percent(),
            last_known_percent: state.last_known_percent().round() as u8,
            current_file: last.and_then(current_file),
            step_counts: step_counts(log),
            recent_log: log
                .iter()
                .skip(log.len().saturating_sub(RECENT_LOG_WINDOW))
                .map(log_line)
                .collect(),
            event_count: log.len(),
            summary,
            manifest,
            degraded: state.consecutive_drops() >= DEGRADED_STREAM_THRESHOLD,
        }
    }
}

fn current_file(event: &ProgressEvent) -> Option<CurrentFileView> {
    let file = event.file.clone()?;
    Some(CurrentFileView {
        file,
        confidence_percent: event.confidence.map(as_percent),
        tier: event.confidence.map(ConfidenceTier::of),
    })
}

fn log_line(event: &ProgressEvent) -> LogLineView {
    LogLineView {
        step: event.step.clone(),
        file: event.file.clone(),
        role: event.role.clone(),
        confidence_percent: event.confidence.map(as_percent),
    }
}

/// Per-step counts over the whole log, in first-seen order.
fn step_counts(log: &[ProgressEvent]) -> Vec<StepCount> {
    let mut counts: Vec<StepCount> = Vec::new();
    for event in log {
        match counts.iter_mut().find(|c| c.step == event.step) {
            Some(entry) => entry.count += 1,
            None => counts.push(StepCount {
                step: event.step.clone(),
                label: step_label(&event.step).to_string(),
                count: 1,
            }),
        }
    }
    counts
}

fn summarize(completion: &crate::Completion, manifest: Option<&Manifest>) -> SummaryView {
    let files = manifest.map(|m| m.files.as_slice()).unwrap_or_default();
    SummaryView {
        // A zero count from the server defers to the manifest.
        files_converted: completion
            .summary
            .total_files
            .filter(|&count| count > 0)
            .unwrap_or(files.len() as u64),
        avg_confidence_percent: as_percent(completion.summary.avg_confidence.unwrap_or(0.0)),
        needs_review: files
            .iter()
            .filter(|f| f.confidence < NEEDS_REVIEW_BELOW)
            .count(),
        validated: files.iter().filter(|f| f.validated).count(),
    }
}

fn as_percent(fraction: f64) -> u8 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}
