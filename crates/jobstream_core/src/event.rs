use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message shown when a server `error` frame carries no message of its own.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Conversion failed";

/// The wire name of each event kind the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Progress,
    Complete,
    Error,
}

impl EventKind {
    /// Maps a frame's `event:` value to a kind; unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "progress" => Some(Self::Progress),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// A dispatched, shape-checked event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(ProgressEvent),
    Complete(JobSummary),
    Error(ErrorEvent),
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Progress(_) => EventKind::Progress,
            Self::Complete(_) => EventKind::Complete,
            Self::Error(_) => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: String,
    /// Server-reported completion; the pipeline emits this as `pct`.
    #[serde(default, alias = "pct")]
    pub percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobSummary {
    #[serde(default)]
    pub total_files: Option<u64>,
    #[serde(default)]
    pub avg_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Fields this client does not interpret, kept for the host.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
}

impl ErrorEvent {
    pub fn display_message(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
    }
}

/// Final artifact manifest returned by `GET /preview/{job_id}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub readme: String,
    #[serde(default)]
    pub demo_script: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub converted: String,
    /// In `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub validated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn of(confidence: f64) -> Self {
        if confidence >= 0.85 {
            Self::High
        } else if confidence >= 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}
