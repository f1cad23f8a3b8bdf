//! Jobstream core: event-stream decoding, the job state machine and progress smoothing.
//!
//! Nothing here performs I/O. The engine crate feeds transport chunks through
//! [`FrameDecoder`], wraps each frame in a [`Msg`], and runs the returned
//! [`Effect`]s.
mod dispatch;
mod effect;
mod event;
mod frame;
mod msg;
mod smoother;
mod state;
mod update;
mod view_model;

pub use dispatch::{dispatch, DispatchError};
pub use effect::Effect;
pub use event::{
    ConfidenceTier, ErrorEvent, EventKind, FileRecord, JobSummary, Manifest, ProgressEvent,
    StreamEvent, DEFAULT_FAILURE_MESSAGE,
};
pub use frame::{Frame, FrameDecoder};
pub use msg::Msg;
pub use smoother::{ProgressSmoother, SmootherSettings};
pub use state::{
    Completion, FailureOrigin, JobId, JobPhase, JobState, ManifestState, Status,
    CONNECTION_LOST_MESSAGE, CONNECT_FAILED_MESSAGE,
};
pub use update::update;
pub use view_model::{
    step_label, CurrentFileView, JobView, LogLineView, StepCount, SummaryView,
    DEGRADED_STREAM_THRESHOLD, NEEDS_REVIEW_BELOW, RECENT_LOG_WINDOW,
};
