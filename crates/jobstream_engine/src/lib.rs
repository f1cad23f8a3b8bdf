//! Jobstream engine: HTTP transport and the per-job session task.
mod api;
mod backend;
mod session;
mod types;

pub use api::{ApiClient, ClientSettings};
pub use backend::{ByteStream, JobBackend};
pub use session::{JobSession, SessionSettings};
pub use types::{ApiError, ApiFailureKind, ConvertRequest, StartedJob};
