use serde_json::Value;

use crate::event::{EventKind, StreamEvent};
use crate::frame::Frame;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("malformed payload on `{event}` frame: {message}")]
    MalformedPayload { event: String, message: String },
    #[error("`{event}` payload has unexpected shape: {message}")]
    InvalidShape { event: String, message: String },
}

/// Classifies a completed frame.
///
/// `Ok(None)` means the frame parsed but names an event kind this client does
/// not know; such frames are skipped so newer servers stay compatible.
pub fn dispatch(frame: &Frame) -> Result<Option<StreamEvent>, DispatchError> {
    let payload: Value =
        serde_json::from_str(&frame.data).map_err(|err| DispatchError::MalformedPayload {
            event: frame.event.clone(),
            message: err.to_string(),
        })?;

    let Some(kind) = EventKind::from_wire(&frame.event) else {
        return Ok(None);
    };

    let shape_error = |err: serde_json::Error| DispatchError::InvalidShape {
        event: frame.event.clone(),
        message: err.to_string(),
    };

    let event = match kind {
        EventKind::Progress => {
            StreamEvent::Progress(serde_json::from_value(payload).map_err(shape_error)?)
        }
        EventKind::Complete => {
            StreamEvent::Complete(serde_json::from_value(payload).map_err(shape_error)?)
        }
        EventKind::Error => StreamEvent::Error(serde_json::from_value(payload).map_err(shape_error)?),
    };
    Ok(Some(event))
}
