use super::head::{Head, StreamId};
use crate::error::Reason;

/// A PRIORITY frame. Parsed for protocol conformance but its fields are
/// ignored, per spec §4.2 ("Priority fields are parsed but ignored").
#[derive(Debug, Clone)]
pub struct Priority {
    stream_id: StreamId,
}

impl Priority {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Priority, Reason> {
        if head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }
        if payload.len() != 5 {
            return Err(Reason::FrameSizeError);
        }
        Ok(Priority {
            stream_id: head.stream_id(),
        })
    }
}
