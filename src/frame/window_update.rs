use byteorder::{BigEndian, ByteOrder};

use super::head::{Head, StreamId};
use crate::error::Reason;

/// WINDOW_UPDATE is parsed but, per spec §4.2, its effect is not implemented
/// in v1 (outbound flow-control windowing is a named Non-goal).
#[derive(Debug, Clone)]
pub struct WindowUpdate {
    stream_id: StreamId,
    increment: u32,
}

impl WindowUpdate {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn increment(&self) -> u32 {
        self.increment
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<WindowUpdate, Reason> {
        if payload.len() != 4 {
            return Err(Reason::FrameSizeError);
        }
        let increment = BigEndian::read_u32(payload) & !(1 << 31);
        Ok(WindowUpdate {
            stream_id: head.stream_id(),
            increment,
        })
    }
}
