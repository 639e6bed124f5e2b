use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};

use super::head::{Head, Kind, StreamId};
use crate::error::Reason;

#[derive(Debug, Clone)]
pub struct RstStream {
    stream_id: StreamId,
    reason: Reason,
}

impl RstStream {
    pub fn new(stream_id: StreamId, reason: Reason) -> RstStream {
        RstStream { stream_id, reason }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<RstStream, Reason> {
        if head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }
        if payload.len() != 4 {
            return Err(Reason::FrameSizeError);
        }
        let reason = Reason::from_wire(BigEndian::read_u32(payload));
        Ok(RstStream {
            stream_id: head.stream_id(),
            reason,
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        Head::new(Kind::Reset, 0, self.stream_id).encode(4, dst);
        dst.put_u32(self.reason.into_wire());
    }
}
