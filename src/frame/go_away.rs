use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use super::head::{Head, Kind, StreamId};
use crate::error::Reason;

#[derive(Debug, Clone)]
pub struct GoAway {
    last_stream_id: StreamId,
    reason: Reason,
    debug_data: Bytes,
}

impl GoAway {
    pub fn new(last_stream_id: StreamId, reason: Reason) -> GoAway {
        GoAway {
            last_stream_id,
            reason,
            debug_data: Bytes::new(),
        }
    }

    pub fn with_debug_data(mut self, data: impl Into<Bytes>) -> Self {
        self.debug_data = data.into();
        self
    }

    pub fn last_stream_id(&self) -> StreamId {
        self.last_stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<GoAway, Reason> {
        if !head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }
        if payload.len() < 8 {
            return Err(Reason::FrameSizeError);
        }
        let last_stream_id = StreamId::new(BigEndian::read_u32(&payload[0..4]) & !(1 << 31));
        let reason = Reason::from_wire(BigEndian::read_u32(&payload[4..8]));
        let debug_data = Bytes::copy_from_slice(&payload[8..]);
        Ok(GoAway {
            last_stream_id,
            reason,
            debug_data,
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let len = 8 + self.debug_data.len();
        Head::new(Kind::GoAway, 0, StreamId::ZERO).encode(len, dst);
        dst.put_u32(u32::from(self.last_stream_id) & !(1 << 31));
        dst.put_u32(self.reason.into_wire());
        dst.put_slice(&self.debug_data);
    }
}
