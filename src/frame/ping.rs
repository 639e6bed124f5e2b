use bytes::{BufMut, BytesMut};

use super::head::{Head, Kind, StreamId};
use crate::error::Reason;

const ACK_FLAG: u8 = 0x1;

pub type PingPayload = [u8; 8];

/// A PING frame: an 8-byte opaque payload, optionally an acknowledgement.
#[derive(Debug, Clone)]
pub struct Ping {
    ack: bool,
    payload: PingPayload,
}

impl Ping {
    pub fn ping(payload: PingPayload) -> Ping {
        Ping {
            ack: false,
            payload,
        }
    }

    pub fn pong(payload: PingPayload) -> Ping {
        Ping { ack: true, payload }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn payload(&self) -> PingPayload {
        self.payload
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Ping, Reason> {
        if !head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }
        if payload.len() != 8 {
            return Err(Reason::FrameSizeError);
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(payload);
        let ack = head.flag() & ACK_FLAG != 0;
        Ok(Ping { ack, payload: buf })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let flag = if self.ack { ACK_FLAG } else { 0 };
        Head::new(Kind::Ping, flag, StreamId::ZERO).encode(8, dst);
        dst.put_slice(&self.payload);
    }
}
