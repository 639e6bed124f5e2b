use byteorder::{BigEndian, ByteOrder};
use bytes::BufMut;

/// A stream identifier. Client-initiated streams are odd, server-initiated
/// (pushed) streams are even; stream zero refers to the connection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u32);

impl StreamId {
    pub const ZERO: StreamId = StreamId(0);

    pub fn new(id: u32) -> StreamId {
        StreamId(id & !(1 << 31))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Server-initiated stream ids (and promised streams) are even and
    /// non-zero; client-initiated ids are odd.
    pub fn is_server_initiated(&self) -> bool {
        self.0 != 0 && self.0 % 2 == 0
    }

    pub fn is_client_initiated(&self) -> bool {
        self.0 != 0 && self.0 % 2 == 1
    }
}

impl From<u32> for StreamId {
    fn from(v: u32) -> StreamId {
        StreamId::new(v)
    }
}

impl From<StreamId> for u32 {
    fn from(v: StreamId) -> u32 {
        v.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream({})", self.0)
    }
}

/// Frame type, per RFC 7540 §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    Headers,
    Priority,
    Reset,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

impl Kind {
    pub fn encode(self) -> u8 {
        match self {
            Kind::Data => 0,
            Kind::Headers => 1,
            Kind::Priority => 2,
            Kind::Reset => 3,
            Kind::Settings => 4,
            Kind::PushPromise => 5,
            Kind::Ping => 6,
            Kind::GoAway => 7,
            Kind::WindowUpdate => 8,
            Kind::Continuation => 9,
            Kind::Unknown(v) => v,
        }
    }

    pub fn load(byte: u8) -> Kind {
        match byte {
            0 => Kind::Data,
            1 => Kind::Headers,
            2 => Kind::Priority,
            3 => Kind::Reset,
            4 => Kind::Settings,
            5 => Kind::PushPromise,
            6 => Kind::Ping,
            7 => Kind::GoAway,
            8 => Kind::WindowUpdate,
            9 => Kind::Continuation,
            other => Kind::Unknown(other),
        }
    }
}

pub const HEADER_LEN: usize = 9;

/// The 9-byte frame header common to every HTTP/2 frame: a 24-bit length,
/// an 8-bit type, an 8-bit flags field, and a 31-bit stream identifier.
#[derive(Debug, Clone, Copy)]
pub struct Head {
    kind: Kind,
    flag: u8,
    stream_id: StreamId,
}

impl Head {
    pub fn new(kind: Kind, flag: u8, stream_id: StreamId) -> Head {
        Head {
            kind,
            flag,
            stream_id,
        }
    }

    /// Parse the 9-byte frame header. The 24-bit length prefix (the first
    /// three bytes) is read separately by the caller, which needs it before
    /// the rest of the header is even available.
    pub fn parse(header: &[u8; HEADER_LEN]) -> Head {
        let kind = Kind::load(header[3]);
        let flag = header[4];
        let stream_id = StreamId::new(BigEndian::read_u32(&header[5..9]) & !(1 << 31));
        Head {
            kind,
            flag,
            stream_id,
        }
    }

    /// Read the 24-bit payload length prefix from the first three bytes of
    /// a frame header.
    pub fn parse_len(header: &[u8]) -> usize {
        (header[0] as usize) << 16 | (header[1] as usize) << 8 | header[2] as usize
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Encode the header into `dst`, given the already-known payload length.
    pub fn encode(&self, payload_len: usize, dst: &mut impl BufMut) {
        debug_assert!(payload_len < 1 << 24, "frame payload too large to encode");
        dst.put_uint(payload_len as u64, 3);
        dst.put_u8(self.kind.encode());
        dst.put_u8(self.flag);
        dst.put_u32(u32::from(self.stream_id) & !(1 << 31));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_parity() {
        assert!(StreamId::new(1).is_client_initiated());
        assert!(!StreamId::new(1).is_server_initiated());
        assert!(StreamId::new(2).is_server_initiated());
        assert!(StreamId::ZERO.is_zero());
    }

    #[test]
    fn head_round_trips() {
        let head = Head::new(Kind::Headers, 0x5, StreamId::new(3));
        let mut buf = Vec::new();
        head.encode(128, &mut buf);
        assert_eq!(buf.len(), HEADER_LEN);

        let header: [u8; HEADER_LEN] = buf[..HEADER_LEN].try_into().unwrap();
        let parsed = Head::parse(&header);
        assert_eq!(parsed.kind(), Kind::Headers);
        assert_eq!(parsed.flag(), 0x5);
        assert_eq!(parsed.stream_id(), StreamId::new(3));
    }
}
