use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::head::{Head, Kind, StreamId};
use crate::error::Reason;

const END_STREAM: u8 = 0x1;
const END_HEADERS: u8 = 0x4;
const PADDED: u8 = 0x8;
const PRIORITY: u8 = 0x20;

/// A HEADERS frame. The header block may be a fragment if `END_HEADERS` is
/// not set, in which case the parse engine accumulates further CONTINUATION
/// fragments before HPACK-decoding the concatenated block (spec §4.1, §4.5).
#[derive(Debug, Clone)]
pub struct Headers {
    stream_id: StreamId,
    end_stream: bool,
    end_headers: bool,
    header_block: Bytes,
}

impl Headers {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn is_end_headers(&self) -> bool {
        self.end_headers
    }

    pub fn into_header_block(self) -> Bytes {
        self.header_block
    }

    pub fn header_block(&self) -> &Bytes {
        &self.header_block
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<Headers, Reason> {
        if head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }

        let flag = head.flag();

        if flag & PADDED == PADDED {
            if payload.is_empty() {
                return Err(Reason::FrameSizeError);
            }
            let pad_len = payload[0] as usize;
            payload.advance(1);
            if pad_len > payload.len() {
                return Err(Reason::ProtocolError);
            }
            payload.truncate(payload.len() - pad_len);
        }

        if flag & PRIORITY == PRIORITY {
            // Stream dependency + weight (5 bytes); parsed elsewhere, ignored
            // here beyond validating the frame is long enough (spec §4.2).
            if payload.len() < 5 {
                return Err(Reason::FrameSizeError);
            }
            payload.advance(5);
        }

        Ok(Headers {
            stream_id: head.stream_id(),
            end_stream: flag & END_STREAM == END_STREAM,
            end_headers: flag & END_HEADERS == END_HEADERS,
            header_block: payload,
        })
    }

    /// Encode a HEADERS frame carrying an already HPACK-encoded block. If
    /// the block is larger than `max_frame_size` it is split across a
    /// HEADERS frame followed by CONTINUATION frames, all but the last
    /// without END_HEADERS.
    pub fn encode(
        stream_id: StreamId,
        end_stream: bool,
        block: &[u8],
        max_frame_size: usize,
        dst: &mut BytesMut,
    ) {
        let mut remaining = block;
        let mut first = true;

        loop {
            let chunk_len = std::cmp::min(max_frame_size, remaining.len());
            let (chunk, rest) = remaining.split_at(chunk_len);
            let is_last = rest.is_empty();

            let mut flag = 0;
            if first && end_stream {
                flag |= END_STREAM;
            }
            if is_last {
                flag |= END_HEADERS;
            }

            let kind = if first { Kind::Headers } else { Kind::Continuation };
            Head::new(kind, flag, stream_id).encode(chunk.len(), dst);
            dst.put_slice(chunk);

            if is_last {
                break;
            }
            remaining = rest;
            first = false;
        }
    }
}

/// A CONTINUATION frame: a raw header-block fragment with no flags beyond
/// END_HEADERS.
#[derive(Debug, Clone)]
pub struct Continuation {
    stream_id: StreamId,
    end_headers: bool,
    header_block: Bytes,
}

impl Continuation {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_headers(&self) -> bool {
        self.end_headers
    }

    pub fn into_header_block(self) -> Bytes {
        self.header_block
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Continuation, Reason> {
        if head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }
        Ok(Continuation {
            stream_id: head.stream_id(),
            end_headers: head.flag() & END_HEADERS == END_HEADERS,
            header_block: payload,
        })
    }
}

/// A PUSH_PROMISE frame, as encoded by the engine when executing a `push`
/// command (spec §4.3). Never accepted from a client: a server receiving
/// one is a connection error (spec §4.2).
#[derive(Debug, Clone)]
pub struct PushPromise {
    stream_id: StreamId,
    promised_id: StreamId,
    header_block: Bytes,
}

impl PushPromise {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn promised_id(&self) -> StreamId {
        self.promised_id
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<PushPromise, Reason> {
        if head.stream_id().is_zero() || payload.len() < 4 {
            return Err(Reason::ProtocolError);
        }
        let raw = payload.get_u32();
        let promised_id = StreamId::new(raw & !(1 << 31));
        Ok(PushPromise {
            stream_id: head.stream_id(),
            promised_id,
            header_block: payload,
        })
    }

    pub fn encode(
        stream_id: StreamId,
        promised_id: StreamId,
        block: &[u8],
        max_frame_size: usize,
        dst: &mut BytesMut,
    ) {
        let budget = max_frame_size.saturating_sub(4);
        let chunk_len = std::cmp::min(budget, block.len());
        let (first_chunk, rest) = block.split_at(chunk_len);
        let end_headers = rest.is_empty();

        let flag = if end_headers { 0x4 } else { 0 };
        Head::new(Kind::PushPromise, flag, stream_id).encode(4 + first_chunk.len(), dst);
        dst.put_u32(u32::from(promised_id) & !(1 << 31));
        dst.put_slice(first_chunk);

        if !rest.is_empty() {
            Headers::encode_continuation_only(stream_id, rest, max_frame_size, dst);
        }
    }
}

impl Headers {
    fn encode_continuation_only(stream_id: StreamId, block: &[u8], max_frame_size: usize, dst: &mut BytesMut) {
        let mut remaining = block;
        loop {
            let chunk_len = std::cmp::min(max_frame_size, remaining.len());
            let (chunk, rest) = remaining.split_at(chunk_len);
            let is_last = rest.is_empty();
            let flag = if is_last { END_HEADERS } else { 0 };
            Head::new(Kind::Continuation, flag, stream_id).encode(chunk.len(), dst);
            dst.put_slice(chunk);
            if is_last {
                break;
            }
            remaining = rest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::head::HEADER_LEN;

    fn decode_frames(buf: &[u8]) -> Vec<(Kind, u8, StreamId, Bytes)> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let header: [u8; HEADER_LEN] = buf[offset..offset + HEADER_LEN].try_into().unwrap();
            let len = Head::parse_len(&header);
            let head = Head::parse(&header);
            let payload = Bytes::copy_from_slice(&buf[offset + HEADER_LEN..offset + HEADER_LEN + len]);
            out.push((head.kind(), head.flag(), head.stream_id(), payload));
            offset += HEADER_LEN + len;
        }
        out
    }

    #[test]
    fn small_block_fits_a_single_headers_frame() {
        let mut buf = BytesMut::new();
        Headers::encode(StreamId::new(1), true, b"hello", 16_384, &mut buf);

        let frames = decode_frames(&buf);
        assert_eq!(frames.len(), 1);
        let (kind, flag, _, payload) = &frames[0];
        assert_eq!(*kind, Kind::Headers);
        assert_eq!(flag & END_HEADERS, END_HEADERS);
        assert_eq!(flag & END_STREAM, END_STREAM);
        assert_eq!(payload.as_ref(), b"hello");
    }

    #[test]
    fn oversized_block_splits_into_headers_then_continuation() {
        let block = vec![0xABu8; 25];
        let mut buf = BytesMut::new();
        Headers::encode(StreamId::new(1), false, &block, 10, &mut buf);

        let frames = decode_frames(&buf);
        assert_eq!(frames.len(), 3);

        assert_eq!(frames[0].0, Kind::Headers);
        assert_eq!(frames[0].1 & END_HEADERS, 0);
        assert_eq!(frames[1].0, Kind::Continuation);
        assert_eq!(frames[1].1 & END_HEADERS, 0);
        assert_eq!(frames[2].0, Kind::Continuation);
        assert_eq!(frames[2].1 & END_HEADERS, END_HEADERS);

        let mut recombined = Vec::new();
        for (_, _, _, payload) in &frames {
            recombined.extend_from_slice(payload);
        }
        assert_eq!(recombined, block);
    }

    #[test]
    fn load_strips_padding() {
        let mut payload = BytesMut::new();
        payload.put_u8(2); // pad length
        payload.put_slice(b"abc");
        payload.put_slice(&[0, 0]); // padding

        let head = Head::new(Kind::Headers, PADDED, StreamId::new(1));
        let headers = Headers::load(head, payload.freeze()).unwrap();
        assert_eq!(headers.header_block().as_ref(), b"abc");
    }
}
