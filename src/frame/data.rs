use bytes::{Bytes, BufMut, BytesMut};

use super::head::{Head, Kind, StreamId};
use crate::error::Reason;

const END_STREAM: u8 = 0x1;

#[derive(Debug, Clone)]
pub struct Data {
    stream_id: StreamId,
    payload: Bytes,
    end_stream: bool,
}

impl Data {
    pub fn new(stream_id: StreamId, payload: Bytes, end_stream: bool) -> Data {
        Data {
            stream_id,
            payload,
            end_stream,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Data, Reason> {
        if head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }
        let end_stream = head.flag() & END_STREAM == END_STREAM;
        Ok(Data {
            stream_id: head.stream_id(),
            payload,
            end_stream,
        })
    }

    /// Encode a single DATA frame whose payload must already fit within
    /// `max_frame_size`; splitting across that boundary is the caller's
    /// responsibility (see `split_data`).
    pub fn encode(&self, dst: &mut BytesMut) {
        let flag = if self.end_stream { END_STREAM } else { 0 };
        Head::new(Kind::Data, flag, self.stream_id).encode(self.payload.len(), dst);
        dst.put_slice(&self.payload);
    }
}

/// Split `payload` into a sequence of DATA frames no larger than
/// `max_frame_size`, setting END_STREAM only on the final frame and only if
/// `end_stream` was requested. Matches the frame codec contract named in
/// spec §6 (`split_data`) and the invariant in spec §8 that splitting a
/// payload of length L with max-frame-size M produces ceil(L/M) frames.
pub fn split_data(stream_id: StreamId, payload: Bytes, end_stream: bool, max_frame_size: usize) -> Vec<Data> {
    debug_assert!(max_frame_size > 0);

    if payload.is_empty() {
        return vec![Data::new(stream_id, payload, end_stream)];
    }

    let mut frames = Vec::with_capacity((payload.len() + max_frame_size - 1) / max_frame_size);
    let mut remaining = payload;
    while !remaining.is_empty() {
        let chunk_len = std::cmp::min(max_frame_size, remaining.len());
        let chunk = remaining.split_to(chunk_len);
        let is_last = remaining.is_empty();
        frames.push(Data::new(stream_id, chunk, is_last && end_stream));
    }
    frames
}

impl From<Data> for super::Frame {
    fn from(src: Data) -> Self {
        super::Frame::Data(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_ceil_of_length_over_max() {
        let payload = Bytes::from(vec![0u8; 25]);
        let frames = split_data(StreamId::new(1), payload, true, 10);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload().len(), 10);
        assert_eq!(frames[1].payload().len(), 10);
        assert_eq!(frames[2].payload().len(), 5);
    }

    #[test]
    fn only_the_final_frame_carries_end_stream() {
        let payload = Bytes::from(vec![1u8; 21]);
        let frames = split_data(StreamId::new(3), payload, true, 8);

        let end_stream_count = frames.iter().filter(|f| f.is_end_stream()).count();
        assert_eq!(end_stream_count, 1);
        assert!(frames.last().unwrap().is_end_stream());
    }

    #[test]
    fn end_stream_false_never_sets_the_flag() {
        let payload = Bytes::from(vec![1u8; 16]);
        let frames = split_data(StreamId::new(5), payload, false, 8);
        assert!(frames.iter().all(|f| !f.is_end_stream()));
    }

    #[test]
    fn concatenated_payload_round_trips() {
        let original: Vec<u8> = (0..50u8).collect();
        let frames = split_data(StreamId::new(1), Bytes::from(original.clone()), true, 7);

        let mut recombined = Vec::new();
        for f in &frames {
            recombined.extend_from_slice(f.payload());
        }
        assert_eq!(recombined, original);
    }

    #[test]
    fn empty_payload_still_emits_one_frame_to_carry_fin() {
        let frames = split_data(StreamId::new(1), Bytes::new(), true, 16_384);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_end_stream());
    }
}
