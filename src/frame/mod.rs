//! Frame types and the frame codec contract (spec §4.1, §6): turning bytes
//! off the wire into typed frames, and typed frames back into bytes.

pub mod data;
pub mod go_away;
pub mod head;
pub mod headers;
pub mod ping;
pub mod priority;
pub mod reset;
pub mod settings;
pub mod window_update;

pub use data::{split_data, Data};
pub use go_away::GoAway;
pub use head::{Head, Kind, StreamId, HEADER_LEN};
pub use headers::{Continuation, Headers, PushPromise};
pub use ping::{Ping, PingPayload};
pub use priority::Priority;
pub use reset::RstStream;
pub use settings::{SettingSet, Settings};
pub use window_update::WindowUpdate;

use bytes::Bytes;

use crate::error::Reason;

/// The maximum frame payload size any engine-side peer will ever be asked to
/// accept, per RFC 7540 §4.1 (2^24 - 1); `max_frame_size` negotiated via
/// SETTINGS is always below this.
pub const MAX_FRAME_SIZE_UPPER_BOUND: usize = (1 << 24) - 1;

/// A decoded frame of any type.
#[derive(Debug, Clone)]
pub enum Frame {
    Data(Data),
    Headers(Headers),
    Priority(Priority),
    Reset(RstStream),
    Settings(Settings),
    PushPromise(PushPromise),
    Ping(Ping),
    GoAway(GoAway),
    WindowUpdate(WindowUpdate),
    Continuation(Continuation),
    /// A frame type the engine does not recognize. RFC 7540 §4.1 requires
    /// these be ignored rather than rejected.
    Unknown(StreamId),
}

impl Frame {
    pub fn stream_id(&self) -> StreamId {
        match self {
            Frame::Data(f) => f.stream_id(),
            Frame::Headers(f) => f.stream_id(),
            Frame::Priority(f) => f.stream_id(),
            Frame::Reset(f) => f.stream_id(),
            Frame::Settings(_) => StreamId::ZERO,
            Frame::PushPromise(f) => f.stream_id(),
            Frame::Ping(_) => StreamId::ZERO,
            Frame::GoAway(_) => StreamId::ZERO,
            Frame::WindowUpdate(f) => f.stream_id(),
            Frame::Continuation(f) => f.stream_id(),
            Frame::Unknown(id) => *id,
        }
    }
}

/// Outcome of attempting to parse one frame out of a buffer, per the frame
/// codec contract (spec §6).
pub enum Decoded {
    /// A complete frame was parsed; `usize` is the number of bytes consumed.
    Frame(Frame, usize),
    /// Not enough bytes are buffered yet; reports how many more are needed
    /// before parsing can be retried.
    Need(usize),
    /// The frame is malformed in a way that only resets its stream; `usize`
    /// is the number of bytes consumed (the whole malformed frame).
    StreamError(StreamId, Reason, usize),
    /// The frame is malformed in a way that is fatal to the connection.
    ConnectionError(Reason),
}

/// Attempt to decode a single frame from the front of `buf`, given the
/// peer's advertised `max_frame_size`. Does not consume `buf`; the caller
/// advances its cursor by the returned byte count on `Decoded::Frame`.
pub fn decode(buf: &[u8], max_frame_size: usize) -> Decoded {
    if buf.len() < HEADER_LEN {
        return Decoded::Need(HEADER_LEN - buf.len());
    }

    let len = Head::parse_len(buf);
    if len > max_frame_size {
        return Decoded::ConnectionError(Reason::FrameSizeError);
    }

    let total = HEADER_LEN + len;
    if buf.len() < total {
        return Decoded::Need(total - buf.len());
    }

    let header: [u8; HEADER_LEN] = buf[..HEADER_LEN].try_into().unwrap();
    let head = Head::parse(&header);
    let payload = Bytes::copy_from_slice(&buf[HEADER_LEN..total]);

    let frame = match head.kind() {
        Kind::Data => Data::load(head, payload).map(Frame::Data),
        Kind::Headers => Headers::load(head, payload).map(Frame::Headers),
        Kind::Priority => Priority::load(head, &payload).map(Frame::Priority),
        Kind::Reset => RstStream::load(head, &payload).map(Frame::Reset),
        Kind::Settings => Settings::load(head, &payload).map(Frame::Settings),
        Kind::PushPromise => PushPromise::load(head, payload).map(Frame::PushPromise),
        Kind::Ping => Ping::load(head, &payload).map(Frame::Ping),
        Kind::GoAway => GoAway::load(head, &payload).map(Frame::GoAway),
        Kind::WindowUpdate => WindowUpdate::load(head, &payload).map(Frame::WindowUpdate),
        Kind::Continuation => Continuation::load(head, payload).map(Frame::Continuation),
        Kind::Unknown(_) => {
            // Unknown frame types are ignored per RFC 7540 §4.1, but we still
            // need to report how many bytes were consumed.
            return Decoded::Frame(Frame::Unknown(head.stream_id()), total);
        }
    };

    match frame {
        Ok(frame) => Decoded::Frame(frame, total),
        Err(reason) => {
            if head.stream_id().is_zero() {
                Decoded::ConnectionError(reason)
            } else {
                Decoded::StreamError(head.stream_id(), reason, total)
            }
        }
    }
}
