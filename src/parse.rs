//! Parse engine (spec §4.1): preface validation, frame decoding, and
//! HEADERS/CONTINUATION reassembly into a single header block.

use bytes::{Bytes, BytesMut};

use crate::error::ConnectionError;
use crate::frame::{self, Decoded, Frame, StreamId, HEADER_LEN};
use crate::timer::TimerId;

/// The fixed 24-byte client connection preface (RFC 7540 §3.5).
pub const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

#[derive(Debug)]
pub enum ParseMode {
    AwaitPrefaceSequence(TimerId),
    AwaitPrefaceSettings(TimerId),
    Normal,
    Continuation {
        stream_id: StreamId,
        end_stream: bool,
        fragment: BytesMut,
    },
}

/// A unit of output from the parser: either a frame to dispatch as-is, or a
/// fully reassembled header block (HEADERS alone, or HEADERS+CONTINUATION)
/// ready for HPACK decode and stream initialisation (spec §4.5).
#[derive(Debug)]
pub enum Parsed {
    Frame(Frame),
    HeaderBlock {
        stream_id: StreamId,
        end_stream: bool,
        block: Bytes,
    },
}

/// Outcome of pumping the parser once.
pub enum Step {
    /// One parsed unit, with more possibly available without new bytes.
    Item(Parsed),
    /// The parser consumed everything it could; `needs` more bytes before
    /// it can make further progress.
    Need(usize),
    ConnectionError(ConnectionError),
}

/// Buffers inbound bytes and drives `ParseMode` forward (spec §3's "Parse
/// cursor" and "Parse mode").
pub struct Parser {
    buf: BytesMut,
    mode: ParseMode,
    max_frame_size: usize,
}

impl Parser {
    pub fn new(preface_timer: TimerId, max_frame_size: usize) -> Self {
        Parser {
            buf: BytesMut::new(),
            mode: ParseMode::AwaitPrefaceSequence(preface_timer),
            max_frame_size,
        }
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }

    pub fn mode(&self) -> &ParseMode {
        &self.mode
    }

    /// Pull the next parseable unit out of the buffer. Returns `Need(0)`
    /// (an empty buffer with nothing buffered yet) when there is truly
    /// nothing left to do until more bytes arrive.
    pub fn step(&mut self) -> Step {
        match &self.mode {
            ParseMode::AwaitPrefaceSequence(_timer) => self.step_preface_sequence(),
            ParseMode::AwaitPrefaceSettings(_timer) => self.step_preface_settings(),
            ParseMode::Normal => self.step_normal(),
            ParseMode::Continuation { .. } => self.step_continuation(),
        }
    }

    fn step_preface_sequence(&mut self) -> Step {
        let n = std::cmp::min(self.buf.len(), PREFACE.len());
        if self.buf[..n] != PREFACE[..n] {
            return Step::ConnectionError(ConnectionError::protocol("invalid connection preface"));
        }
        if self.buf.len() < PREFACE.len() {
            return Step::Need(PREFACE.len() - self.buf.len());
        }

        self.buf.split_to(PREFACE.len());
        let timer = match &self.mode {
            ParseMode::AwaitPrefaceSequence(t) => *t,
            _ => unreachable!(),
        };
        self.mode = ParseMode::AwaitPrefaceSettings(timer);
        self.step()
    }

    fn step_preface_settings(&mut self) -> Step {
        if self.buf.len() < HEADER_LEN {
            return Step::Need(HEADER_LEN - self.buf.len());
        }
        let len = frame::Head::parse_len(&self.buf);
        let kind_byte = self.buf[3];
        let flag_byte = self.buf[4];
        if frame::Kind::load(kind_byte) != frame::Kind::Settings || flag_byte & 0x1 != 0 {
            return Step::ConnectionError(ConnectionError::protocol(
                "first frame after preface must be a non-ack SETTINGS frame",
            ));
        }
        if self.buf.len() < HEADER_LEN + len {
            return Step::Need(HEADER_LEN + len - self.buf.len());
        }

        // The full frame is buffered and has already been confirmed to be
        // a non-ack SETTINGS frame: the preface phase is over. Transition
        // now (this implicitly cancels the preface timer, since it is only
        // consulted while still in one of the `AwaitPreface*` modes) and
        // let the dispatcher apply the frame through the normal path.
        self.mode = ParseMode::Normal;
        self.step_normal()
    }

    fn step_normal(&mut self) -> Step {
        match frame::decode(&self.buf, self.max_frame_size) {
            Decoded::Frame(Frame::Headers(h), consumed) => {
                self.buf.advance_consumed(consumed);
                if h.is_end_headers() {
                    Step::Item(Parsed::HeaderBlock {
                        stream_id: h.stream_id(),
                        end_stream: h.is_end_stream(),
                        block: h.into_header_block(),
                    })
                } else {
                    let stream_id = h.stream_id();
                    let end_stream = h.is_end_stream();
                    let mut fragment = BytesMut::new();
                    fragment.extend_from_slice(&h.into_header_block());
                    self.mode = ParseMode::Continuation {
                        stream_id,
                        end_stream,
                        fragment,
                    };
                    self.step()
                }
            }
            Decoded::Frame(frame, consumed) => {
                self.buf.advance_consumed(consumed);
                Step::Item(Parsed::Frame(frame))
            }
            Decoded::Need(n) => Step::Need(n),
            Decoded::StreamError(id, reason, consumed) => {
                self.buf.advance_consumed(consumed);
                // The frame itself was malformed; surface it as a
                // synthetic RST_STREAM so the dispatcher resets the stream
                // through its one uniform path (spec §4.6).
                Step::Item(Parsed::Frame(Frame::Reset(frame::RstStream::new(id, reason))))
            }
            Decoded::ConnectionError(reason) => {
                Step::ConnectionError(ConnectionError::new(reason, "frame codec rejected input"))
            }
        }
    }

    fn step_continuation(&mut self) -> Step {
        if self.buf.len() < HEADER_LEN {
            return Step::Need(HEADER_LEN - self.buf.len());
        }
        let len = frame::Head::parse_len(&self.buf);
        let kind_byte = self.buf[3];
        if frame::Kind::load(kind_byte) != frame::Kind::Continuation {
            return Step::ConnectionError(ConnectionError::protocol(
                "expected CONTINUATION frame mid-header-block",
            ));
        }
        if self.buf.len() < HEADER_LEN + len {
            return Step::Need(HEADER_LEN + len - self.buf.len());
        }

        match frame::decode(&self.buf, self.max_frame_size) {
            Decoded::Frame(Frame::Continuation(c), consumed) => {
                self.buf.advance_consumed(consumed);
                let (stream_id, end_stream) = match &self.mode {
                    ParseMode::Continuation {
                        stream_id,
                        end_stream,
                        ..
                    } => (*stream_id, *end_stream),
                    _ => unreachable!(),
                };
                if c.stream_id() != stream_id {
                    return Step::ConnectionError(ConnectionError::protocol(
                        "CONTINUATION stream id mismatch",
                    ));
                }

                let end_headers = c.is_end_headers();
                let fragment_piece = c.into_header_block();

                let fragment = match &mut self.mode {
                    ParseMode::Continuation { fragment, .. } => fragment,
                    _ => unreachable!(),
                };
                fragment.extend_from_slice(&fragment_piece);

                if end_headers {
                    let block = std::mem::take(fragment).freeze();
                    self.mode = ParseMode::Normal;
                    Step::Item(Parsed::HeaderBlock {
                        stream_id,
                        end_stream,
                        block,
                    })
                } else {
                    self.step()
                }
            }
            Decoded::Need(n) => Step::Need(n),
            _ => Step::ConnectionError(ConnectionError::protocol("malformed CONTINUATION frame")),
        }
    }
}

trait AdvanceConsumed {
    fn advance_consumed(&mut self, n: usize);
}

impl AdvanceConsumed for BytesMut {
    fn advance_consumed(&mut self, n: usize) {
        let _ = self.split_to(n);
    }
}
