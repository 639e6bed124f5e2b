//! The stream handler contract (spec §6): the sole source of outbound
//! semantics. The engine calls into a handler at well-defined points and
//! interprets the commands it returns; it never inspects handler state
//! itself.

use std::net::SocketAddr;

use crate::error::Reason;
use crate::hpack::Header;

/// Body length, as determined during stream initialisation (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Known(u64),
    Unknown,
}

/// A request, constructed once a client HEADERS block has been fully
/// reassembled and HPACK-decoded (spec §4.5).
#[derive(Debug, Clone)]
pub struct Request {
    pub stream_id: u32,
    pub peer: SocketAddr,
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<Header>,
    pub body_length: BodyLength,
    pub has_body: bool,
}

/// Reason a handler's `terminate` is invoked with (spec §4.6, §7).
#[derive(Debug, Clone)]
pub enum TerminateReason {
    /// Handler issued `stop`.
    Normal,
    /// A stream-level protocol or handler fault (spec §7's `stream_error`
    /// and `internal_error` both surface here with their reason code).
    StreamError(Reason),
    /// The connection itself is going away; every live stream is notified
    /// before socket close.
    ConnectionClosing,
}

/// A declarative directive produced by a handler, interpreted by the
/// command executor to emit frames or manage stream lifecycle (spec §4.3).
#[derive(Debug, Clone)]
pub enum Command {
    ErrorResponse {
        status: StatusCode,
        headers: Vec<Header>,
        body: bytes::Bytes,
    },
    Response {
        status: StatusCode,
        headers: Vec<Header>,
        body: bytes::Bytes,
    },
    Headers {
        status: StatusCode,
        headers: Vec<Header>,
    },
    Data {
        fin: bool,
        bytes: bytes::Bytes,
    },
    Sendfile {
        fin: bool,
        offset: u64,
        count: u64,
        path: std::path::PathBuf,
    },
    Push {
        method: String,
        scheme: String,
        host: String,
        port: u16,
        path: String,
        query: Option<String>,
        headers: Vec<Header>,
    },
    Flow {
        increment: u32,
    },
    Spawn {
        pid: u32,
        shutdown_on_terminate: bool,
    },
    InternalError {
        message: String,
    },
    SwitchProtocol {
        protocol: String,
    },
    Stop,
}

/// A status code as produced by a handler. Spec §4.3: integers serialise as
/// the decimal ASCII triple; a pre-formatted 3-digit string is validated and
/// passed through.
#[derive(Debug, Clone)]
pub enum StatusCode {
    Code(u16),
    Text(String),
}

impl StatusCode {
    /// Render to the `:status` pseudo-header value.
    pub fn render(&self) -> String {
        match self {
            StatusCode::Code(code) => format!("{code:03}"),
            StatusCode::Text(s) => s.clone(),
        }
    }
}

/// Opaque message delivered to a stream's handler via `info` (spec §6):
/// the engine does not interpret its payload.
#[derive(Debug, Clone)]
pub struct Message(pub Vec<u8>);

/// Pluggable request-processing module invoked by the engine (spec §6).
/// `State` is the handler's own per-stream state, opaque to the engine and
/// threaded back in on every subsequent call.
pub trait StreamHandler {
    type State;

    fn init(&self, stream_id: u32, request: &Request) -> (Vec<Command>, Self::State);

    fn data(
        &self,
        stream_id: u32,
        len: u64,
        fin: bool,
        bytes: &[u8],
        state: Self::State,
    ) -> (Vec<Command>, Self::State);

    fn info(&self, stream_id: u32, message: &Message, state: Self::State) -> (Vec<Command>, Self::State);

    fn terminate(&self, stream_id: u32, reason: TerminateReason, state: Self::State);
}
