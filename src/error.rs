//! Error taxonomy for the connection engine.
//!
//! Mirrors spec §7: `connection_error` / `stream_error` / `internal_error` /
//! `socket_error` / `stop` are distinct propagation paths, not a single
//! catch-all `Error` type. `Reason` is the RFC 7540 §11.4 wire error code.

use std::fmt;
use std::io;

/// RFC 7540 §11.4 error codes, carried on RST_STREAM and GOAWAY frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Reason {
    NoError,
    ProtocolError,
    InternalError,
    FlowControlError,
    SettingsTimeout,
    StreamClosed,
    FrameSizeError,
    RefusedStream,
    Cancel,
    CompressionError,
    ConnectError,
    EnhanceYourCalm,
    InadequateSecurity,
    Http11Required,
    Other(u32),
}

impl Reason {
    pub fn into_wire(self) -> u32 {
        match self {
            Reason::NoError => 0x0,
            Reason::ProtocolError => 0x1,
            Reason::InternalError => 0x2,
            Reason::FlowControlError => 0x3,
            Reason::SettingsTimeout => 0x4,
            Reason::StreamClosed => 0x5,
            Reason::FrameSizeError => 0x6,
            Reason::RefusedStream => 0x7,
            Reason::Cancel => 0x8,
            Reason::CompressionError => 0x9,
            Reason::ConnectError => 0xa,
            Reason::EnhanceYourCalm => 0xb,
            Reason::InadequateSecurity => 0xc,
            Reason::Http11Required => 0xd,
            Reason::Other(v) => v,
        }
    }

    pub fn from_wire(v: u32) -> Reason {
        match v {
            0x0 => Reason::NoError,
            0x1 => Reason::ProtocolError,
            0x2 => Reason::InternalError,
            0x3 => Reason::FlowControlError,
            0x4 => Reason::SettingsTimeout,
            0x5 => Reason::StreamClosed,
            0x6 => Reason::FrameSizeError,
            0x7 => Reason::RefusedStream,
            0x8 => Reason::Cancel,
            0x9 => Reason::CompressionError,
            0xa => Reason::ConnectError,
            0xb => Reason::EnhanceYourCalm,
            0xc => Reason::InadequateSecurity,
            0xd => Reason::Http11Required,
            other => Reason::Other(other),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::NoError => "no_error",
            Reason::ProtocolError => "protocol_error",
            Reason::InternalError => "internal_error",
            Reason::FlowControlError => "flow_control_error",
            Reason::SettingsTimeout => "settings_timeout",
            Reason::StreamClosed => "stream_closed",
            Reason::FrameSizeError => "frame_size_error",
            Reason::RefusedStream => "refused_stream",
            Reason::Cancel => "cancel",
            Reason::CompressionError => "compression_error",
            Reason::ConnectError => "connect_error",
            Reason::EnhanceYourCalm => "enhance_your_calm",
            Reason::InadequateSecurity => "inadequate_security",
            Reason::Http11Required => "http_1_1_required",
            Reason::Other(v) => return write!(f, "error({v})"),
        };
        f.write_str(s)
    }
}

/// A connection-fatal error: the whole connection is terminated (spec §7).
#[derive(Debug, thiserror::Error)]
#[error("connection error: {reason} ({message})")]
pub struct ConnectionError {
    pub reason: Reason,
    pub message: String,
}

impl ConnectionError {
    pub fn new(reason: Reason, message: impl Into<String>) -> Self {
        ConnectionError {
            reason,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(Reason::ProtocolError, message)
    }

    pub fn compression(message: impl Into<String>) -> Self {
        Self::new(Reason::CompressionError, message)
    }
}

/// A single-stream error: only that stream is reset (spec §7).
#[derive(Debug, thiserror::Error)]
#[error("stream error on {stream_id}: {reason} ({message})")]
pub struct StreamError {
    pub stream_id: u32,
    pub reason: Reason,
    pub message: String,
}

impl StreamError {
    pub fn new(stream_id: u32, reason: Reason, message: impl Into<String>) -> Self {
        StreamError {
            stream_id,
            reason,
            message: message.into(),
        }
    }
}

/// Top-level outcome of processing that can surface from the connection
/// loop, unifying the five propagation paths named in spec §7.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Handler-raised exception or executor fault; treated like
    /// `stream_error(internal_error)` unless no stream context exists, in
    /// which case it is connection-fatal.
    #[error("internal error on stream {stream_id:?}: {message}")]
    Internal {
        stream_id: Option<u32>,
        message: String,
    },

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    /// Peer requested shutdown via GOAWAY; terminate without error after
    /// draining.
    #[error("connection stopped by peer")]
    Stop,
}

impl ConnError {
    pub fn internal(stream_id: Option<u32>, message: impl Into<String>) -> Self {
        ConnError::Internal {
            stream_id,
            message: message.into(),
        }
    }
}
