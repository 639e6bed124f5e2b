//! Connection-level engine for an HTTP/2 server.
//!
//! Given an accepted, already-negotiated transport connection (plaintext TCP
//! or TLS with ALPN complete), [`Connection`] drives the RFC 7540 framing and
//! HPACK layers, multiplexes concurrent streams, and brokers request/response
//! traffic between remote peers and a pluggable [`handler::StreamHandler`].
//!
//! The byte-level frame codec and HPACK coder, the transport, and the stream
//! handler are external collaborators with contracts fixed in [`frame`],
//! [`transport`], and [`handler`] respectively; this crate owns the
//! connection loop and per-stream state machine that sits between them.
//!
//! HTTP/1.1 upgrade, server push policy, stream prioritisation, outbound
//! flow control, and TLS termination are out of scope; see the crate's
//! design notes for the rationale.

pub mod config;
pub mod conn;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod frame;
pub mod handler;
pub mod hpack;
pub mod lifecycle;
pub mod parse;
pub mod stream;
pub mod timer;
pub mod transport;

pub use config::{Builder, Config};
pub use conn::{Connection, ExitReason};
pub use error::{ConnError, ConnectionError, Reason, StreamError};
pub use handler::StreamHandler;
