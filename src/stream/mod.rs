//! Per-stream state (spec §3 "Stream") and its storage (spec §2 "Stream
//! table").

pub mod table;

pub use table::StreamTable;

use crate::frame::StreamId;

/// Local (outbound) half of a stream's state. Progresses monotonically
/// `Idle -> NoFin -> Fin`, per spec §8; never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Local {
    Idle,
    NoFin,
    Fin,
}

/// Remote (inbound) half of a stream's state: whether the client has closed
/// its send side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remote {
    NoFin,
    Fin,
}

/// A single multiplexed HTTP/2 stream. `H` is the opaque handler state type,
/// owned by the stream and replaced wholesale on each handler invocation
/// (spec §3: "handler-state (opaque, owned by this stream; replaced on each
/// handler invocation)").
#[derive(Debug)]
pub struct Stream<H> {
    pub id: StreamId,
    pub handler_state: Option<H>,
    pub local: Local,
    pub remote: Remote,
    pub body_length: u64,
}

impl<H> Stream<H> {
    pub fn new(id: StreamId, handler_state: H) -> Self {
        Stream {
            id,
            handler_state: Some(handler_state),
            local: Local::Idle,
            remote: Remote::NoFin,
            body_length: 0,
        }
    }

    /// Stream initialised to receive a push: the client will never send us
    /// anything on it (spec §4.3, `push` command: "initialise that promised
    /// stream with `remote = Fin`").
    pub fn new_pushed(id: StreamId, handler_state: H) -> Self {
        Stream {
            id,
            handler_state: Some(handler_state),
            local: Local::Idle,
            remote: Remote::Fin,
            body_length: 0,
        }
    }

    /// Advance `local` forward only; panics if asked to regress, which would
    /// indicate an executor bug rather than a reachable runtime condition.
    pub fn advance_local(&mut self, next: Local) {
        let ok = matches!(
            (self.local, next),
            (Local::Idle, Local::Idle)
                | (Local::Idle, Local::NoFin)
                | (Local::Idle, Local::Fin)
                | (Local::NoFin, Local::NoFin)
                | (Local::NoFin, Local::Fin)
                | (Local::Fin, Local::Fin)
        );
        debug_assert!(ok, "local stream state must not regress");
        self.local = next;
    }
}
