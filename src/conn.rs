//! Connection loop (spec §4.7): the single-threaded cooperative scheduler
//! that merges socket readability, timers, and system/administrative
//! messages, driving the parser and dispatcher.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::config::Config;
use crate::dispatch::Outcome;
use crate::error::{ConnError, ConnectionError, Reason};
use crate::frame::{self, SettingSet, StreamId};
use crate::handler::{StreamHandler, TerminateReason};
use crate::hpack;
use crate::parse::{Parser, Step};
use crate::stream::StreamTable;
use crate::timer::{TimerId, TimerQueue};
use crate::transport::Transport;

/// A unit of work delivered into the connection's mailbox: the merged
/// stand-in for spec §4.7's "data, socket-closed, socket-error,
/// parent-exit, system message, timer expiry, stream inbound message,
/// connection-level message, child exit, administrative query".
pub enum ConnMessage {
    Data(Arc<[u8]>),
    SocketClosed,
    SocketError(std::io::Error),
    TimerExpired(TimerId),
    StreamMessage { stream_id: StreamId, payload: crate::handler::Message },
    ChildExit { pid: u32 },
    System(SystemMessage),
}

/// Out-of-band controls the embedder can push into a running connection.
pub enum SystemMessage {
    Shutdown,
}

/// Per-connection state (spec §3 "Connection state").
pub struct Connection<T: Transport, H: StreamHandler> {
    pub(crate) transport: T,
    pub(crate) config: Config,
    pub(crate) handler: H,
    pub(crate) peer: SocketAddr,

    pub(crate) streams: StreamTable<H::State>,
    pub(crate) children: HashMap<u32, StreamId>,

    pub(crate) hpack_decoder: hpack::Decoder,
    pub(crate) hpack_encoder: hpack::Encoder,

    pub(crate) local_settings: SettingSet,
    pub(crate) remote_settings: SettingSet,
    pub(crate) pending_local_settings: VecDeque<(TimerId, SettingSet)>,

    pub(crate) max_client_stream_id: StreamId,
    pub(crate) next_push_id: StreamId,

    pub(crate) parser: Parser,
    timers: TimerQueue,
    idle_timer: TimerId,

    rx: Receiver<ConnMessage>,
    tx: Sender<ConnMessage>,
}

/// Why the connection loop returned.
#[derive(Debug)]
pub enum ExitReason {
    SocketClosed,
    SocketError(std::io::Error),
    ProtocolError(ConnectionError),
    IdleTimeout,
    PeerGoAway,
    Shutdown,
}

impl<T: Transport, H: StreamHandler> Connection<T, H> {
    pub fn new(mut transport: T, config: Config, handler: H) -> std::io::Result<Self> {
        let peer = transport.peername()?;
        let (tx, rx) = mpsc::channel();

        let mut timers = TimerQueue::new();
        let preface_timer = timers.arm(Duration::from_millis(config.preface_timeout_ms()));
        let settings_timer = timers.arm(Duration::from_millis(config.settings_timeout_ms()));
        let idle_timer = timers.arm(Duration::from_millis(config.idle_timeout_ms()));

        let max_frame_size = config
            .http2_settings()
            .max_frame_size()
            .unwrap_or(frame::settings::DEFAULT_MAX_FRAME_SIZE) as usize;

        let parser = Parser::new(preface_timer, max_frame_size);

        let mut initial_settings_buf = BytesMut::new();
        frame::Settings::new(config.http2_settings().clone()).encode(&mut initial_settings_buf);
        transport.send(&initial_settings_buf)?;
        transport.arm_readable();

        let mut pending_local_settings = VecDeque::new();
        pending_local_settings.push_back((settings_timer, config.http2_settings().clone()));

        Ok(Connection {
            transport,
            config,
            handler,
            peer,
            streams: StreamTable::new(),
            children: HashMap::new(),
            hpack_decoder: hpack::Decoder::new(),
            hpack_encoder: hpack::Encoder::new(),
            local_settings: SettingSet::new(),
            remote_settings: SettingSet::new(),
            pending_local_settings,
            max_client_stream_id: StreamId::ZERO,
            next_push_id: StreamId::new(2),
            parser,
            timers,
            idle_timer,
            rx,
            tx,
        })
    }

    /// A clonable handle callers can use to post messages into this
    /// connection's mailbox from another thread (e.g. a child-process
    /// watcher, or an admin endpoint).
    pub fn mailbox(&self) -> Sender<ConnMessage> {
        self.tx.clone()
    }

    /// Drive the connection to completion (spec §4.7).
    pub fn run(mut self) -> ExitReason {
        log::debug!("connection loop starting; peer={}", self.peer);
        loop {
            let deadline = self.timers.next_deadline();
            let msg = match self.recv_with_deadline(deadline) {
                Some(m) => m,
                None => {
                    // The soonest-armed deadline elapsed with no other
                    // message arriving first; surface every timer that is
                    // now due so `handle_message` can judge staleness.
                    let due = self.timers.expire_due(Instant::now());
                    match due.into_iter().next() {
                        Some(id) => ConnMessage::TimerExpired(id),
                        None => continue,
                    }
                }
            };

            match self.handle_message(msg) {
                Ok(Some(reason)) => {
                    log::debug!("connection loop exiting; peer={}; reason={reason:?}", self.peer);
                    self.terminate_all_streams();
                    return reason;
                }
                Ok(None) => {}
                Err(ConnError::Connection(e)) => {
                    log::warn!("connection error; peer={}; reason={}; {}", self.peer, e.reason, e.message);
                    self.send_go_away(e.reason);
                    return ExitReason::ProtocolError(e);
                }
                Err(ConnError::Stream(e)) => {
                    self.reset_stream(StreamId::new(e.stream_id), e.reason, &e.message);
                }
                Err(ConnError::Internal { stream_id, message }) => match stream_id {
                    Some(id) => self.reset_stream(StreamId::new(id), Reason::InternalError, &message),
                    None => {
                        let e = ConnectionError::new(Reason::InternalError, message);
                        log::error!("internal error with no stream context; peer={}; {}", self.peer, e.message);
                        self.send_go_away(e.reason);
                        return ExitReason::ProtocolError(e);
                    }
                },
                Err(ConnError::Socket(e)) => {
                    log::debug!("socket error; peer={}; {e}", self.peer);
                    return ExitReason::SocketError(e);
                }
                Err(ConnError::Stop) => {
                    self.drain_and_stop();
                    return ExitReason::PeerGoAway;
                }
            }
        }
    }

    fn recv_with_deadline(&self, deadline: Option<Instant>) -> Option<ConnMessage> {
        match deadline {
            Some(when) => {
                let now = Instant::now();
                let timeout = when.saturating_duration_since(now);
                self.rx.recv_timeout(timeout).ok()
            }
            None => self.rx.recv().ok(),
        }
    }

    fn handle_message(&mut self, msg: ConnMessage) -> Result<Option<ExitReason>, ConnError> {
        match msg {
            ConnMessage::Data(bytes) => {
                self.rearm_idle_timer();
                self.parser.feed(&bytes);
                self.pump_parser()?;
                Ok(None)
            }
            ConnMessage::SocketClosed => Ok(Some(ExitReason::SocketClosed)),
            ConnMessage::SocketError(e) => Ok(Some(ExitReason::SocketError(e))),
            ConnMessage::TimerExpired(id) => {
                if id == self.idle_timer {
                    return Ok(Some(ExitReason::IdleTimeout));
                }
                if self.pending_local_settings.iter().any(|(t, _)| *t == id) {
                    return Err(ConnError::Connection(ConnectionError::new(
                        Reason::SettingsTimeout,
                        "no SETTINGS-ack within settings_timeout",
                    )));
                }
                let preface_timer = match self.parser.mode() {
                    crate::parse::ParseMode::AwaitPrefaceSequence(t) => Some(*t),
                    crate::parse::ParseMode::AwaitPrefaceSettings(t) => Some(*t),
                    _ => None,
                };
                if preface_timer == Some(id) {
                    return Err(ConnError::Connection(ConnectionError::protocol(
                        "no preface within preface_timeout",
                    )));
                }
                log::trace!("dropping stale timer expiry; peer={}", self.peer);
                Ok(None)
            }
            ConnMessage::StreamMessage { stream_id, payload } => {
                self.rearm_idle_timer();
                self.deliver_stream_message(stream_id, payload)?;
                Ok(None)
            }
            ConnMessage::ChildExit { pid } => {
                self.children.remove(&pid);
                Ok(None)
            }
            ConnMessage::System(SystemMessage::Shutdown) => Ok(Some(ExitReason::Shutdown)),
        }
    }

    fn rearm_idle_timer(&mut self) {
        self.idle_timer = self.timers.arm(Duration::from_millis(self.config.idle_timeout_ms()));
    }

    fn deliver_stream_message(
        &mut self,
        stream_id: StreamId,
        payload: crate::handler::Message,
    ) -> Result<(), ConnError> {
        let state = match self.streams.get_mut(stream_id).and_then(|s| s.handler_state.take()) {
            Some(s) => s,
            None => return Ok(()),
        };
        let (commands, state) = self.handler.info(u32::from(stream_id), &payload, state);
        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.handler_state = Some(state);
        }
        self.execute_commands(stream_id, commands)
    }

    /// Pump the parser until it needs more bytes, dispatching each unit it
    /// yields (spec §4.1's "loops until the codec returns `Need` or the
    /// buffer is empty").
    fn pump_parser(&mut self) -> Result<(), ConnError> {
        loop {
            match self.parser.step() {
                Step::Item(parsed) => match self.dispatch(parsed)? {
                    Outcome::Continue => continue,
                    Outcome::Stop => return Err(ConnError::Stop),
                },
                Step::Need(_) => return Ok(()),
                Step::ConnectionError(e) => return Err(ConnError::Connection(e)),
            }
        }
    }

    pub(crate) fn send_settings_ack(&mut self) -> Result<(), ConnError> {
        let mut buf = BytesMut::new();
        frame::Settings::ack().encode(&mut buf);
        self.transport.send(&buf).map_err(ConnError::Socket)
    }

    pub(crate) fn send_ping_ack(&mut self, payload: frame::PingPayload) -> Result<(), ConnError> {
        let mut buf = BytesMut::new();
        frame::Ping::pong(payload).encode(&mut buf);
        self.transport.send(&buf).map_err(ConnError::Socket)
    }

    fn send_go_away(&mut self, reason: Reason) {
        let go_away = frame::GoAway::new(self.max_client_stream_id, reason);
        let mut buf = BytesMut::new();
        go_away.encode(&mut buf);
        let _ = self.transport.send(&buf);
        self.terminate_all_streams();
        self.transport.close();
    }

    fn terminate_all_streams(&mut self) {
        let ids: Vec<StreamId> = self.streams.ids().collect();
        for id in ids {
            self.terminate_stream(id, TerminateReason::ConnectionClosing);
        }
    }

    /// Peer requested shutdown via GOAWAY: drain gracefully and close
    /// (spec §7 `stop`).
    fn drain_and_stop(&mut self) {
        let ids: Vec<StreamId> = self.streams.ids().collect();
        for id in ids {
            let _ = self.graceful_stop_stream(id);
        }
        self.transport.close();
    }
}
