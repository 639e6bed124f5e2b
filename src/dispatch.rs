//! Frame dispatcher (spec §4.2): per-frame-type semantics and error gating.

use crate::conn::Connection;
use crate::error::{ConnError, ConnectionError, Reason};
use crate::frame::{self, Frame, StreamId};
use crate::handler::StreamHandler;
use crate::parse::Parsed;
use crate::transport::Transport;

/// What the connection loop should do after dispatching one parsed unit.
pub enum Outcome {
    Continue,
    Stop,
}

impl<T: Transport, H: StreamHandler> Connection<T, H> {
    pub(crate) fn dispatch(&mut self, parsed: Parsed) -> Result<Outcome, ConnError> {
        match parsed {
            Parsed::HeaderBlock {
                stream_id,
                end_stream,
                block,
            } => {
                self.init_stream(stream_id, end_stream, &block)?;
                Ok(Outcome::Continue)
            }
            Parsed::Frame(frame) => self.dispatch_frame(frame),
        }
    }

    fn dispatch_frame(&mut self, frame: Frame) -> Result<Outcome, ConnError> {
        match frame {
            Frame::Data(data) => {
                let id = data.stream_id();
                let fin = data.is_end_stream();
                log::trace!("recv DATA; stream={id}; len={}; fin={fin}", data.payload().len());

                let known = self.streams.get(id).is_some();
                let remote_open = self
                    .streams
                    .get(id)
                    .map(|s| matches!(s.remote, crate::stream::Remote::NoFin))
                    .unwrap_or(false);

                if !known || !remote_open {
                    self.reset_stream(id, Reason::StreamClosed, "DATA on closed or unknown stream");
                    return Ok(Outcome::Continue);
                }

                let chunk_len = data.payload().len() as u64;
                let payload = data.into_payload();

                let stream = self.streams.get_mut(id).expect("checked known above");
                stream.body_length += chunk_len;
                let total = stream.body_length;
                if fin {
                    stream.remote = crate::stream::Remote::Fin;
                }

                // Spec §4.2: `len` is the full body length, handed to the
                // handler only once the body is complete.
                let len = if fin { total } else { 0 };
                self.invoke_data(id, len, fin, &payload)?;
                Ok(Outcome::Continue)
            }

            Frame::Priority(p) => {
                log::trace!("recv PRIORITY; stream={}", p.stream_id());
                Ok(Outcome::Continue)
            }

            Frame::Reset(rst) => {
                let id = rst.stream_id();
                let reason = rst.reason();
                log::debug!("recv RST_STREAM; stream={id}; reason={reason}");
                // Peer-initiated: no outbound RST is sent (spec §4.2).
                self.terminate_stream(
                    id,
                    crate::handler::TerminateReason::StreamError(reason),
                );
                Ok(Outcome::Continue)
            }

            Frame::Settings(settings) => {
                if settings.is_ack() {
                    log::trace!("recv SETTINGS ack");
                    self.apply_settings_ack()?;
                } else {
                    log::trace!("recv SETTINGS; values={:?}", settings.values());
                    self.apply_remote_settings(settings.into_values());
                    self.send_settings_ack()?;
                }
                Ok(Outcome::Continue)
            }

            Frame::PushPromise(_) => {
                log::warn!("recv PUSH_PROMISE from client; this is a protocol violation");
                Err(ConnError::Connection(ConnectionError::protocol(
                    "a server never accepts PUSH_PROMISE",
                )))
            }

            Frame::Ping(ping) => {
                if !ping.is_ack() {
                    log::trace!("recv PING; replying with pong");
                    self.send_ping_ack(ping.payload())?;
                } else {
                    log::trace!("recv PING ack");
                }
                Ok(Outcome::Continue)
            }

            Frame::GoAway(go_away) => {
                log::debug!("recv GOAWAY; reason={}", go_away.reason());
                Ok(Outcome::Stop)
            }

            Frame::WindowUpdate(w) => {
                log::trace!("recv WINDOW_UPDATE; stream={}; increment={}", w.stream_id(), w.increment());
                Ok(Outcome::Continue)
            }

            Frame::Continuation(_) => Err(ConnError::Connection(ConnectionError::protocol(
                "unexpected CONTINUATION outside of a header block",
            ))),

            Frame::Headers(_) => {
                unreachable!("HEADERS is always resolved to Parsed::HeaderBlock by the parser")
            }

            Frame::Unknown(id) => {
                log::trace!("recv unknown frame type; stream={id}");
                Ok(Outcome::Continue)
            }
        }
    }

    fn apply_remote_settings(&mut self, values: frame::SettingSet) {
        // The peer's SETTINGS_MAX_FRAME_SIZE bounds our outbound frames only
        // (see outbound_max_frame_size); the parser's inbound limit stays at
        // what we ourselves advertised.
        self.remote_settings = values;
    }

    fn apply_settings_ack(&mut self) -> Result<(), ConnError> {
        match self.pending_local_settings.pop_front() {
            Some((_timer, settings)) => {
                self.local_settings = settings;
                Ok(())
            }
            None => Err(ConnError::Connection(ConnectionError::protocol(
                "SETTINGS-ack with no pending settings",
            ))),
        }
    }
}
