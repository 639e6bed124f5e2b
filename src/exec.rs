//! Command executor (spec §4.3): translates handler-issued commands into
//! wire frames, one stream at a time, in order.

use bytes::{Bytes, BytesMut};

use crate::conn::Connection;
use crate::error::{ConnError, Reason};
use crate::frame::{self, StreamId};
use crate::handler::{Command, StatusCode, StreamHandler, TerminateReason};
use crate::hpack::Header;
use crate::stream::Local;
use crate::transport::Transport;

impl<T: Transport, H: StreamHandler> Connection<T, H> {
    /// Run a command sequence for `stream_id` to completion, or until a
    /// command (`internal_error`, `stop`) cuts the sequence short (spec
    /// §4.3).
    pub(crate) fn execute_commands(&mut self, stream_id: StreamId, commands: Vec<Command>) -> Result<(), ConnError> {
        for command in commands {
            match command {
                Command::ErrorResponse { status, headers, body } => {
                    if self.local_state(stream_id) == Some(Local::Idle) {
                        self.send_response(stream_id, status, headers, body)?;
                    }
                }
                Command::Response { status, headers, body } => {
                    if self.local_state(stream_id) == Some(Local::Idle) {
                        self.send_response(stream_id, status, headers, body)?;
                    }
                }
                Command::Headers { status, headers } => {
                    if self.local_state(stream_id) == Some(Local::Idle) {
                        let mut all = Vec::with_capacity(headers.len() + 1);
                        all.push(Header::new(":status", status.render()));
                        all.extend(headers);
                        self.send_headers(stream_id, &all, false)?;
                    }
                }
                Command::Data { fin, bytes } => {
                    if self.local_state(stream_id) == Some(Local::NoFin) {
                        self.send_data(stream_id, bytes, fin)?;
                    }
                }
                Command::Sendfile {
                    fin,
                    offset,
                    count,
                    path,
                } => {
                    if self.local_state(stream_id) == Some(Local::NoFin) {
                        self.stream_file(stream_id, &path, offset, count, fin)?;
                    }
                }
                Command::Push {
                    method,
                    scheme,
                    host,
                    port,
                    path,
                    query,
                    headers,
                } => {
                    self.send_push_promise(stream_id, method, scheme, host, Some(port), path, query, headers)?;
                }
                Command::Flow { .. } => {
                    // Reserved for window management; accepted, ignored in v1.
                }
                Command::Spawn {
                    pid,
                    shutdown_on_terminate: _,
                } => {
                    self.children.insert(pid, stream_id);
                }
                Command::InternalError { message } => {
                    self.reset_stream(stream_id, Reason::InternalError, &message);
                    return Ok(());
                }
                Command::SwitchProtocol { .. } => {
                    // Not supported over HTTP/2; discard and continue.
                }
                Command::Stop => {
                    self.terminate_stream(stream_id, TerminateReason::Normal);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn local_state(&self, stream_id: StreamId) -> Option<Local> {
        self.streams.get(stream_id).map(|s| s.local)
    }

    fn send_response(
        &mut self,
        stream_id: StreamId,
        status: StatusCode,
        headers: Vec<Header>,
        body: Bytes,
    ) -> Result<(), ConnError> {
        let mut all = Vec::with_capacity(headers.len() + 1);
        all.push(Header::new(":status", status.render()));
        all.extend(headers);

        if body.is_empty() {
            self.send_headers(stream_id, &all, true)?;
        } else {
            self.send_headers(stream_id, &all, false)?;
            self.send_data(stream_id, body, true)?;
        }
        Ok(())
    }

    pub(crate) fn send_headers(
        &mut self,
        stream_id: StreamId,
        headers: &[Header],
        end_stream: bool,
    ) -> Result<(), ConnError> {
        let block = self.hpack_encoder.encode(headers);
        let max_frame_size = self.outbound_max_frame_size();

        let mut buf = BytesMut::new();
        frame::Headers::encode(stream_id, end_stream, &block, max_frame_size, &mut buf);
        self.transport.send(&buf).map_err(ConnError::Socket)?;

        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.advance_local(if end_stream { Local::Fin } else { Local::NoFin });
        }
        Ok(())
    }

    pub(crate) fn send_data(&mut self, stream_id: StreamId, payload: Bytes, end_stream: bool) -> Result<(), ConnError> {
        let max_frame_size = self.outbound_max_frame_size();
        let frames = frame::split_data(stream_id, payload, end_stream, max_frame_size);

        for f in frames {
            let mut buf = BytesMut::new();
            f.encode(&mut buf);
            self.transport.send(&buf).map_err(ConnError::Socket)?;
        }

        if let Some(stream) = self.streams.get_mut(stream_id) {
            if end_stream {
                stream.advance_local(Local::Fin);
            }
        }
        Ok(())
    }

    /// `sendfile` streaming (spec §4.4): read the file in
    /// `max_frame_size`-sized chunks, emitting one DATA frame per chunk,
    /// resetting the stream with `internal_error` on any I/O failure.
    fn stream_file(
        &mut self,
        stream_id: StreamId,
        path: &std::path::Path,
        offset: u64,
        count: u64,
        fin: bool,
    ) -> Result<(), ConnError> {
        use std::io::{Read, Seek, SeekFrom};

        let max_frame_size = self.outbound_max_frame_size();

        let mut file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                self.reset_stream(stream_id, Reason::InternalError, &format!("sendfile open: {e}"));
                return Ok(());
            }
        };

        let restore = file.stream_position().ok();
        if let Err(e) = file.seek(SeekFrom::Start(offset)) {
            self.reset_stream(stream_id, Reason::InternalError, &format!("sendfile seek: {e}"));
            return Ok(());
        }

        let mut remaining = count;
        let mut buf = vec![0u8; max_frame_size];

        let result: std::io::Result<()> = (|| {
            while remaining > 0 {
                let want = std::cmp::min(remaining, max_frame_size as u64) as usize;
                let n = file.read(&mut buf[..want])?;
                if n == 0 {
                    break;
                }
                let chunk = Bytes::copy_from_slice(&buf[..n]);
                remaining -= n as u64;
                let is_last = remaining == 0;
                self.send_data(stream_id, chunk, is_last && fin)
                    .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "send failed"))?;
            }
            if remaining == count {
                // Nothing was sent at all (e.g. EOF immediately); still
                // need to carry the requested `fin`.
                self.send_data(stream_id, Bytes::new(), fin)
                    .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "send failed"))?;
            }
            Ok(())
        })();

        if let Some(pos) = restore {
            let _ = file.seek(SeekFrom::Start(pos));
        }

        if let Err(e) = result {
            self.reset_stream(stream_id, Reason::InternalError, &format!("sendfile: {e}"));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn send_push_promise(
        &mut self,
        stream_id: StreamId,
        method: String,
        scheme: String,
        host: String,
        port: Option<u16>,
        path: String,
        query: Option<String>,
        headers: Vec<Header>,
    ) -> Result<(), ConnError> {
        let authority = synthesize_authority(&scheme, &host, port);
        let full_path = match query {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path,
        };

        let mut all = Vec::with_capacity(headers.len() + 4);
        all.push(Header::new(":method", method));
        all.push(Header::new(":scheme", scheme));
        all.push(Header::new(":authority", authority));
        all.push(Header::new(":path", full_path));
        all.extend(headers);

        let block = self.hpack_encoder.encode(&all);
        let promised_id = self.next_push_id;
        self.next_push_id = StreamId::new(u32::from(self.next_push_id) + 2);

        let max_frame_size = self.outbound_max_frame_size();
        let mut buf = BytesMut::new();
        frame::headers::PushPromise::encode(stream_id, promised_id, &block, max_frame_size, &mut buf);
        self.transport.send(&buf).map_err(ConnError::Socket)?;

        let (commands, state) = self.handler.init(u32::from(promised_id), &self.pushed_request(promised_id));
        let mut pushed = crate::stream::Stream::new_pushed(promised_id, state);
        pushed.local = Local::Idle;
        self.streams.insert(pushed);
        self.execute_commands(promised_id, commands)
    }

    /// A minimal synthetic request for a pushed stream: the handler never
    /// sees real client bytes for it, since the client did not ask for it.
    fn pushed_request(&self, stream_id: StreamId) -> crate::handler::Request {
        crate::handler::Request {
            stream_id: u32::from(stream_id),
            peer: self.peer,
            method: String::new(),
            scheme: String::new(),
            host: String::new(),
            port: None,
            path: String::new(),
            query: None,
            headers: Vec::new(),
            body_length: crate::handler::BodyLength::Known(0),
            has_body: false,
        }
    }

    pub(crate) fn outbound_max_frame_size(&self) -> usize {
        self.remote_settings
            .max_frame_size()
            .unwrap_or(frame::settings::DEFAULT_MAX_FRAME_SIZE) as usize
    }
}

/// Authority synthesis for `push` (spec §4.3): `host` alone for the default
/// port of its scheme, otherwise `host:port`.
fn synthesize_authority(scheme: &str, host: &str, port: Option<u16>) -> String {
    match (scheme, port) {
        ("http", Some(80)) | ("http", None) => host.to_string(),
        ("https", Some(443)) => host.to_string(),
        (_, Some(p)) => format!("{host}:{p}"),
        (_, None) => host.to_string(),
    }
}
