//! Stream lifecycle (spec §4.6): initialisation, reset, terminate, and
//! graceful stop.

use bytes::Bytes;

use crate::conn::Connection;
use crate::error::{ConnError, ConnectionError, Reason};
use crate::frame::StreamId;
use crate::handler::{BodyLength, Request, StreamHandler, TerminateReason};
use crate::hpack::Header;
use crate::stream::{Local, Remote, Stream};

impl<T: crate::transport::Transport, H: StreamHandler> Connection<T, H> {
    /// Stream initialisation (spec §4.5): decode the reassembled header
    /// block, extract pseudo-headers, determine body length, construct a
    /// `Request`, and invoke the handler's `init`.
    pub(crate) fn init_stream(
        &mut self,
        stream_id: StreamId,
        end_stream: bool,
        block: &[u8],
    ) -> Result<(), ConnError> {
        if stream_id.is_zero() || !stream_id.is_client_initiated() {
            return Err(ConnError::Connection(ConnectionError::protocol(
                "HEADERS on an invalid stream id",
            )));
        }
        if stream_id <= self.max_client_stream_id && self.max_client_stream_id != StreamId::ZERO {
            return Err(ConnError::Connection(ConnectionError::protocol(
                "client stream id did not strictly increase",
            )));
        }

        let headers = self
            .hpack_decoder
            .decode(block)
            .map_err(ConnError::Connection)?;

        self.max_client_stream_id = stream_id;

        let mut method = String::new();
        let mut scheme = String::new();
        let mut authority = String::new();
        let mut path = String::new();
        let mut regular = Vec::with_capacity(headers.len());

        for h in headers {
            match h.name.as_str() {
                ":method" => method = h.value,
                ":scheme" => scheme = h.value,
                ":authority" => authority = h.value,
                ":path" => path = h.value,
                _ => regular.push(h),
            }
        }

        let (host, port) = split_authority(&authority);
        let (path, query) = split_path(&path);

        let body_length = if end_stream {
            Some(BodyLength::Known(0))
        } else {
            match content_length(&regular) {
                Ok(Some(0)) => Some(BodyLength::Known(0)),
                Ok(Some(n)) => Some(BodyLength::Known(n)),
                Ok(None) => Some(BodyLength::Unknown),
                Err(()) => None,
            }
        };

        let body_length = match body_length {
            Some(b) => b,
            None => {
                self.reset_stream(stream_id, Reason::ProtocolError, "unparsable content-length");
                return Ok(());
            }
        };

        let has_body = !end_stream;

        let request = Request {
            stream_id: u32::from(stream_id),
            peer: self.peer,
            method,
            scheme,
            host,
            port,
            path,
            query,
            headers: regular,
            body_length,
            has_body,
        };

        log::trace!("init stream {stream_id}; method={}; path={}", request.method, request.path);
        let (commands, state) = self.handler.init(u32::from(stream_id), &request);
        let mut stream = Stream::new(stream_id, state);
        stream.remote = if end_stream { Remote::Fin } else { Remote::NoFin };
        self.streams.insert(stream);

        self.execute_commands(stream_id, commands)
    }

    /// Invoke the handler's `data` callback and run the resulting commands.
    pub(crate) fn invoke_data(
        &mut self,
        stream_id: StreamId,
        total_len: u64,
        fin: bool,
        bytes: &Bytes,
    ) -> Result<(), ConnError> {
        let state = match self.streams.get_mut(stream_id).and_then(|s| s.handler_state.take()) {
            Some(state) => state,
            None => return Ok(()),
        };

        let (commands, state) = self.handler.data(u32::from(stream_id), total_len, fin, bytes, state);

        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.handler_state = Some(state);
        }

        self.execute_commands(stream_id, commands)
    }

    /// Uniform anomalous-termination path (spec §4.6): emit RST_STREAM with
    /// the given reason (unless the peer already reset it), then terminate.
    pub(crate) fn reset_stream(&mut self, stream_id: StreamId, reason: Reason, message: &str) {
        if self.streams.contains(stream_id) {
            log::debug!("resetting stream {stream_id}: {reason} ({message})");
            let frame = crate::frame::RstStream::new(stream_id, reason);
            let mut buf = bytes::BytesMut::new();
            frame.encode(&mut buf);
            if let Err(e) = self.transport.send(&buf) {
                log::warn!("failed to send RST_STREAM for {stream_id}: {e}");
            }
        }
        self.terminate_stream(stream_id, TerminateReason::StreamError(reason));
    }

    /// Remove the stream from the table, invoke the handler's `terminate`
    /// (swallowing and logging any handler panic-equivalent failure), and
    /// kill any child processes registered against this stream.
    pub(crate) fn terminate_stream(&mut self, stream_id: StreamId, reason: TerminateReason) {
        let stream = match self.streams.remove(stream_id) {
            Some(s) => s,
            None => return,
        };

        log::trace!("terminate stream {stream_id}; reason={reason:?}");

        if let Some(state) = stream.handler_state {
            self.handler.terminate(u32::from(stream_id), reason, state);
        }

        let dead_pids: Vec<u32> = self
            .children
            .iter()
            .filter(|&(_, &sid)| sid == stream_id)
            .map(|(&pid, _)| pid)
            .collect();
        for pid in dead_pids {
            self.children.remove(&pid);
            log::debug!("killing child pid {pid} registered to stream {stream_id}");
            // Killing the actual OS process is the embedder's concern via
            // whatever `spawn` handed the engine; the engine only tracks
            // the pid <-> stream association (spec §4.6).
        }
    }

    /// Graceful per-stream termination (spec §4.6, used by connection
    /// shutdown): close out whatever half of the response is still open,
    /// then terminate normally.
    pub(crate) fn graceful_stop_stream(&mut self, stream_id: StreamId) -> Result<(), ConnError> {
        let local = match self.streams.get(stream_id) {
            Some(s) => s.local,
            None => return Ok(()),
        };

        match local {
            Local::Idle => {
                let headers = vec![Header::new(":status", "204")];
                self.send_headers(stream_id, &headers, true)?;
            }
            Local::NoFin => {
                self.send_data(stream_id, Bytes::new(), true)?;
            }
            Local::Fin => {}
        }

        self.terminate_stream(stream_id, TerminateReason::Normal);
        Ok(())
    }
}

fn split_authority(authority: &str) -> (String, Option<u16>) {
    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(p) => (host.to_string(), Some(p)),
            Err(_) => (authority.to_string(), None),
        },
        None => (authority.to_string(), None),
    }
}

fn split_path(path: &str) -> (String, Option<String>) {
    match path.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (path.to_string(), None),
    }
}

/// Returns `Ok(Some(n))` for a present, parseable `content-length`,
/// `Ok(None)` if absent, `Err(())` if present but unparseable (spec §4.5
/// step 4).
fn content_length(headers: &[Header]) -> Result<Option<u64>, ()> {
    match headers.iter().find(|h| h.name == "content-length") {
        Some(h) => h.value.parse::<u64>().map(Some).map_err(|_| ()),
        None => Ok(None),
    }
}
