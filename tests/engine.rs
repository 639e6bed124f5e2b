//! End-to-end connection scenarios, mirroring the literal cases spelled out
//! in the engine's testable-properties list: preface handling, a full
//! request/response round trip, rejecting client PUSH_PROMISE, rejecting a
//! frame interleaved mid-header-block, peer-initiated RST_STREAM, and
//! duplicate `set-cookie` emission.
//!
//! The connection loop blocks on its own mailbox, so every scenario here
//! queues all inbound bytes (and, where needed, a `SystemMessage::Shutdown`)
//! before calling `run()` once: no threads are needed since the loop drains
//! its queue in order before going back to sleep.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use bytes::{BufMut, Bytes, BytesMut};

use h2_engine::conn::{ConnMessage, SystemMessage};
use h2_engine::error::Reason;
use h2_engine::frame::{self, Decoded, Frame, Head, Kind, StreamId};
use h2_engine::handler::{Command, Message, Request, StatusCode, StreamHandler, TerminateReason};
use h2_engine::hpack;
use h2_engine::{Config, Connection, ExitReason};

struct MockTransport {
    sent: Arc<Mutex<Vec<u8>>>,
    peer: SocketAddr,
}

impl h2_engine::transport::Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sent.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) {}

    fn peername(&self) -> io::Result<SocketAddr> {
        Ok(self.peer)
    }

    fn arm_readable(&mut self) {}
}

fn mock_transport() -> (MockTransport, Arc<Mutex<Vec<u8>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 54321);
    (MockTransport { sent: sent.clone(), peer }, sent)
}

/// A handler whose `init` is driven by a boxed closure; `data`/`info` just
/// record that they ran, and `terminate` records its reason so tests can
/// assert on lifecycle notifications.
struct RecordingHandler {
    events: Arc<Mutex<Vec<String>>>,
    on_init: Box<dyn Fn(u32, &Request) -> Vec<Command> + Send + Sync>,
}

impl StreamHandler for RecordingHandler {
    type State = ();

    fn init(&self, stream_id: u32, request: &Request) -> (Vec<Command>, ()) {
        self.events.lock().unwrap().push(format!(
            "init:{stream_id}:{}:{}:has_body={}:body_length={:?}",
            request.method, request.path, request.has_body, request.body_length
        ));
        ((self.on_init)(stream_id, request), ())
    }

    fn data(&self, stream_id: u32, len: u64, fin: bool, bytes: &[u8], _state: ()) -> (Vec<Command>, ()) {
        self.events
            .lock()
            .unwrap()
            .push(format!("data:{stream_id}:{len}:{fin}:{}", bytes.len()));
        (Vec::new(), ())
    }

    fn info(&self, stream_id: u32, _message: &Message, _state: ()) -> (Vec<Command>, ()) {
        self.events.lock().unwrap().push(format!("info:{stream_id}"));
        (Vec::new(), ())
    }

    fn terminate(&self, stream_id: u32, reason: TerminateReason, _state: ()) {
        self.events
            .lock()
            .unwrap()
            .push(format!("terminate:{stream_id}:{reason:?}"));
    }
}

fn respond_200(_id: u32, _req: &Request) -> Vec<Command> {
    vec![Command::Response {
        status: StatusCode::Code(200),
        headers: Vec::new(),
        body: Bytes::new(),
    }]
}

fn no_commands(_id: u32, _req: &Request) -> Vec<Command> {
    Vec::new()
}

fn handler_with(on_init: impl Fn(u32, &Request) -> Vec<Command> + Send + Sync + 'static) -> (RecordingHandler, Arc<Mutex<Vec<String>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    (
        RecordingHandler {
            events: events.clone(),
            on_init: Box::new(on_init),
        },
        events,
    )
}

const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

fn client_settings_frame() -> Vec<u8> {
    let mut buf = BytesMut::new();
    frame::Settings::new(frame::SettingSet::new()).encode(&mut buf);
    buf.to_vec()
}

fn encode_request_headers(stream_id: u32, end_stream: bool, pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut encoder = hpack::Encoder::new();
    let headers: Vec<hpack::Header> = pairs.iter().map(|(n, v)| hpack::Header::new(*n, *v)).collect();
    let block = encoder.encode(&headers);

    let mut buf = BytesMut::new();
    frame::Headers::encode(StreamId::new(stream_id), end_stream, &block, 16_384, &mut buf);
    buf.to_vec()
}

/// Decode every frame in a flat byte buffer (no CONTINUATION reassembly;
/// every test here keeps header blocks inside a single frame).
fn decode_all(buf: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        match frame::decode(&buf[offset..], 1 << 20) {
            Decoded::Frame(f, consumed) => {
                frames.push(f);
                offset += consumed;
            }
            _ => break,
        }
    }
    frames
}

#[test]
fn valid_connection_exchanges_settings_and_responds() {
    let (transport, sent) = mock_transport();
    let (handler, events) = handler_with(respond_200);
    let config = Config::builder().idle_timeout(5_000).build();
    let conn = Connection::new(transport, config, handler).unwrap();

    let mut inbound = Vec::new();
    inbound.extend_from_slice(PREFACE);
    inbound.extend_from_slice(&client_settings_frame());
    inbound.extend_from_slice(&encode_request_headers(
        1,
        true,
        &[(":method", "GET"), (":scheme", "https"), (":authority", "x"), (":path", "/")],
    ));

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(inbound.into_boxed_slice()))).unwrap();
    tx.send(ConnMessage::System(SystemMessage::Shutdown)).unwrap();

    let exit = conn.run();
    assert!(matches!(exit, ExitReason::Shutdown));

    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| e == "init:1:GET:/:has_body=false:body_length=Known(0)"));

    let sent = sent.lock().unwrap();
    let frames = decode_all(&sent);

    // First outbound frame is the engine's own initial SETTINGS, sent
    // before any client bytes even arrive.
    assert!(matches!(&frames[0], Frame::Settings(s) if !s.is_ack()));
    // Then a SETTINGS-ack once the client's SETTINGS frame is processed.
    assert!(frames.iter().any(|f| matches!(f, Frame::Settings(s) if s.is_ack())));
    // And finally a HEADERS frame carrying the 200 response with END_STREAM.
    let response = frames
        .iter()
        .find_map(|f| match f {
            Frame::Headers(h) => Some(h),
            _ => None,
        })
        .expect("a HEADERS frame was sent");
    assert!(response.is_end_stream());

    let mut decoder = hpack::Decoder::new();
    let headers = decoder.decode(response.header_block()).unwrap();
    assert!(headers.iter().any(|h| h.name == ":status" && h.value == "200"));
}

#[test]
fn invalid_preface_closes_the_connection() {
    let (transport, _sent) = mock_transport();
    let (handler, _events) = handler_with(no_commands);
    let conn = Connection::new(transport, Config::builder().build(), handler).unwrap();

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(
        b"GET / HTTP/1.1\r\n\r\n        ".to_vec().into_boxed_slice(),
    )))
    .unwrap();

    let exit = conn.run();
    match exit {
        ExitReason::ProtocolError(e) => assert_eq!(e.reason, Reason::ProtocolError),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn preface_timeout_closes_the_connection() {
    let (transport, _sent) = mock_transport();
    let (handler, _events) = handler_with(no_commands);
    let config = Config::builder().preface_timeout(20).idle_timeout(60_000).build();
    let conn = Connection::new(transport, config, handler).unwrap();

    // No bytes are ever sent; the preface timer must fire on its own.
    let exit = conn.run();
    match exit {
        ExitReason::ProtocolError(e) => assert_eq!(e.reason, Reason::ProtocolError),
        other => panic!("expected a preface timeout protocol error, got {other:?}"),
    }
}

#[test]
fn client_sent_push_promise_is_a_protocol_error() {
    let (transport, _sent) = mock_transport();
    let (handler, _events) = handler_with(no_commands);
    let conn = Connection::new(transport, Config::builder().build(), handler).unwrap();

    let mut encoder = hpack::Encoder::new();
    let block = encoder.encode(&[hpack::Header::new(":method", "GET")]);

    let mut inbound = Vec::new();
    inbound.extend_from_slice(PREFACE);
    inbound.extend_from_slice(&client_settings_frame());

    let mut pp = BytesMut::new();
    frame::PushPromise::encode(StreamId::new(3), StreamId::new(2), &block, 16_384, &mut pp);
    inbound.extend_from_slice(&pp);

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(inbound.into_boxed_slice()))).unwrap();

    let exit = conn.run();
    match exit {
        ExitReason::ProtocolError(e) => assert_eq!(e.reason, Reason::ProtocolError),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn continuation_interleaved_with_another_frame_is_a_protocol_error() {
    let (transport, _sent) = mock_transport();
    let (handler, _events) = handler_with(no_commands);
    let conn = Connection::new(transport, Config::builder().build(), handler).unwrap();

    let mut encoder = hpack::Encoder::new();
    let block = encoder.encode(&[
        hpack::Header::new(":method", "GET"),
        hpack::Header::new(":scheme", "https"),
        hpack::Header::new(":authority", "x"),
        hpack::Header::new(":path", "/"),
    ]);

    let mut inbound = Vec::new();
    inbound.extend_from_slice(PREFACE);
    inbound.extend_from_slice(&client_settings_frame());

    // HEADERS with no END_HEADERS flag: the header block is left open.
    let mut headers_buf = BytesMut::new();
    Head::new(Kind::Headers, 0, StreamId::new(1)).encode(block.len(), &mut headers_buf);
    headers_buf.put_slice(&block);
    inbound.extend_from_slice(&headers_buf);

    // A DATA frame must not be allowed to interrupt the header block.
    let mut data_buf = BytesMut::new();
    frame::Data::new(StreamId::new(1), Bytes::from_static(b"oops"), false).encode(&mut data_buf);
    inbound.extend_from_slice(&data_buf);

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(inbound.into_boxed_slice()))).unwrap();

    let exit = conn.run();
    match exit {
        ExitReason::ProtocolError(e) => assert_eq!(e.reason, Reason::ProtocolError),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn peer_rst_stream_terminates_without_an_outbound_reset() {
    let (transport, sent) = mock_transport();
    let (handler, events) = handler_with(no_commands);
    let conn = Connection::new(transport, Config::builder().build(), handler).unwrap();

    let mut inbound = Vec::new();
    inbound.extend_from_slice(PREFACE);
    inbound.extend_from_slice(&client_settings_frame());
    inbound.extend_from_slice(&encode_request_headers(
        1,
        true,
        &[(":method", "GET"), (":scheme", "https"), (":authority", "x"), (":path", "/")],
    ));
    let mut rst = BytesMut::new();
    frame::RstStream::new(StreamId::new(1), Reason::Cancel).encode(&mut rst);
    inbound.extend_from_slice(&rst);

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(inbound.into_boxed_slice()))).unwrap();
    tx.send(ConnMessage::System(SystemMessage::Shutdown)).unwrap();

    let exit = conn.run();
    assert!(matches!(exit, ExitReason::Shutdown));

    let events = events.lock().unwrap();
    let terminations: Vec<&String> = events.iter().filter(|e| e.starts_with("terminate:1:")).collect();
    assert_eq!(terminations.len(), 1, "terminate must be invoked exactly once: {events:?}");
    assert!(terminations[0].contains("StreamError(Cancel)"));

    let sent = sent.lock().unwrap();
    let frames = decode_all(&sent);
    assert!(
        !frames.iter().any(|f| matches!(f, Frame::Reset(_))),
        "no outbound RST_STREAM should be sent for a peer-initiated reset"
    );
}

#[test]
fn duplicate_set_cookie_headers_emit_one_hpack_field_each() {
    let (transport, sent) = mock_transport();
    let (handler, _events) = handler_with(|_id, _req| {
        vec![Command::Response {
            status: StatusCode::Code(200),
            headers: vec![
                hpack::Header::new("set-cookie", "a=1"),
                hpack::Header::new("set-cookie", "b=2"),
            ],
            body: Bytes::new(),
        }]
    });
    let conn = Connection::new(transport, Config::builder().build(), handler).unwrap();

    let mut inbound = Vec::new();
    inbound.extend_from_slice(PREFACE);
    inbound.extend_from_slice(&client_settings_frame());
    inbound.extend_from_slice(&encode_request_headers(
        1,
        true,
        &[(":method", "GET"), (":scheme", "https"), (":authority", "x"), (":path", "/")],
    ));

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(inbound.into_boxed_slice()))).unwrap();
    tx.send(ConnMessage::System(SystemMessage::Shutdown)).unwrap();
    conn.run();

    let sent = sent.lock().unwrap();
    let frames = decode_all(&sent);
    let response = frames
        .iter()
        .find_map(|f| match f {
            Frame::Headers(h) => Some(h),
            _ => None,
        })
        .expect("a HEADERS frame was sent");

    // Decode with a bare fluke_hpack decoder (bypassing this crate's
    // duplicate-join rules) to see the raw field count on the wire.
    let mut raw_decoder = fluke_hpack::Decoder::new();
    let pairs = raw_decoder.decode(response.header_block()).unwrap();
    let set_cookie_count = pairs.iter().filter(|(name, _)| name.as_ref() == b"set-cookie").count();
    assert_eq!(set_cookie_count, 2);
}

#[test]
fn data_after_a_fin_closed_headers_is_reset_with_stream_closed() {
    let (transport, sent) = mock_transport();
    // A handler that never responds: the stream sits open on our side with
    // its remote half already closed by the initial HEADERS' END_STREAM.
    let (handler, _events) = handler_with(no_commands);
    let conn = Connection::new(transport, Config::builder().build(), handler).unwrap();

    let mut inbound = Vec::new();
    inbound.extend_from_slice(PREFACE);
    inbound.extend_from_slice(&client_settings_frame());
    inbound.extend_from_slice(&encode_request_headers(
        1,
        true,
        &[(":method", "GET"), (":scheme", "https"), (":authority", "x"), (":path", "/")],
    ));
    let mut data_buf = BytesMut::new();
    frame::Data::new(StreamId::new(1), Bytes::from_static(b"x"), false).encode(&mut data_buf);
    inbound.extend_from_slice(&data_buf);

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(inbound.into_boxed_slice()))).unwrap();
    tx.send(ConnMessage::System(SystemMessage::Shutdown)).unwrap();
    conn.run();

    let sent = sent.lock().unwrap();
    let frames = decode_all(&sent);
    let rst = frames
        .iter()
        .find_map(|f| match f {
            Frame::Reset(r) => Some(r),
            _ => None,
        })
        .expect("a RST_STREAM frame was sent");
    assert_eq!(rst.reason(), Reason::StreamClosed);
}

#[test]
fn settings_ack_with_nothing_pending_is_a_protocol_error() {
    let (transport, _sent) = mock_transport();
    let (handler, _events) = handler_with(no_commands);
    let conn = Connection::new(transport, Config::builder().build(), handler).unwrap();

    let mut inbound = Vec::new();
    inbound.extend_from_slice(PREFACE);
    inbound.extend_from_slice(&client_settings_frame());
    let mut ack_buf = BytesMut::new();
    frame::Settings::ack().encode(&mut ack_buf);
    // A second, spurious ack: the engine only ever has one entry pending.
    inbound.extend_from_slice(&ack_buf);
    inbound.extend_from_slice(&ack_buf);

    let tx = conn.mailbox();
    tx.send(ConnMessage::Data(Arc::from(inbound.into_boxed_slice()))).unwrap();

    let exit = conn.run();
    match exit {
        ExitReason::ProtocolError(e) => assert_eq!(e.reason, Reason::ProtocolError),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}
