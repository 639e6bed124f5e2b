//! The transport contract (spec §6): send/sendfile/close/peername plus
//! arming one-shot readable notifications. The engine treats any
//! implementor as an opaque byte pipe; a blocking `TcpStream` with a reader
//! thread is provided as the default.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use crate::conn::ConnMessage;

/// Consumed by the connection loop to move bytes and manage the underlying
/// socket. `arm_readable` is a one-shot request: after it fires once, it
/// must be called again to receive another readable notification (spec
/// §4.7, step 1).
pub trait Transport: Send {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn sendfile(&mut self, path: &std::path::Path, offset: u64, count: u64) -> io::Result<u64> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut remaining = count;
        let mut buf = [0u8; 16_384];
        let mut sent = 0u64;
        while remaining > 0 {
            let want = std::cmp::min(remaining, buf.len() as u64) as usize;
            let n = file.read(&mut buf[..want])?;
            if n == 0 {
                break;
            }
            self.send(&buf[..n])?;
            sent += n as u64;
            remaining -= n as u64;
        }
        Ok(sent)
    }

    fn close(&mut self);

    fn peername(&self) -> io::Result<SocketAddr>;

    /// Arm the transport to deliver readable notifications into the
    /// connection's shared mailbox. Idempotent: only the first call does
    /// anything, standing in for the one-shot-then-rearm notification model
    /// of an event-driven transport (spec §4.7, step 1) since a blocking
    /// reader thread has no natural "disarm" point between reads.
    fn arm_readable(&mut self);
}

/// A blocking `TcpStream` paired with a dedicated reader thread: the
/// thread's blocking `read` calls are the "one-shot readable notification"
/// primitive, forwarding bytes (or closed/error) into the same mailbox
/// channel the rest of the connection loop merges events from (spec §9's
/// cooperative-mailbox design note, implemented with std-only primitives).
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    reader_spawned: bool,
    tx: Sender<ConnMessage>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream, tx: Sender<ConnMessage>) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(TcpTransport {
            stream,
            peer,
            reader_spawned: false,
            tx,
        })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    fn peername(&self) -> io::Result<SocketAddr> {
        Ok(self.peer)
    }

    fn arm_readable(&mut self) {
        if self.reader_spawned {
            return;
        }
        self.reader_spawned = true;

        let stream = match self.stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                let _ = self.tx.send(ConnMessage::SocketError(e));
                return;
            }
        };
        let tx = self.tx.clone();
        thread::spawn(move || read_loop(stream, tx));
    }
}

fn read_loop(mut stream: TcpStream, tx: Sender<ConnMessage>) {
    let mut buf = [0u8; 16_384];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(ConnMessage::SocketClosed);
                return;
            }
            Ok(n) => {
                if tx.send(ConnMessage::Data(Arc::from(&buf[..n]))).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(ConnMessage::SocketError(e));
                return;
            }
        }
    }
}
