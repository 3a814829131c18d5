use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use bytes::{Buf, BytesMut};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default size of the userspace write buffer: 256 KiB.
pub const DEFAULT_WRITE_CAPACITY: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Connected,
    /// Close requested, waiting for the write buffer to drain.
    Closing,
    Closed,
}

/// Non-blocking TCP transport with a bounded userspace write buffer.
///
/// `write` only copies into the buffer. The host event loop calls
/// [`flush`](TcpTransport::flush) when the socket is writable and forwards
/// the returned count to the message queue as a write-completion signal.
pub struct TcpTransport {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    out: BytesMut,
    write_capacity: usize,
    state: StreamState,
    last_error: Option<String>,
}

impl TcpTransport {
    /// Connect to a remote peer (blocking connect, then non-blocking I/O).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let label = format!("{addr:?}");
        let mut last_err = None;
        for candidate in addr.to_socket_addrs()? {
            match TcpStream::connect(candidate) {
                Ok(stream) => {
                    info!(peer = %candidate, "connected");
                    return Self::from_stream(stream);
                }
                Err(err) => last_err = Some(TransportError::connect(&candidate, err)),
            }
        }
        Err(last_err.unwrap_or(TransportError::NoAddress(label)))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        Self::with_write_capacity(stream, DEFAULT_WRITE_CAPACITY)
    }

    /// Wrap an already connected stream with an explicit write buffer size.
    pub fn with_write_capacity(stream: TcpStream, write_capacity: usize) -> Result<Self> {
        stream.set_nonblocking(true)?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "TCP_NODELAY not applied");
        }
        let peer = stream.peer_addr().ok();
        Ok(Self {
            stream,
            peer,
            out: BytesMut::with_capacity(write_capacity.min(DEFAULT_WRITE_CAPACITY)),
            write_capacity: write_capacity.max(1),
            state: StreamState::Connected,
            last_error: None,
        })
    }

    /// Address of the connected peer, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Push buffered bytes to the socket.
    ///
    /// Returns the number of bytes handed to the kernel during this call.
    /// When a graceful close is pending and the buffer becomes empty, the
    /// write half is shut down.
    pub fn flush(&mut self) -> io::Result<usize> {
        if self.state == StreamState::Closed {
            return Ok(0);
        }

        let mut flushed = 0usize;
        while !self.out.is_empty() {
            match self.stream.write(&self.out) {
                Ok(0) => {
                    self.fail("socket accepted zero bytes");
                    return Err(io::Error::from(ErrorKind::WriteZero));
                }
                Ok(n) => {
                    self.out.advance(n);
                    flushed += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    self.fail(&err.to_string());
                    return Err(err);
                }
            }
        }

        if self.out.is_empty() && self.state == StreamState::Closing {
            self.finish_close();
        }
        Ok(flushed)
    }

    /// Whether a graceful close has completed or the stream was dropped.
    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    fn finish_close(&mut self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Write) {
            debug!(error = %err, "shutdown after drain failed");
        }
        self.state = StreamState::Closed;
        debug!(peer = ?self.peer, "transport closed");
    }

    fn fail(&mut self, message: &str) {
        warn!(peer = ?self.peer, error = message, "transport failure");
        self.last_error = Some(message.to_string());
        self.state = StreamState::Closed;
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.state == StreamState::Closed {
            return Ok(0);
        }
        loop {
            match self.stream.read(buf) {
                Ok(0) => {
                    debug!(peer = ?self.peer, "peer closed the connection");
                    self.state = StreamState::Closed;
                    return Ok(0);
                }
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(err) => {
                    self.fail(&err.to_string());
                    return Err(err);
                }
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state != StreamState::Connected {
            return Err(io::Error::new(
                ErrorKind::NotConnected,
                "transport is not connected",
            ));
        }
        let room = self.write_capacity.saturating_sub(self.out.len());
        let n = room.min(buf.len());
        self.out.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn bytes_to_write(&self) -> usize {
        self.out.len()
    }

    fn is_connected(&self) -> bool {
        self.state == StreamState::Connected
    }

    fn abort(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            debug!(error = %err, "abort shutdown failed");
        }
        self.out.clear();
        self.state = StreamState::Closed;
        info!(peer = ?self.peer, "transport aborted");
    }

    fn close(&mut self) {
        if self.state != StreamState::Connected {
            return;
        }
        self.state = StreamState::Closing;
        if self.out.is_empty() {
            self.finish_close();
        }
    }

    fn error_string(&self) -> String {
        self.last_error
            .clone()
            .unwrap_or_else(|| String::from("unknown transport error"))
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.peer)
            .field("state", &self.state)
            .field("buffered", &self.out.len())
            .finish()
    }
}

/// Listening TCP socket that hands out [`TcpTransport`]s.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind and listen on `addr`.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let label = format!("{addr:?}");
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::bind(&label, e))?;
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "listening");
        }
        Ok(Self { listener })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<TcpTransport> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        TcpTransport::from_stream(stream)
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
