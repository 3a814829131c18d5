use std::io::{self, ErrorKind};

use bytes::{Buf, BytesMut};

use crate::traits::Transport;

/// In-memory transport with scriptable read and write behaviour.
///
/// Inbound bytes are pushed with [`push_inbound`](MemoryTransport::push_inbound)
/// and handed out by `read`. Accepted writes land on [`wire`](MemoryTransport::wire),
/// either immediately or, in buffered mode, only after
/// [`flush`](MemoryTransport::flush). Used for deterministic simulations of
/// slow links, partial writes and transport failures.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: BytesMut,
    read_chunk: Option<usize>,

    wire: BytesMut,
    unflushed: BytesMut,
    buffered: bool,
    write_chunk: Option<usize>,
    write_budget: Option<usize>,
    write_sizes: Vec<usize>,

    read_error: Option<ErrorKind>,
    write_error: Option<ErrorKind>,

    connected: bool,
    abort_count: usize,
    close_count: usize,
    wire_len_at_close: Option<usize>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A connected transport that accepts every write in full.
    pub fn new() -> Self {
        Self {
            inbound: BytesMut::new(),
            read_chunk: None,
            wire: BytesMut::new(),
            unflushed: BytesMut::new(),
            buffered: false,
            write_chunk: None,
            write_budget: None,
            write_sizes: Vec::new(),
            read_error: None,
            write_error: None,
            connected: true,
            abort_count: 0,
            close_count: 0,
            wire_len_at_close: None,
        }
    }

    /// Accept at most `chunk` bytes per `write` call.
    pub fn with_write_chunk(mut self, chunk: usize) -> Self {
        self.write_chunk = Some(chunk.max(1));
        self
    }

    /// Hand out at most `chunk` bytes per `read` call.
    pub fn with_read_chunk(mut self, chunk: usize) -> Self {
        self.read_chunk = Some(chunk.max(1));
        self
    }

    /// Keep accepted bytes pending until [`flush`](Self::flush).
    pub fn buffered(mut self) -> Self {
        self.buffered = true;
        self
    }

    /// Limit the total number of bytes accepted before writes stall.
    ///
    /// `None` removes the limit.
    pub fn set_write_budget(&mut self, budget: Option<usize>) {
        self.write_budget = budget;
    }

    /// Make bytes available to `read`.
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    /// Bytes still waiting to be read.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Move pending bytes onto the wire, returning how many moved.
    pub fn flush(&mut self) -> usize {
        let n = self.unflushed.len();
        let pending = self.unflushed.split();
        self.wire.unsplit(pending);
        n
    }

    /// Everything flushed so far.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    /// Take and clear the flushed bytes.
    pub fn take_wire(&mut self) -> Vec<u8> {
        let out = self.wire.to_vec();
        self.wire.clear();
        out
    }

    /// Sizes of the individual accepted writes, in order.
    pub fn write_sizes(&self) -> &[usize] {
        &self.write_sizes
    }

    /// Fail the next `read` with the given error kind.
    pub fn fail_next_read(&mut self, kind: ErrorKind) {
        self.read_error = Some(kind);
    }

    /// Fail the next `write` with the given error kind.
    pub fn fail_next_write(&mut self, kind: ErrorKind) {
        self.write_error = Some(kind);
    }

    /// Simulate the peer hanging up.
    pub fn disconnect_peer(&mut self) {
        self.connected = false;
    }

    pub fn abort_count(&self) -> usize {
        self.abort_count
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }

    /// Length of the wire (flushed plus pending) when `close` was first called.
    pub fn wire_len_at_close(&self) -> Option<usize> {
        self.wire_len_at_close
    }

    fn accept_limit(&self, offered: usize) -> usize {
        let mut n = offered;
        if let Some(chunk) = self.write_chunk {
            n = n.min(chunk);
        }
        if let Some(budget) = self.write_budget {
            n = n.min(budget);
        }
        n
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.read_error.take() {
            return Err(io::Error::new(kind, "scripted read failure"));
        }
        let mut n = buf.len().min(self.inbound.len());
        if let Some(chunk) = self.read_chunk {
            n = n.min(chunk);
        }
        buf[..n].copy_from_slice(&self.inbound[..n]);
        self.inbound.advance(n);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.write_error.take() {
            return Err(io::Error::new(kind, "scripted write failure"));
        }
        if !self.connected {
            return Err(io::Error::new(
                ErrorKind::NotConnected,
                "transport is not connected",
            ));
        }
        let n = self.accept_limit(buf.len());
        if n == 0 {
            return Ok(0);
        }
        if let Some(budget) = self.write_budget.as_mut() {
            *budget -= n;
        }
        if self.buffered {
            self.unflushed.extend_from_slice(&buf[..n]);
        } else {
            self.wire.extend_from_slice(&buf[..n]);
        }
        self.write_sizes.push(n);
        Ok(n)
    }

    fn bytes_to_write(&self) -> usize {
        self.unflushed.len()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn abort(&mut self) {
        self.abort_count += 1;
        self.connected = false;
        self.unflushed.clear();
    }

    fn close(&mut self) {
        self.close_count += 1;
        if self.wire_len_at_close.is_none() {
            self.wire_len_at_close = Some(self.wire.len() + self.unflushed.len());
        }
        self.connected = false;
    }

    fn error_string(&self) -> String {
        String::from("memory transport error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_writes_accept_partially() {
        let mut t = MemoryTransport::new().with_write_chunk(3);
        assert_eq!(t.write(b"abcdefg").unwrap(), 3);
        assert_eq!(t.write(b"defg").unwrap(), 3);
        assert_eq!(t.wire(), b"abcdef");
        assert_eq!(t.write_sizes(), &[3, 3]);
    }

    #[test]
    fn budget_stalls_writes() {
        let mut t = MemoryTransport::new();
        t.set_write_budget(Some(4));
        assert_eq!(t.write(b"abcdef").unwrap(), 4);
        assert_eq!(t.write(b"ef").unwrap(), 0);
        t.set_write_budget(None);
        assert_eq!(t.write(b"ef").unwrap(), 2);
        assert_eq!(t.wire(), b"abcdef");
    }

    #[test]
    fn buffered_mode_holds_until_flush() {
        let mut t = MemoryTransport::new().buffered();
        t.write(b"hello").unwrap();
        assert_eq!(t.bytes_to_write(), 5);
        assert!(t.wire().is_empty());

        assert_eq!(t.flush(), 5);
        assert_eq!(t.bytes_to_write(), 0);
        assert_eq!(t.wire(), b"hello");
    }

    #[test]
    fn reads_respect_chunk_and_buffer() {
        let mut t = MemoryTransport::new().with_read_chunk(2);
        t.push_inbound(b"xyz");
        let mut buf = [0u8; 8];
        assert_eq!(t.read(&mut buf).unwrap(), 2);
        assert_eq!(t.read(&mut buf).unwrap(), 1);
        assert_eq!(t.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn scripted_failures_fire_once() {
        let mut t = MemoryTransport::new();
        t.fail_next_read(ErrorKind::ConnectionReset);
        let mut buf = [0u8; 4];
        assert_eq!(
            t.read(&mut buf).unwrap_err().kind(),
            ErrorKind::ConnectionReset
        );
        assert_eq!(t.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn close_records_wire_length() {
        let mut t = MemoryTransport::new();
        t.write(b"notice").unwrap();
        t.close();
        t.close();
        assert_eq!(t.wire_len_at_close(), Some(6));
        assert_eq!(t.close_count(), 2);
        assert!(!t.is_connected());
    }
}
