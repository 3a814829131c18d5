use std::io;

/// Which notification stream reports bytes leaving the transport.
///
/// A plain socket reports flushed bytes on one signal. Once an encrypted
/// session is established the underlying stream reports ciphertext flushes
/// on a separate signal, and the plaintext one no longer tracks what has
/// actually reached the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteSource {
    Plain,
    Encrypted,
}

/// A connected, non-blocking duplex byte stream.
///
/// Implementations must never block. The contract mirrors a buffered socket:
///
/// - [`read`](Transport::read) copies pending bytes into `buf` and returns
///   how many were copied. `Ok(0)` means nothing is pending right now.
///   `ErrorKind::WouldBlock` is treated the same as `Ok(0)`.
/// - [`write`](Transport::write) accepts up to `buf.len()` bytes and returns
///   how many were taken. Accepting fewer bytes, including zero, is normal
///   backpressure and not an error.
/// - [`bytes_to_write`](Transport::bytes_to_write) reports bytes accepted by
///   `write` that have not yet been flushed to the peer.
pub trait Transport {
    /// Read pending bytes without blocking.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Offer bytes for transmission without blocking.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Bytes accepted by `write` but not yet flushed.
    fn bytes_to_write(&self) -> usize;

    /// Whether the stream is still connected to its peer.
    fn is_connected(&self) -> bool;

    /// Drop the connection immediately, discarding unflushed bytes.
    fn abort(&mut self);

    /// Close gracefully once all accepted bytes have been flushed.
    fn close(&mut self);

    /// Human-readable description of the most recent error, if any.
    fn error_string(&self) -> String {
        String::from("unknown transport error")
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn bytes_to_write(&self) -> usize {
        (**self).bytes_to_write()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn abort(&mut self) {
        (**self).abort()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn error_string(&self) -> String {
        (**self).error_string()
    }
}
