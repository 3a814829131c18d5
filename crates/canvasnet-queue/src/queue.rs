use std::collections::VecDeque;
use std::fmt;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use canvasnet_frame::{
    deserialize, frame_kind, is_valid_length, serialize, sniff_length, DisconnectReason,
    FrameError, Message, MessagePtr, HEADER_LEN, MAX_FRAME_LEN,
};
use canvasnet_transport::{Transport, WriteSource};
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::control::{self, Inbound, PingTracker};
use crate::error::{ProtocolAnomaly, QueueError};
use crate::event::QueueEvent;
use crate::lag::{NoLag, WriteLag};

/// Lifecycle of a [`MessageQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueState {
    /// Normal bidirectional traffic.
    Active,
    /// A disconnect notice is queued or in flight. Further sends are
    /// ignored and inbound bytes are discarded.
    Draining,
    /// Terminal. The transport was closed or aborted, or failed.
    Closed,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Message framing and buffering over one transport.
///
/// Inbound bytes are reassembled in a fixed buffer large enough for one
/// maximal frame. Outbound messages are serialized one at a time into a
/// second fixed buffer; the next frame is not serialized until every byte
/// of the current one has been accepted by the transport, so frames never
/// interleave on the wire.
///
/// The queue never blocks (apart from an injected [`WriteLag`]) and owns no
/// thread. The host must call:
/// - [`on_readable`](Self::on_readable) when the transport has data
/// - [`on_bytes_written`](Self::on_bytes_written) when the transport reports
///   flushed bytes
/// - [`on_timer_tick`](Self::on_timer_tick) at or after
///   [`next_timer_deadline`](Self::next_timer_deadline)
///
/// and then drain [`poll_event`](Self::poll_event). All calls must come from
/// one thread at a time; there is no internal locking.
pub struct MessageQueue<T> {
    transport: T,
    config: QueueConfig,
    clock: Box<dyn Clock + Send>,
    lag: Box<dyn WriteLag + Send>,

    recv_buf: Box<[u8]>,
    recv_count: usize,
    /// Bytes still to drop from an oversized frame.
    skip_count: usize,

    send_buf: Box<[u8]>,
    send_len: usize,
    sent_count: usize,

    send_queue: VecDeque<MessagePtr>,
    recv_queue: VecDeque<MessagePtr>,
    events: VecDeque<QueueEvent>,

    state: QueueState,
    ignore_incoming: bool,
    close_when_flushed: bool,
    write_source: WriteSource,

    last_recv: Instant,
    idle_timeout: Duration,
    next_idle_check: Option<Instant>,
    ping_interval: Duration,
    next_ping: Option<Instant>,
    pings: PingTracker,
}

impl<T: Transport> MessageQueue<T> {
    /// Create a queue with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, QueueConfig::default())
    }

    /// Create a queue with explicit configuration.
    pub fn with_config(transport: T, config: QueueConfig) -> Self {
        Self::with_parts(transport, config, SystemClock, NoLag)
    }

    /// Create a queue with an explicit clock and write-lag strategy.
    pub fn with_parts(
        transport: T,
        config: QueueConfig,
        clock: impl Clock + Send + 'static,
        lag: impl WriteLag + Send + 'static,
    ) -> Self {
        let now = clock.now();
        Self {
            transport,
            config,
            clock: Box::new(clock),
            lag: Box::new(lag),
            recv_buf: vec![0u8; MAX_FRAME_LEN].into_boxed_slice(),
            recv_count: 0,
            skip_count: 0,
            send_buf: vec![0u8; MAX_FRAME_LEN].into_boxed_slice(),
            send_len: 0,
            sent_count: 0,
            send_queue: VecDeque::new(),
            recv_queue: VecDeque::new(),
            events: VecDeque::new(),
            state: QueueState::Active,
            ignore_incoming: false,
            close_when_flushed: false,
            write_source: WriteSource::Plain,
            last_recv: now,
            idle_timeout: Duration::ZERO,
            next_idle_check: None,
            ping_interval: Duration::ZERO,
            next_ping: None,
            pings: PingTracker::default(),
        }
    }

    /// Queue a message behind everything already waiting.
    ///
    /// Ignored once a disconnect is under way.
    pub fn send(&mut self, msg: impl Into<MessagePtr>) {
        if self.state != QueueState::Active {
            trace!(state = %self.state, "send ignored");
            return;
        }
        self.send_queue.push_back(msg.into());
        if self.send_len == 0 {
            self.write_data();
        }
    }

    /// Queue a message ahead of everything already waiting.
    ///
    /// A frame already being written is not interrupted. Ignored once a
    /// disconnect is under way.
    pub fn send_priority(&mut self, msg: impl Into<MessagePtr>) {
        if self.state != QueueState::Active {
            trace!(state = %self.state, "priority send ignored");
            return;
        }
        self.send_queue.push_front(msg.into());
        if self.send_len == 0 {
            self.write_data();
        }
    }

    /// Send a disconnect notice, then close once it is flushed.
    ///
    /// The notice jumps the outbound queue. Messages queued behind it are
    /// dropped when it is serialized. From now on inbound bytes are still
    /// read off the transport but discarded.
    pub fn send_disconnect(&mut self, reason: DisconnectReason, message: impl Into<String>) {
        if self.state != QueueState::Active {
            debug!(state = %self.state, "disconnect already under way");
            return;
        }
        let message = message.into();
        info!(%reason, %message, "sending disconnect notice");
        self.send_queue
            .push_front(Message::disconnect(0, reason, message).into_ptr());
        self.state = QueueState::Draining;
        self.ignore_incoming = true;
        self.recv_count = 0;
        self.skip_count = 0;
        if self.send_len == 0 {
            self.write_data();
        }
    }

    /// Send a keepalive probe now, as the ping timer would.
    pub fn send_ping(&mut self) {
        if self.state != QueueState::Active {
            return;
        }
        if let Some(outstanding) = self.pings.probe_sent(self.clock.now()) {
            warn!(outstanding, "reply to previous ping not yet received");
            self.report(ProtocolAnomaly::PingUnanswered { outstanding }.into());
            if let Some(max) = self.config.max_unanswered_pings {
                if outstanding >= max {
                    warn!(unanswered = outstanding, "peer unresponsive, aborting");
                    self.transport.abort();
                    self.report(QueueError::PingTimeout {
                        unanswered: outstanding,
                    });
                    self.enter_closed();
                    return;
                }
            }
        }
        self.send_priority(control::probe());
    }

    /// Whether a received message is waiting.
    pub fn is_pending(&self) -> bool {
        !self.recv_queue.is_empty()
    }

    /// Take the oldest received message. `None` when nothing is waiting.
    pub fn get_pending(&mut self) -> Option<MessagePtr> {
        self.recv_queue.pop_front()
    }

    /// Arm (non-zero) or disarm (zero) the idle timeout.
    ///
    /// Either way the last-received time is reset to now.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        let now = self.clock.now();
        self.idle_timeout = timeout;
        self.last_recv = now;
        self.next_idle_check = if timeout.is_zero() {
            None
        } else {
            Some(now + self.config.idle_check_interval)
        };
    }

    /// Arm (non-zero) or disarm (zero) periodic keepalive probes.
    pub fn set_ping_interval(&mut self, interval: Duration) {
        self.ping_interval = interval;
        self.next_ping = if interval.is_zero() {
            None
        } else {
            Some(self.clock.now() + interval)
        };
    }

    /// Bytes not yet handed off by the transport: unflushed transport bytes,
    /// the unsent part of the current frame, and every queued message.
    pub fn upload_queue_bytes(&self) -> usize {
        let queued: usize = self.send_queue.iter().map(|msg| msg.length()).sum();
        self.transport.bytes_to_write() + (self.send_len - self.sent_count) + queued
    }

    /// Time since bytes were last received.
    pub fn idle_time(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_recv)
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Earliest instant at which [`on_timer_tick`](Self::on_timer_tick) has work.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        match (self.next_idle_check, self.next_ping) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Take the oldest pending notification.
    pub fn poll_event(&mut self) -> Option<QueueEvent> {
        self.events.pop_front()
    }

    /// Take every pending notification.
    pub fn drain_events(&mut self) -> impl Iterator<Item = QueueEvent> + '_ {
        self.events.drain(..)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the queue and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// The transport switched to an encrypted session: from now on only
    /// [`WriteSource::Encrypted`] completions count.
    pub fn on_encrypted(&mut self) {
        if self.state == QueueState::Closed {
            return;
        }
        info!("encrypted session established");
        self.write_source = WriteSource::Encrypted;
    }

    /// Timer trigger: runs the idle check and the ping timer if they are due.
    pub fn on_timer_tick(&mut self) {
        if self.state == QueueState::Closed {
            return;
        }
        let now = self.clock.now();

        if let Some(due) = self.next_idle_check {
            if now >= due {
                self.next_idle_check = Some(now + self.config.idle_check_interval);
                self.check_idle_timeout();
            }
        }

        if let Some(due) = self.next_ping {
            if now >= due && self.state != QueueState::Closed {
                self.next_ping = Some(now + self.ping_interval);
                self.send_ping();
            }
        }
    }

    /// Abort the transport if nothing has been received within the idle
    /// timeout.
    pub fn check_idle_timeout(&mut self) {
        if self.state == QueueState::Closed
            || self.idle_timeout.is_zero()
            || !self.transport.is_connected()
        {
            return;
        }
        let idle = self.idle_time();
        if idle > self.idle_timeout {
            warn!(?idle, timeout = ?self.idle_timeout, "message queue timeout");
            self.transport.abort();
            self.report(QueueError::IdleTimeout {
                idle,
                timeout: self.idle_timeout,
            });
            self.enter_closed();
        }
    }

    /// Readable trigger: read everything available and extract complete
    /// frames.
    pub fn on_readable(&mut self) {
        if self.state == QueueState::Closed {
            return;
        }

        let mut got_message = false;
        let mut total_read = 0usize;
        loop {
            let read = match self.transport.read(&mut self.recv_buf[self.recv_count..]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::WouldBlock => 0,
                Err(err) => {
                    self.transport_failed(err);
                    return;
                }
            };

            if self.ignore_incoming {
                // Shutting down: keep the socket drained but drop the bytes.
                if read > 0 {
                    continue;
                }
                break;
            }

            // Advisories count bytes read earlier in this pass.
            let read_before = total_read;
            self.recv_count += read;
            total_read += read;
            self.discard_skipped();
            got_message |= self.extract_frames(read_before);

            if read == 0 || self.state == QueueState::Closed {
                break;
            }
        }

        if total_read > 0 {
            self.last_recv = self.clock.now();
            self.push_before_closed(QueueEvent::BytesReceived(total_read));
        }
        if got_message {
            self.push_before_closed(QueueEvent::MessageAvailable);
        }

        if self.state != QueueState::Closed && !self.transport.is_connected() {
            info!("peer disconnected");
            self.enter_closed();
        }
    }

    /// Write-completion trigger.
    ///
    /// Completions from a source other than the current one are ignored.
    /// Writing resumes once the transport has flushed everything.
    pub fn on_bytes_written(&mut self, source: WriteSource, bytes: usize) {
        if self.state == QueueState::Closed {
            return;
        }
        if source != self.write_source {
            trace!(?source, bytes, "ignoring completion from inactive source");
            return;
        }
        self.events.push_back(QueueEvent::BytesSent(bytes));
        if self.transport.bytes_to_write() > 0 {
            return;
        }
        if self.send_len == 0 && self.send_queue.is_empty() {
            self.events.push_back(QueueEvent::AllSent);
        } else {
            self.write_data();
        }
    }

    fn discard_skipped(&mut self) {
        if self.skip_count == 0 || self.recv_count == 0 {
            return;
        }
        let n = self.skip_count.min(self.recv_count);
        self.consume(n);
        self.skip_count -= n;
    }

    /// Extract every complete frame in the receive buffer. Returns true if
    /// anything was added to the inbound queue.
    fn extract_frames(&mut self, read_before: usize) -> bool {
        let mut got_message = false;
        while self.skip_count == 0 && self.recv_count >= HEADER_LEN {
            let buffered = &self.recv_buf[..self.recv_count];
            let length = sniff_length(buffered).unwrap_or(0);
            let kind = frame_kind(buffered).unwrap_or(0);

            if !is_valid_length(length) {
                self.report_malformed(length, kind, FrameError::InvalidLength { length });
                if length > self.recv_count {
                    self.skip_count = length - self.recv_count;
                    self.recv_count = 0;
                } else {
                    self.consume(length.max(HEADER_LEN));
                }
                continue;
            }
            if length > self.recv_count {
                break;
            }

            match deserialize(&self.recv_buf[..length]) {
                Ok(msg) => got_message |= self.dispatch(msg, read_before),
                Err(err) => self.report_malformed(length, kind, err),
            }
            self.consume(length);
        }
        got_message
    }

    fn dispatch(&mut self, msg: Message, read_before: usize) -> bool {
        match control::classify(&msg) {
            Inbound::Expecting(bytes) => {
                let offset = u32::try_from(read_before).unwrap_or(u32::MAX);
                let expected = bytes.saturating_add(offset);
                trace!(bytes, expected, "peer announced pending bytes");
                self.events.push_back(QueueEvent::ExpectingBytes(expected));
                false
            }
            Inbound::Pong => {
                match self.pings.pong_received(self.clock.now()) {
                    Some(roundtrip) => {
                        debug!(?roundtrip, "ping round trip");
                        self.events.push_back(QueueEvent::PingPong(roundtrip));
                    }
                    None => {
                        warn!("received pong, but no ping was sent");
                        self.report(ProtocolAnomaly::UnexpectedPong.into());
                    }
                }
                false
            }
            Inbound::Probe => {
                self.send_priority(control::pong());
                false
            }
            Inbound::Deliver => {
                trace!(kind = msg.kind(), context = msg.context_id(), "message received");
                self.recv_queue.push_back(msg.into_ptr());
                true
            }
        }
    }

    fn consume(&mut self, n: usize) {
        if n < self.recv_count {
            self.recv_buf.copy_within(n..self.recv_count, 0);
        }
        self.recv_count = self.recv_count.saturating_sub(n);
    }

    fn write_data(&mut self) {
        loop {
            if self.state == QueueState::Closed {
                return;
            }

            if self.send_len == 0 {
                let Some(msg) = self.send_queue.pop_front() else {
                    return;
                };
                match serialize(&msg, &mut self.send_buf) {
                    Ok(n) => self.send_len = n,
                    Err(source) => {
                        warn!(kind = msg.kind(), error = %source, "dropping unsendable message");
                        self.report(QueueError::Encode {
                            kind: msg.kind(),
                            source,
                        });
                        continue;
                    }
                }
                trace!(kind = msg.kind(), len = self.send_len, "frame serialized");

                if msg.is_disconnect() {
                    // Nothing may follow a disconnect notice.
                    let dropped = self.send_queue.len();
                    self.send_queue.clear();
                    self.close_when_flushed = true;
                    self.state = QueueState::Draining;
                    debug!(dropped, "disconnect notice in flight");
                }
            }

            while self.sent_count < self.send_len {
                self.lag.before_write();
                match self
                    .transport
                    .write(&self.send_buf[self.sent_count..self.send_len])
                {
                    // Transport is full; resume on the next write completion.
                    Ok(0) => return,
                    Ok(n) => self.sent_count += n,
                    Err(err) if err.kind() == ErrorKind::WouldBlock => return,
                    Err(err) => {
                        self.transport_failed(err);
                        return;
                    }
                }
            }

            self.send_len = 0;
            self.sent_count = 0;
            if self.close_when_flushed {
                info!("disconnect notice flushed, closing transport");
                self.transport.close();
                self.enter_closed();
                return;
            }
        }
    }

    fn report_malformed(&mut self, length: usize, kind: u8, source: FrameError) {
        warn!(length, kind, error = %source, "malformed frame skipped");
        self.report(QueueError::MalformedFrame {
            length,
            kind,
            source,
        });
    }

    fn transport_failed(&mut self, err: std::io::Error) {
        error!(error = %err, detail = %self.transport.error_string(), "transport error");
        self.report(QueueError::Transport(err));
        self.enter_closed();
    }

    fn enter_closed(&mut self) {
        if self.state == QueueState::Closed {
            return;
        }
        self.state = QueueState::Closed;
        self.next_idle_check = None;
        self.next_ping = None;
        self.pings.reset();
        self.events.push_back(QueueEvent::Closed);
    }

    /// Queue an event, keeping `Closed` last if this pass already closed.
    fn push_before_closed(&mut self, event: QueueEvent) {
        match self.events.back() {
            Some(QueueEvent::Closed) => {
                let at = self.events.len() - 1;
                self.events.insert(at, event);
            }
            _ => self.events.push_back(event),
        }
    }

    fn report(&mut self, err: QueueError) {
        self.events.push_back(QueueEvent::Error(err));
    }
}

impl<T> fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("state", &self.state)
            .field("recv_count", &self.recv_count)
            .field("send_len", &self.send_len)
            .field("sent_count", &self.sent_count)
            .field("outbound", &self.send_queue.len())
            .field("inbound", &self.recv_queue.len())
            .finish()
    }
}
