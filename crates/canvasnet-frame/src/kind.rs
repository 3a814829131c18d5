//! Message kind tags.
//!
//! Kinds 0-3 are the protocol messages the transport understands.
//! Kinds 4-31 are reserved and rejected by the decoder.
//! Kinds 32-255 carry opaque application payloads (canvas commands etc).

/// Server command or login line (UTF-8 text).
pub const COMMAND: u8 = 0;

/// Keepalive probe or reply.
pub const PING: u8 = 1;

/// Disconnect notice with reason code and text.
pub const DISCONNECT: u8 = 2;

/// Flow-control advisory: bytes still expected for a pending operation.
pub const STREAM_POS: u8 = 3;

/// First kind carrying an opaque application payload.
pub const OPAQUE_START: u8 = 32;

/// Returns a human-readable name for a kind tag.
pub fn kind_name(kind: u8) -> &'static str {
    match kind {
        COMMAND => "COMMAND",
        PING => "PING",
        DISCONNECT => "DISCONNECT",
        STREAM_POS => "STREAM_POS",
        k if !is_known(k) => "RESERVED",
        _ => "OPAQUE",
    }
}

/// Returns true for the three protocol-level control messages.
pub fn is_control(kind: u8) -> bool {
    matches!(kind, PING | DISCONNECT | STREAM_POS)
}

/// Returns true if the decoder accepts this kind.
pub fn is_known(kind: u8) -> bool {
    kind <= STREAM_POS || kind >= OPAQUE_START
}

/// Returns true if the kind carries an opaque application payload.
pub fn is_opaque(kind: u8) -> bool {
    kind >= OPAQUE_START
}
