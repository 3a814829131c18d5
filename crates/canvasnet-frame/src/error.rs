/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes are available than the frame needs.
    #[error("truncated frame ({available} of {needed} bytes)")]
    Truncated { needed: usize, available: usize },

    /// The header declares a length outside `HEADER_LEN..=MAX_FRAME_LEN`.
    #[error("invalid frame length {length}")]
    InvalidLength { length: usize },

    /// The kind tag is reserved or unassigned.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    /// The payload does not match the layout required by its kind.
    #[error("invalid payload for message kind {kind}: {reason}")]
    InvalidPayload { kind: u8, reason: &'static str },

    /// The payload exceeds the maximum frame payload size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The output buffer cannot hold the serialized frame.
    #[error("output buffer too small ({capacity} bytes, need {needed})")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
