/// Errors that can occur while chunking or reassembling messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// An inbound value carried no continuation byte.
    #[error("invalid data length 0 for chunked frame (need at least 1 byte)")]
    EmptyFrame,

    /// The MTU leaves no room for a chunk.
    #[error("MTU {mtu} too small for chunked frames (min {min})")]
    MtuTooSmall { mtu: u16, min: u16 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
