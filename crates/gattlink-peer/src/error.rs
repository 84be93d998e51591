use gattlink_transport::GattStatus;
use uuid::Uuid;

/// Errors that can occur in initiator and responder operations.
///
/// Errors discovered inside a transport callback are handed to
/// [`Listener::on_error`](crate::Listener::on_error); errors discovered
/// synchronously are also returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gattlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] gattlink_frame::FrameError),

    /// The configured service was not found on the peer.
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    /// A required characteristic is missing from the service.
    #[error("{name} characteristic not found")]
    MissingCharacteristic { name: &'static str },

    /// A required descriptor is missing from a characteristic.
    #[error("{name} client characteristic configuration descriptor not found")]
    MissingDescriptor { name: &'static str },

    /// A callback referenced a characteristic this role does not expect.
    #[error("unexpected {operation} for characteristic {characteristic}")]
    UnexpectedCharacteristic {
        operation: &'static str,
        characteristic: Uuid,
    },

    /// A descriptor write completed out of sequence.
    #[error("unexpected descriptor write for characteristic {characteristic} descriptor {descriptor}")]
    UnexpectedDescriptor { characteristic: Uuid, descriptor: Uuid },

    /// An asynchronous operation completed with a failure status.
    #[error("{operation} failed with status {status}")]
    Status {
        operation: &'static str,
        status: GattStatus,
    },

    /// The ident value read from the peer differs from the derived token.
    #[error("received ident does not match expected ident")]
    IdentMismatch,

    /// A state characteristic value was not exactly one byte.
    #[error("invalid data length {0} for state characteristic")]
    InvalidStateLength(usize),

    /// A state characteristic carried an unknown or misdirected code.
    #[error("invalid byte 0x{0:02x} for state characteristic")]
    InvalidStateByte(u8),

    /// The operation requires a completed handshake.
    #[error("not ready (state {0})")]
    NotReady(&'static str),

    /// The responder has no connected peer.
    #[error("no peer connected")]
    NoPeer,

    /// The role is already running.
    #[error("already {0}")]
    AlreadyActive(&'static str),

    /// Ident key derivation failed.
    #[error("ident derivation failed: {0}")]
    IdentDerivation(String),

    /// The endpoint configuration could not be parsed.
    #[error("invalid endpoint config: {0}")]
    Config(String),
}

impl From<serde_json::Error> for PeerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
