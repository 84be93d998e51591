use std::fmt;
use std::io;

use gattlink_frame::FrameError;
use gattlink_peer::PeerError;
use gattlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = if err.is_security() {
        PERMISSION_DENIED
    } else {
        TRANSPORT_ERROR
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match err {
        FrameError::MtuTooSmall { .. } => USAGE,
        FrameError::EmptyFrame => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::IdentMismatch
        | PeerError::InvalidStateByte(_)
        | PeerError::InvalidStateLength(_)
        | PeerError::UnexpectedCharacteristic { .. }
        | PeerError::UnexpectedDescriptor { .. }
        | PeerError::Config(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PeerError::Status { .. } => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        PeerError::ServiceNotFound(_)
        | PeerError::MissingCharacteristic { .. }
        | PeerError::MissingDescriptor { .. }
        | PeerError::NotReady(_)
        | PeerError::NoPeer => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_failures_map_to_permission_denied() {
        let err = peer_error(
            "connect",
            PeerError::Transport(TransportError::security("connect", "denied")),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
        assert!(err.message.starts_with("connect: "));
    }

    #[test]
    fn ident_mismatch_is_invalid_data() {
        assert_eq!(
            peer_error("handshake", PeerError::IdentMismatch).code,
            DATA_INVALID
        );
    }

    #[test]
    fn small_mtu_is_usage_error() {
        let err = frame_error("chunk", FrameError::MtuTooSmall { mtu: 4, min: 5 });
        assert_eq!(err.code, USAGE);
    }
}
