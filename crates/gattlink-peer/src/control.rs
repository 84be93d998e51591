use crate::error::{PeerError, Result};

/// State characteristic code: initiator is ready to receive.
pub const STATE_READY: u8 = 0x01;
/// State characteristic code: explicit session termination.
pub const STATE_TERMINATE: u8 = 0x02;

/// A value carried on the state characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSignal {
    /// Sent by the initiator once notifications are enabled.
    Ready,
    /// Sent by either side to end the session.
    Terminate,
}

impl StateSignal {
    /// Parse a state characteristic value; it must be exactly one known byte.
    pub fn parse(value: &[u8]) -> Result<Self> {
        match value {
            [STATE_READY] => Ok(Self::Ready),
            [STATE_TERMINATE] => Ok(Self::Terminate),
            [other] => Err(PeerError::InvalidStateByte(*other)),
            _ => Err(PeerError::InvalidStateLength(value.len())),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Ready => STATE_READY,
            Self::Terminate => STATE_TERMINATE,
        }
    }

    /// The one-byte wire value.
    pub fn encode(self) -> [u8; 1] {
        [self.as_byte()]
    }
}
