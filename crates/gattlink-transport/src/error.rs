use uuid::Uuid;

/// Errors returned synchronously by GATT transport calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The platform refused the call for lack of permission.
    #[error("security exception during {operation}: {message}")]
    Security {
        operation: &'static str,
        message: String,
    },

    /// The platform returned a failure indication when issuing the call.
    #[error("failed to issue {operation}")]
    Rejected { operation: &'static str },

    /// The GATT server context could not be opened.
    #[error("GATT server context unavailable")]
    ServerUnavailable,

    /// No connection exists for the operation.
    #[error("not connected")]
    NotConnected,

    /// The characteristic is not known to the transport.
    #[error("unknown characteristic {0}")]
    UnknownCharacteristic(Uuid),

    /// The descriptor is not known on the given characteristic.
    #[error("unknown descriptor {descriptor} on characteristic {characteristic}")]
    UnknownDescriptor { characteristic: Uuid, descriptor: Uuid },

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Construct a security failure for `operation`.
    pub fn security(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Security {
            operation,
            message: message.into(),
        }
    }

    /// Whether this is a permission/security failure.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
