//! Initiator and responder roles of the gattlink session protocol.
//!
//! Both roles run the same chunked framing over three characteristics
//! (state, client2server, server2client) plus an optional ident value:
//! - [`GattClient`] connects, negotiates the MTU, optionally verifies the
//!   ident, enables notifications and signals readiness
//! - [`GattServer`] publishes the service and serves a single peer
//!
//! Neither role spawns threads or blocks. They are driven entirely by the
//! transport callbacks they implement, and report to a [`Listener`].

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod ident;
pub mod initiator;
pub mod responder;

pub use config::{ClientConfig, EndpointConfig, DEFAULT_REQUESTED_MTU};
pub use control::{StateSignal, STATE_READY, STATE_TERMINATE};
pub use error::{PeerError, Result};
pub use events::{EventGate, Listener, PeerEvent};
#[cfg(feature = "async")]
pub use events::stream::{event_channel, EventStream};
pub use ident::{IdentToken, IDENT_INFO, IDENT_LEN};
pub use initiator::{ClientState, GattClient, NotificationTarget};
pub use responder::{service_definition, GattServer, ServerState};
