//! Chunked, flow-controlled message sessions over GATT characteristics.
//!
//! gattlink moves arbitrary-length binary messages between a GATT central
//! and a GATT peripheral using three characteristics, a one-byte
//! continuation flag per frame and a single outstanding write at a time.
//!
//! # Crate Structure
//!
//! - [`transport`]: the GATT capability contract a platform stack implements,
//!   plus recording and in-memory loopback transports
//! - [`frame`]: frame codec, reassembly and write flow control
//! - [`peer`]: initiator and responder state machines
//!
//! # Example
//!
//! ```
//! use gattlink::peer::{EndpointConfig, GattClient, GattServer, PeerEvent};
//! use gattlink::transport::{DeviceId, LoopbackLink, Uuid};
//!
//! let endpoints = EndpointConfig::mdoc_reader_peripheral_server(Uuid::from_u128(1));
//! let link = LoopbackLink::new(DeviceId::new("reader"), DeviceId::new("holder"));
//!
//! let mut server = GattServer::new(link.peripheral(), endpoints, b"key".to_vec(), Vec::<PeerEvent>::new());
//! let mut client = GattClient::new(link.central(), endpoints, b"key".to_vec(), Vec::<PeerEvent>::new());
//!
//! server.start().unwrap();
//! client.connect(&link.peripheral_address()).unwrap();
//! link.pump(&mut client, &mut server);
//!
//! client.send_message(b"hello").unwrap();
//! link.pump(&mut client, &mut server);
//! assert!(server.listener().contains(&PeerEvent::MessageReceived("hello".into())));
//! ```

/// Re-export transport types.
pub mod transport {
    pub use gattlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gattlink_frame::*;
}

/// Re-export peer types.
pub mod peer {
    pub use gattlink_peer::*;
}
