//! GATT transport capability contract.
//!
//! Describes what gattlink needs from a Bluetooth LE stack, without binding to
//! any particular one:
//! - [`CentralTransport`] / [`CentralCallback`] for the connecting side
//! - [`PeripheralTransport`] / [`PeripheralCallback`] for the serving side
//!
//! This is the lowest layer of gattlink. Platform bindings implement the
//! command traits and call the callback traits; everything above only sees
//! these types. [`recording`] and [`loopback`] provide radio-free transports.

pub mod error;
pub mod event;
pub mod gatt;
pub mod loopback;
pub mod recording;
pub mod traits;

pub use error::{Result, TransportError};
pub use event::{CentralEvent, PeripheralEvent};
pub use gatt::{
    CharacteristicDefinition, ConnectionState, DescriptorDefinition, DeviceId,
    DiscoveredCharacteristic, DiscoveredService, GattStatus, Permissions, Properties,
    ServiceDefinition, CLIENT_CHARACTERISTIC_CONFIG, DISABLE_NOTIFICATION_VALUE,
    ENABLE_NOTIFICATION_VALUE,
};
pub use loopback::{LinkEvent, LoopbackCentral, LoopbackLink, LoopbackPeripheral};
pub use traits::{
    CentralCallback, CentralTransport, DescriptorWriteRequest, PeripheralCallback,
    PeripheralTransport, WriteRequest,
};
pub use uuid::Uuid;
