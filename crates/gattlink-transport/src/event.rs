//! Owned event values for transports that queue callbacks.
//!
//! A platform binding or simulator that cannot call into the role directly
//! stores events as these enums and later hands them over with `dispatch`,
//! one at a time.

use bytes::Bytes;
use uuid::Uuid;

use crate::gatt::{ConnectionState, DeviceId, GattStatus};
use crate::traits::{CentralCallback, DescriptorWriteRequest, PeripheralCallback, WriteRequest};

/// An event destined for a [`CentralCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralEvent {
    ConnectionStateChange {
        status: GattStatus,
        state: ConnectionState,
    },
    ServicesDiscovered {
        status: GattStatus,
    },
    MtuChanged {
        mtu: u16,
        status: GattStatus,
    },
    CharacteristicRead {
        characteristic: Uuid,
        value: Bytes,
        status: GattStatus,
    },
    CharacteristicWrite {
        characteristic: Uuid,
        status: GattStatus,
    },
    CharacteristicChanged {
        characteristic: Uuid,
        value: Bytes,
    },
    DescriptorWrite {
        characteristic: Uuid,
        descriptor: Uuid,
        status: GattStatus,
    },
}

impl CentralEvent {
    /// Deliver this event to `callback`.
    pub fn dispatch<C: CentralCallback + ?Sized>(self, callback: &mut C) {
        match self {
            Self::ConnectionStateChange { status, state } => {
                callback.on_connection_state_change(status, state)
            }
            Self::ServicesDiscovered { status } => callback.on_services_discovered(status),
            Self::MtuChanged { mtu, status } => callback.on_mtu_changed(mtu, status),
            Self::CharacteristicRead {
                characteristic,
                value,
                status,
            } => callback.on_characteristic_read(characteristic, &value, status),
            Self::CharacteristicWrite {
                characteristic,
                status,
            } => callback.on_characteristic_write(characteristic, status),
            Self::CharacteristicChanged {
                characteristic,
                value,
            } => callback.on_characteristic_changed(characteristic, &value),
            Self::DescriptorWrite {
                characteristic,
                descriptor,
                status,
            } => callback.on_descriptor_write(characteristic, descriptor, status),
        }
    }
}

/// An event destined for a [`PeripheralCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    ConnectionStateChange {
        device: DeviceId,
        status: GattStatus,
        state: ConnectionState,
    },
    CharacteristicReadRequest {
        device: DeviceId,
        request_id: u32,
        offset: u16,
        characteristic: Uuid,
    },
    CharacteristicWriteRequest {
        device: DeviceId,
        request: WriteRequest,
    },
    DescriptorReadRequest {
        device: DeviceId,
        request_id: u32,
        offset: u16,
        characteristic: Uuid,
        descriptor: Uuid,
    },
    DescriptorWriteRequest {
        device: DeviceId,
        request: DescriptorWriteRequest,
    },
    MtuChanged {
        device: DeviceId,
        mtu: u16,
    },
    NotificationSent {
        device: DeviceId,
        status: GattStatus,
    },
}

impl PeripheralEvent {
    /// Deliver this event to `callback`.
    pub fn dispatch<P: PeripheralCallback + ?Sized>(self, callback: &mut P) {
        match self {
            Self::ConnectionStateChange {
                device,
                status,
                state,
            } => callback.on_connection_state_change(&device, status, state),
            Self::CharacteristicReadRequest {
                device,
                request_id,
                offset,
                characteristic,
            } => callback.on_characteristic_read_request(&device, request_id, offset, characteristic),
            Self::CharacteristicWriteRequest { device, request } => {
                callback.on_characteristic_write_request(&device, request)
            }
            Self::DescriptorReadRequest {
                device,
                request_id,
                offset,
                characteristic,
                descriptor,
            } => callback.on_descriptor_read_request(
                &device,
                request_id,
                offset,
                characteristic,
                descriptor,
            ),
            Self::DescriptorWriteRequest { device, request } => {
                callback.on_descriptor_write_request(&device, request)
            }
            Self::MtuChanged { device, mtu } => callback.on_mtu_changed(&device, mtu),
            Self::NotificationSent { device, status } => {
                callback.on_notification_sent(&device, status)
            }
        }
    }
}
