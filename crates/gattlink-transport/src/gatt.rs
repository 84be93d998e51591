//! GATT data types shared by the central and peripheral contracts.

use std::fmt;

use bitflags::bitflags;
use uuid::Uuid;

/// Client Characteristic Configuration descriptor (16-bit UUID 0x2902).
pub const CLIENT_CHARACTERISTIC_CONFIG: Uuid =
    Uuid::from_u128(0x0000_2902_0000_1000_8000_0080_5f9b_34fb);

/// CCCD value enabling notifications.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// CCCD value disabling notifications.
pub const DISABLE_NOTIFICATION_VALUE: [u8; 2] = [0x00, 0x00];

/// Completion status of an asynchronous GATT operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattStatus(pub u16);

impl GattStatus {
    pub const SUCCESS: Self = Self(0x0000);
    pub const READ_NOT_PERMITTED: Self = Self(0x0002);
    pub const WRITE_NOT_PERMITTED: Self = Self(0x0003);
    pub const FAILURE: Self = Self(0x0101);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Link-level connection state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Opaque identifier of a remote device (typically its address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

bitflags! {
    /// Characteristic property bits (Bluetooth Core Vol 3, Part G, 3.3.1.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Properties: u8 {
        const READ = 0x02;
        const WRITE_NO_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
    }
}

bitflags! {
    /// Attribute access permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u16 {
        const READ = 0x0001;
        const WRITE = 0x0010;
    }
}

/// A descriptor attached to a published characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorDefinition {
    pub uuid: Uuid,
    pub permissions: Permissions,
    pub value: Vec<u8>,
}

impl DescriptorDefinition {
    /// A writable CCCD with notifications initially disabled.
    pub fn notification_config() -> Self {
        Self {
            uuid: CLIENT_CHARACTERISTIC_CONFIG,
            permissions: Permissions::WRITE,
            value: DISABLE_NOTIFICATION_VALUE.to_vec(),
        }
    }
}

/// A characteristic published by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDefinition {
    pub uuid: Uuid,
    pub properties: Properties,
    pub permissions: Permissions,
    pub descriptors: Vec<DescriptorDefinition>,
}

impl CharacteristicDefinition {
    pub fn new(uuid: Uuid, properties: Properties, permissions: Permissions) -> Self {
        Self {
            uuid,
            properties,
            permissions,
            descriptors: Vec::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: DescriptorDefinition) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn descriptor(&self, uuid: Uuid) -> Option<&DescriptorDefinition> {
        self.descriptors.iter().find(|d| d.uuid == uuid)
    }
}

/// A primary service published by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDefinition>,
}

impl ServiceDefinition {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: CharacteristicDefinition) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    pub fn characteristic(&self, uuid: Uuid) -> Option<&CharacteristicDefinition> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// A service as seen by a central after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub uuid: Uuid,
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

impl DiscoveredService {
    pub fn characteristic(&self, uuid: Uuid) -> Option<&DiscoveredCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

impl From<&ServiceDefinition> for DiscoveredService {
    fn from(service: &ServiceDefinition) -> Self {
        Self {
            uuid: service.uuid,
            characteristics: service
                .characteristics
                .iter()
                .map(|c| DiscoveredCharacteristic {
                    uuid: c.uuid,
                    properties: c.properties,
                    descriptors: c.descriptors.iter().map(|d| d.uuid).collect(),
                })
                .collect(),
        }
    }
}

/// A characteristic as seen by a central after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub uuid: Uuid,
    pub properties: Properties,
    pub descriptors: Vec<Uuid>,
}

impl DiscoveredCharacteristic {
    pub fn has_descriptor(&self, uuid: Uuid) -> bool {
        self.descriptors.contains(&uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cccd_uuid_matches_bluetooth_base() {
        assert_eq!(
            CLIENT_CHARACTERISTIC_CONFIG.to_string(),
            "00002902-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn property_bits_combine() {
        let props = Properties::NOTIFY | Properties::WRITE_NO_RESPONSE;
        assert!(props.contains(Properties::NOTIFY));
        assert!(props.contains(Properties::WRITE_NO_RESPONSE));
        assert!(!props.contains(Properties::READ));
        assert_eq!(props.bits(), 0x14);
    }

    #[test]
    fn raw_bits_outside_known_flags_are_rejected() {
        assert_eq!(Properties::from_bits(0x12), Some(Properties::READ | Properties::NOTIFY));
        assert_eq!(Properties::from_bits(0x01), None);
        assert_eq!(Properties::from_bits_truncate(0x13), Properties::READ | Properties::NOTIFY);
        assert_eq!(
            (Permissions::READ | Permissions::WRITE).bits(),
            0x0011
        );
        assert!(Permissions::empty().is_empty());
    }

    #[test]
    fn discovered_view_keeps_descriptor_uuids() {
        let state = Uuid::from_u128(1);
        let service = ServiceDefinition::new(Uuid::from_u128(9)).with_characteristic(
            CharacteristicDefinition::new(state, Properties::NOTIFY, Permissions::WRITE)
                .with_descriptor(DescriptorDefinition::notification_config()),
        );

        let discovered = DiscoveredService::from(&service);
        let characteristic = discovered
            .characteristic(state)
            .expect("state characteristic should be discovered");
        assert!(characteristic.has_descriptor(CLIENT_CHARACTERISTIC_CONFIG));
        assert!(discovered.characteristic(Uuid::from_u128(2)).is_none());
    }

    #[test]
    fn only_zero_status_is_success() {
        assert!(GattStatus::SUCCESS.is_success());
        assert!(!GattStatus::FAILURE.is_success());
        assert_eq!(GattStatus(0x85).to_string(), "0x0085");
    }
}
