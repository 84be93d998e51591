use bytes::Bytes;
use uuid::Uuid;

use crate::error::Result;
use crate::gatt::{ConnectionState, DeviceId, DiscoveredService, GattStatus, ServiceDefinition};

/// Commands a GATT central (client) can issue.
///
/// Every method only *starts* an operation. Completion is delivered later
/// through the matching [`CentralCallback`] method; an `Err` means the
/// operation was never started.
pub trait CentralTransport {
    /// Start connecting to `device`.
    fn connect(&mut self, device: &DeviceId) -> Result<()>;

    /// Tear down the current connection.
    fn disconnect(&mut self) -> Result<()>;

    /// Ask for the highest connection priority (shortest connection interval).
    fn request_high_priority(&mut self) -> Result<()>;

    /// Start service discovery.
    fn discover_services(&mut self) -> Result<()>;

    /// Look up a discovered service. Only meaningful after discovery succeeded.
    fn service(&self, uuid: Uuid) -> Option<DiscoveredService>;

    /// Request an ATT MTU.
    fn request_mtu(&mut self, mtu: u16) -> Result<()>;

    /// Start reading a characteristic value.
    fn read_characteristic(&mut self, characteristic: Uuid) -> Result<()>;

    /// Start writing a characteristic value.
    fn write_characteristic(&mut self, characteristic: Uuid, value: &[u8]) -> Result<()>;

    /// Enable or disable local delivery of notifications for a characteristic.
    fn set_characteristic_notification(&mut self, characteristic: Uuid, enabled: bool)
        -> Result<()>;

    /// Start writing a descriptor value.
    fn write_descriptor(&mut self, characteristic: Uuid, descriptor: Uuid, value: &[u8])
        -> Result<()>;
}

/// Completion and notification events delivered to a GATT central.
pub trait CentralCallback {
    fn on_connection_state_change(&mut self, status: GattStatus, state: ConnectionState);

    fn on_services_discovered(&mut self, status: GattStatus);

    fn on_mtu_changed(&mut self, mtu: u16, status: GattStatus);

    fn on_characteristic_read(&mut self, characteristic: Uuid, value: &[u8], status: GattStatus);

    fn on_characteristic_write(&mut self, characteristic: Uuid, status: GattStatus);

    fn on_characteristic_changed(&mut self, characteristic: Uuid, value: &[u8]);

    fn on_descriptor_write(&mut self, characteristic: Uuid, descriptor: Uuid, status: GattStatus);
}

/// Commands a GATT peripheral (server) can issue.
pub trait PeripheralTransport {
    /// Open the GATT server context.
    fn open_server(&mut self) -> Result<()>;

    /// Publish a primary service.
    fn add_service(&mut self, service: &ServiceDefinition) -> Result<()>;

    /// Complete a pending read or write transaction.
    fn send_response(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        status: GattStatus,
        offset: u16,
        value: Option<&[u8]>,
    ) -> Result<()>;

    /// Send a notification (or indication when `confirm`) to `device`.
    fn notify_characteristic_changed(
        &mut self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
        confirm: bool,
    ) -> Result<()>;

    /// Drop the connection to `device`.
    fn cancel_connection(&mut self, device: &DeviceId) -> Result<()>;

    /// Close the GATT server context.
    fn close(&mut self) -> Result<()>;
}

/// A characteristic-write transaction received by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub request_id: u32,
    pub characteristic: Uuid,
    pub prepared_write: bool,
    pub response_needed: bool,
    pub offset: u16,
    pub value: Bytes,
}

/// A descriptor-write transaction received by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorWriteRequest {
    pub request_id: u32,
    pub characteristic: Uuid,
    pub descriptor: Uuid,
    pub prepared_write: bool,
    pub response_needed: bool,
    pub offset: u16,
    pub value: Bytes,
}

/// Request and completion events delivered to a GATT peripheral.
pub trait PeripheralCallback {
    fn on_connection_state_change(
        &mut self,
        device: &DeviceId,
        status: GattStatus,
        state: ConnectionState,
    );

    fn on_characteristic_read_request(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        offset: u16,
        characteristic: Uuid,
    );

    fn on_characteristic_write_request(&mut self, device: &DeviceId, request: WriteRequest);

    fn on_descriptor_read_request(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        offset: u16,
        characteristic: Uuid,
        descriptor: Uuid,
    );

    fn on_descriptor_write_request(&mut self, device: &DeviceId, request: DescriptorWriteRequest);

    fn on_mtu_changed(&mut self, device: &DeviceId, mtu: u16);

    fn on_notification_sent(&mut self, device: &DeviceId, status: GattStatus);
}
