//! Transports that record every issued command instead of touching a radio.
//!
//! Pair these with synthetic callback invocations to walk a role through its
//! state machine one completion at a time.

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Result, TransportError};
use crate::gatt::{DeviceId, DiscoveredService, GattStatus, ServiceDefinition};
use crate::traits::{CentralTransport, PeripheralTransport};

/// A command issued through [`RecordingCentral`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralOp {
    Connect(DeviceId),
    Disconnect,
    RequestHighPriority,
    DiscoverServices,
    RequestMtu(u16),
    Read(Uuid),
    Write {
        characteristic: Uuid,
        value: Bytes,
    },
    SetNotification {
        characteristic: Uuid,
        enabled: bool,
    },
    WriteDescriptor {
        characteristic: Uuid,
        descriptor: Uuid,
        value: Bytes,
    },
}

/// Injected failures, consumed in order by operation name.
#[derive(Debug, Default)]
struct Failures(Vec<(&'static str, TransportError)>);

impl Failures {
    fn check(&mut self, operation: &'static str) -> Result<()> {
        match self.0.iter().position(|(op, _)| *op == operation) {
            Some(index) => Err(self.0.remove(index).1),
            None => Ok(()),
        }
    }
}

/// A [`CentralTransport`] that records commands.
#[derive(Debug, Default)]
pub struct RecordingCentral {
    ops: Vec<CentralOp>,
    services: Vec<DiscoveredService>,
    failures: Failures,
}

impl RecordingCentral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `service` visible to [`CentralTransport::service`].
    pub fn with_service(mut self, service: DiscoveredService) -> Self {
        self.services.push(service);
        self
    }

    /// Fail the next call named `operation` (e.g. `"write_characteristic"`).
    pub fn fail_next(&mut self, operation: &'static str, error: TransportError) {
        self.failures.0.push((operation, error));
    }

    pub fn ops(&self) -> &[CentralOp] {
        &self.ops
    }

    /// Return and clear the recorded commands.
    pub fn take_ops(&mut self) -> Vec<CentralOp> {
        std::mem::take(&mut self.ops)
    }

    /// Values written to `characteristic`, in issue order.
    pub fn writes_to(&self, characteristic: Uuid) -> Vec<Bytes> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                CentralOp::Write {
                    characteristic: c,
                    value,
                } if *c == characteristic => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, operation: &'static str, op: CentralOp) -> Result<()> {
        self.failures.check(operation)?;
        self.ops.push(op);
        Ok(())
    }
}

impl CentralTransport for RecordingCentral {
    fn connect(&mut self, device: &DeviceId) -> Result<()> {
        self.record("connect", CentralOp::Connect(device.clone()))
    }

    fn disconnect(&mut self) -> Result<()> {
        self.record("disconnect", CentralOp::Disconnect)
    }

    fn request_high_priority(&mut self) -> Result<()> {
        self.record("request_high_priority", CentralOp::RequestHighPriority)
    }

    fn discover_services(&mut self) -> Result<()> {
        self.record("discover_services", CentralOp::DiscoverServices)
    }

    fn service(&self, uuid: Uuid) -> Option<DiscoveredService> {
        self.services.iter().find(|s| s.uuid == uuid).cloned()
    }

    fn request_mtu(&mut self, mtu: u16) -> Result<()> {
        self.record("request_mtu", CentralOp::RequestMtu(mtu))
    }

    fn read_characteristic(&mut self, characteristic: Uuid) -> Result<()> {
        self.record("read_characteristic", CentralOp::Read(characteristic))
    }

    fn write_characteristic(&mut self, characteristic: Uuid, value: &[u8]) -> Result<()> {
        self.record(
            "write_characteristic",
            CentralOp::Write {
                characteristic,
                value: Bytes::copy_from_slice(value),
            },
        )
    }

    fn set_characteristic_notification(
        &mut self,
        characteristic: Uuid,
        enabled: bool,
    ) -> Result<()> {
        self.record(
            "set_characteristic_notification",
            CentralOp::SetNotification {
                characteristic,
                enabled,
            },
        )
    }

    fn write_descriptor(
        &mut self,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<()> {
        self.record(
            "write_descriptor",
            CentralOp::WriteDescriptor {
                characteristic,
                descriptor,
                value: Bytes::copy_from_slice(value),
            },
        )
    }
}

/// A command issued through [`RecordingPeripheral`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralOp {
    OpenServer,
    AddService(ServiceDefinition),
    SendResponse {
        device: DeviceId,
        request_id: u32,
        status: GattStatus,
        offset: u16,
        value: Option<Bytes>,
    },
    Notify {
        device: DeviceId,
        characteristic: Uuid,
        value: Bytes,
        confirm: bool,
    },
    CancelConnection(DeviceId),
    Close,
}

/// A [`PeripheralTransport`] that records commands.
#[derive(Debug, Default)]
pub struct RecordingPeripheral {
    ops: Vec<PeripheralOp>,
    failures: Failures,
}

impl RecordingPeripheral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call named `operation` (e.g. `"open_server"`).
    pub fn fail_next(&mut self, operation: &'static str, error: TransportError) {
        self.failures.0.push((operation, error));
    }

    pub fn ops(&self) -> &[PeripheralOp] {
        &self.ops
    }

    /// Return and clear the recorded commands.
    pub fn take_ops(&mut self) -> Vec<PeripheralOp> {
        std::mem::take(&mut self.ops)
    }

    /// Values notified on `characteristic`, in issue order.
    pub fn notifications_on(&self, characteristic: Uuid) -> Vec<Bytes> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                PeripheralOp::Notify {
                    characteristic: c,
                    value,
                    ..
                } if *c == characteristic => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// The last published service, if any.
    pub fn published_service(&self) -> Option<&ServiceDefinition> {
        self.ops.iter().rev().find_map(|op| match op {
            PeripheralOp::AddService(service) => Some(service),
            _ => None,
        })
    }

    fn record(&mut self, operation: &'static str, op: PeripheralOp) -> Result<()> {
        self.failures.check(operation)?;
        self.ops.push(op);
        Ok(())
    }
}

impl PeripheralTransport for RecordingPeripheral {
    fn open_server(&mut self) -> Result<()> {
        self.record("open_server", PeripheralOp::OpenServer)
    }

    fn add_service(&mut self, service: &ServiceDefinition) -> Result<()> {
        self.record("add_service", PeripheralOp::AddService(service.clone()))
    }

    fn send_response(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        status: GattStatus,
        offset: u16,
        value: Option<&[u8]>,
    ) -> Result<()> {
        self.record(
            "send_response",
            PeripheralOp::SendResponse {
                device: device.clone(),
                request_id,
                status,
                offset,
                value: value.map(Bytes::copy_from_slice),
            },
        )
    }

    fn notify_characteristic_changed(
        &mut self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
        confirm: bool,
    ) -> Result<()> {
        self.record(
            "notify_characteristic_changed",
            PeripheralOp::Notify {
                device: device.clone(),
                characteristic,
                value: Bytes::copy_from_slice(value),
                confirm,
            },
        )
    }

    fn cancel_connection(&mut self, device: &DeviceId) -> Result<()> {
        self.record(
            "cancel_connection",
            PeripheralOp::CancelConnection(device.clone()),
        )
    }

    fn close(&mut self) -> Result<()> {
        self.record("close", PeripheralOp::Close)
    }
}
