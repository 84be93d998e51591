//! In-memory link wiring one central to one peripheral.
//!
//! Commands issued on either handle are turned into the events the other
//! side (and the issuing side's completions) would observe on a real radio.
//! Nothing is delivered until [`LoopbackLink::pump`] is called, which hands
//! events over one at a time, matching the single-callback-at-a-time model
//! of platform GATT stacks.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Result, TransportError};
use crate::event::{CentralEvent, PeripheralEvent};
use crate::gatt::{
    ConnectionState, DeviceId, DiscoveredService, GattStatus, ServiceDefinition,
    CLIENT_CHARACTERISTIC_CONFIG, ENABLE_NOTIFICATION_VALUE,
};
use crate::traits::{
    CentralCallback, CentralTransport, DescriptorWriteRequest, PeripheralCallback,
    PeripheralTransport, WriteRequest,
};

/// Largest ATT MTU a loopback link negotiates by default.
pub const DEFAULT_LINK_MTU: u16 = 517;

/// An event queued on the link, tagged with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Central(CentralEvent),
    Peripheral(PeripheralEvent),
}

#[derive(Debug)]
struct PendingDescriptorWrite {
    characteristic: Uuid,
    descriptor: Uuid,
    value: Bytes,
}

#[derive(Debug)]
struct LinkState {
    central_address: DeviceId,
    peripheral_address: DeviceId,
    max_mtu: u16,
    server_available: bool,
    server_open: bool,
    services: Vec<ServiceDefinition>,
    connected: bool,
    subscribed: HashSet<Uuid>,
    locally_enabled: HashSet<Uuid>,
    pending_reads: HashMap<u32, Uuid>,
    pending_descriptor_writes: HashMap<u32, PendingDescriptorWrite>,
    next_request_id: u32,
    queue: VecDeque<LinkEvent>,
    delivered: usize,
}

impl LinkState {
    fn request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn to_central(&mut self, event: CentralEvent) {
        self.queue.push_back(LinkEvent::Central(event));
    }

    fn to_peripheral(&mut self, event: PeripheralEvent) {
        self.queue.push_back(LinkEvent::Peripheral(event));
    }

    fn knows_characteristic(&self, characteristic: Uuid) -> bool {
        self.services
            .iter()
            .any(|s| s.characteristic(characteristic).is_some())
    }

    fn drop_connection(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.subscribed.clear();
        self.locally_enabled.clear();
        self.pending_reads.clear();
        self.pending_descriptor_writes.clear();
        let device = self.central_address.clone();
        self.to_peripheral(PeripheralEvent::ConnectionStateChange {
            device,
            status: GattStatus::SUCCESS,
            state: ConnectionState::Disconnected,
        });
        self.to_central(CentralEvent::ConnectionStateChange {
            status: GattStatus::SUCCESS,
            state: ConnectionState::Disconnected,
        });
    }
}

/// Shared handle to an in-memory link.
#[derive(Debug, Clone)]
pub struct LoopbackLink {
    state: Rc<RefCell<LinkState>>,
}

impl LoopbackLink {
    /// Create a link where the central appears as `central_address` and the
    /// peripheral is reachable at `peripheral_address`.
    pub fn new(central_address: DeviceId, peripheral_address: DeviceId) -> Self {
        Self {
            state: Rc::new(RefCell::new(LinkState {
                central_address,
                peripheral_address,
                max_mtu: DEFAULT_LINK_MTU,
                server_available: true,
                server_open: false,
                services: Vec::new(),
                connected: false,
                subscribed: HashSet::new(),
                locally_enabled: HashSet::new(),
                pending_reads: HashMap::new(),
                pending_descriptor_writes: HashMap::new(),
                next_request_id: 1,
                queue: VecDeque::new(),
                delivered: 0,
            })),
        }
    }

    /// Cap the MTU the link agrees to.
    pub fn with_max_mtu(self, mtu: u16) -> Self {
        self.state.borrow_mut().max_mtu = mtu;
        self
    }

    /// Make `open_server` fail with [`TransportError::ServerUnavailable`].
    pub fn with_server_unavailable(self) -> Self {
        self.state.borrow_mut().server_available = false;
        self
    }

    /// Command handle for the central side.
    pub fn central(&self) -> LoopbackCentral {
        LoopbackCentral { link: self.clone() }
    }

    /// Command handle for the peripheral side.
    pub fn peripheral(&self) -> LoopbackPeripheral {
        LoopbackPeripheral { link: self.clone() }
    }

    /// Address the central uses to reach the peripheral.
    pub fn peripheral_address(&self) -> DeviceId {
        self.state.borrow().peripheral_address.clone()
    }

    /// Address the peripheral sees for the central.
    pub fn central_address(&self) -> DeviceId {
        self.state.borrow().central_address.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Total events delivered so far.
    pub fn delivered(&self) -> usize {
        self.state.borrow().delivered
    }

    /// Queue an arbitrary event, e.g. a connection from a second central.
    pub fn inject(&self, event: LinkEvent) {
        self.state.borrow_mut().queue.push_back(event);
    }

    /// Deliver the next queued event. Returns `false` when the queue is empty.
    pub fn pump_one<C, P>(&self, central: &mut C, peripheral: &mut P) -> bool
    where
        C: CentralCallback + ?Sized,
        P: PeripheralCallback + ?Sized,
    {
        let event = {
            let mut state = self.state.borrow_mut();
            let event = state.queue.pop_front();
            if event.is_some() {
                state.delivered += 1;
            }
            event
        };

        match event {
            Some(LinkEvent::Central(event)) => {
                tracing::trace!(?event, "loopback -> central");
                event.dispatch(central);
                true
            }
            Some(LinkEvent::Peripheral(event)) => {
                tracing::trace!(?event, "loopback -> peripheral");
                event.dispatch(peripheral);
                true
            }
            None => false,
        }
    }

    /// Deliver events until the queue is empty. Returns the number delivered.
    pub fn pump<C, P>(&self, central: &mut C, peripheral: &mut P) -> usize
    where
        C: CentralCallback + ?Sized,
        P: PeripheralCallback + ?Sized,
    {
        let mut count = 0usize;
        while self.pump_one(central, peripheral) {
            count += 1;
        }
        count
    }
}

/// Central-side command handle of a [`LoopbackLink`].
#[derive(Debug, Clone)]
pub struct LoopbackCentral {
    link: LoopbackLink,
}

impl LoopbackCentral {
    pub fn link(&self) -> &LoopbackLink {
        &self.link
    }
}

impl CentralTransport for LoopbackCentral {
    fn connect(&mut self, device: &DeviceId) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if state.connected {
            return Err(TransportError::Rejected {
                operation: "connect",
            });
        }
        if *device != state.peripheral_address || !state.server_open {
            state.to_central(CentralEvent::ConnectionStateChange {
                status: GattStatus::FAILURE,
                state: ConnectionState::Disconnected,
            });
            return Ok(());
        }
        state.connected = true;
        let central = state.central_address.clone();
        state.to_peripheral(PeripheralEvent::ConnectionStateChange {
            device: central,
            status: GattStatus::SUCCESS,
            state: ConnectionState::Connected,
        });
        state.to_central(CentralEvent::ConnectionStateChange {
            status: GattStatus::SUCCESS,
            state: ConnectionState::Connected,
        });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.drop_connection();
        Ok(())
    }

    fn request_high_priority(&mut self) -> Result<()> {
        if !self.link.state.borrow().connected {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    fn discover_services(&mut self) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.to_central(CentralEvent::ServicesDiscovered {
            status: GattStatus::SUCCESS,
        });
        Ok(())
    }

    fn service(&self, uuid: Uuid) -> Option<DiscoveredService> {
        let state = self.link.state.borrow();
        state
            .services
            .iter()
            .find(|s| s.uuid == uuid)
            .map(DiscoveredService::from)
    }

    fn request_mtu(&mut self, mtu: u16) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let negotiated = mtu.min(state.max_mtu);
        let central = state.central_address.clone();
        state.to_peripheral(PeripheralEvent::MtuChanged {
            device: central,
            mtu: negotiated,
        });
        state.to_central(CentralEvent::MtuChanged {
            mtu: negotiated,
            status: GattStatus::SUCCESS,
        });
        Ok(())
    }

    fn read_characteristic(&mut self, characteristic: Uuid) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if !state.knows_characteristic(characteristic) {
            return Err(TransportError::UnknownCharacteristic(characteristic));
        }
        let request_id = state.request_id();
        state.pending_reads.insert(request_id, characteristic);
        let central = state.central_address.clone();
        state.to_peripheral(PeripheralEvent::CharacteristicReadRequest {
            device: central,
            request_id,
            offset: 0,
            characteristic,
        });
        Ok(())
    }

    fn write_characteristic(&mut self, characteristic: Uuid, value: &[u8]) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if !state.knows_characteristic(characteristic) {
            return Err(TransportError::UnknownCharacteristic(characteristic));
        }
        let request_id = state.request_id();
        let central = state.central_address.clone();
        state.to_peripheral(PeripheralEvent::CharacteristicWriteRequest {
            device: central,
            request: WriteRequest {
                request_id,
                characteristic,
                prepared_write: false,
                response_needed: false,
                offset: 0,
                value: Bytes::copy_from_slice(value),
            },
        });
        state.to_central(CentralEvent::CharacteristicWrite {
            characteristic,
            status: GattStatus::SUCCESS,
        });
        Ok(())
    }

    fn set_characteristic_notification(
        &mut self,
        characteristic: Uuid,
        enabled: bool,
    ) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.knows_characteristic(characteristic) {
            return Err(TransportError::UnknownCharacteristic(characteristic));
        }
        if enabled {
            state.locally_enabled.insert(characteristic);
        } else {
            state.locally_enabled.remove(&characteristic);
        }
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let known = state.services.iter().any(|s| {
            s.characteristic(characteristic)
                .is_some_and(|c| c.descriptor(descriptor).is_some())
        });
        if !known {
            return Err(TransportError::UnknownDescriptor {
                characteristic,
                descriptor,
            });
        }
        let request_id = state.request_id();
        let value = Bytes::copy_from_slice(value);
        state.pending_descriptor_writes.insert(
            request_id,
            PendingDescriptorWrite {
                characteristic,
                descriptor,
                value: value.clone(),
            },
        );
        let central = state.central_address.clone();
        state.to_peripheral(PeripheralEvent::DescriptorWriteRequest {
            device: central,
            request: DescriptorWriteRequest {
                request_id,
                characteristic,
                descriptor,
                prepared_write: false,
                response_needed: true,
                offset: 0,
                value,
            },
        });
        Ok(())
    }
}

/// Peripheral-side command handle of a [`LoopbackLink`].
#[derive(Debug, Clone)]
pub struct LoopbackPeripheral {
    link: LoopbackLink,
}

impl LoopbackPeripheral {
    pub fn link(&self) -> &LoopbackLink {
        &self.link
    }
}

impl PeripheralTransport for LoopbackPeripheral {
    fn open_server(&mut self) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.server_available {
            return Err(TransportError::ServerUnavailable);
        }
        state.server_open = true;
        Ok(())
    }

    fn add_service(&mut self, service: &ServiceDefinition) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.server_open {
            return Err(TransportError::Shutdown);
        }
        state.services.retain(|s| s.uuid != service.uuid);
        state.services.push(service.clone());
        Ok(())
    }

    fn send_response(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        status: GattStatus,
        _offset: u16,
        value: Option<&[u8]>,
    ) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected || *device != state.central_address {
            return Err(TransportError::NotConnected);
        }

        if let Some(characteristic) = state.pending_reads.remove(&request_id) {
            state.to_central(CentralEvent::CharacteristicRead {
                characteristic,
                value: value.map(Bytes::copy_from_slice).unwrap_or_default(),
                status,
            });
        } else if let Some(pending) = state.pending_descriptor_writes.remove(&request_id) {
            if status.is_success() && pending.descriptor == CLIENT_CHARACTERISTIC_CONFIG {
                if pending.value[..] == ENABLE_NOTIFICATION_VALUE {
                    state.subscribed.insert(pending.characteristic);
                } else {
                    state.subscribed.remove(&pending.characteristic);
                }
            }
            state.to_central(CentralEvent::DescriptorWrite {
                characteristic: pending.characteristic,
                descriptor: pending.descriptor,
                status,
            });
        }
        Ok(())
    }

    fn notify_characteristic_changed(
        &mut self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
        _confirm: bool,
    ) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if !state.connected || *device != state.central_address {
            return Err(TransportError::NotConnected);
        }
        if state.subscribed.contains(&characteristic)
            && state.locally_enabled.contains(&characteristic)
        {
            state.to_central(CentralEvent::CharacteristicChanged {
                characteristic,
                value: Bytes::copy_from_slice(value),
            });
        }
        state.to_peripheral(PeripheralEvent::NotificationSent {
            device: device.clone(),
            status: GattStatus::SUCCESS,
        });
        Ok(())
    }

    fn cancel_connection(&mut self, device: &DeviceId) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        if *device == state.central_address {
            state.drop_connection();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.link.state.borrow_mut();
        state.drop_connection();
        state.server_open = false;
        state.services.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::{CharacteristicDefinition, DescriptorDefinition, Permissions, Properties};

    const SERVICE: Uuid = Uuid::from_u128(0x10);
    const DATA: Uuid = Uuid::from_u128(0x11);

    fn published_link() -> LoopbackLink {
        let link = LoopbackLink::new(DeviceId::new("central"), DeviceId::new("peripheral"));
        let mut peripheral = link.peripheral();
        peripheral.open_server().expect("server should open");
        peripheral
            .add_service(&ServiceDefinition::new(SERVICE).with_characteristic(
                CharacteristicDefinition::new(DATA, Properties::NOTIFY, Permissions::WRITE)
                    .with_descriptor(DescriptorDefinition::notification_config()),
            ))
            .expect("service should publish");
        link
    }

    fn drain(link: &LoopbackLink) -> Vec<LinkEvent> {
        let mut out = Vec::new();
        while let Some(event) = link.state.borrow_mut().queue.pop_front() {
            out.push(event);
        }
        out
    }

    #[test]
    fn connect_notifies_both_sides() {
        let link = published_link();
        let mut central = link.central();
        central
            .connect(&DeviceId::new("peripheral"))
            .expect("connect should start");

        let events = drain(&link);
        assert_eq!(events.len(), 2);
        assert!(link.is_connected());
        assert!(matches!(
            events[1],
            LinkEvent::Central(CentralEvent::ConnectionStateChange {
                state: ConnectionState::Connected,
                ..
            })
        ));
    }

    #[test]
    fn disconnect_reports_once_and_refuses_when_down() {
        let link = published_link();
        let mut central = link.central();
        central
            .connect(&DeviceId::new("peripheral"))
            .expect("connect should start");
        drain(&link);

        central.disconnect().expect("disconnect should start");
        assert!(!link.is_connected());
        assert_eq!(drain(&link).len(), 2);

        assert_eq!(central.disconnect(), Err(TransportError::NotConnected));
        assert!(drain(&link).is_empty());
    }

    #[test]
    fn connect_to_unknown_address_fails_asynchronously() {
        let link = published_link();
        link.central()
            .connect(&DeviceId::new("elsewhere"))
            .expect("connect call itself succeeds");

        let events = drain(&link);
        assert_eq!(
            events,
            vec![LinkEvent::Central(CentralEvent::ConnectionStateChange {
                status: GattStatus::FAILURE,
                state: ConnectionState::Disconnected,
            })]
        );
        assert!(!link.is_connected());
    }

    #[test]
    fn notification_requires_subscription() {
        let link = published_link();
        let mut central = link.central();
        let mut peripheral = link.peripheral();
        central
            .connect(&DeviceId::new("peripheral"))
            .expect("connect should start");
        drain(&link);

        let device = link.central_address();
        peripheral
            .notify_characteristic_changed(&device, DATA, &[0x00], false)
            .expect("notify should be issued");
        let unsubscribed = drain(&link);
        assert_eq!(unsubscribed.len(), 1, "only the sent callback is queued");

        central
            .set_characteristic_notification(DATA, true)
            .expect("local enable should succeed");
        central
            .write_descriptor(DATA, CLIENT_CHARACTERISTIC_CONFIG, &ENABLE_NOTIFICATION_VALUE)
            .expect("descriptor write should start");
        let request_id = match drain(&link).pop() {
            Some(LinkEvent::Peripheral(PeripheralEvent::DescriptorWriteRequest {
                request, ..
            })) => request.request_id,
            other => panic!("expected descriptor write request, got {other:?}"),
        };
        peripheral
            .send_response(&device, request_id, GattStatus::SUCCESS, 0, None)
            .expect("response should be accepted");
        drain(&link);

        peripheral
            .notify_characteristic_changed(&device, DATA, &[0x00, 0xAA], false)
            .expect("notify should be issued");
        let subscribed = drain(&link);
        assert_eq!(subscribed.len(), 2);
        assert_eq!(
            subscribed[0],
            LinkEvent::Central(CentralEvent::CharacteristicChanged {
                characteristic: DATA,
                value: Bytes::from_static(&[0x00, 0xAA]),
            })
        );
    }

    #[test]
    fn mtu_is_capped_by_link() {
        let link = published_link().with_max_mtu(185);
        let mut central = link.central();
        central
            .connect(&DeviceId::new("peripheral"))
            .expect("connect should start");
        drain(&link);

        central.request_mtu(517).expect("mtu request should start");
        let events = drain(&link);
        assert!(events.contains(&LinkEvent::Central(CentralEvent::MtuChanged {
            mtu: 185,
            status: GattStatus::SUCCESS,
        })));
    }

    #[test]
    fn unavailable_server_cannot_open() {
        let link =
            LoopbackLink::new(DeviceId::new("c"), DeviceId::new("p")).with_server_unavailable();
        assert_eq!(
            link.peripheral().open_server(),
            Err(TransportError::ServerUnavailable)
        );
    }
}
