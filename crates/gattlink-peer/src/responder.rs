//! Responder (GATT server) role.
//!
//! Publishes the service, accepts exactly one peer at a time and answers
//! every read and write transaction it receives, including ones it rejects.

use std::collections::VecDeque;

use gattlink_frame::ChunkedTransport;
use gattlink_transport::{
    CharacteristicDefinition, ConnectionState, DescriptorDefinition, DescriptorWriteRequest,
    DeviceId, GattStatus, Permissions, PeripheralCallback, PeripheralTransport, Properties,
    ServiceDefinition, WriteRequest, DISABLE_NOTIFICATION_VALUE,
};
use uuid::Uuid;

use crate::config::EndpointConfig;
use crate::control::StateSignal;
use crate::error::{PeerError, Result};
use crate::events::{GatedListener, Listener};
use crate::ident::IdentToken;

/// Responder lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    /// Held only for the duration of [`GattServer::start`] while the server
    /// context is opened and the service published. `start` returns in
    /// `Listening` or `Stopped`, so callers never see it; the transition
    /// shows up in the `responder state` trace.
    Starting,
    Listening,
    PeerConnected,
}

impl ServerState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Listening => "listening",
            Self::PeerConnected => "peer-connected",
        }
    }
}

/// Which kind of notification a pending notification-sent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notified {
    Data,
    Control,
}

/// Build the service a responder publishes for `endpoints`.
///
/// Notify-capable characteristics carry a writable CCCD initialised to
/// notifications disabled; ident is added only when configured.
pub fn service_definition(endpoints: &EndpointConfig) -> ServiceDefinition {
    let mut service = ServiceDefinition::new(endpoints.service)
        .with_characteristic(
            CharacteristicDefinition::new(
                endpoints.state,
                Properties::NOTIFY | Properties::WRITE_NO_RESPONSE,
                Permissions::WRITE,
            )
            .with_descriptor(DescriptorDefinition::notification_config()),
        )
        .with_characteristic(CharacteristicDefinition::new(
            endpoints.client_to_server,
            Properties::WRITE_NO_RESPONSE,
            Permissions::WRITE,
        ))
        .with_characteristic(
            CharacteristicDefinition::new(
                endpoints.server_to_client,
                Properties::NOTIFY,
                Permissions::WRITE,
            )
            .with_descriptor(DescriptorDefinition::notification_config()),
        );
    if let Some(ident) = endpoints.ident {
        service = service.with_characteristic(CharacteristicDefinition::new(
            ident,
            Properties::READ,
            Permissions::READ,
        ));
    }
    service
}

/// The responder role over a [`PeripheralTransport`].
pub struct GattServer<T, L> {
    transport: T,
    endpoints: EndpointConfig,
    ident_key: Vec<u8>,
    ident: Option<IdentToken>,
    state: ServerState,
    peer: Option<DeviceId>,
    link: ChunkedTransport,
    in_flight: VecDeque<Notified>,
    events: GatedListener<L>,
}

impl<T, L> std::fmt::Debug for GattServer<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattServer")
            .field("endpoints", &self.endpoints)
            .field("state", &self.state)
            .field("peer", &self.peer)
            .field("ident_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl<T: PeripheralTransport, L: Listener> GattServer<T, L> {
    pub fn new(
        transport: T,
        endpoints: EndpointConfig,
        ident_key: impl Into<Vec<u8>>,
        listener: L,
    ) -> Self {
        Self {
            transport,
            endpoints,
            ident_key: ident_key.into(),
            ident: None,
            state: ServerState::Stopped,
            peer: None,
            link: ChunkedTransport::new(),
            in_flight: VecDeque::new(),
            events: GatedListener::new(listener),
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The currently connected peer.
    pub fn peer(&self) -> Option<&DeviceId> {
        self.peer.as_ref()
    }

    pub fn mtu(&self) -> Option<u16> {
        self.link.mtu()
    }

    pub fn ident(&self) -> Option<&IdentToken> {
        self.ident.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn listener(&self) -> &L {
        self.events.listener()
    }

    pub fn listener_mut(&mut self) -> &mut L {
        self.events.listener_mut()
    }

    /// Open the server context and publish the service.
    ///
    /// On failure nothing is left open and the server is `Stopped`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ServerState::Stopped {
            return Err(PeerError::AlreadyActive(self.state.name()));
        }

        self.ident = Some(IdentToken::derive(&self.ident_key)?);
        let epoch = self.events.open();
        tracing::debug!(epoch, service = %self.endpoints.service, "starting");
        self.transition(ServerState::Starting);

        if let Err(err) = self.transport.open_server() {
            self.transition(ServerState::Stopped);
            return Err(err.into());
        }

        let service = service_definition(&self.endpoints);
        if let Err(err) = self.transport.add_service(&service) {
            if let Err(close_err) = self.transport.close() {
                tracing::error!(%close_err, "error closing server after publish failure");
            }
            self.transition(ServerState::Stopped);
            return Err(err.into());
        }

        self.transition(ServerState::Listening);
        Ok(())
    }

    /// Drop the current peer and close the server context. No listener
    /// notification is delivered afterwards.
    pub fn stop(&mut self) {
        self.events.close();
        if self.state == ServerState::Stopped {
            return;
        }
        if let Some(peer) = self.peer.take() {
            if let Err(err) = self.transport.cancel_connection(&peer) {
                tracing::error!(%err, security = err.is_security(), "error cancelling connection");
            }
        }
        if let Err(err) = self.transport.close() {
            tracing::error!(%err, security = err.is_security(), "error closing server");
        }
        self.link.reset();
        self.in_flight.clear();
        self.transition(ServerState::Stopped);
    }

    /// Queue `data` for delivery on server2client to the current peer.
    pub fn send_message(&mut self, data: &[u8]) -> Result<()> {
        if self.peer.is_none() {
            return Err(PeerError::NoPeer);
        }
        self.link.enqueue_message(data)?;
        if let Err(err) = self.drain() {
            self.events.error(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Notify the termination byte on the state characteristic.
    pub fn send_transport_specific_termination(&mut self) -> Result<()> {
        let Some(peer) = self.peer.as_ref() else {
            return Err(PeerError::NoPeer);
        };
        tracing::debug!(%peer, "sending transport specific termination");
        self.transport.notify_characteristic_changed(
            peer,
            self.endpoints.state,
            &StateSignal::Terminate.encode(),
            false,
        )?;
        self.in_flight.push_back(Notified::Control);
        Ok(())
    }

    fn transition(&mut self, next: ServerState) {
        if self.state != next {
            tracing::debug!(
                from = self.state.name(),
                to = next.name(),
                epoch = self.events.gate().epoch(),
                "responder state"
            );
            self.state = next;
        }
    }

    fn is_current(&self, device: &DeviceId) -> bool {
        self.peer.as_ref() == Some(device)
    }

    fn drain(&mut self) -> Result<()> {
        let Some(peer) = self.peer.as_ref() else {
            return Ok(());
        };
        let transport = &mut self.transport;
        let characteristic = self.endpoints.server_to_client;
        let issued = self.link.drain(|frame| {
            transport.notify_characteristic_changed(peer, characteristic, frame, false)
        })?;
        if issued {
            self.in_flight.push_back(Notified::Data);
        }
        Ok(())
    }

    fn respond(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        status: GattStatus,
        value: Option<&[u8]>,
    ) {
        if let Err(err) = self
            .transport
            .send_response(device, request_id, status, 0, value)
        {
            self.events.error(err.into());
        }
    }

    fn on_state_write(&mut self, value: &[u8]) {
        match StateSignal::parse(value) {
            Ok(StateSignal::Ready) => {
                tracing::debug!("peer ready");
                self.events.peer_connected();
            }
            Ok(StateSignal::Terminate) => {
                tracing::debug!("transport specific termination received");
                self.events.session_termination();
            }
            Err(err) => self.events.error(err),
        }
    }

    fn on_data_write(&mut self, value: &[u8]) {
        tracing::trace!(len = value.len(), data = %hex::encode(value), "chunk received");
        match self.link.receive(value) {
            Ok(Some(message)) => {
                tracing::debug!(len = message.len(), "message received");
                self.events.message_received(message);
            }
            Ok(None) => {}
            Err(err) => self.events.error(err.into()),
        }
    }
}

impl<T: PeripheralTransport, L: Listener> PeripheralCallback for GattServer<T, L> {
    fn on_connection_state_change(
        &mut self,
        device: &DeviceId,
        status: GattStatus,
        state: ConnectionState,
    ) {
        tracing::debug!(%device, %status, ?state, "connection state change");
        match state {
            ConnectionState::Connected => {
                if let Some(current) = &self.peer {
                    if current != device {
                        tracing::warn!(
                            %device,
                            %current,
                            "second peer connected, ignoring"
                        );
                    }
                    return;
                }
                if self.state != ServerState::Listening {
                    tracing::debug!(state = self.state.name(), "ignoring connection");
                    return;
                }
                self.peer = Some(device.clone());
                self.link.reset();
                self.in_flight.clear();
                self.transition(ServerState::PeerConnected);
            }
            ConnectionState::Disconnected => {
                if !self.is_current(device) {
                    tracing::debug!(%device, "disconnect from unknown device ignored");
                    return;
                }
                self.peer = None;
                self.link.reset();
                self.in_flight.clear();
                self.transition(ServerState::Listening);
                self.events.peer_disconnected();
            }
            ConnectionState::Connecting | ConnectionState::Disconnecting => {}
        }
    }

    fn on_characteristic_read_request(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        offset: u16,
        characteristic: Uuid,
    ) {
        tracing::debug!(%device, request_id, offset, %characteristic, "read request");
        match (self.endpoints.ident, self.ident) {
            (Some(ident), Some(token)) if ident == characteristic => {
                self.respond(device, request_id, GattStatus::SUCCESS, Some(token.as_bytes()));
            }
            _ => {
                self.events.error(PeerError::UnexpectedCharacteristic {
                    operation: "read",
                    characteristic,
                });
                self.respond(device, request_id, GattStatus::READ_NOT_PERMITTED, None);
            }
        }
    }

    fn on_characteristic_write_request(&mut self, device: &DeviceId, request: WriteRequest) {
        tracing::trace!(
            %device,
            request_id = request.request_id,
            characteristic = %request.characteristic,
            len = request.value.len(),
            "write request"
        );

        let known = request.characteristic == self.endpoints.state
            || request.characteristic == self.endpoints.client_to_server;
        if request.response_needed {
            let status = if known && self.is_current(device) {
                GattStatus::SUCCESS
            } else {
                GattStatus::WRITE_NOT_PERMITTED
            };
            self.respond(device, request.request_id, status, None);
        }

        if !self.is_current(device) {
            tracing::debug!(%device, "write from non-current peer ignored");
            return;
        }
        if request.characteristic == self.endpoints.state {
            self.on_state_write(&request.value);
        } else if request.characteristic == self.endpoints.client_to_server {
            self.on_data_write(&request.value);
        } else {
            self.events.error(PeerError::UnexpectedCharacteristic {
                operation: "write",
                characteristic: request.characteristic,
            });
        }
    }

    fn on_descriptor_read_request(
        &mut self,
        device: &DeviceId,
        request_id: u32,
        offset: u16,
        characteristic: Uuid,
        descriptor: Uuid,
    ) {
        tracing::debug!(
            %device,
            request_id,
            offset,
            %characteristic,
            %descriptor,
            "descriptor read request"
        );
        self.respond(
            device,
            request_id,
            GattStatus::SUCCESS,
            Some(&DISABLE_NOTIFICATION_VALUE),
        );
    }

    fn on_descriptor_write_request(&mut self, device: &DeviceId, request: DescriptorWriteRequest) {
        tracing::debug!(
            %device,
            characteristic = %request.characteristic,
            descriptor = %request.descriptor,
            value = %hex::encode(&request.value),
            "descriptor write request"
        );
        if request.response_needed {
            self.respond(device, request.request_id, GattStatus::SUCCESS, None);
        }
    }

    fn on_mtu_changed(&mut self, device: &DeviceId, mtu: u16) {
        tracing::debug!(%device, mtu, "mtu changed");
        if self.is_current(device) {
            self.link.set_mtu(mtu);
        }
    }

    fn on_notification_sent(&mut self, device: &DeviceId, status: GattStatus) {
        tracing::trace!(%device, %status, "notification sent");
        if !self.is_current(device) {
            return;
        }
        match self.in_flight.pop_front() {
            Some(Notified::Data) => {
                if !self.link.complete_write(status.is_success()) {
                    self.events.error(PeerError::Status {
                        operation: "notification",
                        status,
                    });
                    return;
                }
                if let Err(err) = self.drain() {
                    self.events.error(err);
                }
            }
            Some(Notified::Control) => {
                if !status.is_success() {
                    self.events.error(PeerError::Status {
                        operation: "state notification",
                        status,
                    });
                }
            }
            None => tracing::debug!("notification sent with nothing in flight"),
        }
    }
}
