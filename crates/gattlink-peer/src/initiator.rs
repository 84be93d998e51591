//! Initiator (GATT client) role.
//!
//! Connects to a responder and drives the handshake:
//!
//! ```text
//! Disconnected → Connecting → ServiceDiscovery → MtuNegotiation
//!     → [IdentVerification] → NotificationSetup(ServerToClient)
//!     → NotificationSetup(State) → WriteStateStart → Ready
//! ```
//!
//! Any fatal error during the handshake moves the client to `Failed`, from
//! which only [`GattClient::disconnect`] leads out. A disconnect of a live
//! link parks the client in `Closing` until the transport confirms with its
//! `Disconnected` callback; `connect` is refused until then.

use bytes::Bytes;
use gattlink_frame::ChunkedTransport;
use gattlink_transport::{
    CentralCallback, CentralTransport, ConnectionState, DeviceId, DiscoveredService, GattStatus,
    TransportError, CLIENT_CHARACTERISTIC_CONFIG, ENABLE_NOTIFICATION_VALUE,
};
use uuid::Uuid;

use crate::config::{ClientConfig, EndpointConfig};
use crate::control::StateSignal;
use crate::error::{PeerError, Result};
use crate::events::{GatedListener, Listener};
use crate::ident::IdentToken;

/// Which characteristic a notification-setup step is enabling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTarget {
    ServerToClient,
    State,
}

impl NotificationTarget {
    fn name(self) -> &'static str {
        match self {
            Self::ServerToClient => "server2client",
            Self::State => "state",
        }
    }
}

/// Initiator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    ServiceDiscovery,
    MtuNegotiation,
    IdentVerification,
    NotificationSetup(NotificationTarget),
    WriteStateStart,
    Ready,
    Closing,
    Failed,
}

impl ClientState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ServiceDiscovery => "service-discovery",
            Self::MtuNegotiation => "mtu-negotiation",
            Self::IdentVerification => "ident-verification",
            Self::NotificationSetup(NotificationTarget::ServerToClient) => {
                "notification-setup-server2client"
            }
            Self::NotificationSetup(NotificationTarget::State) => "notification-setup-state",
            Self::WriteStateStart => "write-state-start",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Failed => "failed",
        }
    }

    fn in_handshake(self) -> bool {
        matches!(
            self,
            Self::ServiceDiscovery
                | Self::MtuNegotiation
                | Self::IdentVerification
                | Self::NotificationSetup(_)
                | Self::WriteStateStart
        )
    }
}

/// The initiator role over a [`CentralTransport`].
///
/// Feed it transport completions through its [`CentralCallback`] impl.
pub struct GattClient<T, L> {
    transport: T,
    endpoints: EndpointConfig,
    config: ClientConfig,
    ident_key: Vec<u8>,
    ident: Option<IdentToken>,
    service: Option<DiscoveredService>,
    ident_characteristic: Option<Uuid>,
    state: ClientState,
    link: ChunkedTransport,
    events: GatedListener<L>,
}

impl<T, L> std::fmt::Debug for GattClient<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattClient")
            .field("endpoints", &self.endpoints)
            .field("state", &self.state)
            .field("mtu", &self.link.mtu())
            .field("ident_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl<T: CentralTransport, L: Listener> GattClient<T, L> {
    /// Create a client; `ident_key` is the key material the ident token is
    /// derived from.
    pub fn new(
        transport: T,
        endpoints: EndpointConfig,
        ident_key: impl Into<Vec<u8>>,
        listener: L,
    ) -> Self {
        Self::with_config(
            transport,
            endpoints,
            ident_key,
            listener,
            ClientConfig::default(),
        )
    }

    pub fn with_config(
        transport: T,
        endpoints: EndpointConfig,
        ident_key: impl Into<Vec<u8>>,
        listener: L,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            endpoints,
            config,
            ident_key: ident_key.into(),
            ident: None,
            service: None,
            ident_characteristic: None,
            state: ClientState::Disconnected,
            link: ChunkedTransport::new(),
            events: GatedListener::new(listener),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Negotiated MTU, once known.
    pub fn mtu(&self) -> Option<u16> {
        self.link.mtu()
    }

    /// The ident token derived for the current connection attempt.
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

    /// Start connecting to `peer`.
    ///
    /// Only allowed from `Disconnected`. A synchronous connect failure is
    /// reported, returned, and leaves the client `Disconnected`.
    pub fn connect(&mut self, peer: &DeviceId) -> Result<()> {
        if self.state != ClientState::Disconnected {
            return Err(PeerError::AlreadyActive(self.state.name()));
        }

        self.ident = Some(IdentToken::derive(&self.ident_key)?);
        self.service = None;
        self.ident_characteristic = None;
        self.link.reset();
        let epoch = self.events.open();
        tracing::debug!(%peer, epoch, "connecting");
        self.transition(ClientState::Connecting);

        if let Err(err) = self.transport.connect(peer) {
            let err = PeerError::from(err);
            self.transition(ClientState::Disconnected);
            self.events.error(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Tear the connection down. No listener notification is delivered for
    /// this connection afterwards.
    ///
    /// The client stays `Closing` until the transport reports the link down.
    /// If the transport refuses the disconnect there is no callback to wait
    /// for and the client goes straight to `Disconnected`.
    pub fn disconnect(&mut self) {
        self.events.close();
        if matches!(self.state, ClientState::Disconnected | ClientState::Closing) {
            return;
        }
        self.transition(ClientState::Closing);
        self.link.reset();
        self.service = None;
        match self.transport.disconnect() {
            Ok(()) => {}
            Err(TransportError::NotConnected) => {
                tracing::debug!("link already down");
                self.transition(ClientState::Disconnected);
            }
            Err(err) => {
                tracing::error!(%err, security = err.is_security(), "error disconnecting");
                self.transition(ClientState::Disconnected);
            }
        }
    }

    /// Queue `data` for delivery on client2server.
    pub fn send_message(&mut self, data: &[u8]) -> Result<()> {
        if self.state != ClientState::Ready {
            return Err(PeerError::NotReady(self.state.name()));
        }
        self.link.enqueue_message(data)?;
        if let Err(err) = self.drain() {
            self.events.error(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Write the termination byte on the state characteristic.
    pub fn send_transport_specific_termination(&mut self) -> Result<()> {
        if self.service.is_none()
            || matches!(
                self.state,
                ClientState::Disconnected | ClientState::Closing | ClientState::Connecting
            )
        {
            return Err(PeerError::NotReady(self.state.name()));
        }
        tracing::debug!("sending transport specific termination");
        self.transport
            .write_characteristic(self.endpoints.state, &StateSignal::Terminate.encode())?;
        Ok(())
    }

    fn transition(&mut self, next: ClientState) {
        if self.state != next {
            tracing::debug!(
                from = self.state.name(),
                to = next.name(),
                epoch = self.events.gate().epoch(),
                "initiator state"
            );
            self.state = next;
        }
    }

    /// Report a fatal connection error and stop the handshake.
    fn fail(&mut self, err: PeerError) {
        self.transition(ClientState::Failed);
        self.events.error(err);
    }

    fn drain(&mut self) -> Result<()> {
        let transport = &mut self.transport;
        let characteristic = self.endpoints.client_to_server;
        self.link
            .drain(|frame| transport.write_characteristic(characteristic, frame))?;
        Ok(())
    }

    fn on_connected(&mut self) {
        if self.state != ClientState::Connecting {
            tracing::debug!(state = self.state.name(), "ignoring connected event");
            return;
        }
        self.transition(ClientState::ServiceDiscovery);
        if let Err(err) = self.transport.request_high_priority() {
            tracing::warn!(%err, "connection priority request failed");
        }
        if let Err(err) = self.transport.discover_services() {
            self.fail(err.into());
        }
    }

    fn on_disconnected(&mut self) {
        tracing::debug!(state = self.state.name(), "peer disconnected");
        self.link.reset();
        self.service = None;
        self.transition(ClientState::Disconnected);
        self.events.peer_disconnected();
    }

    fn resolve_service(&mut self) -> Result<()> {
        let service = self
            .transport
            .service(self.endpoints.service)
            .ok_or(PeerError::ServiceNotFound(self.endpoints.service))?;

        let required = [
            ("state", self.endpoints.state),
            ("client2server", self.endpoints.client_to_server),
            ("server2client", self.endpoints.server_to_client),
        ];
        for (name, uuid) in required {
            if service.characteristic(uuid).is_none() {
                return Err(PeerError::MissingCharacteristic { name });
            }
        }

        self.ident_characteristic = self
            .endpoints
            .ident
            .filter(|uuid| service.characteristic(*uuid).is_some());
        if self.endpoints.ident.is_some() && self.ident_characteristic.is_none() {
            tracing::debug!("ident characteristic not offered, skipping verification");
        }
        self.service = Some(service);
        Ok(())
    }

    fn notification_characteristic(&self, target: NotificationTarget) -> Uuid {
        match target {
            NotificationTarget::ServerToClient => self.endpoints.server_to_client,
            NotificationTarget::State => self.endpoints.state,
        }
    }

    fn enable_notifications(&mut self, target: NotificationTarget) -> Result<()> {
        let characteristic = self.notification_characteristic(target);
        let has_cccd = self
            .service
            .as_ref()
            .and_then(|s| s.characteristic(characteristic))
            .is_some_and(|c| c.has_descriptor(CLIENT_CHARACTERISTIC_CONFIG));
        if !has_cccd {
            return Err(PeerError::MissingDescriptor {
                name: target.name(),
            });
        }

        self.transition(ClientState::NotificationSetup(target));
        self.transport
            .set_characteristic_notification(characteristic, true)?;
        self.transport.write_descriptor(
            characteristic,
            CLIENT_CHARACTERISTIC_CONFIG,
            &ENABLE_NOTIFICATION_VALUE,
        )?;
        Ok(())
    }

    fn after_mtu(&mut self) -> Result<()> {
        match self.ident_characteristic {
            Some(ident) => {
                self.transition(ClientState::IdentVerification);
                self.transport.read_characteristic(ident)?;
                Ok(())
            }
            None => self.enable_notifications(NotificationTarget::ServerToClient),
        }
    }

    fn write_state_start(&mut self) -> Result<()> {
        self.transition(ClientState::WriteStateStart);
        self.transport
            .write_characteristic(self.endpoints.state, &StateSignal::Ready.encode())?;
        Ok(())
    }

    fn on_state_notification(&mut self, value: &[u8]) {
        match StateSignal::parse(value) {
            Ok(StateSignal::Terminate) => {
                tracing::debug!("transport specific termination received");
                self.events.session_termination();
            }
            Ok(StateSignal::Ready) => {
                self.events
                    .error(PeerError::InvalidStateByte(StateSignal::Ready.as_byte()));
            }
            Err(err) => self.events.error(err),
        }
    }

    fn on_data_notification(&mut self, value: &[u8]) {
        tracing::trace!(len = value.len(), data = %hex::encode(value), "chunk received");
        match self.link.receive(value) {
            Ok(Some(message)) => self.deliver(message),
            Ok(None) => {}
            Err(err) => self.events.error(err.into()),
        }
    }

    fn deliver(&mut self, message: Bytes) {
        tracing::debug!(len = message.len(), "message received");
        self.events.message_received(message);
    }
}

impl<T: CentralTransport, L: Listener> CentralCallback for GattClient<T, L> {
    fn on_connection_state_change(&mut self, status: GattStatus, state: ConnectionState) {
        tracing::debug!(%status, ?state, "connection state change");
        match state {
            ConnectionState::Connected => self.on_connected(),
            ConnectionState::Disconnected => self.on_disconnected(),
            ConnectionState::Connecting | ConnectionState::Disconnecting => {}
        }
    }

    fn on_services_discovered(&mut self, status: GattStatus) {
        tracing::debug!(%status, "services discovered");
        if self.state != ClientState::ServiceDiscovery {
            return;
        }
        if !status.is_success() {
            self.fail(PeerError::Status {
                operation: "service discovery",
                status,
            });
            return;
        }

        let result = self.resolve_service().and_then(|()| {
            self.transition(ClientState::MtuNegotiation);
            self.transport.request_mtu(self.config.requested_mtu)?;
            Ok(())
        });
        if let Err(err) = result {
            self.fail(err);
        }
    }

    fn on_mtu_changed(&mut self, mtu: u16, status: GattStatus) {
        tracing::debug!(mtu, %status, "mtu changed");
        if self.state != ClientState::MtuNegotiation {
            // Frame size is fixed once negotiation completes.
            tracing::warn!(
                mtu,
                current = ?self.link.mtu(),
                state = self.state.name(),
                "ignoring mtu change outside negotiation"
            );
            return;
        }
        if !status.is_success() {
            self.fail(PeerError::Status {
                operation: "mtu negotiation",
                status,
            });
            return;
        }

        self.link.set_mtu(mtu);
        if let Err(err) = self.after_mtu() {
            self.fail(err);
        }
    }

    fn on_characteristic_read(&mut self, characteristic: Uuid, value: &[u8], status: GattStatus) {
        tracing::debug!(%characteristic, %status, len = value.len(), "characteristic read");
        if self.state != ClientState::IdentVerification
            || Some(characteristic) != self.ident_characteristic
        {
            self.fail(PeerError::UnexpectedCharacteristic {
                operation: "read",
                characteristic,
            });
            return;
        }
        if !status.is_success() {
            self.fail(PeerError::Status {
                operation: "ident read",
                status,
            });
            return;
        }

        let matches = self.ident.as_ref().is_some_and(|t| t.matches(value));
        if !matches {
            tracing::debug!(
                received = %hex::encode(value),
                expected = ?self.ident,
                "ident mismatch"
            );
            self.fail(PeerError::IdentMismatch);
            return;
        }

        if let Err(err) = self.enable_notifications(NotificationTarget::ServerToClient) {
            self.fail(err);
        }
    }

    fn on_characteristic_write(&mut self, characteristic: Uuid, status: GattStatus) {
        tracing::trace!(%characteristic, %status, "characteristic write");
        if characteristic == self.endpoints.state {
            if self.state == ClientState::WriteStateStart {
                if !status.is_success() {
                    self.fail(PeerError::Status {
                        operation: "state write",
                        status,
                    });
                    return;
                }
                self.transition(ClientState::Ready);
                self.events.peer_connected();
            } else if !status.is_success() {
                self.events.error(PeerError::Status {
                    operation: "state write",
                    status,
                });
            }
        } else if characteristic == self.endpoints.client_to_server {
            if !self.link.complete_write(status.is_success()) {
                self.events.error(PeerError::Status {
                    operation: "message write",
                    status,
                });
                return;
            }
            if let Err(err) = self.drain() {
                self.events.error(err);
            }
        } else {
            self.events.error(PeerError::UnexpectedCharacteristic {
                operation: "write",
                characteristic,
            });
        }
    }

    fn on_characteristic_changed(&mut self, characteristic: Uuid, value: &[u8]) {
        if characteristic == self.endpoints.server_to_client {
            self.on_data_notification(value);
        } else if characteristic == self.endpoints.state {
            self.on_state_notification(value);
        } else {
            self.events.error(PeerError::UnexpectedCharacteristic {
                operation: "notification",
                characteristic,
            });
        }
    }

    fn on_descriptor_write(&mut self, characteristic: Uuid, descriptor: Uuid, status: GattStatus) {
        tracing::debug!(%characteristic, %descriptor, %status, "descriptor write");
        let ClientState::NotificationSetup(target) = self.state else {
            let err = PeerError::UnexpectedDescriptor {
                characteristic,
                descriptor,
            };
            if self.state.in_handshake() {
                self.fail(err);
            } else {
                self.events.error(err);
            }
            return;
        };

        if characteristic != self.notification_characteristic(target)
            || descriptor != CLIENT_CHARACTERISTIC_CONFIG
        {
            self.fail(PeerError::UnexpectedDescriptor {
                characteristic,
                descriptor,
            });
            return;
        }
        if !status.is_success() {
            self.fail(PeerError::Status {
                operation: "descriptor write",
                status,
            });
            return;
        }

        let result = match target {
            NotificationTarget::ServerToClient => {
                self.enable_notifications(NotificationTarget::State)
            }
            NotificationTarget::State => self.write_state_start(),
        };
        if let Err(err) = result {
            self.fail(err);
        }
    }
}
