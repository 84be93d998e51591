//! End-to-end sessions between a `GattClient` and a `GattServer` over the
//! in-memory loopback link.

use bytes::Bytes;
use gattlink::peer::{
    ClientState, EndpointConfig, GattClient, GattServer, PeerError, PeerEvent, ServerState,
};
use gattlink::transport::{
    ConnectionState, DeviceId, GattStatus, LinkEvent, LoopbackCentral, LoopbackLink,
    LoopbackPeripheral, PeripheralEvent, TransportError, Uuid,
};

const SERVICE: Uuid = Uuid::from_u128(0x0000_feed_0000_1000_8000_0080_5f9b_34fb);
const KEY: &[u8] = b"session key material";

type Client = GattClient<LoopbackCentral, Vec<PeerEvent>>;
type Server = GattServer<LoopbackPeripheral, Vec<PeerEvent>>;

struct Session {
    link: LoopbackLink,
    client: Client,
    server: Server,
}

impl Session {
    fn new(endpoints: EndpointConfig, max_mtu: u16, client_key: &[u8]) -> Self {
        let link = LoopbackLink::new(DeviceId::new("central"), DeviceId::new("peripheral"))
            .with_max_mtu(max_mtu);
        let server = GattServer::new(link.peripheral(), endpoints, KEY, Vec::new());
        let client = GattClient::new(link.central(), endpoints, client_key, Vec::new());
        Self {
            link,
            client,
            server,
        }
    }

    fn pump(&mut self) -> usize {
        self.link.pump(&mut self.client, &mut self.server)
    }

    fn handshake(&mut self) {
        self.server.start().expect("server should start");
        self.client
            .connect(&self.link.peripheral_address())
            .expect("connect should start");
        self.pump();
    }
}

fn reader_endpoints() -> EndpointConfig {
    EndpointConfig::mdoc_reader_peripheral_server(SERVICE)
}

fn messages(events: &[PeerEvent]) -> Vec<Bytes> {
    events
        .iter()
        .filter_map(|event| match event {
            PeerEvent::MessageReceived(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn handshake_reaches_ready_on_both_sides() {
    let mut session = Session::new(reader_endpoints(), 185, KEY);
    session.handshake();

    assert_eq!(session.client.state(), ClientState::Ready);
    assert_eq!(session.server.state(), ServerState::PeerConnected);
    assert_eq!(session.client.mtu(), Some(185));
    assert_eq!(session.server.mtu(), Some(185));
    assert_eq!(session.client.listener(), &vec![PeerEvent::PeerConnected]);
    assert_eq!(session.server.listener(), &vec![PeerEvent::PeerConnected]);
}

#[test]
fn handshake_without_ident_characteristic() {
    let mut session = Session::new(EndpointConfig::mdoc_peripheral_server(SERVICE), 517, KEY);
    session.handshake();

    assert_eq!(session.client.state(), ClientState::Ready);
    assert_eq!(session.client.mtu(), Some(517));
}

#[test]
fn messages_flow_both_ways_at_minimum_mtu() {
    let mut session = Session::new(reader_endpoints(), 23, KEY);
    session.handshake();

    let upstream: Vec<Vec<u8>> = vec![vec![], vec![1; 19], vec![2; 20], (0..=255).collect()];
    let downstream: Vec<Vec<u8>> = vec![b"hello".to_vec(), vec![3; 1000], vec![]];

    for message in &upstream {
        session.client.send_message(message).expect("client send");
    }
    for message in &downstream {
        session.server.send_message(message).expect("server send");
    }
    session.pump();

    assert_eq!(
        messages(session.server.listener()),
        upstream.into_iter().map(Bytes::from).collect::<Vec<_>>()
    );
    assert_eq!(
        messages(session.client.listener()),
        downstream.into_iter().map(Bytes::from).collect::<Vec<_>>()
    );
    assert!(session
        .client
        .listener()
        .iter()
        .all(|e| !matches!(e, PeerEvent::Error(_))));
    assert!(session
        .server
        .listener()
        .iter()
        .all(|e| !matches!(e, PeerEvent::Error(_))));
}

#[test]
fn ident_mismatch_never_becomes_ready() {
    let mut session = Session::new(reader_endpoints(), 517, b"some other key");
    session.handshake();

    assert_eq!(session.client.state(), ClientState::Failed);
    assert_eq!(
        session.client.listener(),
        &vec![PeerEvent::Error(PeerError::IdentMismatch)]
    );
    assert!(!session
        .server
        .listener()
        .contains(&PeerEvent::PeerConnected));
    assert_eq!(
        session.client.send_message(b"x"),
        Err(PeerError::NotReady("failed"))
    );
}

#[test]
fn termination_in_both_directions() {
    let mut session = Session::new(reader_endpoints(), 517, KEY);
    session.handshake();

    session
        .client
        .send_transport_specific_termination()
        .expect("client termination");
    session
        .server
        .send_transport_specific_termination()
        .expect("server termination");
    session.pump();

    assert_eq!(
        session.server.listener().last(),
        Some(&PeerEvent::TransportSpecificSessionTermination)
    );
    assert_eq!(
        session.client.listener().last(),
        Some(&PeerEvent::TransportSpecificSessionTermination)
    );
}

#[test]
fn termination_mid_reassembly_keeps_partial_message() {
    let endpoints = reader_endpoints();
    let mut session = Session::new(endpoints, 23, KEY);
    session.handshake();
    session.server.listener_mut().clear();

    // First frame of a two-frame message, then termination, then the rest.
    session.client.send_message(&[7u8; 30]).expect("send");
    session.link.pump_one(&mut session.client, &mut session.server);
    session
        .client
        .send_transport_specific_termination()
        .expect("termination");
    session.pump();

    assert_eq!(
        session.server.listener(),
        &vec![
            PeerEvent::TransportSpecificSessionTermination,
            PeerEvent::MessageReceived(Bytes::from(vec![7u8; 30])),
        ]
    );
}

#[test]
fn disconnect_silences_initiator_and_frees_responder() {
    let mut session = Session::new(reader_endpoints(), 517, KEY);
    session.handshake();
    session.client.listener_mut().clear();
    session.server.listener_mut().clear();

    session.server.send_message(b"in flight").expect("send");
    session.client.disconnect();
    assert_eq!(session.client.state(), ClientState::Closing);
    assert_eq!(
        session.client.connect(&session.link.peripheral_address()),
        Err(PeerError::AlreadyActive("closing"))
    );
    session.pump();

    assert_eq!(session.client.state(), ClientState::Disconnected);
    assert!(session.client.listener().is_empty());
    assert_eq!(session.server.state(), ServerState::Listening);
    assert_eq!(session.server.listener(), &vec![PeerEvent::PeerDisconnected]);

    // The responder accepts a fresh connection afterwards.
    session.client.listener_mut().clear();
    session
        .client
        .connect(&session.link.peripheral_address())
        .expect("reconnect");
    session.pump();
    assert_eq!(session.client.state(), ClientState::Ready);
}

#[test]
fn stop_silences_responder() {
    let mut session = Session::new(reader_endpoints(), 517, KEY);
    session.handshake();
    session.client.listener_mut().clear();
    session.server.listener_mut().clear();

    session.client.send_message(b"late").expect("send");
    session.server.stop();
    session.pump();

    assert_eq!(session.server.state(), ServerState::Stopped);
    assert!(session.server.listener().is_empty());
    assert_eq!(session.client.state(), ClientState::Disconnected);
    assert_eq!(session.client.listener(), &vec![PeerEvent::PeerDisconnected]);
}

#[test]
fn second_central_is_ignored() {
    let mut session = Session::new(reader_endpoints(), 517, KEY);
    session.handshake();

    let intruder = DeviceId::new("intruder");
    session
        .link
        .inject(LinkEvent::Peripheral(PeripheralEvent::ConnectionStateChange {
            device: intruder.clone(),
            status: GattStatus::SUCCESS,
            state: ConnectionState::Connected,
        }));
    session.pump();

    assert_eq!(session.server.peer(), Some(&session.link.central_address()));

    session.server.send_message(b"still here").expect("send");
    session.pump();
    assert_eq!(
        messages(session.client.listener()),
        vec![Bytes::from_static(b"still here")]
    );
}

#[test]
fn unavailable_server_fails_start_and_connect_reports_disconnect() {
    let link = LoopbackLink::new(DeviceId::new("central"), DeviceId::new("peripheral"))
        .with_server_unavailable();
    let mut server = GattServer::new(
        link.peripheral(),
        reader_endpoints(),
        KEY,
        Vec::<PeerEvent>::new(),
    );
    let mut client = GattClient::new(
        link.central(),
        reader_endpoints(),
        KEY,
        Vec::<PeerEvent>::new(),
    );

    assert_eq!(
        server.start(),
        Err(PeerError::Transport(TransportError::ServerUnavailable))
    );
    assert_eq!(server.state(), ServerState::Stopped);

    client
        .connect(&link.peripheral_address())
        .expect("connect is only started");
    link.pump(&mut client, &mut server);
    assert_eq!(client.state(), ClientState::Disconnected);
    assert_eq!(client.listener(), &vec![PeerEvent::PeerDisconnected]);
}

#[test]
fn single_outstanding_write_per_direction() {
    let mut session = Session::new(reader_endpoints(), 23, KEY);
    session.handshake();
    let before = session.link.delivered();

    session.client.send_message(&[1u8; 95]).expect("send");
    // Only the first of five frames is on the link.
    assert_eq!(session.link.pending(), 2);
    session.pump();

    // Each frame is one peripheral write request plus one central completion.
    assert_eq!(session.link.delivered() - before, 10);
    assert_eq!(
        messages(session.server.listener()),
        vec![Bytes::from(vec![1u8; 95])]
    );
}
