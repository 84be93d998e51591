use gattlink_frame::MIN_MTU;
use gattlink_peer::{
    ClientState, EndpointConfig, GattClient, GattServer, PeerError, PeerEvent,
};
use gattlink_transport::{DeviceId, LoopbackLink, Uuid};
use serde::Serialize;

use crate::cmd::LoopbackArgs;
use crate::exit::{io_error, peer_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

/// Service used when no endpoint file is given.
const LOOPBACK_SERVICE: Uuid = Uuid::from_u128(0x6d2c_0a51_3c4e_4c8b_9d53_1b7e_1f0e_a1c9);
const SESSION_KEY: &[u8] = b"gattlink loopback session key";
const WRONG_KEY: &[u8] = b"gattlink loopback wrong key";

#[derive(Serialize, Default)]
struct RoleSummary {
    connected: usize,
    disconnected: usize,
    messages_received: usize,
    bytes_received: usize,
    terminations: usize,
    errors: Vec<String>,
}

impl RoleSummary {
    fn from_events(events: &[PeerEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            match event {
                PeerEvent::PeerConnected => summary.connected += 1,
                PeerEvent::PeerDisconnected => summary.disconnected += 1,
                PeerEvent::MessageReceived(message) => {
                    summary.messages_received += 1;
                    summary.bytes_received += message.len();
                }
                PeerEvent::TransportSpecificSessionTermination => summary.terminations += 1,
                PeerEvent::Error(err) => summary.errors.push(err.to_string()),
            }
        }
        summary
    }
}

#[derive(Serialize)]
struct SessionOutput {
    mtu: Option<u16>,
    handshake: &'static str,
    messages_per_direction: usize,
    message_size: usize,
    verified: bool,
    link_events: usize,
    initiator: RoleSummary,
    responder: RoleSummary,
}

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    if args.mtu < MIN_MTU {
        return Err(CliError::usage(format!(
            "--mtu must be at least {MIN_MTU}, got {}",
            args.mtu
        )));
    }
    let endpoints = load_endpoints(&args)?;

    let link = LoopbackLink::new(
        DeviceId::new("loopback-central"),
        DeviceId::new("loopback-peripheral"),
    )
    .with_max_mtu(args.mtu);
    let client_key = if args.mismatch_ident {
        WRONG_KEY
    } else {
        SESSION_KEY
    };

    let mut server = GattServer::new(
        link.peripheral(),
        endpoints,
        SESSION_KEY,
        Vec::<PeerEvent>::new(),
    );
    let mut client = GattClient::new(
        link.central(),
        endpoints,
        client_key,
        Vec::<PeerEvent>::new(),
    );

    server.start().map_err(|err| peer_error("start", err))?;
    client
        .connect(&link.peripheral_address())
        .map_err(|err| peer_error("connect", err))?;
    link.pump(&mut client, &mut server);

    let handshake = client.state();
    tracing::info!(state = handshake.name(), mtu = ?client.mtu(), "handshake finished");

    let mut sent_to_server = Vec::new();
    let mut sent_to_client = Vec::new();
    if handshake == ClientState::Ready {
        for index in 0..args.messages {
            let upstream = pattern(index, args.size, 0x11);
            let downstream = pattern(index, args.size, 0x77);
            client
                .send_message(&upstream)
                .map_err(|err| peer_error("send", err))?;
            server
                .send_message(&downstream)
                .map_err(|err| peer_error("send", err))?;
            sent_to_server.push(upstream);
            sent_to_client.push(downstream);
            link.pump(&mut client, &mut server);
        }
        client
            .send_transport_specific_termination()
            .map_err(|err| peer_error("terminate", err))?;
        link.pump(&mut client, &mut server);
    }

    client.disconnect();
    link.pump(&mut client, &mut server);
    server.stop();
    link.pump(&mut client, &mut server);

    let verified = handshake == ClientState::Ready
        && received(client.listener()) == sent_to_client
        && received(server.listener()) == sent_to_server;

    let out = SessionOutput {
        mtu: client.mtu().or(server.mtu()),
        handshake: handshake.name(),
        messages_per_direction: args.messages,
        message_size: args.size,
        verified,
        link_events: link.delivered(),
        initiator: RoleSummary::from_events(client.listener()),
        responder: RoleSummary::from_events(server.listener()),
    };
    print_session(&out, format);

    if handshake != ClientState::Ready {
        let cause =
            first_error(client.listener()).unwrap_or(PeerError::NotReady(handshake.name()));
        return Err(peer_error("handshake", cause));
    }
    Ok(if verified { SUCCESS } else { FAILURE })
}

fn load_endpoints(args: &LoopbackArgs) -> CliResult<EndpointConfig> {
    match &args.endpoints {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|err| io_error(&path.display().to_string(), err))?;
            EndpointConfig::from_json(&json).map_err(|err| peer_error("endpoints", err))
        }
        None => Ok(EndpointConfig::mdoc_reader_peripheral_server(
            LOOPBACK_SERVICE,
        )),
    }
}

/// Deterministic payload so both ends can be compared byte for byte.
fn pattern(index: usize, size: usize, seed: u8) -> Vec<u8> {
    (0..size)
        .map(|i| seed.wrapping_add(index as u8).wrapping_add(i as u8))
        .collect()
}

fn received(events: &[PeerEvent]) -> Vec<Vec<u8>> {
    events
        .iter()
        .filter_map(|event| match event {
            PeerEvent::MessageReceived(message) => Some(message.to_vec()),
            _ => None,
        })
        .collect()
}

fn first_error(events: &[PeerEvent]) -> Option<PeerError> {
    events.iter().find_map(|event| match event {
        PeerEvent::Error(err) => Some(err.clone()),
        _ => None,
    })
}

fn print_session(out: &SessionOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let row = |role: &str, s: &RoleSummary| {
                vec![
                    role.to_string(),
                    s.connected.to_string(),
                    s.messages_received.to_string(),
                    s.bytes_received.to_string(),
                    s.terminations.to_string(),
                    s.disconnected.to_string(),
                    s.errors.join("; "),
                ]
            };
            print_table(
                &[
                    "ROLE",
                    "CONNECTED",
                    "MESSAGES",
                    "BYTES",
                    "TERMINATIONS",
                    "DISCONNECTED",
                    "ERRORS",
                ],
                vec![
                    row("initiator", &out.initiator),
                    row("responder", &out.responder),
                ],
            );
            println!(
                "handshake={} mtu={} verified={}",
                out.handshake,
                out.mtu.map_or_else(|| "-".to_string(), |m| m.to_string()),
                out.verified
            );
        }
        OutputFormat::Pretty => {
            println!(
                "handshake={} mtu={} events={} verified={}",
                out.handshake,
                out.mtu.map_or_else(|| "-".to_string(), |m| m.to_string()),
                out.link_events,
                out.verified
            );
            for (role, s) in [("initiator", &out.initiator), ("responder", &out.responder)] {
                println!(
                    "{role}: connected={} messages={} bytes={} terminations={} disconnected={} errors={}",
                    s.connected,
                    s.messages_received,
                    s.bytes_received,
                    s.terminations,
                    s.disconnected,
                    s.errors.len()
                );
                for err in &s.errors {
                    println!("  error: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_differs_per_message() {
        assert_eq!(pattern(0, 3, 0x10), vec![0x10, 0x11, 0x12]);
        assert_ne!(pattern(0, 8, 0x10), pattern(1, 8, 0x10));
        assert!(pattern(4, 0, 0x10).is_empty());
    }

    #[test]
    fn summary_counts_events() {
        let events = vec![
            PeerEvent::PeerConnected,
            PeerEvent::MessageReceived("abcd".into()),
            PeerEvent::Error(PeerError::NoPeer),
            PeerEvent::PeerDisconnected,
        ];
        let summary = RoleSummary::from_events(&events);
        assert_eq!(summary.connected, 1);
        assert_eq!(summary.bytes_received, 4);
        assert_eq!(summary.errors, vec!["no peer connected".to_string()]);
        assert_eq!(received(&events), vec![b"abcd".to_vec()]);
    }
}
