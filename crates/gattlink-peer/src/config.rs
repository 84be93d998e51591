//! Endpoint and client configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Default MTU the initiator requests after service discovery.
pub const DEFAULT_REQUESTED_MTU: u16 = 517;

const MDL_BASE: u128 = 0x0000_0000_a123_48ce_896b_4c76_9733_73e6;

const fn mdl_characteristic(short: u32) -> Uuid {
    Uuid::from_u128(MDL_BASE | ((short as u128) << 96))
}

/// The service and characteristics one session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Primary service containing every characteristic below.
    pub service: Uuid,
    /// Control channel (ready / termination bytes).
    pub state: Uuid,
    /// Initiator to responder data.
    #[serde(rename = "client2server")]
    pub client_to_server: Uuid,
    /// Responder to initiator data.
    #[serde(rename = "server2client")]
    pub server_to_client: Uuid,
    /// Optional anti-relay check value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<Uuid>,
}

impl EndpointConfig {
    /// "mdoc peripheral server" mode: the holder serves, no ident.
    pub fn mdoc_peripheral_server(service: Uuid) -> Self {
        Self {
            service,
            state: mdl_characteristic(0x0000_0001),
            client_to_server: mdl_characteristic(0x0000_0002),
            server_to_client: mdl_characteristic(0x0000_0003),
            ident: None,
        }
    }

    /// "mdoc reader peripheral server" mode: the reader serves, with ident.
    pub fn mdoc_reader_peripheral_server(service: Uuid) -> Self {
        Self {
            service,
            state: mdl_characteristic(0x0000_0005),
            client_to_server: mdl_characteristic(0x0000_0006),
            server_to_client: mdl_characteristic(0x0000_0007),
            ident: Some(mdl_characteristic(0x0000_0008)),
        }
    }

    /// Parse a JSON document such as
    /// `{"service": "...", "state": "...", "client2server": "...", "server2client": "..."}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Initiator tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// MTU requested after discovery.
    pub requested_mtu: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requested_mtu: DEFAULT_REQUESTED_MTU,
        }
    }
}
