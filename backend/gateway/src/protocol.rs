//! Gateway wire protocol.
//!
//! JSON frames with a `type` discriminator: server-initiated `event`s,
//! client `req`s carrying an `id` and `method`, and `res` frames matched
//! back to their request by `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GatewayFrame {
    /// Server-initiated notification.
    Event {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// A request; the matching response echoes `id`.
    Req {
        id: String,
        method: String,
        params: Value,
    },
    /// Response to a request.
    Res {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<GatewayErrorBody>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Parameters of the one `connect` request sent per transport connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientDescriptor,
    pub role: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDescriptor {
    pub id: String,
    pub version: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// What a successful `connect` response carries. Parsed leniently; the
/// gateway is free to add fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectAck {
    #[serde(default)]
    pub protocol: Option<u32>,
    #[serde(default)]
    pub token: Option<String>,
}

impl ConnectParams {
    /// The bridge's own identity when it connects as a read-side operator.
    pub fn operator() -> Self {
        Self {
            min_protocol: 3,
            max_protocol: 3,
            client: ClientDescriptor {
                id: "clawbridge".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                platform: std::env::consts::OS.to_string(),
                mode: Some("headless".to_string()),
            },
            role: "operator".to_string(),
            scopes: vec!["operator.read".to_string()],
            caps: Vec::new(),
            device: None,
        }
    }
}
