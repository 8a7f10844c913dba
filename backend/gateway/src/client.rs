//! WebSocket client driver for the gateway handshake.
//!
//! Wraps a `tokio-tungstenite` connection and runs [`HandshakeFlow`] to
//! completion before handing the connection back. Application traffic is
//! only possible on a client that reached `READY`; a rejected handshake
//! consumes the transport.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use uuid::Uuid;

use clawbridge_core::BridgeError;

use crate::handshake::{HandshakeFlow, HandshakeState};
use crate::protocol::{ConnectParams, GatewayFrame};

/// Bound on the whole challenge/connect/response exchange.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A gateway connection that has completed its handshake.
pub struct GatewayClient {
    ws: WsStream,
    flow: HandshakeFlow,
}

impl GatewayClient {
    /// Connect to the gateway and negotiate a session.
    ///
    /// `bearer_token` is forwarded as an `Authorization` header when set.
    /// Rejection is terminal for this transport; callers wanting another
    /// attempt must call `connect` again for a fresh connection.
    pub async fn connect(
        url: &str,
        params: ConnectParams,
        bearer_token: Option<&str>,
    ) -> Result<Self, BridgeError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| anyhow::anyhow!("bad gateway URL {url}: {e}"))?;
        if let Some(token) = bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| anyhow::anyhow!("bad gateway token: {e}"))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| anyhow::anyhow!("gateway connect to {url} failed: {e}"))?;
        info!(url = %url, "Gateway transport connected, awaiting challenge");

        let mut flow = HandshakeFlow::new(params);
        flow.on_connected();

        let ws = timeout(HANDSHAKE_TIMEOUT, run_handshake(ws, &mut flow))
            .await
            .map_err(|_| anyhow::anyhow!("gateway handshake timed out"))??;

        Ok(Self { ws, flow })
    }

    /// Session token granted by the gateway, held in memory only.
    pub fn session_token(&self) -> Option<&str> {
        self.flow.token()
    }

    pub fn negotiated_protocol(&self) -> Option<u32> {
        self.flow.negotiated_protocol()
    }

    /// Send one privileged request on the negotiated session, attaching the
    /// session token to the params. Returns the request id.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<String, BridgeError> {
        let mut params = params;
        if let (Some(token), Value::Object(map)) = (self.flow.token(), &mut params) {
            map.insert("token".to_string(), Value::String(token.to_string()));
        }
        let id = Uuid::new_v4().to_string();
        let frame = GatewayFrame::Req {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        let json = serde_json::to_string(&frame)
            .map_err(|e| anyhow::anyhow!("encode gateway request: {e}"))?;
        self.ws
            .send(Message::Text(json))
            .await
            .map_err(|e| anyhow::anyhow!("gateway send failed: {e}"))?;
        Ok(id)
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

async fn run_handshake(mut ws: WsStream, flow: &mut HandshakeFlow) -> Result<WsStream, BridgeError> {
    while let Some(msg) = ws.next().await {
        let msg = msg.map_err(|e| anyhow::anyhow!("gateway transport error: {e}"))?;
        let Message::Text(text) = msg else {
            continue;
        };
        let frame: GatewayFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable gateway frame");
                continue;
            }
        };

        if let Some(out) = flow.on_frame(&frame) {
            let json = serde_json::to_string(&out)
                .map_err(|e| anyhow::anyhow!("encode gateway frame: {e}"))?;
            ws.send(Message::Text(json))
                .await
                .map_err(|e| anyhow::anyhow!("gateway send failed: {e}"))?;
        }

        match flow.state() {
            HandshakeState::Ready => return Ok(ws),
            HandshakeState::Rejected => {
                let reason = flow
                    .rejection()
                    .unwrap_or("connection rejected")
                    .to_string();
                let _ = ws.close(None).await;
                return Err(BridgeError::HandshakeRejected(reason));
            }
            _ => {}
        }
    }

    Err(BridgeError::HandshakeRejected(
        "gateway closed before the handshake completed".to_string(),
    ))
}
