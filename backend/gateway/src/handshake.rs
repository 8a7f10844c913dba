//! Handshake state machine for the upstream gateway connection.
//!
//! Pure frames-in/frame-out logic with no transport attached, driven by
//! [`crate::client::GatewayClient`] over a live socket. The server opens
//! with a `connect.challenge` event; the client answers with exactly one
//! `connect` request and then waits for the matching response.

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{ConnectAck, ConnectParams, GatewayFrame};

/// Event name the server uses to invite the `connect` request.
pub const CHALLENGE_EVENT: &str = "connect.challenge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Disconnected,
    AwaitingChallenge,
    Handshaking,
    Ready,
    /// Terminal. The same transport must not be reused for another attempt.
    Rejected,
}

pub struct HandshakeFlow {
    state: HandshakeState,
    request_id: String,
    params: ConnectParams,
    token: Option<String>,
    protocol: Option<u32>,
    rejection: Option<String>,
}

impl HandshakeFlow {
    pub fn new(params: ConnectParams) -> Self {
        Self {
            state: HandshakeState::Disconnected,
            request_id: Uuid::new_v4().to_string(),
            params,
            token: None,
            protocol: None,
            rejection: None,
        }
    }

    /// The transport is up; start waiting for the server's challenge.
    pub fn on_connected(&mut self) {
        if self.state == HandshakeState::Disconnected {
            self.state = HandshakeState::AwaitingChallenge;
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Session token from a successful handshake. Held in memory for the
    /// life of the connection, never written to disk.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn negotiated_protocol(&self) -> Option<u32> {
        self.protocol
    }

    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    /// Feed one inbound frame; returns the frame to send back, if any.
    /// Frames that do not advance the handshake are ignored.
    pub fn on_frame(&mut self, frame: &GatewayFrame) -> Option<GatewayFrame> {
        match (&self.state, frame) {
            (HandshakeState::AwaitingChallenge, GatewayFrame::Event { event, .. })
                if event == CHALLENGE_EVENT =>
            {
                debug!("Challenge received, sending connect request");
                self.state = HandshakeState::Handshaking;
                Some(GatewayFrame::Req {
                    id: self.request_id.clone(),
                    method: "connect".to_string(),
                    params: serde_json::to_value(&self.params).unwrap_or(Value::Null),
                })
            }
            (
                HandshakeState::Handshaking,
                GatewayFrame::Res {
                    id,
                    ok,
                    payload,
                    error,
                },
            ) if *id == self.request_id => {
                if *ok {
                    let ack: ConnectAck = payload
                        .clone()
                        .and_then(|p| serde_json::from_value(p).ok())
                        .unwrap_or_default();
                    info!(protocol = ?ack.protocol, "Gateway handshake complete");
                    self.token = ack.token;
                    self.protocol = ack.protocol;
                    self.state = HandshakeState::Ready;
                } else {
                    let reason = error
                        .as_ref()
                        .map(|e| e.message.clone())
                        .unwrap_or_else(|| "connection rejected".to_string());
                    warn!(reason = %reason, "Gateway rejected the handshake");
                    self.rejection = Some(reason);
                    self.state = HandshakeState::Rejected;
                }
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GatewayErrorBody;
    use serde_json::json;

    fn challenge() -> GatewayFrame {
        GatewayFrame::Event {
            event: CHALLENGE_EVENT.to_string(),
            payload: None,
        }
    }

    fn started_flow() -> HandshakeFlow {
        let mut flow = HandshakeFlow::new(ConnectParams::operator());
        flow.on_connected();
        flow
    }

    #[test]
    fn challenge_triggers_one_connect_request() {
        let mut flow = started_flow();
        let out = flow.on_frame(&challenge()).unwrap();
        match out {
            GatewayFrame::Req { method, params, .. } => {
                assert_eq!(method, "connect");
                assert_eq!(params["minProtocol"], 3);
            }
            other => panic!("wrong frame: {other:?}"),
        }
        assert_eq!(*flow.state(), HandshakeState::Handshaking);

        // A second challenge must not produce a second request.
        assert!(flow.on_frame(&challenge()).is_none());
    }

    #[test]
    fn accepting_response_reaches_ready_with_token() {
        let mut flow = started_flow();
        let req = flow.on_frame(&challenge()).unwrap();
        let GatewayFrame::Req { id, .. } = req else {
            panic!("expected req");
        };

        let res = GatewayFrame::Res {
            id,
            ok: true,
            payload: Some(json!({"protocol": 3, "token": "sess-abc"})),
            error: None,
        };
        assert!(flow.on_frame(&res).is_none());
        assert_eq!(*flow.state(), HandshakeState::Ready);
        assert_eq!(flow.token(), Some("sess-abc"));
        assert_eq!(flow.negotiated_protocol(), Some(3));
    }

    #[test]
    fn rejection_is_terminal_and_sends_nothing_further() {
        let mut flow = started_flow();
        let req = flow.on_frame(&challenge()).unwrap();
        let GatewayFrame::Req { id, .. } = req else {
            panic!("expected req");
        };

        let res = GatewayFrame::Res {
            id,
            ok: false,
            payload: None,
            error: Some(GatewayErrorBody {
                code: None,
                message: "role not allowed".to_string(),
            }),
        };
        assert!(flow.on_frame(&res).is_none());
        assert_eq!(*flow.state(), HandshakeState::Rejected);
        assert_eq!(flow.rejection(), Some("role not allowed"));

        // Nothing more goes out on this transport, challenge or not.
        assert!(flow.on_frame(&challenge()).is_none());
    }

    #[test]
    fn response_with_foreign_id_is_ignored() {
        let mut flow = started_flow();
        flow.on_frame(&challenge());

        let res = GatewayFrame::Res {
            id: "someone-else".to_string(),
            ok: false,
            payload: None,
            error: None,
        };
        assert!(flow.on_frame(&res).is_none());
        assert_eq!(*flow.state(), HandshakeState::Handshaking);
    }

    #[test]
    fn frames_before_transport_are_ignored() {
        let mut flow = HandshakeFlow::new(ConnectParams::operator());
        assert!(flow.on_frame(&challenge()).is_none());
        assert_eq!(*flow.state(), HandshakeState::Disconnected);
    }
}
