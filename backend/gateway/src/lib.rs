pub mod client;
pub mod handshake;
pub mod protocol;

pub use client::GatewayClient;
pub use handshake::{CHALLENGE_EVENT, HandshakeFlow, HandshakeState};
pub use protocol::{
    ClientDescriptor, ConnectAck, ConnectParams, DeviceDescriptor, GatewayErrorBody, GatewayFrame,
};
