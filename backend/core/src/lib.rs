pub mod config;
pub mod error;
pub mod event;

pub use config::BridgeConfig;
pub use error::{BridgeError, ProviderFailure};
pub use event::{InboundEvent, OutboundEvent};
