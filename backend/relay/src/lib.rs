pub mod dispatch;
pub mod server;
pub mod ws_server;

pub use server::{RelayState, build_router, serve};
