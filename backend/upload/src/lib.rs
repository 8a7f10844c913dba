pub mod chain;
pub mod providers;

pub use chain::UploadChain;
pub use providers::{Catbox, TmpFiles, UploadProvider, ZeroXZero};
