pub mod media_server;
pub mod mime_detect;
pub mod snapshot;

pub use media_server::{is_safe_filename, media_router};
pub use mime_detect::{detect_mime_type, is_audio, is_video};
pub use snapshot::SnapshotStore;
