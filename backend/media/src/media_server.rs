//! Local media server: serves agent-generated media files over HTTP.
//!
//! The browser fetches synthesized speech and generated clips from here,
//! decoupled from the WebSocket channel. Filenames resolve against one
//! fixed base directory and nothing else.

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::{path::PathBuf, sync::Arc};
use tokio::fs;
use tracing::{debug, warn};

use crate::mime_detect::detect_mime_type;

/// State shared by media server routes.
#[derive(Clone)]
pub struct MediaServerState {
    pub media_dir: Arc<PathBuf>,
}

/// Build the media Axum router.
///
/// Mount at the `/media` prefix:
///   GET /media/:filename  — serve a media file
pub fn media_router(media_dir: PathBuf) -> Router {
    let state = MediaServerState {
        media_dir: Arc::new(media_dir),
    };
    Router::new()
        .route("/:filename", get(serve_media))
        .with_state(state)
}

/// Whether a requested filename is safe to resolve against the base
/// directory. Traversal segments and separators are refused outright.
pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
}

/// GET /:filename — read a media file out of the local store.
async fn serve_media(
    Path(filename): Path<String>,
    State(state): State<MediaServerState>,
) -> Response {
    if !is_safe_filename(&filename) {
        warn!(filename = %filename, "Rejected traversal media path");
        return (StatusCode::BAD_REQUEST, "Invalid filename").into_response();
    }

    let path = state.media_dir.join(&filename);
    debug!(path = %path.display(), "Serving media file");

    match fs::read(&path).await {
        Ok(bytes) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(detect_mime_type(&path)),
            );
            headers.insert(
                header::CONTENT_LENGTH,
                HeaderValue::from(bytes.len() as u64),
            );
            // Pages hosting the chat UI are served from a different origin.
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Media file not found").into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read media file");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read media").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_segments() {
        assert!(!is_safe_filename("../../etc/passwd"));
        assert!(!is_safe_filename("..\\windows\\system32"));
        assert!(!is_safe_filename("a/../b.mp3"));
    }

    #[test]
    fn rejects_separators_and_empty() {
        assert!(!is_safe_filename("nested/file.mp3"));
        assert!(!is_safe_filename(""));
    }

    #[test]
    fn accepts_plain_filenames() {
        assert!(is_safe_filename("voice-1700000000000.mp3"));
        assert!(is_safe_filename("clip.mp4"));
    }
}
