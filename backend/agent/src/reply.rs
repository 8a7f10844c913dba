//! MEDIA directive extraction from agent reply text.
//!
//! An agent reply that carries generated media points at it with a line of
//! the form `MEDIA: /tmp/voice-123.mp3` embedded in the payload text. Only
//! the first such line is honored; any later marker lines stay embedded in
//! the display text verbatim.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// A media-reference line: `MEDIA:` followed by a non-empty path, to the
/// end of that line.
static MEDIA_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)MEDIA:\s*\S.*$").unwrap());

/// A payload split into its display text and an optional local media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDirective {
    pub display_text: String,
    pub local_media_path: Option<PathBuf>,
}

/// Split a payload on its first `MEDIA:` line.
///
/// The matched line is removed from the display text and the remainder is
/// trimmed; without a marker the text passes through unchanged.
pub fn extract(text: &str) -> MediaDirective {
    match MEDIA_LINE.find(text) {
        Some(m) => {
            let path = m.as_str()["MEDIA:".len()..].trim();
            let mut display = String::with_capacity(text.len());
            display.push_str(&text[..m.start()]);
            display.push_str(&text[m.end()..]);
            MediaDirective {
                display_text: display.trim().to_string(),
                local_media_path: Some(PathBuf::from(path)),
            }
        }
        None => MediaDirective {
            display_text: text.to_string(),
            local_media_path: None,
        },
    }
}

/// [`extract`], then verify the referenced file actually exists.
///
/// A directive pointing at a missing file degrades to plain text; the
/// session must never crash over a stale path.
pub fn extract_checked(text: &str) -> MediaDirective {
    let mut directive = extract(text);
    if let Some(path) = &directive.local_media_path {
        if !path.exists() {
            warn!(path = %path.display(), "Reply referenced a missing media file, degrading to text");
            directive.local_media_path = None;
        }
    }
    directive
}
