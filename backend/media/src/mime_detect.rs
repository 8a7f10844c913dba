//! MIME type detection for served media files.

use std::path::Path;

/// Detect MIME type by file extension. The agent mostly produces MP3
/// speech and MP4 clips; everything else falls through to octet-stream.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "opus" => "audio/opus",

        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",

        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",

        _ => "application/octet-stream",
    }
}

/// Whether a MIME type is for audio.
pub fn is_audio(mime: &str) -> bool {
    mime.starts_with("audio/")
}

/// Whether a MIME type is for video.
pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_mp3() {
        assert_eq!(detect_mime_type(&PathBuf::from("voice.mp3")), "audio/mpeg");
    }

    #[test]
    fn detects_mp4() {
        assert_eq!(detect_mime_type(&PathBuf::from("clip.MP4")), "video/mp4");
    }

    #[test]
    fn unknown_extension_fallback() {
        assert_eq!(
            detect_mime_type(&PathBuf::from("file.xyz")),
            "application/octet-stream"
        );
    }
}
