//! Browser-facing WebSocket event schema.
//!
//! One JSON object per logical event, discriminated by `type`. The inbound
//! and outbound sets are distinct unions; both sides of a `voice` exchange
//! share the tag but not the shape.

use serde::{Deserialize, Serialize};

/// Messages the browser sends to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A camera snapshot: raw base64 or a full `data:image/*;base64,` URI.
    Snapshot {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// A spoken utterance, already transcribed client-side.
    Voice { text: String },
    /// Keep-alive probe; answered synchronously, never reaches the agent.
    Ping,
}

/// Messages the bridge sends to the browser. Each is addressed to exactly
/// one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Connected { message: String },
    Processing { message: String },
    /// A narrated reply with synthesized speech.
    #[serde(rename_all = "camelCase")]
    Voice { text: String, audio_url: String },
    /// A plain text reply with no attached media.
    Message { text: String },
    /// A reply whose media is a generated video clip.
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
    Error { message: String },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inbound_snapshot_decodes() {
        let msg = r#"{"type":"snapshot","data":"aGVsbG8=","timestamp":1700000000000}"#;
        let ev: InboundEvent = serde_json::from_str(msg).unwrap();
        match ev {
            InboundEvent::Snapshot { data, timestamp } => {
                assert_eq!(data, "aGVsbG8=");
                assert_eq!(timestamp, Some(1_700_000_000_000));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn inbound_ping_decodes_without_fields() {
        let ev: InboundEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ev, InboundEvent::Ping));
    }

    #[test]
    fn unknown_inbound_type_is_an_error() {
        assert!(serde_json::from_str::<InboundEvent>(r#"{"type":"transcribe"}"#).is_err());
    }

    #[test]
    fn outbound_voice_uses_camel_case_audio_url() {
        let ev = OutboundEvent::Voice {
            text: "hey".into(),
            audio_url: "http://localhost:8765/media/a.mp3".into(),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "voice",
                "text": "hey",
                "audioUrl": "http://localhost:8765/media/a.mp3"
            })
        );
    }

    #[test]
    fn outbound_video_omits_absent_fields() {
        let ev = OutboundEvent::Video {
            url: "http://localhost:8765/media/clip.mp4".into(),
            character: None,
            duration: None,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            v,
            json!({"type": "video", "url": "http://localhost:8765/media/clip.mp4"})
        );
    }

    #[test]
    fn outbound_pong_is_bare() {
        let v = serde_json::to_value(OutboundEvent::Pong).unwrap();
        assert_eq!(v, json!({"type": "pong"}));
    }
}
