//! Per-event dispatch: decode, route, reply.
//!
//! Every error raised inside a pipeline is converted to an `error`
//! outbound event right here; nothing unwinds past the dispatch boundary
//! and the session stays open.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

use clawbridge_agent::{AgentPayload, AgentReply, AgentRequest, ReplyMeta, extract_checked};
use clawbridge_core::{BridgeConfig, BridgeError, InboundEvent, OutboundEvent};
use clawbridge_media::{detect_mime_type, is_video};

use crate::server::RelayState;

/// Shown when stripping a directive leaves nothing to display.
const FALLBACK_REPLY_TEXT: &str = "(voice reply)";

/// Decode one text frame and run it through the pipeline. Parse failures
/// and pipeline errors both surface as `error` events.
pub async fn dispatch_message(
    text: &str,
    session_id: Uuid,
    state: &RelayState,
    out: &UnboundedSender<OutboundEvent>,
) {
    let event = match serde_json::from_str::<InboundEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(session = %session_id, error = %e, "Unrecognized inbound message");
            let _ = out.send(OutboundEvent::Error {
                message: format!("unrecognized message: {e}"),
            });
            return;
        }
    };

    if let Err(e) = handle_event(event, state, out).await {
        warn!(session = %session_id, error = %e, "Event pipeline failed");
        let _ = out.send(OutboundEvent::Error {
            message: e.user_message(),
        });
    }
}

/// Route one decoded event. `ping` never touches the agent; `snapshot`
/// and `voice` each trigger exactly one agent invocation.
pub async fn handle_event(
    event: InboundEvent,
    state: &RelayState,
    out: &UnboundedSender<OutboundEvent>,
) -> Result<(), BridgeError> {
    match event {
        InboundEvent::Ping => {
            let _ = out.send(OutboundEvent::Pong);
            Ok(())
        }
        InboundEvent::Voice { text } => {
            info!(chars = text.len(), "Voice message received");
            send_processing(state, out);

            let request = AgentRequest {
                target_channel: state.cfg.agent_target.clone(),
                prompt_text: format!("{}{}", state.cfg.voice_prompt_prefix, text),
                media: None,
                timeout_secs: state.cfg.agent_timeout_secs,
            };
            let reply = invoke_capped(state, &request).await?;
            emit_reply(&state.cfg, &reply, out);
            Ok(())
        }
        InboundEvent::Snapshot { data, .. } => {
            info!("Snapshot received");
            let path = state.snapshots.save(&data).await?;
            send_processing(state, out);

            // Image-edit paths need a URL any remote API can fetch; the
            // plain agent path reads straight from local disk.
            let media = if state.cfg.require_public_url {
                state.uploads.publish(&path).await?
            } else {
                path.display().to_string()
            };

            let request = AgentRequest {
                target_channel: state.cfg.agent_target.clone(),
                prompt_text: state.cfg.snapshot_prompt.clone(),
                media: Some(media),
                timeout_secs: state.cfg.agent_timeout_secs,
            };
            let reply = invoke_capped(state, &request).await?;
            emit_reply(&state.cfg, &reply, out);
            Ok(())
        }
    }
}

fn send_processing(state: &RelayState, out: &UnboundedSender<OutboundEvent>) {
    let who = state.cfg.character.as_deref().unwrap_or("Agent");
    let _ = out.send(OutboundEvent::Processing {
        message: format!("{who} is thinking..."),
    });
}

async fn invoke_capped(
    state: &RelayState,
    request: &AgentRequest,
) -> Result<AgentReply, BridgeError> {
    let _permit = state
        .agent_permits
        .acquire()
        .await
        .map_err(|_| anyhow::anyhow!("agent semaphore closed"))?;
    let reply = state.invoker.invoke(request).await?;
    info!(
        payloads = reply.payloads.len(),
        duration_ms = ?reply.meta.duration_ms,
        model = ?reply.meta.model,
        "Agent replied"
    );
    Ok(reply)
}

fn emit_reply(cfg: &BridgeConfig, reply: &AgentReply, out: &UnboundedSender<OutboundEvent>) {
    for payload in &reply.payloads {
        let _ = out.send(payload_event(cfg, payload, &reply.meta));
    }
}

/// Map one agent payload to its outbound event.
///
/// A payload with a valid local `MEDIA:` directive becomes a voice or
/// video reply served through the media routes; a payload carrying the
/// agent's own remote media URL becomes a video reply; anything else is
/// plain text.
pub fn payload_event(
    cfg: &BridgeConfig,
    payload: &AgentPayload,
    meta: &ReplyMeta,
) -> OutboundEvent {
    let directive = extract_checked(&payload.text);

    if let Some(path) = &directive.local_media_path {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "Directive path has no usable filename");
            return OutboundEvent::Message {
                text: payload.text.clone(),
            };
        };
        let url = cfg.media_url(filename);
        if is_video(detect_mime_type(path)) {
            return OutboundEvent::Video {
                url,
                character: cfg.character.clone(),
                duration: None,
            };
        }
        let text = if directive.display_text.is_empty() {
            FALLBACK_REPLY_TEXT.to_string()
        } else {
            directive.display_text
        };
        return OutboundEvent::Voice {
            text,
            audio_url: url,
        };
    }

    if let Some(url) = &payload.media_url {
        return OutboundEvent::Video {
            url: url.clone(),
            character: cfg.character.clone(),
            duration: meta.duration_ms,
        };
    }

    // No media survived extraction: plain text, with any stale directive
    // already stripped.
    OutboundEvent::Message {
        text: directive.display_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn stub_agent(dir: &Path, body: &str) -> String {
        let path = dir.join("agent-stub.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn state_with(cfg: BridgeConfig) -> RelayState {
        RelayState::new(Arc::new(cfg))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn ping_pongs_without_an_agent() {
        // A missing agent binary proves ping never reaches it.
        let state = state_with(BridgeConfig {
            agent_bin: "/nonexistent/agent".into(),
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_event(InboundEvent::Ping, &state, &tx).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], OutboundEvent::Pong));
    }

    #[tokio::test]
    async fn voice_event_round_trips_to_a_voice_reply() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("a.mp3");
        std::fs::write(&media, b"mp3").unwrap();

        // printf, not echo: dash's echo rewrites the \n escape inside the
        // JSON string into a real control character.
        let envelope = format!(
            r#"printf '%s' '{{"status":"ok","result":{{"payloads":[{{"text":"MEDIA: {}\nhey"}}],"meta":{{"durationMs":10}}}}}}'"#,
            media.display()
        );
        let cfg = BridgeConfig {
            agent_bin: stub_agent(dir.path(), &envelope),
            ..Default::default()
        };
        let expected_url = cfg.media_url("a.mp3");
        let state = state_with(cfg);
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_event(
            InboundEvent::Voice { text: "hi".into() },
            &state,
            &tx,
        )
        .await
        .unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], OutboundEvent::Processing { .. }));
        match &events[1] {
            OutboundEvent::Voice { text, audio_url } => {
                assert_eq!(text, "hey");
                assert_eq!(audio_url, &expected_url);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn agent_failure_becomes_an_error_event() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BridgeConfig {
            agent_bin: stub_agent(dir.path(), "echo 'model crashed'; exit 1"),
            ..Default::default()
        };
        let state = state_with(cfg);
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch_message(
            r#"{"type":"voice","text":"hi"}"#,
            Uuid::new_v4(),
            &state,
            &tx,
        )
        .await;

        let events = drain(&mut rx);
        assert!(matches!(events[0], OutboundEvent::Processing { .. }));
        assert!(matches!(events.last(), Some(OutboundEvent::Error { .. })));
    }

    #[tokio::test]
    async fn malformed_frame_becomes_an_error_event() {
        let state = state_with(BridgeConfig {
            agent_bin: "/nonexistent/agent".into(),
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch_message("{not json", Uuid::new_v4(), &state, &tx).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], OutboundEvent::Error { .. }));
    }

    #[test]
    fn plain_payload_maps_to_message() {
        let cfg = BridgeConfig::default();
        let payload = AgentPayload {
            text: "just words".into(),
            media_url: None,
        };
        let ev = payload_event(&cfg, &payload, &ReplyMeta::default());
        assert!(matches!(ev, OutboundEvent::Message { text } if text == "just words"));
    }

    #[test]
    fn remote_media_url_maps_to_video() {
        let cfg = BridgeConfig {
            character: Some("Pal".into()),
            ..Default::default()
        };
        let payload = AgentPayload {
            text: "look".into(),
            media_url: Some("https://cdn.example/v.mp4".into()),
        };
        let meta = ReplyMeta {
            duration_ms: Some(420),
            model: None,
        };
        match payload_event(&cfg, &payload, &meta) {
            OutboundEvent::Video {
                url,
                character,
                duration,
            } => {
                assert_eq!(url, "https://cdn.example/v.mp4");
                assert_eq!(character.as_deref(), Some("Pal"));
                assert_eq!(duration, Some(420));
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn video_directive_maps_to_video_event() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"mp4").unwrap();

        let cfg = BridgeConfig::default();
        let payload = AgentPayload {
            text: format!("MEDIA: {}", clip.display()),
            media_url: None,
        };
        match payload_event(&cfg, &payload, &ReplyMeta::default()) {
            OutboundEvent::Video { url, .. } => {
                assert_eq!(url, cfg.media_url("clip.mp4"));
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn stale_directive_degrades_to_plain_voice_text() {
        let cfg = BridgeConfig::default();
        let payload = AgentPayload {
            text: "hear me\nMEDIA: /nonexistent/gone.mp3".into(),
            media_url: None,
        };
        let ev = payload_event(&cfg, &payload, &ReplyMeta::default());
        assert!(matches!(ev, OutboundEvent::Message { text } if text == "hear me"));
    }
}
