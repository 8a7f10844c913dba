//! Agent invocation over a bounded-time subprocess.
//!
//! The external agent is opaque beyond its CLI contract: it takes a target
//! channel, a message, an optional media path, and a timeout, and prints
//! exactly one JSON result envelope on stdout.

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use clawbridge_core::BridgeError;

/// One agent invocation. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub target_channel: String,
    pub prompt_text: String,
    /// Local file path, or a published URL when the request needed one.
    pub media: Option<String>,
    pub timeout_secs: u64,
}

/// A parsed, validated agent reply.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub payloads: Vec<AgentPayload>,
    pub meta: ReplyMeta,
}

#[derive(Debug, Clone)]
pub struct AgentPayload {
    pub text: String,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplyMeta {
    pub duration_ms: Option<u64>,
    pub model: Option<String>,
}

// Wire shape of the envelope the agent prints with `--json`.

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    result: Option<EnvelopeResult>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResult {
    #[serde(default)]
    payloads: Vec<EnvelopePayload>,
    #[serde(default)]
    meta: Option<EnvelopeMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopePayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeMeta {
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    agent_meta: Option<EnvelopeAgentMeta>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeAgentMeta {
    #[serde(default)]
    model: Option<String>,
}

/// Spawns the agent binary once per inbound event. No queueing, no
/// deduplication: concurrent sessions each get their own subprocess.
#[derive(Debug, Clone)]
pub struct AgentInvoker {
    bin: String,
}

impl AgentInvoker {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Run one invocation under a hard wall-clock bound.
    ///
    /// On expiry the output future is dropped, which kills the child
    /// (`kill_on_drop`); the invocation fails with `AgentTimeout`.
    pub async fn invoke(&self, req: &AgentRequest) -> Result<AgentReply, BridgeError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("agent")
            .arg("--to")
            .arg(&req.target_channel)
            .arg("--message")
            .arg(&req.prompt_text);
        if let Some(media) = &req.media {
            cmd.arg("--media").arg(media);
        }
        cmd.arg("--json")
            .arg("--timeout")
            .arg(req.timeout_secs.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            target = %req.target_channel,
            media = ?req.media,
            timeout_secs = req.timeout_secs,
            "Invoking agent"
        );

        let wall = Duration::from_secs(req.timeout_secs);
        let output = match timeout(wall, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                anyhow::anyhow!("failed to run agent binary {}: {e}", self.bin)
            })?,
            Err(_) => return Err(BridgeError::AgentTimeout(req.timeout_secs)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::AgentProtocol {
                reason: format!("agent exited with {}: {}", output.status, stderr.trim()),
                raw: stdout,
            });
        }

        parse_envelope(&stdout)
    }
}

/// Parse the agent's stdout into a validated reply.
///
/// Malformed output is expected occasionally from a live external process;
/// the raw text always travels with the error for diagnostics.
pub fn parse_envelope(stdout: &str) -> Result<AgentReply, BridgeError> {
    let envelope: Envelope =
        serde_json::from_str(stdout.trim()).map_err(|e| BridgeError::AgentProtocol {
            reason: e.to_string(),
            raw: stdout.to_string(),
        })?;

    if envelope.status != "ok" {
        return Err(BridgeError::AgentStatus(envelope.status));
    }

    let result = envelope.result.unwrap_or(EnvelopeResult {
        payloads: Vec::new(),
        meta: None,
    });

    let payloads: Vec<AgentPayload> = result
        .payloads
        .into_iter()
        .filter_map(|p| {
            let text = p.text?;
            Some(AgentPayload {
                text,
                media_url: p.media_url,
            })
        })
        .collect();

    // An ok envelope with nothing to say is still a failed exchange.
    if payloads.is_empty() {
        return Err(BridgeError::AgentStatus("ok (empty payloads)".to_string()));
    }

    let meta = result
        .meta
        .map(|m| ReplyMeta {
            duration_ms: m.duration_ms,
            model: m.agent_meta.and_then(|a| a.model),
        })
        .unwrap_or_default();

    debug!(payloads = payloads.len(), model = ?meta.model, "Agent reply parsed");
    Ok(AgentReply { payloads, meta })
}
