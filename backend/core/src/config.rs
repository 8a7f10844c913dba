use serde::Deserialize;

/// ClawBridge runtime configuration.
///
/// Built once at startup and passed to each component at construction;
/// no ambient process-wide state.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// WebSocket/HTTP server bind address
    pub bind_address: String,
    /// WebSocket/HTTP server port
    pub port: u16,
    /// Externally reachable base URL for media links; defaults to
    /// `http://localhost:<port>` when unset
    pub public_base_url: Option<String>,
    /// Directory inbound snapshots are written to
    pub snapshot_dir: String,
    /// Directory the media server resolves filenames against
    pub media_dir: String,
    /// Agent executable invoked per inbound event
    pub agent_bin: String,
    /// Channel identifier passed to the agent via `--to`
    pub agent_target: String,
    /// Hard wall-clock bound on a single agent invocation, seconds
    pub agent_timeout_secs: u64,
    /// Cap on concurrently running agent subprocesses
    pub max_concurrent_agents: usize,
    /// Whether snapshots must be published to a public URL before the
    /// agent sees them (image-edit paths), rather than passed as a local path
    pub require_public_url: bool,
    /// Per-provider timeout for one upload attempt, seconds
    pub upload_attempt_timeout_secs: u64,
    /// Prompt sent alongside a snapshot
    pub snapshot_prompt: String,
    /// Prefix prepended to a spoken utterance before it reaches the agent
    pub voice_prompt_prefix: String,
    /// Character name attached to video replies
    pub character: Option<String>,
    /// Upstream gateway WebSocket URL
    pub gateway_url: String,
    /// Optional bearer token forwarded to the gateway
    pub gateway_token: Option<String>,
    /// Log level
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8765,
            public_base_url: None,
            snapshot_dir: "/tmp/clawbridge-snapshots".to_string(),
            media_dir: "/tmp".to_string(),
            agent_bin: "openclaw".to_string(),
            agent_target: "#general".to_string(),
            agent_timeout_secs: 60,
            max_concurrent_agents: 4,
            require_public_url: false,
            upload_attempt_timeout_secs: 30,
            snapshot_prompt: "You are looking at a live camera snapshot of the user. \
                              Give them a warm, brief reaction."
                .to_string(),
            voice_prompt_prefix: "send a voice message: ".to_string(),
            character: None,
            gateway_url: "ws://localhost:18789".to_string(),
            gateway_token: None,
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: std::env::var("CLAWBRIDGE_BIND").unwrap_or(defaults.bind_address),
            port: std::env::var("CLAWBRIDGE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            public_base_url: std::env::var("CLAWBRIDGE_PUBLIC_URL").ok(),
            snapshot_dir: std::env::var("CLAWBRIDGE_SNAPSHOT_DIR").unwrap_or(defaults.snapshot_dir),
            media_dir: std::env::var("CLAWBRIDGE_MEDIA_DIR").unwrap_or(defaults.media_dir),
            agent_bin: std::env::var("CLAWBRIDGE_AGENT_BIN").unwrap_or(defaults.agent_bin),
            agent_target: std::env::var("CLAWBRIDGE_CHANNEL").unwrap_or(defaults.agent_target),
            agent_timeout_secs: std::env::var("CLAWBRIDGE_AGENT_TIMEOUT")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.agent_timeout_secs),
            max_concurrent_agents: std::env::var("CLAWBRIDGE_MAX_AGENTS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.max_concurrent_agents),
            require_public_url: std::env::var("CLAWBRIDGE_REQUIRE_PUBLIC_URL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.require_public_url),
            upload_attempt_timeout_secs: std::env::var("CLAWBRIDGE_UPLOAD_TIMEOUT")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.upload_attempt_timeout_secs),
            snapshot_prompt: std::env::var("CLAWBRIDGE_SNAPSHOT_PROMPT")
                .unwrap_or(defaults.snapshot_prompt),
            voice_prompt_prefix: std::env::var("CLAWBRIDGE_VOICE_PREFIX")
                .unwrap_or(defaults.voice_prompt_prefix),
            character: std::env::var("CLAWBRIDGE_CHARACTER").ok(),
            gateway_url: std::env::var("CLAWBRIDGE_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            gateway_token: std::env::var("CLAWBRIDGE_GATEWAY_TOKEN").ok(),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Public URL under which the media server exposes `filename`.
    pub fn media_url(&self, filename: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/media/{}", base.trim_end_matches('/'), filename),
            None => format!("http://localhost:{}/media/{}", self.port, filename),
        }
    }
}
