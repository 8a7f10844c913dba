use thiserror::Error;

/// A single failed upload attempt, kept for diagnostics when the whole
/// chain is exhausted.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Top-level error type for the ClawBridge relay.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("upload via {provider} failed: {reason}")]
    Upload { provider: String, reason: String },

    #[error("all upload providers failed: {failures:?}")]
    AllProvidersExhausted { failures: Vec<ProviderFailure> },

    #[error("agent timed out after {0}s")]
    AgentTimeout(u64),

    #[error("agent output was not a valid result envelope: {reason}")]
    AgentProtocol { reason: String, raw: String },

    #[error("agent returned status \"{0}\"")]
    AgentStatus(String),

    #[error("gateway handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    /// The message surfaced to the browser in an `error` outbound event.
    /// Exhausted upload chains include every per-provider reason so the
    /// failure is diagnosable from the client side alone.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::AllProvidersExhausted { failures } => {
                let detail: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
                format!("all upload providers failed: [{}]", detail.join("; "))
            }
            BridgeError::AgentProtocol { reason, raw } => {
                format!("agent output unparseable ({reason}); raw output: {raw}")
            }
            other => other.to_string(),
        }
    }
}
