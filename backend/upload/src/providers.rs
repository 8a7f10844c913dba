//! Public upload providers.
//!
//! Each provider is an unauthenticated multipart file host with its own
//! response shape, so each gets its own parsing adapter. Providers report
//! failures as `BridgeError::Upload`; the chain decides what happens next.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, header::USER_AGENT, multipart};
use serde::Deserialize;

use clawbridge_core::BridgeError;

const BRIDGE_USER_AGENT: &str = "clawbridge/0.1";

/// One public file host in the fallback chain.
#[async_trait]
pub trait UploadProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Upload a local file and return its publicly reachable URL.
    async fn upload(&self, path: &Path) -> Result<String, BridgeError>;
}

fn upload_err(provider: &str, reason: impl Into<String>) -> BridgeError {
    BridgeError::Upload {
        provider: provider.to_string(),
        reason: reason.into(),
    }
}

async fn file_part(provider: &str, path: &Path) -> Result<multipart::Part, BridgeError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| upload_err(provider, format!("read {}: {e}", path.display())))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    Ok(multipart::Part::bytes(bytes).file_name(filename))
}

/// `0x0.st`: multipart `file` field, bare URL in the response body.
pub struct ZeroXZero {
    client: Client,
    base_url: String,
}

impl ZeroXZero {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://0x0.st".to_string(),
        }
    }
}

#[async_trait]
impl UploadProvider for ZeroXZero {
    fn name(&self) -> &str {
        "0x0.st"
    }

    async fn upload(&self, path: &Path) -> Result<String, BridgeError> {
        let form = multipart::Form::new().part("file", file_part(self.name(), path).await?);
        let resp = self
            .client
            .post(&self.base_url)
            // 0x0.st rejects requests without an identifying agent.
            .header(USER_AGENT, BRIDGE_USER_AGENT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| upload_err(self.name(), e.to_string()))?;

        if !resp.status().is_success() {
            return Err(upload_err(self.name(), format!("HTTP {}", resp.status())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| upload_err(self.name(), e.to_string()))?;
        Ok(body.trim().to_string())
    }
}

/// `catbox.moe`: multipart with a `reqtype` selector, bare URL body.
pub struct Catbox {
    client: Client,
    base_url: String,
}

impl Catbox {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://catbox.moe/user/api.php".to_string(),
        }
    }
}

#[async_trait]
impl UploadProvider for Catbox {
    fn name(&self) -> &str {
        "catbox.moe"
    }

    async fn upload(&self, path: &Path) -> Result<String, BridgeError> {
        let form = multipart::Form::new()
            .text("reqtype", "fileupload")
            .part("fileToUpload", file_part(self.name(), path).await?);
        let resp = self
            .client
            .post(&self.base_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| upload_err(self.name(), e.to_string()))?;

        if !resp.status().is_success() {
            return Err(upload_err(self.name(), format!("HTTP {}", resp.status())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| upload_err(self.name(), e.to_string()))?;
        Ok(body.trim().to_string())
    }
}

/// `tmpfiles.org`: multipart `file` field, JSON envelope response. The
/// envelope's `url` is a landing page; the direct download lives under
/// the `/dl/` prefix.
pub struct TmpFiles {
    client: Client,
    base_url: String,
}

impl TmpFiles {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://tmpfiles.org/api/v1/upload".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmpFilesEnvelope {
    status: String,
    data: TmpFilesData,
}

#[derive(Debug, Deserialize)]
struct TmpFilesData {
    url: String,
}

/// Parse the tmpfiles envelope and rewrite the page URL into the direct
/// download URL.
pub fn parse_tmpfiles_response(body: &str) -> Result<String, String> {
    let envelope: TmpFilesEnvelope =
        serde_json::from_str(body).map_err(|e| format!("bad envelope: {e}"))?;
    if envelope.status != "success" {
        return Err(format!("status {}", envelope.status));
    }
    Ok(envelope
        .data
        .url
        .replacen("tmpfiles.org/", "tmpfiles.org/dl/", 1))
}

#[async_trait]
impl UploadProvider for TmpFiles {
    fn name(&self) -> &str {
        "tmpfiles.org"
    }

    async fn upload(&self, path: &Path) -> Result<String, BridgeError> {
        let form = multipart::Form::new().part("file", file_part(self.name(), path).await?);
        let resp = self
            .client
            .post(&self.base_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| upload_err(self.name(), e.to_string()))?;

        if !resp.status().is_success() {
            return Err(upload_err(self.name(), format!("HTTP {}", resp.status())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| upload_err(self.name(), e.to_string()))?;
        parse_tmpfiles_response(&body).map_err(|reason| upload_err(self.name(), reason))
    }
}
