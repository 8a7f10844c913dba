//! Ordered fallback across public upload providers.
//!
//! Providers are tried strictly in order; the first well-formed absolute
//! URL wins. Every failure is recorded so an exhausted chain can report
//! exactly what went wrong at each hop.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio::time::timeout;
use tracing::{info, warn};

use clawbridge_core::{BridgeError, ProviderFailure};

use crate::providers::{Catbox, TmpFiles, UploadProvider, ZeroXZero};

pub struct UploadChain {
    providers: Vec<Box<dyn UploadProvider>>,
    attempt_timeout: Duration,
}

impl UploadChain {
    pub fn new(providers: Vec<Box<dyn UploadProvider>>, attempt_timeout: Duration) -> Self {
        Self {
            providers,
            attempt_timeout,
        }
    }

    /// The stock provider order: 0x0.st, catbox.moe, tmpfiles.org.
    pub fn with_default_providers(attempt_timeout: Duration) -> Self {
        let client = Client::new();
        Self::new(
            vec![
                Box::new(ZeroXZero::new(client.clone())),
                Box::new(Catbox::new(client.clone())),
                Box::new(TmpFiles::new(client)),
            ],
            attempt_timeout,
        )
    }

    /// Push a local file to the first provider that accepts it.
    ///
    /// Each attempt is independently time-bounded; a hung provider costs at
    /// most `attempt_timeout` before the chain moves on. No provider is
    /// tried twice within one call.
    pub async fn publish(&self, path: &Path) -> Result<String, BridgeError> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match timeout(self.attempt_timeout, provider.upload(path)).await {
                Ok(Ok(url)) if is_absolute_url(&url) => {
                    info!(provider = provider.name(), url = %url, "Upload published");
                    return Ok(url);
                }
                Ok(Ok(url)) => {
                    warn!(provider = provider.name(), body = %url, "Provider returned a non-URL body");
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        reason: format!("response is not an absolute URL: {url}"),
                    });
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "Upload attempt failed");
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(provider = provider.name(), "Upload attempt timed out");
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        reason: format!("timed out after {:?}", self.attempt_timeout),
                    });
                }
            }
        }

        Err(BridgeError::AllProvidersExhausted { failures })
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysFails(&'static str);

    #[async_trait]
    impl UploadProvider for AlwaysFails {
        fn name(&self) -> &str {
            self.0
        }
        async fn upload(&self, _path: &Path) -> Result<String, BridgeError> {
            Err(BridgeError::Upload {
                provider: self.0.to_string(),
                reason: "HTTP 503".to_string(),
            })
        }
    }

    struct AlwaysSucceeds(&'static str);

    #[async_trait]
    impl UploadProvider for AlwaysSucceeds {
        fn name(&self) -> &str {
            "good"
        }
        async fn upload(&self, _path: &Path) -> Result<String, BridgeError> {
            Ok(self.0.to_string())
        }
    }

    struct Hangs;

    #[async_trait]
    impl UploadProvider for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }
        async fn upload(&self, _path: &Path) -> Result<String, BridgeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn third_provider_wins_after_two_failures() {
        let chain = UploadChain::new(
            vec![
                Box::new(AlwaysFails("a")),
                Box::new(AlwaysFails("b")),
                Box::new(AlwaysSucceeds("https://files.example/x.jpg")),
            ],
            Duration::from_secs(5),
        );
        let url = chain.publish(Path::new("/tmp/nothing")).await.unwrap();
        assert_eq!(url, "https://files.example/x.jpg");
    }

    #[tokio::test]
    async fn exhausted_chain_records_every_failure() {
        let chain = UploadChain::new(
            vec![Box::new(AlwaysFails("a")), Box::new(AlwaysFails("b"))],
            Duration::from_secs(5),
        );
        let err = chain.publish(Path::new("/tmp/nothing")).await.unwrap_err();
        match err {
            BridgeError::AllProvidersExhausted { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].provider, "a");
                assert_eq!(failures[1].provider, "b");
            }
            other => panic!("wrong error: {other}"),
        }
    }

    #[tokio::test]
    async fn hung_provider_does_not_block_the_chain() {
        let chain = UploadChain::new(
            vec![
                Box::new(Hangs),
                Box::new(AlwaysSucceeds("https://files.example/y.jpg")),
            ],
            Duration::from_millis(50),
        );
        let url = chain.publish(Path::new("/tmp/nothing")).await.unwrap();
        assert_eq!(url, "https://files.example/y.jpg");
    }

    #[tokio::test]
    async fn non_url_response_counts_as_failure() {
        let chain = UploadChain::new(
            vec![Box::new(AlwaysSucceeds("internal error"))],
            Duration::from_secs(5),
        );
        let err = chain.publish(Path::new("/tmp/nothing")).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::AllProvidersExhausted { failures } if failures.len() == 1
        ));
    }
}
