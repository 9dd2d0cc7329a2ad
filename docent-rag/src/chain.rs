//! Priority-ordered provider selection with single-hop fallback.

use std::sync::Arc;

use tracing::{error, warn};

use crate::error::LlmError;
use crate::provider::{GenerateOptions, Generation, LlmProvider};

/// An ordered list of providers. Each call goes to the first provider; if it
/// fails and another provider is configured, exactly one retry is made
/// against the next in line. No unbounded retry chains.
pub struct ProviderChain {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl ProviderChain {
    pub fn new(primary: Arc<dyn LlmProvider>) -> Self {
        Self {
            providers: vec![primary],
        }
    }

    pub fn with_fallback(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Generate through the chain. Returns the completion and the name of
    /// the provider that produced it.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<(Generation, String), LlmError> {
        let mut providers = self.providers.iter();
        let Some(primary) = providers.next() else {
            return Err(LlmError::InvalidEndpoint("no providers configured".into()));
        };
        let primary_err = match primary.generate(prompt, options).await {
            Ok(generation) => return Ok((generation, primary.name().to_string())),
            Err(e) => e,
        };

        let Some(fallback) = providers.next() else {
            error!(provider = primary.name(), error = %primary_err, "provider failed, no fallback configured");
            return Err(primary_err);
        };
        warn!(
            provider = primary.name(),
            fallback = fallback.name(),
            error = %primary_err,
            "provider failed, retrying against fallback"
        );
        match fallback.generate(prompt, options).await {
            Ok(generation) => Ok((generation, fallback.name().to_string())),
            Err(fallback_err) => {
                error!(
                    provider = fallback.name(),
                    error = %fallback_err,
                    "fallback provider failed too"
                );
                Err(fallback_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn ok(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<Generation, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::EmptyResponse);
            }
            Ok(Generation {
                text: format!("answer from {}", self.name),
                model: "fake".to_string(),
                usage: None,
            })
        }

        async fn check(&self) -> Result<(), LlmError> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let primary = FakeProvider::ok("primary");
        let fallback = FakeProvider::ok("fallback");
        let chain = ProviderChain::new(primary.clone()).with_fallback(fallback.clone());

        let (generation, provider) = chain
            .generate("q", &GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(provider, "primary");
        assert_eq!(generation.text, "answer from primary");
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn failed_primary_falls_back_once() {
        let primary = FakeProvider::failing("primary");
        let fallback = FakeProvider::ok("fallback");
        let chain = ProviderChain::new(primary.clone()).with_fallback(fallback.clone());

        let (_, provider) = chain
            .generate("q", &GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(provider, "fallback");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn only_one_fallback_hop_is_attempted() {
        let primary = FakeProvider::failing("primary");
        let second = FakeProvider::failing("second");
        let third = FakeProvider::ok("third");
        let chain = ProviderChain::new(primary)
            .with_fallback(second.clone())
            .with_fallback(third.clone());

        let result = chain.generate("q", &GenerateOptions::default()).await;
        assert!(result.is_err());
        assert_eq!(second.calls(), 1);
        // The third provider is never consulted in the same call.
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn no_fallback_surfaces_primary_error() {
        let primary = FakeProvider::failing("primary");
        let chain = ProviderChain::new(primary.clone());
        let result = chain.generate("q", &GenerateOptions::default()).await;
        assert!(matches!(result, Err(LlmError::EmptyResponse)));
        assert_eq!(primary.calls(), 1);
    }
}
