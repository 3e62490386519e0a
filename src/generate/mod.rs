// src/generate/mod.rs
//! Bid text generation. Always yields text: a remote completion when a
//! credential is configured and the call succeeds, the fallback template
//! otherwise.

pub mod openai;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;

pub use openai::{CompletionProvider, CompletionRequest, OpenAiProvider};

use crate::config::{DaemonConfig, Preferences, Profile};
use crate::error::{RadarError, Result};

/// Where the returned text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidSource {
    Generated,
    NoCredential,
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub text: String,
    pub source: BidSource,
}

pub struct BidGenerator {
    provider: Arc<dyn CompletionProvider>,
    permits: Arc<Semaphore>,
    permit_wait: Duration,
}

impl BidGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, max_concurrent: usize, permit_wait: Duration) -> Self {
        Self {
            provider,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            permit_wait,
        }
    }

    pub fn from_config(cfg: &DaemonConfig) -> Result<Self> {
        let provider = OpenAiProvider::new(&cfg.generation.api_base, cfg.generation_timeout())?;
        Ok(Self::new(
            Arc::new(provider),
            cfg.generation.max_concurrent,
            cfg.generation_timeout(),
        ))
    }

    /// Text only; see [`BidGenerator::generate_bid`].
    pub async fn generate(&self, description: &str, prefs: &Preferences, profile: &Profile) -> String {
        self.generate_bid(description, prefs, profile).await.text
    }

    pub async fn generate_bid(&self, description: &str, prefs: &Preferences, profile: &Profile) -> Bid {
        counter!("generation_requests_total").increment(1);

        let api_key = prefs.resolved_api_key();
        if api_key.is_empty() {
            tracing::debug!(target: "generate", "no credential configured; using fallback");
            counter!("generation_fallback_total", "reason" => "no_credential").increment(1);
            return Bid {
                text: prefs.fallback_bid().to_string(),
                source: BidSource::NoCredential,
            };
        }

        match self.try_remote(description, prefs, profile, api_key).await {
            Ok(text) => Bid {
                text,
                source: BidSource::Generated,
            },
            Err(e) => {
                tracing::warn!(
                    target: "generate",
                    provider = self.provider.name(),
                    error = %e,
                    "generation failed; using fallback"
                );
                counter!("generation_fallback_total", "reason" => "failure").increment(1);
                Bid {
                    text: prefs.fallback_bid().to_string(),
                    source: BidSource::Fallback { reason: e.to_string() },
                }
            }
        }
    }

    async fn try_remote(
        &self,
        description: &str,
        prefs: &Preferences,
        profile: &Profile,
        api_key: String,
    ) -> Result<String> {
        let _permit = tokio::time::timeout(self.permit_wait, self.permits.acquire())
            .await
            .map_err(|_| RadarError::GenerationFailure("too many generations in flight".into()))?
            .map_err(|_| RadarError::GenerationFailure("generator closed".into()))?;

        let req = CompletionRequest {
            api_key,
            model: prefs.gpt_model.clone(),
            messages: prompt::build_messages(description, profile, &prefs.bid_condition),
            max_tokens: prompt::MAX_TOKENS,
            temperature: prompt::TEMPERATURE,
        };
        let started = std::time::Instant::now();
        let text = self.provider.complete(&req).await?;
        tracing::info!(
            target: "generate",
            provider = self.provider.name(),
            model = %req.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "bid generated"
        );
        Ok(text)
    }

    pub async fn validate_credential(&self, api_key: &str) -> bool {
        self.provider.validate_key(api_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Scripted {
        reply: Result<String>,
        seen: Mutex<Vec<CompletionRequest>>,
        hold: Option<Arc<tokio::sync::Notify>>,
    }

    impl Scripted {
        fn ok(s: &str) -> Self {
            Self {
                reply: Ok(s.into()),
                seen: Mutex::new(vec![]),
                hold: None,
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(&self, req: &CompletionRequest) -> Result<String> {
            self.seen.lock().push(req.clone());
            if let Some(h) = &self.hold {
                h.notified().await;
            }
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(RadarError::GenerationFailure("scripted".into())),
            }
        }
        async fn validate_key(&self, api_key: &str) -> bool {
            api_key == "sk-good"
        }
        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn prefs(key: &str, template: &str) -> Preferences {
        Preferences {
            api_key: key.into(),
            bid_template: template.into(),
            ..Preferences::default()
        }
    }

    #[tokio::test]
    async fn without_credential_returns_template_and_skips_remote() {
        let p = Arc::new(Scripted::ok("remote"));
        let g = BidGenerator::new(p.clone(), 2, Duration::from_secs(1));
        let bid = g.generate_bid("desc", &prefs("", "My template"), &Profile::default()).await;
        assert_eq!(bid.text, "My template");
        assert_eq!(bid.source, BidSource::NoCredential);
        assert!(p.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn remote_text_is_returned_with_request_shape() {
        let p = Arc::new(Scripted::ok("Hello client"));
        let g = BidGenerator::new(p.clone(), 2, Duration::from_secs(1));
        let mut pr = prefs("sk-1", "");
        pr.gpt_model = "gpt-4o-mini".into();
        let bid = g.generate_bid("desc", &pr, &Profile::default()).await;
        assert_eq!(bid.text, "Hello client");
        assert_eq!(bid.source, BidSource::Generated);
        let seen = p.seen.lock();
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].max_tokens, 1500);
        assert_eq!(seen[0].api_key, "sk-1");
    }

    #[tokio::test]
    async fn failure_falls_back_to_default_template_when_empty() {
        let p = Arc::new(Scripted {
            reply: Err(RadarError::GenerationFailure("x".into())),
            seen: Mutex::new(vec![]),
            hold: None,
        });
        let g = BidGenerator::new(p, 2, Duration::from_secs(1));
        let bid = g.generate_bid("desc", &prefs("sk-1", ""), &Profile::default()).await;
        assert_eq!(bid.text, crate::config::preferences::DEFAULT_BID_TEMPLATE);
        assert!(matches!(bid.source, BidSource::Fallback { .. }));
    }

    #[tokio::test]
    async fn saturated_generator_falls_back_after_permit_wait() {
        let hold = Arc::new(tokio::sync::Notify::new());
        let p = Arc::new(Scripted {
            reply: Ok("remote".into()),
            seen: Mutex::new(vec![]),
            hold: Some(hold.clone()),
        });
        let g = Arc::new(BidGenerator::new(p, 1, Duration::from_millis(50)));

        let busy = {
            let g = g.clone();
            tokio::spawn(async move { g.generate("a", &prefs("sk-1", "T"), &Profile::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = g.generate_bid("b", &prefs("sk-1", "T"), &Profile::default()).await;
        assert_eq!(second.text, "T");
        assert!(matches!(second.source, BidSource::Fallback { .. }));

        hold.notify_one();
        assert_eq!(busy.await.unwrap(), "remote");
    }

    #[tokio::test]
    async fn validate_credential_delegates() {
        let g = BidGenerator::new(Arc::new(Scripted::ok("x")), 1, Duration::from_secs(1));
        assert!(g.validate_credential("sk-good").await);
        assert!(!g.validate_credential("sk-bad").await);
    }
}
