// src/generate/openai.rs
//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompt::ChatMessage;
use crate::error::{RadarError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    #[serde(skip)]
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Low-level provider: one remote call, no fallback. Kept separate so the
/// generator's fallback path can be driven by test doubles.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<String>;
    /// True when the credential is accepted by the service.
    async fn validate_key(&self, api_key: &str) -> bool;
    fn name(&self) -> &'static str;
}

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_base: String,
}

impl OpenAiProvider {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("bid-radar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .map_err(|e| RadarError::Network(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMsg>,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

/// Pull `choices[0].message.content`; absent or blank is a failure.
fn extract_content(body: &str) -> Result<String> {
    let resp: Resp = serde_json::from_str(body)
        .map_err(|e| RadarError::GenerationFailure(format!("response is not JSON: {e}")))?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| RadarError::GenerationFailure("missing choices[0].message.content".into()))
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<String> {
        if req.api_key.is_empty() {
            return Err(RadarError::CredentialMissing);
        }
        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.api_base))
            .bearer_auth(&req.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| RadarError::Network(format!("chat completions: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RadarError::Network(format!("chat completions body: {e}")))?;
        if !status.is_success() {
            return Err(RadarError::GenerationFailure(format!(
                "chat completions returned {status}"
            )));
        }
        extract_content(&body)
    }

    async fn validate_key(&self, api_key: &str) -> bool {
        if api_key.trim().is_empty() {
            return false;
        }
        match self
            .http
            .get(format!("{}/v1/models", self.api_base))
            .bearer_auth(api_key.trim())
            .send()
            .await
        {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::warn!(target: "generate", error = %e, "credential validation request failed");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hi there");
    }

    #[test]
    fn missing_or_blank_content_is_failure() {
        for body in [
            r#"{}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{}]}"#,
            r#"{"choices":[{"message":{"content":"  "}}]}"#,
            r#"{"error":{"message":"bad key"}}"#,
        ] {
            assert!(
                matches!(extract_content(body), Err(RadarError::GenerationFailure(_))),
                "body should fail: {body}"
            );
        }
    }

    #[test]
    fn request_body_omits_credential() {
        let req = CompletionRequest {
            api_key: "sk-secret".into(),
            model: "gpt-3.5-turbo".into(),
            messages: vec![],
            max_tokens: 1500,
            temperature: 0.7,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("api_key").is_none());
        assert_eq!(v["max_tokens"], 1500);
    }
}
