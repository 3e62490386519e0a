// src/notify/opener.rs
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{RadarError, Result};

/// Opens an item link in a new browsing context.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}

pub type DynOpener = Arc<dyn LinkOpener>;

/// Only absolute http(s) links are handed to the OS.
pub fn validate_link(candidate: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(candidate.trim())
        .map_err(|e| RadarError::UpstreamFormat(format!("invalid link: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(RadarError::UpstreamFormat(format!(
            "unsupported link scheme: {other}"
        ))),
    }
}

/// Platform browser launcher (`open`, `xdg-open`, `cmd /C start`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemOpener;

#[async_trait]
impl LinkOpener for SystemOpener {
    async fn open(&self, url: &str) -> Result<()> {
        let url = validate_link(url)?;

        #[cfg(target_os = "macos")]
        let mut cmd = {
            let mut c = tokio::process::Command::new("open");
            c.arg(url.as_str());
            c
        };
        #[cfg(target_os = "windows")]
        let mut cmd = {
            let mut c = tokio::process::Command::new("cmd");
            c.arg("/C").arg("start").arg("").arg(url.as_str());
            c
        };
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let mut cmd = {
            let mut c = tokio::process::Command::new("xdg-open");
            c.arg(url.as_str());
            c
        };

        let status = cmd
            .status()
            .await
            .map_err(|e| RadarError::Network(format!("launch browser: {e}")))?;
        if !status.success() {
            return Err(RadarError::Network(format!("browser launcher exited with {status}")));
        }
        tracing::info!(target: "notify", url = %url, "opened link");
        Ok(())
    }
}

/// Records opened links instead of launching anything.
#[derive(Clone, Default)]
pub struct RecordingOpener {
    opened: Arc<Mutex<Vec<String>>>,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl LinkOpener for RecordingOpener {
    async fn open(&self, url: &str) -> Result<()> {
        let url = validate_link(url)?;
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_only() {
        assert!(validate_link("https://www.freelancer.com/projects/1").is_ok());
        assert!(validate_link("http://localhost/x").is_ok());
        assert!(validate_link("file:///etc/passwd").is_err());
        assert!(validate_link("not a url").is_err());
    }
}
