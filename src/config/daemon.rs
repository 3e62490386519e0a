// src/config/daemon.rs
//! Process-level settings read from TOML at startup.
//! Operator preferences (interval, credential, toggles) live in the key/value store instead.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DAEMON_CONFIG_PATH: &str = "config/bid_radar.toml";
pub const ENV_DAEMON_CONFIG_PATH: &str = "BID_RADAR_CONFIG_PATH";

fn default_listen() -> String {
    "127.0.0.1:7878".to_string()
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state/bid_radar.json")
}
fn default_listing_url() -> String {
    "https://www.freelancer.com/api/projects/0.1/projects/active/".to_string()
}
fn default_project_base_url() -> String {
    "https://www.freelancer.com/projects".to_string()
}
fn default_limit() -> u32 {
    30
}
fn default_excluded_currencies() -> Vec<String> {
    vec!["INR".to_string()]
}
fn default_retention() -> usize {
    500
}
fn default_api_base() -> String {
    "https://api.openai.com".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_max_concurrent() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub listing: ListingSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    /// Upper bound on persisted items; keeps the seen-set from growing without limit.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingSection {
    #[serde(default = "default_listing_url")]
    pub url: String,
    #[serde(default = "default_project_base_url")]
    pub project_base_url: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_excluded_currencies")]
    pub excluded_currencies: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            retention: default_retention(),
        }
    }
}

impl Default for ListingSection {
    fn default() -> Self {
        Self {
            url: default_listing_url(),
            project_base_url: default_project_base_url(),
            limit: default_limit(),
            excluded_currencies: default_excluded_currencies(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            storage: StorageSection::default(),
            listing: ListingSection::default(),
            generation: GenerationSection::default(),
        }
    }
}

impl DaemonConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading daemon config from {}", path.display()))?;
        Self::parse(&content)
    }

    /// Resolution order:
    /// 1) $BID_RADAR_CONFIG_PATH (must exist)
    /// 2) config/bid_radar.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_DAEMON_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_DAEMON_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let fallback = PathBuf::from(DEFAULT_DAEMON_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from_file(&fallback);
        }
        Ok(Self::default())
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut cfg: DaemonConfig = toml::from_str(s).context("parsing daemon config toml")?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        self.listing.limit = self.listing.limit.clamp(1, 100);
        self.listing.excluded_currencies = self
            .listing
            .excluded_currencies
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        self.listing.timeout_secs = self.listing.timeout_secs.max(1);
        self.generation.timeout_secs = self.generation.timeout_secs.max(1);
        self.generation.max_concurrent = self.generation.max_concurrent.max(1);
        self.storage.retention = self.storage.retention.max(self.listing.limit as usize);
        self.generation.api_base = self.generation.api_base.trim_end_matches('/').to_string();
        self.listing.project_base_url = self
            .listing
            .project_base_url
            .trim_end_matches('/')
            .to_string();
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing.timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }
}
