// src/ingest/providers/freelancer.rs
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;

use crate::config::DaemonConfig;
use crate::error::{RadarError, Result};
use crate::ingest::types::{BidStats, Budget, Country, Currency, Item, ItemId, ListingSource};
use crate::ingest::{filter_excluded, normalize_text};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<ResultBody>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    projects: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: ItemId,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    currency: Option<Currency>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    budget: Option<Budget>,
    #[serde(default)]
    country: Option<Country>,
    #[serde(default)]
    bid_stats: Option<BidStats>,
    #[serde(default)]
    preview_description: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    seo_url: Option<String>,
}

impl RawProject {
    fn into_item(self, project_base_url: &str) -> Item {
        let preview = self
            .preview_description
            .filter(|s| !s.trim().is_empty())
            .or(self.description)
            .unwrap_or_default();
        let path = self
            .seo_url
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.id.to_string());
        Item {
            link: format!("{project_base_url}/{}", path.trim_start_matches('/')),
            id: self.id,
            kind: self.kind.unwrap_or_default(),
            currency: self.currency.unwrap_or_default(),
            title: normalize_text(&self.title.unwrap_or_default()),
            budget: self.budget.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
            bid_stats: self.bid_stats.unwrap_or_default(),
            preview_description: normalize_text(&preview),
            is_new: false,
        }
    }
}

/// Parse an upstream body into normalized items (unfiltered).
///
/// A missing or null `result.projects` is an empty listing. Individual records
/// that do not carry a usable id are skipped rather than failing the batch.
pub fn parse_listing(body: &str, project_base_url: &str) -> Result<Vec<Item>> {
    let env: Envelope = serde_json::from_str(body)
        .map_err(|e| RadarError::UpstreamFormat(format!("listing body is not JSON: {e}")))?;
    let raw = env.result.and_then(|r| r.projects).unwrap_or_default();

    let mut out = Vec::with_capacity(raw.len());
    for v in raw {
        match serde_json::from_value::<RawProject>(v) {
            Ok(p) => out.push(p.into_item(project_base_url)),
            Err(e) => tracing::debug!(target: "ingest", error = %e, "skipping malformed project record"),
        }
    }
    Ok(out)
}

pub struct FreelancerProvider {
    mode: Mode,
    project_base_url: String,
    excluded_currencies: Vec<String>,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        limit: u32,
        client: reqwest::Client,
    },
}

impl FreelancerProvider {
    pub fn from_config(cfg: &DaemonConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bid-radar/", env!("CARGO_PKG_VERSION")))
            .timeout(cfg.listing_timeout())
            .build()
            .map_err(|e| RadarError::Network(format!("http client: {e}")))?;
        Ok(Self {
            mode: Mode::Http {
                url: cfg.listing.url.clone(),
                limit: cfg.listing.limit,
                client,
            },
            project_base_url: cfg.listing.project_base_url.clone(),
            excluded_currencies: cfg.listing.excluded_currencies.clone(),
        })
    }

    /// Serve a fixed body instead of calling upstream.
    pub fn from_fixture(body: &str, project_base_url: &str, excluded: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            project_base_url: project_base_url.trim_end_matches('/').to_string(),
            excluded_currencies: excluded,
        }
    }

    fn finish(&self, body: &str) -> Result<Vec<Item>> {
        let items = parse_listing(body, &self.project_base_url)?;
        let (kept, dropped) = filter_excluded(items, &self.excluded_currencies);
        counter!("listing_excluded_total").increment(dropped as u64);
        Ok(kept)
    }
}

#[async_trait]
impl ListingSource for FreelancerProvider {
    async fn fetch_listing(&self) -> Result<Vec<Item>> {
        match &self.mode {
            Mode::Fixture(s) => self.finish(s),
            Mode::Http { url, limit, client } => {
                let resp = client
                    .get(url.as_str())
                    .query(&[("limit", *limit)])
                    .send()
                    .await
                    .map_err(|e| RadarError::Network(format!("listing get: {e}")))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(RadarError::Network(format!("listing returned {status}")));
                }
                let body = resp
                    .text()
                    .await
                    .map_err(|e| RadarError::Network(format!("listing body: {e}")))?;
                self.finish(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "freelancer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.freelancer.com/projects";

    #[test]
    fn missing_or_null_projects_is_empty_listing() {
        assert!(parse_listing(r#"{}"#, BASE).unwrap().is_empty());
        assert!(parse_listing(r#"{"result": null}"#, BASE).unwrap().is_empty());
        assert!(parse_listing(r#"{"result": {"projects": null}}"#, BASE)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn non_json_body_is_format_error() {
        let err = parse_listing("<html>busy</html>", BASE).unwrap_err();
        assert!(matches!(err, RadarError::UpstreamFormat(_)));
    }

    #[test]
    fn fallbacks_for_description_and_path() {
        let body = r#"{"result": {"projects": [
            {"id": 7, "title": "No seo", "description": "Full text"},
            {"id": 8, "title": "Seo", "seo_url": "python/scraper-8", "preview_description": "Short"}
        ]}}"#;
        let items = parse_listing(body, BASE).unwrap();
        assert_eq!(items[0].link, "https://www.freelancer.com/projects/7");
        assert_eq!(items[0].preview_description, "Full text");
        assert_eq!(items[1].link, "https://www.freelancer.com/projects/python/scraper-8");
        assert_eq!(items[1].preview_description, "Short");
    }

    #[test]
    fn record_without_id_is_skipped() {
        let body = r#"{"result": {"projects": [{"title": "ghost"}, {"id": 1}]}}"#;
        let items = parse_listing(body, BASE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, ItemId::from(1));
    }

    #[tokio::test]
    async fn fixture_mode_applies_currency_exclusion() {
        let body = r#"{"result": {"projects": [
            {"id": 1, "currency": {"code": "INR", "sign": "₹"}},
            {"id": 2, "currency": {"code": "USD", "sign": "$"}}
        ]}}"#;
        let p = FreelancerProvider::from_fixture(body, BASE, vec!["INR".into()]);
        let items = p.fetch_listing().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, ItemId::from(2));
    }
}
