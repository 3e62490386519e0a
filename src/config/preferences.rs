// src/config/preferences.rs
//! Operator preferences and user profile as persisted in the key/value store.
//! Field names match the stored JSON layout; every field defaults so older
//! records keep loading after new fields are added.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Poll interval floor in seconds.
pub const MIN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const DEFAULT_BID_CONDITION: &str = "Please write a winning bid that is attentive, flawless, courteous, engaging, and technical.
Provide a winning bid that would make the client eager to hire me, ensuring all aspects are covered.\n\n";

/// Built-in fallback used when the configured template is empty.
pub const DEFAULT_BID_TEMPLATE: &str = "Hello, I hope you're doing well.\n
I believe I am the best candidate for this project because I bring combination of proven experience, technical expertise, and strong attention to detail.\n
I have successfully completed similar projects in the past, which means I understand the challenges and how to solve them efficiently.\n
My focus is always delivering high-quality result, meeting deadlines, and ensuring smooth communication throughout the project.\n
I am committed to not only meeting your requirements but also adding value by suggesting improvements when possible.\n
Looking forward to working with you for the long term.\n
Best regards,\n
[Your Name]";

fn default_interval() -> u64 {
    MIN_INTERVAL_SECS
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_bid_condition() -> String {
    DEFAULT_BID_CONDITION.to_string()
}
fn default_bid_template() -> String {
    DEFAULT_BID_TEMPLATE.to_string()
}

/// A field of the wrong type falls back to its own default instead of
/// failing the whole record.
fn lenient<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let v = Value::deserialize(d)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

fn lenient_or<'de, D, T>(d: D, fallback: fn() -> T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = Value::deserialize(d)?;
    Ok(serde_json::from_value(v).unwrap_or_else(|_| fallback()))
}

fn lenient_model<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient_or(d, default_model)
}
fn lenient_bid_condition<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient_or(d, default_bid_condition)
}
fn lenient_bid_template<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient_or(d, default_bid_template)
}

/// Seconds as stored by the options form: any number or numeric string.
/// Negative values floor at zero; `normalized` applies the real minimum.
fn interval_secs<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let secs = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(match secs {
        Some(s) if s.is_finite() => s.max(0.0) as u64,
        _ => default_interval(),
    })
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_interval", deserialize_with = "interval_secs")]
    pub interval: u64,
    /// Opaque credential for the generation service. `ENV` reads `OPENAI_API_KEY`.
    #[serde(rename = "apiKey", default, deserialize_with = "lenient")]
    pub api_key: String,
    #[serde(rename = "autoFill", default, deserialize_with = "lenient")]
    pub auto_fill: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub notifications: bool,
    /// Keep notifications on screen until the user interacts with them.
    #[serde(rename = "notifications_show_mode", default, deserialize_with = "lenient")]
    pub notifications_show_mode: bool,
    /// Emit desktop notifications on the first cycle after an empty store.
    #[serde(rename = "notifyOnColdStart", default, deserialize_with = "lenient")]
    pub notify_on_cold_start: bool,
    #[serde(
        rename = "bidTemplate",
        default = "default_bid_template",
        deserialize_with = "lenient_bid_template"
    )]
    pub bid_template: String,
    #[serde(rename = "gptModel", default = "default_model", deserialize_with = "lenient_model")]
    pub gpt_model: String,
    #[serde(
        rename = "BidCondition",
        default = "default_bid_condition",
        deserialize_with = "lenient_bid_condition"
    )]
    pub bid_condition: String,
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("interval", &self.interval)
            .field("api_key_len", &self.api_key.len())
            .field("auto_fill", &self.auto_fill)
            .field("notifications", &self.notifications)
            .field("notifications_show_mode", &self.notifications_show_mode)
            .field("notify_on_cold_start", &self.notify_on_cold_start)
            .field("bid_template", &self.bid_template)
            .field("gpt_model", &self.gpt_model)
            .field("bid_condition", &self.bid_condition)
            .finish()
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            api_key: String::new(),
            auto_fill: false,
            notifications: false,
            notifications_show_mode: false,
            notify_on_cold_start: false,
            bid_template: default_bid_template(),
            gpt_model: default_model(),
            bid_condition: default_bid_condition(),
        }
    }
}

impl Preferences {
    /// Clamp and trim after loading or before saving.
    pub fn normalized(mut self) -> Self {
        self.interval = self.interval.max(MIN_INTERVAL_SECS);
        self.api_key = self.api_key.trim().to_string();
        self.gpt_model = self.gpt_model.trim().to_string();
        if self.gpt_model.is_empty() {
            self.gpt_model = default_model();
        }
        self
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.interval.max(MIN_INTERVAL_SECS))
    }

    /// Credential to send, resolving the `ENV` indirection. Empty means none.
    pub fn resolved_api_key(&self) -> String {
        let raw = self.api_key.trim();
        if raw.eq_ignore_ascii_case("env") {
            return std::env::var("OPENAI_API_KEY")
                .unwrap_or_default()
                .trim()
                .to_string();
        }
        raw.to_string()
    }

    /// Fallback text: configured template, or the built-in one when it is blank.
    pub fn fallback_bid(&self) -> &str {
        if self.bid_template.trim().is_empty() {
            DEFAULT_BID_TEMPLATE
        } else {
            &self.bid_template
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient")]
    pub skills: String,
}
