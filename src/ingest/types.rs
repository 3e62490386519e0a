// src/ingest/types.rs
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// Opaque item identity. Upstream sends numbers; older state files may hold
/// strings. Only equality and hashing are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        // Numeric ids go back out as numbers to keep the stored layout stable.
        match self.0.parse::<u64>() {
            Ok(n) => s.serialize_u64(n),
            Err(_) => s.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }
        Ok(match Raw::deserialize(d)? {
            Raw::Num(n) => ItemId::from(n),
            Raw::Str(s) => ItemId(s),
        })
    }
}

/// `null` and absent both become `T::default()`.
fn null_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    #[serde(default, deserialize_with = "null_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_default")]
    pub sign: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Country {
    #[serde(default, deserialize_with = "null_default")]
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidStats {
    #[serde(default, deserialize_with = "null_default")]
    pub bid_count: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub bid_avg: f64,
}

/// One listed project, in the layout persisted under the `projects` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_default")]
    pub currency: Currency,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub budget: Budget,
    #[serde(default, deserialize_with = "null_default")]
    pub country: Country,
    #[serde(default, deserialize_with = "null_default")]
    pub bid_stats: BidStats,
    #[serde(default, deserialize_with = "null_default")]
    pub preview_description: String,
    #[serde(rename = "url", default, deserialize_with = "null_default")]
    pub link: String,
    /// Derived each cycle from the seen-set; stored as `pro_stat` 1/0.
    #[serde(rename = "pro_stat", default, with = "pro_stat")]
    pub is_new: bool,
}

impl Item {
    /// `Budget: $100-250 USD [ Fixed ]`
    pub fn budget_line(&self) -> String {
        let sign = if self.currency.sign.is_empty() {
            "$"
        } else {
            self.currency.sign.as_str()
        };
        format!(
            "Budget: {}{}-{} {} [ {} ]",
            sign,
            fmt_amount(self.budget.minimum),
            fmt_amount(self.budget.maximum),
            self.currency.code,
            capitalize(&self.kind)
        )
    }
}

fn fmt_amount(v: Option<f64>) -> String {
    match v {
        None => String::new(),
        Some(x) if x.fract() == 0.0 => format!("{}", x as i64),
        Some(x) => format!("{x}"),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

mod pro_stat {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Num(i64),
        }
        Ok(match Option::<Raw>::deserialize(d)? {
            Some(Raw::Flag(b)) => b,
            Some(Raw::Num(n)) => n != 0,
            None => false,
        })
    }
}

#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    /// One round-trip to the upstream listing. Returned items are normalized
    /// and already filtered; `is_new` is not yet meaningful.
    async fn fetch_listing(&self) -> Result<Vec<Item>>;
    fn name(&self) -> &'static str;
}
