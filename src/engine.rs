//! # Engine
//! Owns one fetch → diff → persist → notify cycle and the operations the
//! bridge exposes around it. All collaborators are injected, so tests build
//! isolated engines over a memory store and recording adapters.
//!
//! Three pieces of shared state need care:
//! - the cycle gate (`Idle`/`Fetching`) rejects a trigger while a cycle runs;
//! - the persisted listing is read-modify-written only while `items_lock` is
//!   held, so `mark_all_seen` never interleaves with a cycle's write;
//! - the badge changes in memory and in the store only while `badge_lock` is
//!   held, so a reset is never overwritten by a cycle's stale count.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::badge::{BadgeCounter, BadgeIndicator};
use crate::change_detector::{self, Reconciled, SeenSet};
use crate::config::{Preferences, Profile};
use crate::error::{RadarError, Result};
use crate::generate::{Bid, BidGenerator};
use crate::ingest::{self, types::Item, types::ItemId, types::ListingSource};
use crate::notify::opener::DynOpener;
use crate::notify::{DynNotifier, NotificationScheduler};
use crate::store::{self, KvStore, KEY_BADGE, KEY_DARK_MODE, KEY_PREFERENCES, KEY_PROFILE, KEY_PROJECTS};

/// Pushed to UI listeners. No listener is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UiEvent {
    #[serde(rename_all = "camelCase")]
    UpdatePopup { new_items: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle held the gate.
    Skipped,
    /// Error caught at the cycle boundary.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new_items: usize,
    pub notified: usize,
    pub cold_start: bool,
    pub persisted: usize,
}

struct CycleGate(Mutex<CycleState>);

struct CycleGuard<'a>(&'a CycleGate);

impl CycleGate {
    fn try_enter(&self) -> Option<CycleGuard<'_>> {
        let mut s = self.0.lock();
        if *s == CycleState::Fetching {
            return None;
        }
        *s = CycleState::Fetching;
        Some(CycleGuard(self))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.0 .0.lock() = CycleState::Idle;
    }
}

/// Persisted listing split into records that parse and raw records that
/// no longer do. An unreadable record still counts as seen by its `id` and is
/// written back as-is until retention pushes it out.
struct StoredListing {
    items: Vec<Item>,
    unreadable: Vec<(ItemId, Value)>,
}

impl StoredListing {
    async fn load(store: &dyn KvStore) -> Result<Self> {
        let raw: Vec<Value> = store::load_or_default(store, KEY_PROJECTS).await?;
        let mut items = Vec::with_capacity(raw.len());
        let mut unreadable = Vec::new();
        for v in raw {
            match Item::deserialize(&v) {
                Ok(it) => items.push(it),
                Err(e) => {
                    let id = v.get("id").and_then(|id| ItemId::deserialize(id).ok());
                    tracing::warn!(
                        target: "engine",
                        id = id.as_ref().map(ItemId::as_str),
                        error = %e,
                        "stored item unreadable"
                    );
                    // Without an id it cannot take part in diffing.
                    if let Some(id) = id {
                        unreadable.push((id, v));
                    }
                }
            }
        }
        Ok(Self { items, unreadable })
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty() && self.unreadable.is_empty()
    }

    fn seen(&self) -> SeenSet {
        let mut seen = change_detector::seen_from_items(&self.items);
        seen.extend(self.unreadable.iter().map(|(id, _)| id.clone()));
        seen
    }

    /// `items` first, then unreadable records not superseded by them, up to
    /// `retention` entries in total.
    fn to_persist(items: &[Item], unreadable: Vec<(ItemId, Value)>, retention: usize) -> Result<Vec<Value>> {
        let ids: HashSet<&ItemId> = items.iter().map(|it| &it.id).collect();
        let mut out = items
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RadarError::Storage(e.to_string()))?;
        let room = retention.saturating_sub(out.len());
        out.extend(
            unreadable
                .into_iter()
                .filter(|(id, _)| !ids.contains(id))
                .take(room)
                .map(|(_, v)| v),
        );
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
struct Settings {
    prefs: Preferences,
    profile: Profile,
}

/// Collaborators for [`Engine::new`].
pub struct EngineParts {
    pub store: Arc<dyn KvStore>,
    pub source: Arc<dyn ListingSource>,
    pub notifier: DynNotifier,
    pub opener: DynOpener,
    pub generator: Arc<BidGenerator>,
    pub indicator: Arc<dyn BadgeIndicator>,
    /// Cap on the persisted listing (and so on the seen-set).
    pub retention: usize,
}

pub struct Engine {
    store: Arc<dyn KvStore>,
    source: Arc<dyn ListingSource>,
    scheduler: Arc<NotificationScheduler>,
    opener: DynOpener,
    generator: Arc<BidGenerator>,
    badge: BadgeCounter,
    retention: usize,
    gate: CycleGate,
    items_lock: tokio::sync::Mutex<()>,
    badge_lock: tokio::sync::Mutex<()>,
    settings: RwLock<Settings>,
    updates: broadcast::Sender<UiEvent>,
    period_tx: watch::Sender<Duration>,
}

impl Engine {
    /// Load preferences, profile and badge from the store and wire the parts.
    pub async fn new(parts: EngineParts) -> Result<Self> {
        ingest::ensure_metrics_described();

        let prefs = store::load_or_default::<Preferences>(parts.store.as_ref(), KEY_PREFERENCES)
            .await?
            .normalized();
        let profile = store::load_or_default::<Profile>(parts.store.as_ref(), KEY_PROFILE).await?;
        let badge = store::load_or_default::<u64>(parts.store.as_ref(), KEY_BADGE).await?;

        let (updates, _) = broadcast::channel(16);
        let (period_tx, _) = watch::channel(prefs.poll_period());
        let scheduler = Arc::new(NotificationScheduler::new(parts.notifier, parts.opener.clone()));

        tracing::info!(
            target: "engine",
            source = parts.source.name(),
            interval_secs = prefs.interval,
            notifications = prefs.notifications,
            credential_len = prefs.api_key.len(),
            badge,
            "engine ready"
        );

        Ok(Self {
            store: parts.store,
            source: parts.source,
            scheduler,
            opener: parts.opener,
            generator: parts.generator,
            badge: BadgeCounter::new(badge, parts.indicator),
            retention: parts.retention.max(1),
            gate: CycleGate(Mutex::new(CycleState::Idle)),
            items_lock: tokio::sync::Mutex::new(()),
            badge_lock: tokio::sync::Mutex::new(()),
            settings: RwLock::new(Settings { prefs, profile }),
            updates,
            period_tx,
        })
    }

    pub fn scheduler(&self) -> Arc<NotificationScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.updates.subscribe()
    }

    /// Current poll period; changes whenever preferences with a new interval
    /// are saved or picked up by a cycle.
    pub fn poll_period(&self) -> watch::Receiver<Duration> {
        self.period_tx.subscribe()
    }

    pub fn cycle_state(&self) -> CycleState {
        *self.gate.0.lock()
    }

    pub fn badge(&self) -> u64 {
        self.badge.get()
    }

    pub fn preferences(&self) -> Preferences {
        self.settings.read().prefs.clone()
    }

    /// Run one cycle. Never returns an error: failures are logged and
    /// reported as [`CycleOutcome::Failed`].
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = self.gate.try_enter() else {
            counter!("cycle_skipped_total").increment(1);
            tracing::debug!(target: "cycle", "cycle already in flight; trigger skipped");
            return CycleOutcome::Skipped;
        };

        match self.cycle_inner().await {
            Ok(report) => {
                counter!("cycle_runs_total").increment(1);
                gauge!("cycle_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
                tracing::info!(
                    target: "cycle",
                    fetched = report.fetched,
                    new = report.new_items,
                    notified = report.notified,
                    cold_start = report.cold_start,
                    persisted = report.persisted,
                    badge = self.badge.get(),
                    "cycle complete"
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                tracing::warn!(target: "cycle", error = %e, "cycle failed");
                CycleOutcome::Failed(e.to_string())
            }
        }
    }

    async fn cycle_inner(&self) -> Result<CycleReport> {
        let prefs = self.refresh_settings().await?;
        {
            let _badge = self.badge_lock.lock().await;
            let stored_badge = store::load_or_default::<u64>(self.store.as_ref(), KEY_BADGE).await?;
            self.badge.sync(stored_badge);
        }

        let fetched = ingest::fetch_once(self.source.as_ref()).await?;
        let fetched_len = fetched.len();

        let (new_items, cold_start, persisted) = {
            let _items = self.items_lock.lock().await;
            let previous = StoredListing::load(self.store.as_ref()).await?;
            let cold_start = previous.is_empty();
            let seen = previous.seen();
            let Reconciled {
                updated_items,
                new_items,
                ..
            } = change_detector::reconcile(fetched, &seen);
            let merged = change_detector::merge_for_persist(&updated_items, previous.items, self.retention);
            let values = StoredListing::to_persist(&merged, previous.unreadable, self.retention)?;
            store::save(self.store.as_ref(), KEY_PROJECTS, &values).await?;
            (new_items, cold_start, values.len())
        };

        let mut report = CycleReport {
            fetched: fetched_len,
            new_items: new_items.len(),
            notified: 0,
            cold_start,
            persisted,
        };
        if new_items.is_empty() {
            return Ok(report);
        }

        counter!("listing_new_items_total").increment(new_items.len() as u64);
        {
            let _badge = self.badge_lock.lock().await;
            let badge = self.badge.increment(new_items.len() as u64);
            store::save(self.store.as_ref(), KEY_BADGE, &badge).await?;
        }

        if !prefs.notifications {
            tracing::debug!(target: "cycle", "notifications disabled");
        } else if cold_start && !prefs.notify_on_cold_start {
            tracing::info!(target: "cycle", new = new_items.len(), "cold start; notifications suppressed");
        } else {
            report.notified = self
                .scheduler
                .dispatch(&new_items, prefs.notifications_show_mode)
                .len();
        }

        // Err only means nobody is listening.
        let _ = self.updates.send(UiEvent::UpdatePopup {
            new_items: new_items.len(),
        });
        Ok(report)
    }

    /// Re-read preferences and profile; pick up an interval edited behind our back.
    async fn refresh_settings(&self) -> Result<Preferences> {
        let prefs = store::load_or_default::<Preferences>(self.store.as_ref(), KEY_PREFERENCES)
            .await?
            .normalized();
        let profile = store::load_or_default::<Profile>(self.store.as_ref(), KEY_PROFILE).await?;
        self.publish_period(prefs.poll_period());
        *self.settings.write() = Settings {
            prefs: prefs.clone(),
            profile,
        };
        Ok(prefs)
    }

    fn publish_period(&self, period: Duration) {
        self.period_tx.send_if_modified(|cur| {
            if *cur == period {
                return false;
            }
            tracing::info!(target: "engine", secs = period.as_secs(), "poll period changed");
            *cur = period;
            true
        });
    }

    /// Clear every `is_new` flag in the persisted listing.
    pub async fn mark_all_seen(&self) -> Result<usize> {
        let _items = self.items_lock.lock().await;
        let stored = StoredListing::load(self.store.as_ref()).await?;
        let n = stored.items.len();
        let cleared = change_detector::mark_all_seen(stored.items);
        let values = StoredListing::to_persist(&cleared, stored.unreadable, usize::MAX)?;
        store::save(self.store.as_ref(), KEY_PROJECTS, &values).await?;
        tracing::debug!(target: "engine", items = n, "new flags cleared");
        Ok(n)
    }

    pub async fn reset_badge(&self) -> Result<()> {
        let _badge = self.badge_lock.lock().await;
        let v = self.badge.reset();
        store::save(self.store.as_ref(), KEY_BADGE, &v).await
    }

    /// Stored items that still parse.
    pub async fn projects(&self) -> Result<Vec<Item>> {
        Ok(StoredListing::load(self.store.as_ref()).await?.items)
    }

    pub async fn open_item(&self, url: &str) -> Result<()> {
        self.opener.open(url).await
    }

    pub async fn generate_bid(&self, description: &str) -> Bid {
        let Settings { prefs, profile } = self.settings.read().clone();
        self.generator.generate_bid(description, &prefs, &profile).await
    }

    /// `ENV` resolves the same way as for generation.
    pub async fn validate_credential(&self, api_key: &str) -> bool {
        let key = Preferences {
            api_key: api_key.to_string(),
            ..Preferences::default()
        }
        .resolved_api_key();
        let valid = self.generator.validate_credential(&key).await;
        tracing::info!(target: "engine", credential_len = key.len(), valid, "credential validated");
        valid
    }

    /// Persist whichever parts are given and apply them to the running engine.
    pub async fn save_settings(&self, prefs: Option<Preferences>, profile: Option<Profile>) -> Result<()> {
        if let Some(p) = prefs {
            let p = p.normalized();
            store::save(self.store.as_ref(), KEY_PREFERENCES, &p).await?;
            self.publish_period(p.poll_period());
            self.settings.write().prefs = p;
        }
        if let Some(p) = profile {
            store::save(self.store.as_ref(), KEY_PROFILE, &p).await?;
            self.settings.write().profile = p;
        }
        tracing::info!(target: "engine", "settings saved");
        Ok(())
    }

    pub async fn dark_mode(&self) -> Result<bool> {
        store::load_or_default(self.store.as_ref(), KEY_DARK_MODE).await
    }

    pub async fn set_dark_mode(&self, on: bool) -> Result<()> {
        store::save(self.store.as_ref(), KEY_DARK_MODE, &on).await
    }
}
