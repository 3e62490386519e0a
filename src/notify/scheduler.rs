// src/notify/scheduler.rs
//! Staggered desktop notification fan-out with click-through bookkeeping.
//!
//! Near-simultaneous notifications get coalesced or dropped by several OS
//! notification daemons, so item `i` fires `i * STAGGER_MS` after dispatch.
//! Each notification's id maps back to the item link until it is clicked or
//! dismissed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use super::opener::DynOpener;
use super::{DesktopNotification, DynNotifier, NotificationEvent};
use crate::ingest::types::Item;

pub const STAGGER_MS: u64 = 459;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNotification {
    /// Offset from dispatch time.
    pub delay: Duration,
    pub link: String,
    pub notification: DesktopNotification,
}

/// Pure schedule for `new_items`, in order.
pub fn plan(new_items: &[Item], require_interaction: bool, stagger: Duration) -> Vec<ScheduledNotification> {
    new_items
        .iter()
        .enumerate()
        .map(|(i, it)| ScheduledNotification {
            delay: stagger * i as u32,
            link: it.link.clone(),
            notification: DesktopNotification {
                id: it.id.to_string(),
                title: it.title.clone(),
                body: format!("{}\nClick to view", it.budget_line()),
                require_interaction,
            },
        })
        .collect()
}

pub struct NotificationScheduler {
    notifier: DynNotifier,
    opener: DynOpener,
    pending: Arc<Mutex<HashMap<String, String>>>,
    stagger: Duration,
}

impl NotificationScheduler {
    pub fn new(notifier: DynNotifier, opener: DynOpener) -> Self {
        Self {
            notifier,
            opener,
            pending: Arc::new(Mutex::new(HashMap::new())),
            stagger: Duration::from_millis(STAGGER_MS),
        }
    }

    /// Schedule one notification per item. Returns the schedule; once spawned
    /// the timers run to completion even if notifications are disabled later.
    pub fn dispatch(&self, new_items: &[Item], require_interaction: bool) -> Vec<ScheduledNotification> {
        let schedule = plan(new_items, require_interaction, self.stagger);
        if schedule.is_empty() {
            return schedule;
        }

        {
            let mut pending = self.pending.lock();
            for s in &schedule {
                pending.insert(s.notification.id.clone(), s.link.clone());
            }
        }

        let start = tokio::time::Instant::now();
        for s in &schedule {
            let notifier = Arc::clone(&self.notifier);
            let pending = Arc::clone(&self.pending);
            let n = s.notification.clone();
            let at = start + s.delay;
            tokio::spawn(async move {
                tokio::time::sleep_until(at).await;
                match notifier.show(&n).await {
                    Ok(()) => counter!("notifications_sent_total").increment(1),
                    Err(e) => {
                        // Never shown, so no click or dismissal will clear it.
                        pending.lock().remove(&n.id);
                        counter!("notifications_failed_total").increment(1);
                        tracing::warn!(target: "notify", id = %n.id, error = %e, "notification not shown");
                    }
                }
            });
        }

        tracing::info!(target: "notify", count = schedule.len(), "notifications scheduled");
        schedule
    }

    pub fn pending_link(&self, id: &str) -> Option<String> {
        self.pending.lock().get(id).cloned()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Click opens the stored link; both click and dismissal drop the entry.
    /// Unknown or already-handled ids are ignored.
    pub async fn handle_event(&self, ev: NotificationEvent) {
        match ev {
            NotificationEvent::Clicked(id) => {
                let link = self.pending.lock().remove(&id);
                let Some(link) = link else {
                    tracing::debug!(target: "notify", %id, "click for unknown notification");
                    return;
                };
                if let Err(e) = self.opener.open(&link).await {
                    tracing::warn!(target: "notify", %id, error = %e, "failed to open item link");
                }
            }
            NotificationEvent::Dismissed(id) => {
                self.pending.lock().remove(&id);
            }
        }
    }

    pub fn spawn_event_loop(
        self: Arc<Self>,
        mut events: UnboundedReceiver<NotificationEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(ev) = events.recv().await {
                self.handle_event(ev).await;
            }
        })
    }
}
