// src/notify/mod.rs
pub mod desktop;
pub mod opener;
pub mod scheduler;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

pub use desktop::DesktopNotifier;
pub use opener::{LinkOpener, SystemOpener};
pub use scheduler::{NotificationScheduler, ScheduledNotification, STAGGER_MS};

/// What the platform is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    /// Item id as text; also the key for click-through.
    pub id: String,
    pub title: String,
    pub body: String,
    /// Keep on screen until the user acts on it.
    pub require_interaction: bool,
}

/// User interaction reported back by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Clicked(String),
    Dismissed(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, n: &DesktopNotification) -> Result<()>;
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Records notifications with the (tokio) instant they were shown.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<(tokio::time::Instant, DesktopNotification)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(tokio::time::Instant, DesktopNotification)> {
        self.calls.lock().clone()
    }

    pub fn shown_ids(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, n)| n.id.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, n: &DesktopNotification) -> Result<()> {
        self.calls.lock().push((tokio::time::Instant::now(), n.clone()));
        Ok(())
    }
}
