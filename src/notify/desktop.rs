// src/notify/desktop.rs
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::{DesktopNotification, NotificationEvent, Notifier};
use crate::error::{RadarError, Result};

/// Desktop notifications through notify-rust.
///
/// `show()` on the platform backends is synchronous, so it runs on tokio's
/// blocking pool. On freedesktop targets a waiter thread listens for the
/// default action or close signal and reports it on `events`.
#[derive(Clone)]
pub struct DesktopNotifier {
    app_name: String,
    events: UnboundedSender<NotificationEvent>,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>, events: UnboundedSender<NotificationEvent>) -> Self {
        Self {
            app_name: app_name.into(),
            events,
        }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn show(&self, n: &DesktopNotification) -> Result<()> {
        let app_name = self.app_name.clone();
        let events = self.events.clone();
        let n = n.clone();
        tokio::task::spawn_blocking(move || show_blocking(&app_name, &n, events))
            .await
            .map_err(|e| RadarError::NotificationUnavailable(format!("notifier task: {e}")))?
    }
}

fn show_blocking(
    app_name: &str,
    n: &DesktopNotification,
    events: UnboundedSender<NotificationEvent>,
) -> Result<()> {
    let mut notification = notify_rust::Notification::new();
    notification.appname(app_name).summary(&n.title).body(&n.body);

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        notification.action("default", "Open");
        if n.require_interaction {
            notification
                .timeout(notify_rust::Timeout::Never)
                .urgency(notify_rust::Urgency::Critical);
        }
    }

    let handle = notification
        .show()
        .map_err(|e| RadarError::NotificationUnavailable(e.to_string()))?;
    tracing::debug!(target: "notify", id = %n.id, "desktop notification shown");

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let id = n.id.clone();
        std::thread::spawn(move || {
            handle.wait_for_action(|action| {
                let ev = match action {
                    "default" => NotificationEvent::Clicked(id),
                    _ => NotificationEvent::Dismissed(id),
                };
                let _ = events.send(ev);
            });
        });
    }
    #[cfg(not(all(unix, not(target_os = "macos"))))]
    {
        // No click-through on this platform; entries are released on dismissal.
        drop(handle);
        let _ = events.send(NotificationEvent::Dismissed(n.id.clone()));
    }

    Ok(())
}
