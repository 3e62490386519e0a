//! Running count of undismissed new items, mirrored onto an indicator surface.

use std::sync::Arc;

use metrics::gauge;
use parking_lot::Mutex;

/// Surface that shows the count (tray badge, status bar, ...).
pub trait BadgeIndicator: Send + Sync {
    /// Empty text hides the badge.
    fn set_text(&self, text: &str);
}

/// Indicator that only logs; used when no UI surface is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl BadgeIndicator for LogIndicator {
    fn set_text(&self, text: &str) {
        tracing::info!(target: "badge", badge = text, "badge updated");
    }
}

pub struct BadgeCounter {
    count: Mutex<u64>,
    indicator: Arc<dyn BadgeIndicator>,
}

impl BadgeCounter {
    pub fn new(initial: u64, indicator: Arc<dyn BadgeIndicator>) -> Self {
        let b = Self {
            count: Mutex::new(initial),
            indicator,
        };
        b.render(initial);
        b
    }

    pub fn get(&self) -> u64 {
        *self.count.lock()
    }

    /// Add `n`; the indicator is updated before returning.
    pub fn increment(&self, n: u64) -> u64 {
        let mut g = self.count.lock();
        *g = g.saturating_add(n);
        let v = *g;
        self.render(v);
        v
    }

    /// Adopt a value read back from storage. Renders only on change.
    pub fn sync(&self, stored: u64) {
        let mut g = self.count.lock();
        if *g != stored {
            *g = stored;
            self.render(stored);
        }
    }

    pub fn reset(&self) -> u64 {
        let mut g = self.count.lock();
        *g = 0;
        self.render(0);
        0
    }

    fn render(&self, v: u64) {
        gauge!("badge_count").set(v as f64);
        if v == 0 {
            self.indicator.set_text("");
        } else {
            self.indicator.set_text(&v.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl BadgeIndicator for Capture {
        fn set_text(&self, text: &str) {
            self.0.lock().push(text.to_string());
        }
    }

    #[test]
    fn increments_accumulate_and_reset_clears() {
        let cap = Arc::new(Capture::default());
        let b = BadgeCounter::new(0, cap.clone());
        assert_eq!(b.increment(3), 3);
        assert_eq!(b.increment(2), 5);
        assert_eq!(b.increment(0), 5);
        assert_eq!(b.reset(), 0);
        assert_eq!(*cap.0.lock(), vec!["", "3", "5", "5", ""]);
    }

    #[test]
    fn sync_renders_only_on_change() {
        let cap = Arc::new(Capture::default());
        let b = BadgeCounter::new(2, cap.clone());
        b.sync(2);
        b.sync(6);
        assert_eq!(b.get(), 6);
        assert_eq!(*cap.0.lock(), vec!["2", "6"]);
    }

    #[test]
    fn restored_count_is_rendered() {
        let cap = Arc::new(Capture::default());
        let b = BadgeCounter::new(4, cap.clone());
        assert_eq!(b.get(), 4);
        assert_eq!(*cap.0.lock(), vec!["4"]);
    }
}
