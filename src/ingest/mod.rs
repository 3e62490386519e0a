// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::types::{Item, ListingSource};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("listing_fetch_total", "Listing round-trips attempted.");
        describe_counter!(
            "listing_fetch_errors_total",
            "Listing round-trips that failed (network or format)."
        );
        describe_counter!(
            "listing_excluded_total",
            "Items dropped by the currency exclusion set."
        );
        describe_counter!(
            "listing_new_items_total",
            "Items classified new by the seen-set differ."
        );
        describe_counter!("cycle_runs_total", "Completed fetch/diff/persist cycles.");
        describe_counter!(
            "cycle_skipped_total",
            "Cycle triggers rejected because a cycle was in flight."
        );
        describe_counter!("notifications_sent_total", "Desktop notifications shown.");
        describe_counter!(
            "notifications_failed_total",
            "Desktop notifications the platform refused."
        );
        describe_counter!("generation_requests_total", "Bid generation calls.");
        describe_counter!(
            "generation_fallback_total",
            "Bid generation calls answered with the fallback template."
        );
        describe_gauge!("badge_count", "Undismissed new items.");
        describe_gauge!("cycle_last_run_ts", "Unix ts when the last cycle finished.");
        describe_histogram!("listing_fetch_ms", "Listing round-trip time in milliseconds.");
    });
}

/// Decode HTML entities and collapse whitespace in upstream preview text.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_excluded_currency<S: AsRef<str>>(code: S, excluded: &[String]) -> bool {
    let c = code.as_ref().trim();
    excluded.iter().any(|x| x.eq_ignore_ascii_case(c))
}

/// Drop items whose currency is excluded. Returns (kept, dropped_count).
pub fn filter_excluded(items: Vec<Item>, excluded: &[String]) -> (Vec<Item>, usize) {
    let before = items.len();
    let kept: Vec<Item> = items
        .into_iter()
        .filter(|it| !is_excluded_currency(&it.currency.code, excluded))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Fetch once from `source`, recording timing and error telemetry.
pub async fn fetch_once(source: &dyn ListingSource) -> crate::error::Result<Vec<Item>> {
    ensure_metrics_described();
    counter!("listing_fetch_total").increment(1);

    let t0 = std::time::Instant::now();
    let res = source.fetch_listing().await;
    histogram!("listing_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match &res {
        Ok(items) => {
            tracing::debug!(target: "ingest", source = source.name(), count = items.len(), "listing fetched");
        }
        Err(e) => {
            tracing::warn!(target: "ingest", source = source.name(), error = %e, "listing fetch failed");
            counter!("listing_fetch_errors_total").increment(1);
        }
    }
    res
}
