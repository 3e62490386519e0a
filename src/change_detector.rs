//! # Seen-Set Differ
//! Pure classification of a fetched listing against the ids observed in
//! earlier cycles. No I/O; the engine owns loading and persisting.
//!
//! The seen-set only ever grows by union: an item that drops out of one fetch
//! and reappears later is still known. `mark_all_seen` clears flags without
//! touching membership.

use std::collections::HashSet;

use crate::ingest::types::{Item, ItemId};

pub type SeenSet = HashSet<ItemId>;

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Fetched items, in fetch order, with `is_new` set.
    pub updated_items: Vec<Item>,
    pub next_seen: SeenSet,
    /// Subset of `updated_items` with `is_new == true`, same order.
    pub new_items: Vec<Item>,
}

pub fn reconcile(fetched: Vec<Item>, previous_seen: &SeenSet) -> Reconciled {
    let mut next_seen = previous_seen.clone();
    let mut updated_items = Vec::with_capacity(fetched.len());
    let mut new_items = Vec::new();

    for mut it in fetched {
        // A duplicate id inside one fetch is new at most once.
        it.is_new = next_seen.insert(it.id.clone());
        if it.is_new {
            new_items.push(it.clone());
        }
        updated_items.push(it);
    }

    Reconciled {
        updated_items,
        next_seen,
        new_items,
    }
}

/// Rebuild the seen-set from the persisted listing.
pub fn seen_from_items(items: &[Item]) -> SeenSet {
    items.iter().map(|it| it.id.clone()).collect()
}

pub fn mark_all_seen(items: Vec<Item>) -> Vec<Item> {
    items
        .into_iter()
        .map(|mut it| {
            it.is_new = false;
            it
        })
        .collect()
}

/// Listing to persist after a cycle: the fresh items first (with their flags),
/// then previously stored items that were absent from this fetch, as known.
/// Older entries fall off once `retention` is reached; the fresh fetch is
/// always kept whole.
pub fn merge_for_persist(fresh: &[Item], previous: Vec<Item>, retention: usize) -> Vec<Item> {
    let mut fresh_ids: HashSet<&ItemId> = HashSet::with_capacity(fresh.len());
    // Upstream occasionally repeats an id within one page; store it once.
    let mut out: Vec<Item> = fresh
        .iter()
        .filter(|it| fresh_ids.insert(&it.id))
        .cloned()
        .collect();
    let room = retention.saturating_sub(out.len());
    out.extend(
        previous
            .into_iter()
            .filter(|it| !fresh_ids.contains(&it.id))
            .take(room)
            .map(|mut it| {
                it.is_new = false;
                it
            }),
    );
    out
}
