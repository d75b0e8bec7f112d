//! # Availability Index
//!
//! In-memory authority for "is this item free on those dates?".
//!
//! ## Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     AvailabilityIndex                                   │
//! │                                                                         │
//! │  RwLock<HashMap<item_id, Arc<Mutex<Vec<BookingInterval>>>>>            │
//! │       │                         │                                       │
//! │       │ outer lock: held only   │ per-item lock: held across            │
//! │       │ to find/create entries  │ check-then-insert, so two             │
//! │       │                         │ clerks can never double-book          │
//! │       ▼                         ▼                                       │
//! │  item "dress-1" ──► [Jun 1–5 RNT-0001 Alice] [Jun 8–10 RNT-0002 Bob]  │
//! │  item "tent-2"  ──► [Jun 3–7 RNT-0003 Carol]                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-item reservations lock items in sorted ID order, so two
//! overlapping multi-item requests cannot deadlock. A reservation is
//! all-or-nothing: one conflicting item denies the whole request and
//! leaves the index untouched.
//!
//! Date ranges are inclusive on both ends. A rental ending June 5 and
//! another starting June 5 conflict: the item still has to come back
//! and be checked before it can go out again.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use rental_db::StoredInterval;

/// One committed reservation of one inventory item.
///
/// Rental number and customer name are snapshots so conflict listings
/// can name the winner without a database round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInterval {
    pub rental_id: String,
    pub rental_number: String,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BookingInterval {
    /// Inclusive overlap test: `[a.start, a.end]` touches `[start, end]`.
    pub fn overlaps(&self, start_date: NaiveDate, end_date: NaiveDate) -> bool {
        self.start_date <= end_date && start_date <= self.end_date
    }
}

/// A denied reservation: which item, and the winning interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalConflict {
    pub inventory_item_id: String,
    pub winner: BookingInterval,
}

/// One item's slot list, behind its own lock. Kept ordered by start
/// date; emptied slots are pruned from the map on release.
type ItemSlot = Arc<Mutex<Vec<BookingInterval>>>;

/// In-memory availability index over all inventory items.
#[derive(Debug, Default)]
pub struct AvailabilityIndex {
    items: RwLock<HashMap<String, ItemSlot>>,
}

impl AvailabilityIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        AvailabilityIndex {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuilds the index from persisted intervals (startup).
    pub async fn load(&self, stored: Vec<StoredInterval>) {
        let mut map: HashMap<String, Vec<BookingInterval>> = HashMap::new();
        for row in stored {
            map.entry(row.inventory_item_id).or_default().push(BookingInterval {
                rental_id: row.rental_id,
                rental_number: row.rental_number,
                customer_name: row.customer_name,
                start_date: row.start_date,
                end_date: row.end_date,
            });
        }

        let count: usize = map.values().map(Vec::len).sum();
        let mut items = self.items.write().await;
        items.clear();
        for (item_id, mut intervals) in map {
            intervals.sort_by_key(|i| i.start_date);
            items.insert(item_id, Arc::new(Mutex::new(intervals)));
        }
        debug!(intervals = count, items = items.len(), "Availability index loaded");
    }

    /// Returns every interval on `item_id` overlapping the given range.
    pub async fn query(
        &self,
        item_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Vec<BookingInterval> {
        let slot = {
            let items = self.items.read().await;
            match items.get(item_id) {
                Some(slot) => Arc::clone(slot),
                None => return Vec::new(),
            }
        };

        let intervals = slot.lock().await;
        intervals
            .iter()
            .filter(|i| i.overlaps(start_date, end_date))
            .cloned()
            .collect()
    }

    /// Reserves the given range on every listed item, all-or-nothing.
    ///
    /// Items are locked in sorted ID order and all locks are held
    /// across the conflict check and the inserts, so a concurrent
    /// request for any of the same items serializes behind this one.
    /// On conflict nothing is inserted and every winner is returned.
    pub async fn reserve_all(
        &self,
        item_ids: &[String],
        interval: &BookingInterval,
    ) -> Result<(), Vec<IntervalConflict>> {
        let mut ordered: Vec<&String> = item_ids.iter().collect();
        ordered.sort();
        ordered.dedup();

        let mut guards: Vec<(String, OwnedMutexGuard<Vec<BookingInterval>>)> =
            Vec::with_capacity(ordered.len());
        for item_id in ordered {
            let slot = self.slot(item_id).await;
            guards.push((item_id.clone(), slot.lock_owned().await));
        }

        let conflicts: Vec<IntervalConflict> = guards
            .iter()
            .flat_map(|(item_id, intervals)| {
                intervals
                    .iter()
                    .filter(|i| i.overlaps(interval.start_date, interval.end_date))
                    .map(|winner| IntervalConflict {
                        inventory_item_id: item_id.clone(),
                        winner: winner.clone(),
                    })
            })
            .collect();

        if !conflicts.is_empty() {
            // A denied request must not leave behind slots it created.
            let emptied: Vec<String> = guards
                .iter()
                .filter(|(_, intervals)| intervals.is_empty())
                .map(|(item_id, _)| item_id.clone())
                .collect();
            drop(guards);
            for item_id in &emptied {
                self.prune(item_id).await;
            }
            return Err(conflicts);
        }

        for (_, intervals) in guards.iter_mut() {
            let pos = intervals.partition_point(|i| i.start_date <= interval.start_date);
            intervals.insert(pos, interval.clone());
        }

        Ok(())
    }

    /// Removes a rental's interval from one item. Idempotent.
    pub async fn release(&self, item_id: &str, rental_id: &str) {
        let slot = {
            let items = self.items.read().await;
            items.get(item_id).map(Arc::clone)
        };
        if let Some(slot) = slot {
            let emptied = {
                let mut intervals = slot.lock().await;
                intervals.retain(|i| i.rental_id != rental_id);
                intervals.is_empty()
            };
            drop(slot);
            if emptied {
                self.prune(item_id).await;
            }
        }
    }

    /// Removes a rental's intervals from every item (return, cancel).
    pub async fn release_rental(&self, rental_id: &str) {
        let slots: Vec<(String, ItemSlot)> = {
            let items = self.items.read().await;
            items
                .iter()
                .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
                .collect()
        };
        let mut emptied = Vec::new();
        for (item_id, slot) in slots {
            let mut intervals = slot.lock().await;
            intervals.retain(|i| i.rental_id != rental_id);
            if intervals.is_empty() {
                emptied.push(item_id);
            }
        }
        for item_id in &emptied {
            self.prune(item_id).await;
        }
    }

    /// Widens a rental's intervals to `new_end_date`, all-or-nothing.
    ///
    /// Fails if any other rental already holds one of the items inside
    /// the widened window; the index is left unchanged in that case.
    pub async fn extend(
        &self,
        rental_id: &str,
        new_end_date: NaiveDate,
    ) -> Result<(), Vec<IntervalConflict>> {
        // Find which items this rental currently holds.
        let mut holding: Vec<(String, ItemSlot)> = {
            let items = self.items.read().await;
            items
                .iter()
                .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
                .collect()
        };
        holding.sort_by(|a, b| a.0.cmp(&b.0));

        let mut guards: Vec<(String, OwnedMutexGuard<Vec<BookingInterval>>)> = Vec::new();
        for (item_id, slot) in holding {
            let guard = slot.lock_owned().await;
            if guard.iter().any(|i| i.rental_id == rental_id) {
                guards.push((item_id, guard));
            }
        }

        let mut conflicts = Vec::new();
        for (item_id, intervals) in &guards {
            let own = intervals
                .iter()
                .find(|i| i.rental_id == rental_id)
                .cloned();
            if let Some(own) = own {
                for winner in intervals.iter().filter(|i| {
                    i.rental_id != rental_id && i.overlaps(own.start_date, new_end_date)
                }) {
                    conflicts.push(IntervalConflict {
                        inventory_item_id: item_id.clone(),
                        winner: winner.clone(),
                    });
                }
            }
        }

        if !conflicts.is_empty() {
            return Err(conflicts);
        }

        for (_, intervals) in guards.iter_mut() {
            for i in intervals.iter_mut() {
                if i.rental_id == rental_id {
                    i.end_date = new_end_date;
                }
            }
        }

        Ok(())
    }

    /// Number of items with live slots. Diagnostic; emptied slots are
    /// pruned as rentals release.
    pub async fn tracked_items(&self) -> usize {
        self.items.read().await.len()
    }

    /// Drops an item's slot once it is empty and nobody else holds it.
    ///
    /// Holding the map write lock means no new clone can be handed out
    /// during the check, and a strong count of one means only the map
    /// itself holds the slot, so no racing reservation can be about to
    /// insert into it. A slot kept alive by a racing holder is simply
    /// pruned on a later release.
    async fn prune(&self, item_id: &str) {
        let mut items = self.items.write().await;
        let removable = items.get(item_id).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .map(|intervals| intervals.is_empty())
                    .unwrap_or(false)
        });
        if removable {
            items.remove(item_id);
        }
    }

    /// Returns the slot for an item, creating an empty one if needed.
    async fn slot(&self, item_id: &str) -> ItemSlot {
        {
            let items = self.items.read().await;
            if let Some(slot) = items.get(item_id) {
                return Arc::clone(slot);
            }
        }
        let mut items = self.items.write().await;
        Arc::clone(
            items
                .entry(item_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new()))),
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
