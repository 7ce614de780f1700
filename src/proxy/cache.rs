//! Per-vehicle snapshot cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// Last known-good payload for one vehicle.
#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Value,
    fetched_at: Instant,
}

/// Table of most-recently-fetched snapshots keyed by vehicle id.
///
/// Entries are written only for payloads classified as valid data and are
/// never deleted; growth is bounded by the number of distinct vehicle ids
/// queried in one process lifetime.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl SnapshotCache {
    /// Snapshot younger than `window`, if any.
    #[must_use]
    pub fn fresh(&self, vehicle_id: &str, window: Duration) -> Option<Value> {
        self.entry_younger_than(vehicle_id, Some(window))
    }

    /// Snapshot usable as a failure fallback: younger than `ceiling`, or of
    /// any age when the ceiling is `None`.
    #[must_use]
    pub fn stale(&self, vehicle_id: &str, ceiling: Option<Duration>) -> Option<Value> {
        self.entry_younger_than(vehicle_id, ceiling)
    }

    /// Store the last known-good snapshot for a vehicle; last writer wins.
    pub fn store(&self, vehicle_id: &str, snapshot: Value) {
        self.lock_entries().insert(
            vehicle_id.to_owned(),
            CacheEntry {
                snapshot,
                fetched_at: Instant::now(),
            },
        );
    }

    fn entry_younger_than(&self, vehicle_id: &str, max_age: Option<Duration>) -> Option<Value> {
        let entries = self.lock_entries();
        let entry = entries.get(vehicle_id)?;
        match max_age {
            Some(limit) if entry.fetched_at.elapsed() >= limit => None,
            _ => Some(entry.snapshot.clone()),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
