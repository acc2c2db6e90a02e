//! The generic, non-RT-safe data store: a named map of [`CellValue`]
//! cells with type-checked access, expiration policies, and observer
//! subscriptions.
//!
//! This is the non-RT companion to [`crate::hotkey::HotKeyCache`]: it
//! favors a regular `RwLock`-guarded map over a seqlock, since callers
//! here are not running on the cyclic executive's deadline.

use crate::value::CellValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vantage_common::error::CoreError;

/// How a cell expires.
#[derive(Debug, Clone, Copy)]
pub enum ExpirationPolicy {
    /// Never expires.
    Never,
    /// Expires `ttl` after the last write.
    AfterWrite(Duration),
}

struct Cell {
    value: CellValue,
    policy: ExpirationPolicy,
    last_write: Instant,
    version: AtomicU64,
}

impl Cell {
    fn is_expired(&self, now: Instant) -> bool {
        match self.policy {
            ExpirationPolicy::Never => false,
            ExpirationPolicy::AfterWrite(ttl) => now.duration_since(self.last_write) >= ttl,
        }
    }
}

/// A cell's value paired with its version, the same (value, version)
/// shape `VersionedCell` exposes on the RT side — every key ever
/// written has a version that is strictly monotonic across time.
#[derive(Debug, Clone)]
pub struct VersionedValue {
    pub value: CellValue,
    pub version: u64,
}

type Observer = Box<dyn Fn(&str, &CellValue) + Send + Sync>;

struct SubscriptionInner {
    key: String,
}

/// A live subscription. Dropping it deregisters the observer; the
/// store never holds a strong reference back to the caller.
pub struct SubscriptionHandle {
    inner: Arc<SubscriptionInner>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StoreMetrics {
    pub sets: u64,
    pub gets: u64,
    pub not_found: u64,
    pub type_mismatches: u64,
    pub expirations: u64,
}

struct Observers {
    // Keyed by the same Arc identity stored in each cell's subscriber
    // list, so unsubscription via Drop and lookup via notify agree.
    by_key: HashMap<String, Vec<(Arc<SubscriptionInner>, Observer)>>,
}

/// An in-memory, type-checked key/value store with expiration and
/// synchronous observer notification.
pub struct DataStore {
    cells: RwLock<HashMap<String, Cell>>,
    observers: RwLock<Observers>,
    sets: AtomicU64,
    gets: AtomicU64,
    not_found: AtomicU64,
    type_mismatches: AtomicU64,
    expirations: AtomicU64,
}

impl DataStore {
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            observers: RwLock::new(Observers {
                by_key: HashMap::new(),
            }),
            sets: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            type_mismatches: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Write `value` to `id`. If the cell already exists with a
    /// different runtime type, the write is rejected. Subscribers
    /// registered for `id` are invoked synchronously, after the write
    /// is visible in the map.
    pub fn set(&self, id: &str, value: CellValue, policy: ExpirationPolicy) -> Result<(), CoreError> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        {
            let mut cells = self.cells.write();
            if let Some(existing) = cells.get(id) {
                if existing.value.kind() != value.kind() {
                    self.type_mismatches.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = id, expected = existing.value.kind(), found = value.kind(), "type mismatch on set");
                    return Err(CoreError::TypeMismatch {
                        key: id.to_string(),
                        expected: existing.value.kind(),
                        found: value.kind(),
                    });
                }
            }
            let entry = cells.entry(id.to_string()).or_insert_with(|| Cell {
                value: value.clone(),
                policy,
                last_write: Instant::now(),
                version: AtomicU64::new(0),
            });
            entry.value = value.clone();
            entry.policy = policy;
            entry.last_write = Instant::now();
            entry.version.fetch_add(1, Ordering::Release);
        }
        self.notify(id, &value);
        Ok(())
    }

    /// Read the current value and version of `id`, failing if absent.
    pub fn get(&self, id: &str) -> Result<VersionedValue, CoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let cells = self.cells.read();
        match cells.get(id) {
            Some(cell) => Ok(VersionedValue {
                value: cell.value.clone(),
                version: cell.version.load(Ordering::Acquire),
            }),
            None => {
                self.not_found.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = id, "get: key not found");
                Err(CoreError::NotFound(id.to_string()))
            }
        }
    }

    /// Non-failing read: `None` if absent, without bumping the
    /// not-found counter (used for cheap presence polling).
    pub fn poll(&self, id: &str) -> Option<VersionedValue> {
        self.cells.read().get(id).map(|c| VersionedValue {
            value: c.value.clone(),
            version: c.version.load(Ordering::Acquire),
        })
    }

    /// Subscribe to writes on `id`. The returned handle deregisters
    /// the observer when dropped.
    pub fn subscribe<F>(&self, id: &str, observer: F) -> SubscriptionHandle
    where
        F: Fn(&str, &CellValue) + Send + Sync + 'static,
    {
        let inner = Arc::new(SubscriptionInner { key: id.to_string() });
        self.observers
            .write()
            .by_key
            .entry(id.to_string())
            .or_default()
            .push((inner.clone(), Box::new(observer)));
        SubscriptionHandle { inner }
    }

    /// Remove observers whose handle has been dropped. Called
    /// automatically after every `set`; exposed for callers that want
    /// to reclaim memory eagerly after bulk unsubscription.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut observers = self.observers.write();
        if let Some(list) = observers.by_key.get_mut(&handle.inner.key) {
            list.retain(|(inner, _)| !Arc::ptr_eq(inner, &handle.inner));
        }
    }

    fn notify(&self, id: &str, value: &CellValue) {
        let observers = self.observers.read();
        if let Some(list) = observers.by_key.get(id) {
            for (inner, observer) in list {
                if Arc::strong_count(inner) > 1 {
                    observer(id, value);
                }
            }
        }
    }

    /// Set (or replace) the expiration policy of an existing cell.
    pub fn apply_expiration(&self, id: &str, policy: ExpirationPolicy) -> Result<(), CoreError> {
        let mut cells = self.cells.write();
        match cells.get_mut(id) {
            Some(cell) => {
                cell.policy = policy;
                Ok(())
            }
            None => Err(CoreError::NotFound(id.to_string())),
        }
    }

    /// Remove all cells whose policy has expired. Returns the number
    /// removed.
    pub fn clean_expired(&self) -> usize {
        let now = Instant::now();
        let mut cells = self.cells.write();
        let before = cells.len();
        cells.retain(|_, cell| !cell.is_expired(now));
        let removed = before - cells.len();
        if removed > 0 {
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(removed, "cleaned expired cells");
        }
        removed
    }

    pub fn metrics(&self) -> StoreMetrics {
        StoreMetrics {
            sets: self.sets.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            type_mismatches: self.type_mismatches.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
