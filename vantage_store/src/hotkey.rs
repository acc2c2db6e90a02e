//! Hot-key cache: a bounded set of pre-registered, index-addressed
//! slots for values read or written on every cycle of the RT executive.
//!
//! The lookup-by-string-then-atomic-map pattern used outside the hot
//! path does not belong here: a hash lookup on an RT thread is an
//! unbounded-latency operation. Keys are registered once during
//! startup (non-RT context) and resolved to a [`HotKeyIndex`]; the RT
//! path only ever uses the index, turning every access into a fixed
//! array slot plus a seqlock read or write.

use crate::version::VersionedCell;
use std::sync::atomic::{AtomicU64, Ordering};
use vantage_common::consts::MAX_HOT_KEYS;
use vantage_common::error::CoreError;

/// A pre-resolved handle to a hot-key slot. Opaque outside this crate
/// beyond its `Copy`/`Eq` identity — never format it back into a key
/// name on the RT path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotKeyIndex(usize);

struct Slot<T: Copy> {
    name: String,
    cell: VersionedCell<T>,
}

/// A fixed-capacity cache of named, seqlock-guarded scalar values.
///
/// Capacity is bounded by [`MAX_HOT_KEYS`]; [`HotKeyCache::register`]
/// past that bound fails with [`CoreError::CapacityExceeded`].
pub struct HotKeyCache<T: Copy> {
    slots: Vec<Slot<T>>,
    read_count: AtomicU64,
    write_count: AtomicU64,
    retry_count: AtomicU64,
}

impl<T: Copy> HotKeyCache<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_HOT_KEYS),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            retry_count: AtomicU64::new(0),
        }
    }

    /// Register a new key with its initial value. Intended for
    /// one-time use during startup, not the RT path.
    pub fn register(&mut self, name: &str, initial: T) -> Result<HotKeyIndex, CoreError> {
        if self.slots.len() >= MAX_HOT_KEYS {
            return Err(CoreError::CapacityExceeded(format!(
                "hot-key cache full at {MAX_HOT_KEYS} slots, cannot register `{name}`"
            )));
        }
        if self.slots.iter().any(|s| s.name == name) {
            return Err(CoreError::PolicyInvalid(format!(
                "hot key `{name}` already registered"
            )));
        }
        let idx = HotKeyIndex(self.slots.len());
        self.slots.push(Slot {
            name: name.to_string(),
            cell: VersionedCell::new(initial),
        });
        Ok(idx)
    }

    /// Resolve a key name to its index. Not RT-safe (linear scan);
    /// call once during startup and cache the returned index.
    pub fn resolve(&self, name: &str) -> Option<HotKeyIndex> {
        self.slots.iter().position(|s| s.name == name).map(HotKeyIndex)
    }

    /// RT-safe read by pre-resolved index.
    pub fn get(&self, idx: HotKeyIndex) -> T {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        let cell = &self.slots[idx.0].cell;
        match cell.try_read() {
            Some(v) => v,
            None => {
                self.retry_count.fetch_add(1, Ordering::Relaxed);
                cell.read()
            }
        }
    }

    /// RT-safe write by pre-resolved index.
    pub fn set(&self, idx: HotKeyIndex, value: T) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.slots[idx.0].cell.update(value);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn metrics(&self) -> HotKeyMetrics {
        HotKeyMetrics {
            read_count: self.read_count.load(Ordering::Relaxed),
            write_count: self.write_count.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
        }
    }
}

impl<T: Copy> Default for HotKeyCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HotKeyMetrics {
    pub read_count: u64,
    pub write_count: u64,
    pub retry_count: u64,
}
