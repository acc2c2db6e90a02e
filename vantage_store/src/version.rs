//! The seqlock primitive shared by the hot-key cache and the generic
//! data store: an atomic version counter guards a plain value, giving
//! lock-free optimistic reads and a single-writer update path.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use vantage_common::consts::MAX_READ_RETRIES;

/// A value paired with a seqlock version counter.
///
/// Writers call [`VersionedCell::update`]; readers call
/// [`VersionedCell::try_read`] or [`VersionedCell::read`]. Readers never
/// block a writer and never observe a torn value: the version is
/// incremented to odd before the write and back to even after, and a
/// read that observes an odd-or-changing version retries.
pub struct VersionedCell<T: Copy> {
    version: AtomicU64,
    value: UnsafeCell<T>,
    fallback: parking_lot::Mutex<T>,
}

// SAFETY: `value` is only written under `update`, which serializes
// writers through `fallback`'s lock; reads only ever copy `T` (Copy).
unsafe impl<T: Copy + Send> Sync for VersionedCell<T> {}

impl<T: Copy> VersionedCell<T> {
    /// Create a new cell holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            version: AtomicU64::new(0),
            value: UnsafeCell::new(initial),
            fallback: parking_lot::Mutex::new(initial),
        }
    }

    /// Current version. Even means stable, odd means a write is in
    /// progress.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Update the value under the seqlock write protocol. Serializes
    /// with other writers via an internal lock — the primitive assumes
    /// a single logical writer, but does not panic under contention.
    pub fn update(&self, new_value: T) {
        let mut guard = self.fallback.lock();

        let odd = self.version.fetch_add(1, Ordering::Release) + 1;
        debug_assert!(odd % 2 == 1);
        std::sync::atomic::fence(Ordering::Release);

        unsafe { *self.value.get() = new_value };
        *guard = new_value;

        std::sync::atomic::fence(Ordering::Release);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// A single optimistic read attempt: `None` if a write was
    /// observed in progress or completed during the read.
    pub fn try_read(&self) -> Option<T> {
        let before = self.version.load(Ordering::Acquire);
        if before % 2 != 0 {
            return None;
        }
        let snapshot = unsafe { *self.value.get() };
        std::sync::atomic::fence(Ordering::Acquire);
        let after = self.version.load(Ordering::Acquire);
        (before == after).then_some(snapshot)
    }

    /// Read the value, retrying up to [`MAX_READ_RETRIES`] times before
    /// falling back to a locked read of the last committed value.
    pub fn read(&self) -> T {
        for _ in 0..MAX_READ_RETRIES {
            if let Some(v) = self.try_read() {
                return v;
            }
        }
        *self.fallback.lock()
    }
}

/// Read `cell` into `out`, returning whether the read was consistent
/// without retrying. Mirrors the plain seqlock helper pattern used
/// elsewhere in the runtime.
pub fn try_optimistic_read<T: Copy>(cell: &VersionedCell<T>, out: &mut T) -> bool {
    match cell.try_read() {
        Some(v) => {
            *out = v;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn read_after_update_sees_new_value() {
        let cell = VersionedCell::new(1u32);
        assert_eq!(cell.read(), 1);
        cell.update(2);
        assert_eq!(cell.read(), 2);
    }

    #[test]
    fn version_is_even_when_stable() {
        let cell = VersionedCell::new(0i64);
        assert_eq!(cell.version() % 2, 0);
        cell.update(5);
        assert_eq!(cell.version() % 2, 0);
    }

    #[test]
    fn try_optimistic_read_helper_matches_value() {
        let cell = VersionedCell::new(42u64);
        let mut out = 0u64;
        assert!(try_optimistic_read(&cell, &mut out));
        assert_eq!(out, 42);
    }

    #[test]
    fn concurrent_updates_converge() {
        let cell = Arc::new(VersionedCell::new(0u64));
        let mut handles = Vec::new();
        for i in 1..=8u64 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || cell.update(i)));
        }
        for h in handles {
            h.join().unwrap();
        }
        let final_value = cell.read();
        assert!((1..=8).contains(&final_value));
    }
}
