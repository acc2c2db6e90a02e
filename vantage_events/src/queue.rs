//! A bounded, multi-producer/single-consumer priority queue with a
//! graduated backpressure drop policy.

use crate::event::{EventPriority, PrioritizedEvent};
use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use vantage_common::consts::DEFAULT_QUEUE_CAPACITY;

/// Heap entry ordered so [`BinaryHeap::pop`] (a max-heap) returns the
/// lowest (priority, timestamp, sequence) tuple first.
struct HeapEntry {
    event: PrioritizedEvent,
    seq: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for HeapEntry {}

impl HeapEntry {
    fn key(&self) -> (EventPriority, u64, u64) {
        (self.event.priority, self.event.timestamp_ns, self.seq)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest key first.
        other.key().cmp(&self.key())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityCounters {
    pub pushed: u64,
    pub dropped: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueMetrics {
    pub critical: PriorityCounters,
    pub high: PriorityCounters,
    pub normal: PriorityCounters,
    pub low: PriorityCounters,
    pub expired_on_pop: u64,
}

struct Counters {
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> PriorityCounters {
        PriorityCounters {
            pushed: self.pushed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// A bounded priority queue. Safe for many concurrent pushers and one
/// consumer popping.
pub struct PriorityQueue {
    capacity: usize,
    heap: Mutex<BinaryHeap<HeapEntry>>,
    size: AtomicU64,
    seq: AtomicU64,
    critical: Counters,
    high: Counters,
    normal: Counters,
    low: Counters,
    expired_on_pop: AtomicU64,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: Mutex::new(BinaryHeap::new()),
            size: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            critical: Counters::new(),
            high: Counters::new(),
            normal: Counters::new(),
            low: Counters::new(),
            expired_on_pop: AtomicU64::new(0),
        }
    }

    fn counters(&self, priority: EventPriority) -> &Counters {
        match priority {
            EventPriority::Critical => &self.critical,
            EventPriority::High => &self.high,
            EventPriority::Normal => &self.normal,
            EventPriority::Low => &self.low,
        }
    }

    /// Whether `priority` is currently subject to backpressure drop,
    /// based on the queue's fill level relative to capacity.
    fn should_drop(&self, priority: EventPriority) -> bool {
        if priority == EventPriority::Critical {
            return false;
        }
        let size = self.size.load(Ordering::Relaxed) as f64;
        let cap = self.capacity as f64;
        let fill = size / cap;
        match priority {
            EventPriority::Critical => false,
            EventPriority::High => fill >= 1.0,
            EventPriority::Normal => fill >= 0.9,
            EventPriority::Low => fill >= 0.8,
        }
    }

    /// Attempt to enqueue `event`, applying the backpressure drop
    /// policy. Returns `true` if accepted.
    pub fn push(&self, event: PrioritizedEvent) -> bool {
        let counters = self.counters(event.priority);
        if self.should_drop(event.priority) {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                r#type = %event.type_name,
                priority = event.priority.as_str(),
                "event dropped under backpressure"
            );
            return false;
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.heap.lock().push(HeapEntry { event, seq });
        self.size.fetch_add(1, Ordering::Relaxed);
        counters.pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Pop the highest-priority, oldest event. Events whose TTL has
    /// expired are silently discarded and counted, not returned.
    pub fn pop(&self, now_ns: u64) -> Option<PrioritizedEvent> {
        let mut heap = self.heap.lock();
        loop {
            let entry = heap.pop()?;
            self.size.fetch_sub(1, Ordering::Relaxed);
            if entry.event.is_expired(now_ns) {
                self.expired_on_pop.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            return Some(entry.event);
        }
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed) as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> QueueMetrics {
        QueueMetrics {
            critical: self.critical.snapshot(),
            high: self.high.snapshot(),
            normal: self.normal.snapshot(),
            low: self.low.snapshot(),
            expired_on_pop: self.expired_on_pop.load(Ordering::Relaxed),
        }
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;

    fn event(priority: EventPriority, ts: u64) -> PrioritizedEvent {
        PrioritizedEvent::new("t", priority, EventPayload::Int(1), ts)
    }

    #[test]
    fn pop_returns_critical_before_low() {
        let q = PriorityQueue::new(16);
        q.push(event(EventPriority::Low, 1));
        q.push(event(EventPriority::Critical, 2));
        let first = q.pop(0).unwrap();
        assert_eq!(first.priority, EventPriority::Critical);
    }

    #[test]
    fn pop_orders_by_timestamp_within_priority() {
        let q = PriorityQueue::new(16);
        q.push(event(EventPriority::Normal, 50));
        q.push(event(EventPriority::Normal, 10));
        assert_eq!(q.pop(0).unwrap().timestamp_ns, 10);
        assert_eq!(q.pop(0).unwrap().timestamp_ns, 50);
    }

    #[test]
    fn low_dropped_past_80_percent_fill() {
        let q = PriorityQueue::new(10);
        for _ in 0..8 {
            assert!(q.push(event(EventPriority::Normal, 0)));
        }
        assert!(!q.push(event(EventPriority::Low, 0)));
        assert_eq!(q.metrics().low.dropped, 1);
    }

    #[test]
    fn critical_never_dropped_even_over_capacity() {
        let q = PriorityQueue::new(2);
        assert!(q.push(event(EventPriority::Critical, 0)));
        assert!(q.push(event(EventPriority::Critical, 1)));
        assert!(q.push(event(EventPriority::Critical, 2)));
        assert_eq!(q.size(), 3);
    }

    #[test]
    fn pop_skips_expired_events() {
        let q = PriorityQueue::new(16);
        let expiring = event(EventPriority::Normal, 0).with_ttl(std::time::Duration::from_millis(10));
        q.push(expiring);
        q.push(event(EventPriority::Normal, 1));
        let popped = q.pop(1_000_000_000).unwrap();
        assert_eq!(popped.timestamp_ns, 1);
        assert_eq!(q.metrics().expired_on_pop, 1);
    }

    #[test]
    fn pop_on_empty_queue_is_none() {
        let q = PriorityQueue::new(16);
        assert!(q.pop(0).is_none());
    }
}
