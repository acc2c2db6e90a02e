//! Coalescing: merges bursts of same-key events into the latest
//! value within a time window, to keep the queue from filling with
//! redundant status updates.

use crate::event::PrioritizedEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use vantage_common::consts::DEFAULT_COALESCE_WINDOW_MS;

struct Pending {
    event: PrioritizedEvent,
    stored_at_ns: u64,
}

/// A time-windowed coalescing filter, keyed by
/// [`PrioritizedEvent::coalesce_key`].
pub struct CoalescingPolicy {
    window: Duration,
    pending: Mutex<HashMap<String, Pending>>,
}

impl CoalescingPolicy {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Offer `event` at `now_ns`. Returns the event that should be
    /// forwarded to the queue now, if any: either a previously pending
    /// event whose window has expired, or `None` if `event` is now
    /// held pending.
    pub fn coalesce(&self, event: PrioritizedEvent, now_ns: u64) -> Option<PrioritizedEvent> {
        let key = event.coalesce_key().to_string();
        let mut pending = self.pending.lock();
        match pending.get_mut(&key) {
            None => {
                pending.insert(key, Pending { event, stored_at_ns: now_ns });
                None
            }
            Some(p) => {
                if now_ns.saturating_sub(p.stored_at_ns) < self.window.as_nanos() as u64 {
                    // Latest payload wins; the window keeps running
                    // from the first arrival.
                    let original_ts = p.event.timestamp_ns;
                    let mut replacement = event;
                    replacement.timestamp_ns = original_ts;
                    p.event = replacement;
                    None
                } else {
                    let expired = std::mem::replace(&mut p.event, event);
                    p.stored_at_ns = now_ns;
                    Some(expired)
                }
            }
        }
    }

    /// Return and clear every pending event, regardless of window state.
    pub fn flush(&self) -> Vec<PrioritizedEvent> {
        self.pending.lock().drain().map(|(_, p)| p.event).collect()
    }

    /// Return and clear the pending event for a single key, if any.
    pub fn flush_key(&self, key: &str) -> Option<PrioritizedEvent> {
        self.pending.lock().remove(key).map(|p| p.event)
    }
}

impl Default for CoalescingPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_COALESCE_WINDOW_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, EventPriority};

    fn event(key: &str, ts: u64, value: f64) -> PrioritizedEvent {
        PrioritizedEvent::new(key, EventPriority::Normal, EventPayload::Float(value), ts)
    }

    #[test]
    fn first_event_is_held_pending() {
        let policy = CoalescingPolicy::new(Duration::from_millis(100));
        assert!(policy.coalesce(event("k", 0, 1.0), 0).is_none());
    }

    #[test]
    fn within_window_replaces_payload_keeps_original_timestamp() {
        let policy = CoalescingPolicy::new(Duration::from_millis(100));
        policy.coalesce(event("k", 1_000, 1.0), 1_000);
        let result = policy.coalesce(event("k", 50_000_000, 2.0), 50_000_000);
        assert!(result.is_none());
        let flushed = policy.flush_key("k").unwrap();
        assert_eq!(flushed.timestamp_ns, 1_000);
        assert_eq!(flushed.payload, EventPayload::Float(2.0));
    }

    #[test]
    fn past_window_returns_previous_and_starts_new() {
        let policy = CoalescingPolicy::new(Duration::from_millis(100));
        policy.coalesce(event("k", 0, 1.0), 0);
        let expired = policy.coalesce(event("k", 200_000_000, 2.0), 200_000_000);
        assert!(expired.is_some());
        assert_eq!(expired.unwrap().payload, EventPayload::Float(1.0));
        let flushed = policy.flush_key("k").unwrap();
        assert_eq!(flushed.payload, EventPayload::Float(2.0));
    }

    #[test]
    fn flush_clears_all_keys() {
        let policy = CoalescingPolicy::new(Duration::from_millis(100));
        policy.coalesce(event("a", 0, 1.0), 0);
        policy.coalesce(event("b", 0, 2.0), 0);
        let flushed = policy.flush();
        assert_eq!(flushed.len(), 2);
        assert!(policy.flush_key("a").is_none());
    }
}
