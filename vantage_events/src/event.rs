//! The event payload type and its priority ordering.

use std::time::Duration;

/// Determines processing order and drop policy under backpressure.
/// Lower ordinal sorts first: CRITICAL is never dropped and always
/// processed ahead of everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

impl EventPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventPriority::Critical => "critical",
            EventPriority::High => "high",
            EventPriority::Normal => "normal",
            EventPriority::Low => "low",
        }
    }
}

/// A value carried by a [`PrioritizedEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Int(i64),
    Float(f64),
    Text(String),
}

/// An event queued on the event plane.
///
/// `coalescing_key` defaults to `type_name` when absent: two events of
/// the same type with no explicit key still coalesce against each
/// other.
#[derive(Debug, Clone)]
pub struct PrioritizedEvent {
    pub type_name: String,
    pub priority: EventPriority,
    pub payload: EventPayload,
    pub timestamp_ns: u64,
    pub sequence_num: u64,
    pub ttl: Option<Duration>,
    pub coalescing_key: Option<String>,
}

impl PrioritizedEvent {
    pub fn new(type_name: impl Into<String>, priority: EventPriority, payload: EventPayload, timestamp_ns: u64) -> Self {
        Self {
            type_name: type_name.into(),
            priority,
            payload,
            timestamp_ns,
            sequence_num: 0,
            ttl: None,
            coalescing_key: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_coalescing_key(mut self, key: impl Into<String>) -> Self {
        self.coalescing_key = Some(key.into());
        self
    }

    /// The key coalescing groups this event by: the explicit
    /// `coalescing_key` if set, otherwise `type_name`.
    pub fn coalesce_key(&self) -> &str {
        self.coalescing_key.as_deref().unwrap_or(&self.type_name)
    }

    /// Whether `now_ns` is past this event's TTL deadline.
    pub fn is_expired(&self, now_ns: u64) -> bool {
        match self.ttl {
            None => false,
            Some(ttl) => now_ns.saturating_sub(self.timestamp_ns) > ttl.as_nanos() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_is_critical_first() {
        assert!(EventPriority::Critical < EventPriority::High);
        assert!(EventPriority::High < EventPriority::Normal);
        assert!(EventPriority::Normal < EventPriority::Low);
    }

    #[test]
    fn coalesce_key_defaults_to_type_name() {
        let evt = PrioritizedEvent::new("sensor.temperature", EventPriority::Normal, EventPayload::Float(1.0), 0);
        assert_eq!(evt.coalesce_key(), "sensor.temperature");
    }

    #[test]
    fn explicit_coalescing_key_overrides_type() {
        let evt = PrioritizedEvent::new("sensor.temperature", EventPriority::Normal, EventPayload::Float(1.0), 0)
            .with_coalescing_key("sensor.joint0");
        assert_eq!(evt.coalesce_key(), "sensor.joint0");
    }

    #[test]
    fn ttl_expiration_checked_against_now() {
        let evt = PrioritizedEvent::new("x", EventPriority::Low, EventPayload::Int(1), 1_000_000_000)
            .with_ttl(Duration::from_millis(100));
        assert!(!evt.is_expired(1_000_000_000 + 50_000_000));
        assert!(evt.is_expired(1_000_000_000 + 200_000_000));
    }
}
