//! # Event Plane
//!
//! A bounded, priority-ordered event queue for the non-RT plane, with
//! a graduated backpressure drop policy and a separate coalescing
//! filter for bursty, same-key updates.
//!
//! - [`event`] — [`event::PrioritizedEvent`] and [`event::EventPriority`]
//! - [`queue`] — [`queue::PriorityQueue`], the bounded MPSC structure
//! - [`coalesce`] — [`coalesce::CoalescingPolicy`]

pub mod coalesce;
pub mod event;
pub mod queue;

pub use coalesce::CoalescingPolicy;
pub use event::{EventPayload, EventPriority, PrioritizedEvent};
pub use queue::{PriorityCounters, PriorityQueue, QueueMetrics};
