//! Drains the priority queue on a tight poll loop, coalescing bursts
//! of same-key events before acting on them. `rt_peer_unreachable`
//! events are routed into the HA state machine as a health-probe
//! failure; everything else is logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use vantage_events::{CoalescingPolicy, PriorityQueue};
use vantage_ha::{FailureType, HAStateMachine};

fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

pub fn spawn(
    queue: Arc<PriorityQueue>,
    coalescing: Arc<CoalescingPolicy>,
    ha: Arc<HAStateMachine>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            let now = now_ns();
            match queue.pop(now) {
                Some(event) => {
                    if let Some(ready) = coalescing.coalesce(event, now) {
                        dispatch(&ha, &ready);
                    }
                }
                None => std::thread::sleep(poll_interval),
            }
        }
    })
}

fn dispatch(ha: &HAStateMachine, event: &vantage_events::PrioritizedEvent) {
    match event.type_name.as_str() {
        "rt_peer_unreachable" => {
            if let Err(e) = ha.handle_failure(FailureType::HealthProbeTimeout) {
                tracing::warn!(error = %e, "failed to handle rt_peer_unreachable event");
            }
        }
        other => {
            tracing::debug!(event = other, "unhandled event type");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use vantage_events::{EventPayload, EventPriority, PrioritizedEvent};
    use vantage_ha::RecoveryPolicy;

    #[test]
    fn dispatch_routes_peer_unreachable_to_health_probe_timeout() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let ha = HAStateMachine::new(
            RecoveryPolicy::default(),
            Box::new(|_, _, _| {}),
            Box::new(move |failure, _| {
                calls2.fetch_add(1, Ordering::Relaxed);
                assert_eq!(failure, FailureType::HealthProbeTimeout);
                true
            }),
        );
        let event = PrioritizedEvent::new(
            "rt_peer_unreachable",
            EventPriority::Critical,
            EventPayload::Text("stale".to_string()),
            0,
        );
        dispatch(&ha, &event);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
