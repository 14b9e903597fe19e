//! Admission event bus.
//!
//! The gate can optionally publish an [`GateEvent`] after every state change:
//! a vehicle admitted, a vehicle forced to wait, a vehicle departed, the gate
//! closed.  The bus is a thin wrapper over [`tokio::sync::broadcast`], so any
//! number of observers can follow along without touching the gate lock.
//!
//! Publishing never blocks.  Events are wrapped in [`Arc`] so each subscriber
//! shares one allocation.  A subscriber that falls more than `capacity`
//! events behind sees [`broadcast::error::RecvError::Lagged`] and skips ahead.
//!
//! # Usage
//!
//! ```rust
//! # use crossway_kernel::events::{EventBus, GateEvent};
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(GateEvent::Closed { timestamp: chrono::Utc::now() });
//! assert!(matches!(*rx.try_recv().unwrap(), GateEvent::Closed { .. }));
//! ```
//!
//! Observers living on plain threads use `Receiver::blocking_recv`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::direction::Trajectory;
use crate::registry::TicketId;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Something that happened at the intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateEvent {
    /// A vehicle was admitted.
    Admitted {
        ticket_id: TicketId,
        trajectory: Trajectory,
        /// Vehicles inside after this admission.
        occupancy: usize,
        timestamp: DateTime<Utc>,
    },

    /// A vehicle found a conflicting entry and is about to wait.
    Blocked {
        trajectory: Trajectory,
        /// The earliest admitted trajectory it conflicts with.
        conflicts_with: Trajectory,
        timestamp: DateTime<Utc>,
    },

    /// A vehicle left the intersection.
    Departed {
        ticket_id: TicketId,
        trajectory: Trajectory,
        /// Vehicles inside after this departure.
        occupancy: usize,
        timestamp: DateTime<Utc>,
    },

    /// The gate was shut down.
    Closed { timestamp: DateTime<Utc> },
}

// ---------------------------------------------------------------------------
// Event bus
// ---------------------------------------------------------------------------

/// Publish/subscribe channel for [`GateEvent`]s.
///
/// Cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    sender: broadcast::Sender<Arc<GateEvent>>,
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventBusInner { sender }),
        }
    }

    /// Publish an event to all current subscribers and return how many will
    /// see it.  With nobody listening the event is dropped.
    pub fn publish(&self, event: GateEvent) -> usize {
        match self.inner.sender.send(Arc::new(event)) {
            Ok(n) => {
                tracing::trace!(receivers = n, "gate event published");
                n
            }
            Err(_) => 0,
        }
    }

    /// Subscribe to all future events.  Earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<GateEvent>> {
        self.inner.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use uuid::Uuid;

    fn departed() -> GateEvent {
        GateEvent::Departed {
            ticket_id: Uuid::now_v7(),
            trajectory: Trajectory::new(Direction::North, Direction::South),
            occupancy: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = departed();
        assert_eq!(bus.publish(event.clone()), 1);

        let received = rx.try_recv().expect("event should be buffered");
        assert_eq!(*received, event);
    }

    #[test]
    fn subscribers_share_one_allocation() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(departed());

        let e1 = rx1.try_recv().expect("rx1");
        let e2 = rx2.try_recv().expect("rx2");
        assert!(Arc::ptr_eq(&e1, &e2));
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(departed()), 0);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_value(GateEvent::Closed {
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(json["kind"], "closed");
    }
}
