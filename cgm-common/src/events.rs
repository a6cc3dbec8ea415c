//! Event types for live dashboard updates
//!
//! Handlers emit a [`CgmEvent`] after a successful write; connected
//! browsers receive them over SSE. Nothing else consumes these events, so
//! emitting with no subscribers is normal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cleaning::StockLevel;
use crate::db::models::Audience;
use crate::service_year::MonthKey;

/// Dashboard event types
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CgmEvent {
    /// A message was posted
    MessagePosted {
        message_id: Uuid,
        audience: Audience,
        subject: String,
        timestamp: DateTime<Utc>,
    },

    /// Assignments for a meeting week were added or removed
    AssignmentsChanged {
        week_of: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    /// A monthly field service report was saved
    ReportSubmitted {
        member_id: Uuid,
        month: MonthKey,
        timestamp: DateTime<Utc>,
    },

    /// Territory checked out, returned, divided or redistributed
    TerritoriesChanged {
        territory_ids: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// An inventory item dropped to low or out of stock
    InventoryLow {
        item_id: Uuid,
        name: String,
        quantity: i64,
        level: StockLevel,
        timestamp: DateTime<Utc>,
    },
}

impl CgmEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            CgmEvent::MessagePosted { .. } => "MessagePosted",
            CgmEvent::AssignmentsChanged { .. } => "AssignmentsChanged",
            CgmEvent::ReportSubmitted { .. } => "ReportSubmitted",
            CgmEvent::TerritoriesChanged { .. } => "TerritoriesChanged",
            CgmEvent::InventoryLow { .. } => "InventoryLow",
        }
    }
}

/// Broadcast bus shared by all handlers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CgmEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per slow subscriber
    ///
    /// # Examples
    ///
    /// ```
    /// use cgm_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CgmEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CgmEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No SSE subscribers for event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let week_of = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        bus.emit_lossy(CgmEvent::AssignmentsChanged {
            week_of,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            CgmEvent::AssignmentsChanged { week_of: got, .. } => assert_eq!(got, week_of),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(CgmEvent::TerritoriesChanged {
            territory_ids: vec![],
            timestamp: Utc::now(),
        });
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CgmEvent::ReportSubmitted {
            member_id: Uuid::new_v4(),
            month: "2025-01".parse().unwrap(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ReportSubmitted");
        assert_eq!(json["month"], "2025-01");
        assert_eq!(event.event_type(), "ReportSubmitted");
    }
}
