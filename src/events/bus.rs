//! In-process event bus.
//!
//! # Responsibilities
//! - Publish domain events to every live subscriber
//! - Keep a bounded store of recent events
//! - Report its own health (store size, handler count, shutdown flag)
//!
//! # Design Decisions
//! - Fan-out uses `tokio::sync::broadcast`; slow subscribers lag, they do not block publishers
//! - Publishing after shutdown is an error, not a silent drop

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: u64,
    pub kind: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventBusError {
    #[error("event bus is shutting down")]
    ShuttingDown,
}

/// Health figures reported by an event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventBusHealth {
    pub event_store_size: usize,
    pub handler_count: usize,
    pub shutting_down: bool,
}

/// Health accessor consumed by the event-bus probe.
pub trait EventBusStatus: Send + Sync {
    fn health(&self) -> EventBusHealth;
}

#[derive(Debug)]
pub struct LocalEventBus {
    store: Mutex<VecDeque<DomainEvent>>,
    capacity: usize,
    sender: broadcast::Sender<DomainEvent>,
    next_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl LocalEventBus {
    /// Create a bus retaining at most `capacity` recent events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            store: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sender,
            next_id: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn publish(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<DomainEvent, EventBusError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(EventBusError::ShuttingDown);
        }

        let event = DomainEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind: kind.into(),
            payload,
            occurred_at: Utc::now(),
        };

        {
            let mut store = self.store.lock();
            if self.capacity > 0 {
                while store.len() >= self.capacity {
                    store.pop_front();
                }
                store.push_back(event.clone());
            }
        }

        // No subscribers is fine; the event is still stored.
        let _ = self.sender.send(event.clone());
        tracing::debug!(id = event.id, kind = %event.kind, "Event published");
        Ok(event)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Up to `limit` most recent events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<DomainEvent> {
        let store = self.store.lock();
        let skip = store.len().saturating_sub(limit);
        store.iter().skip(skip).cloned().collect()
    }

    /// Stop accepting events. Existing subscribers keep what was sent.
    pub fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            tracing::info!("Event bus shutting down");
        }
    }
}

impl EventBusStatus for LocalEventBus {
    fn health(&self) -> EventBusHealth {
        EventBusHealth {
            event_store_size: self.store.lock().len(),
            handler_count: self.sender.receiver_count(),
            shutting_down: self.shutting_down.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = LocalEventBus::new(16);
        let mut rx = bus.subscribe();

        let sent = bus.publish("booking.created", json!({ "id": 42 })).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, sent);
        assert_eq!(bus.health().handler_count, 1);
    }

    #[test]
    fn test_store_is_bounded() {
        let bus = LocalEventBus::new(2);
        for i in 0..5 {
            bus.publish("tick", json!(i)).unwrap();
        }
        let recent = bus.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].payload, json!(3));
        assert_eq!(recent[1].payload, json!(4));
        assert_eq!(bus.health().event_store_size, 2);
    }

    #[test]
    fn test_publish_after_shutdown_fails() {
        let bus = LocalEventBus::new(4);
        bus.shutdown();
        assert_eq!(bus.publish("tick", json!(null)), Err(EventBusError::ShuttingDown));
        assert!(bus.health().shutting_down);
    }
}
