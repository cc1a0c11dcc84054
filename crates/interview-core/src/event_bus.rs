// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Event Bus (C3) — in-process publish/subscribe with bounded history.
//!
//! A callback table guarded by a lock risks reentrancy deadlocks if a
//! subscriber callback tries to publish or subscribe again while being
//! invoked. Rust closures captured in a shared table are also not freely
//! `Clone`-able, and this crate's actual subscriber needs (WebSocket
//! fan-out, `/metrics` counters, test observers) are a natural fit for a
//! broadcast channel instead — each subscriber gets its own independent
//! receiver, which rules out that reentrancy hazard by construction. See
//! DESIGN.md for the full rationale.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

const MAX_HISTORY: usize = 1000;
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionEnd,
    SessionReset,
    AgentLoad,
    UserMessage,
    AssistantResponse,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: EventType,
    pub source: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            source: source.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast-backed publish/subscribe bus with a capped history ring.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    history: Mutex<VecDeque<Event>>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, history: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)) }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to history and fan the event out to every live subscriber.
    /// A subscriber that is not currently receiving (no active receivers,
    /// or all lagged out) simply misses it — best-effort delivery, matching
    /// the original's "callback exception never aborts delivery" contract.
    pub fn publish(&self, event: Event) {
        {
            let mut history = self.history.lock().expect("event history lock poisoned");
            history.push_back(event.clone());
            while history.len() > MAX_HISTORY {
                history.pop_front();
            }
        }
        // `send` only errors when there are zero receivers; that's a normal
        // and expected state (no subscribers yet), not a failure to log.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event. The returned receiver is independent: it
    /// observes its own lagging/closing, never another subscriber's.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe to a single event type, filtering out the rest.
    pub fn subscribe_filtered(
        &self,
        event_type: EventType,
    ) -> impl futures::Stream<Item = Event> {
        use futures::StreamExt;
        use tokio_stream::wrappers::BroadcastStream;

        BroadcastStream::new(self.subscribe())
            .filter_map(|r| async move { r.ok() })
            .filter(move |e| futures::future::ready(e.event_type == event_type))
    }

    pub fn history(&self, limit: usize) -> Vec<Event> {
        let history = self.history.lock().expect("event history lock poisoned");
        history.iter().rev().take(limit).rev().cloned().collect()
    }

    pub fn history_of(&self, event_type: EventType, limit: usize) -> Vec<Event> {
        let history = self.history.lock().expect("event history lock poisoned");
        history
            .iter()
            .rev()
            .filter(|e| e.event_type == event_type)
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventType::SessionStart, "test", serde_json::json!({})));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event_type, EventType::SessionStart);
    }

    #[tokio::test]
    async fn history_is_capped_and_ordered() {
        let bus = EventBus::new();
        for i in 0..(MAX_HISTORY + 10) {
            bus.publish(Event::new(
                EventType::UserMessage,
                "test",
                serde_json::json!({"i": i}),
            ));
        }
        let hist = bus.history(MAX_HISTORY + 10);
        assert_eq!(hist.len(), MAX_HISTORY);
        assert_eq!(hist.last().unwrap().data["i"], MAX_HISTORY + 9);
    }

    #[tokio::test]
    async fn independent_receivers_each_see_every_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.publish(Event::new(EventType::SessionEnd, "test", serde_json::json!({})));
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(Event::new(EventType::Error, "test", serde_json::json!({})));
    }
}
