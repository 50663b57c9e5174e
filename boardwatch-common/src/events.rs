//! Progress event types and broadcast bus
//!
//! Long-running refreshes report their progress on a broadcast channel
//! so any number of SSE clients can follow along. The bus also retains
//! the most recent event per collection so a client that connects
//! mid-refresh is told the current state immediately.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// The two cached collections served by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Roadmap,
    Issues,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Roadmap => "roadmap",
            Collection::Issues => "issues",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roadmap" => Ok(Collection::Roadmap),
            "issues" => Ok(Collection::Issues),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown collection '{}'",
                other
            ))),
        }
    }
}

/// A single progress report from a refresh pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub collection: Collection,
    /// Human-readable description of the current step
    pub step: String,
    pub current: usize,
    pub total: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ProgressEvent {
    pub fn new(collection: Collection, step: impl Into<String>, current: usize, total: usize) -> Self {
        Self {
            collection,
            step: step.into(),
            current,
            total,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Broadcast bus for progress events
///
/// Thin wrapper over `tokio::sync::broadcast`. Subscribers that lag
/// past the channel capacity lose the oldest events; subscribers that
/// disconnect are dropped by the channel itself. Publishing with no
/// subscribers is not an error.
#[derive(Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
    last: Arc<RwLock<HashMap<Collection, ProgressEvent>>>,
}

impl ProgressBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            last: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Most recent event published for a collection, if any
    pub fn last_event(&self, collection: Collection) -> Option<ProgressEvent> {
        self.last
            .read()
            .ok()
            .and_then(|map| map.get(&collection).cloned())
    }

    /// Publish an event, ignoring the no-subscriber case
    pub fn publish(&self, event: ProgressEvent) {
        if let Ok(mut map) = self.last.write() {
            map.insert(event.collection, event.clone());
        }
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("No progress subscribers: {}", e);
        }
    }

    /// Convenience: build and publish in one call
    pub fn report(&self, collection: Collection, step: impl Into<String>, current: usize, total: usize) {
        self.publish(ProgressEvent::new(collection, step, current, total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_round_trips_through_str() {
        for c in [Collection::Roadmap, Collection::Issues] {
            let parsed: Collection = c.as_str().parse().unwrap();
            assert_eq!(parsed, c);
        }
        assert!("queue".parse::<Collection>().is_err());
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = ProgressBus::new(16);
        let mut rx = bus.subscribe();

        bus.report(Collection::Roadmap, "Fetching project items", 0, 0);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.collection, Collection::Roadmap);
        assert_eq!(event.step, "Fetching project items");
    }

    #[tokio::test]
    async fn last_event_is_retained_per_collection() {
        let bus = ProgressBus::new(16);
        assert!(bus.last_event(Collection::Issues).is_none());

        bus.report(Collection::Issues, "Enriching", 3, 10);
        bus.report(Collection::Roadmap, "Saving", 5, 5);

        let last = bus.last_event(Collection::Issues).unwrap();
        assert_eq!(last.current, 3);
        assert_eq!(last.total, 10);

        let last = bus.last_event(Collection::Roadmap).unwrap();
        assert_eq!(last.step, "Saving");
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = ProgressBus::new(4);
        bus.report(Collection::Roadmap, "Filtering", 1, 2);
        assert!(bus.last_event(Collection::Roadmap).is_some());
    }
}
