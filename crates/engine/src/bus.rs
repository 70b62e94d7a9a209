//! Topic-based update bus.
//!
//! Fans ride state changes and live driver positions out to subscribers.
//! Topics are `ride:<id>` and `location:<driverId>`; each topic is backed by
//! a broadcast channel, so delivery is in publish order within a topic and a
//! slow or dropped subscriber never affects the others. Delivery is
//! best-effort and at-most-once across process restarts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use domain::models::{DriverPosition, RideStatus};

/// Per-topic channel capacity; laggards lose oldest messages first.
const TOPIC_CAPACITY: usize = 256;

/// Topic carrying state changes for one ride.
pub fn ride_topic(ride_id: Uuid) -> String {
    format!("ride:{}", ride_id)
}

/// Topic carrying raw position pings for one driver.
pub fn location_topic(driver_id: Uuid) -> String {
    format!("location:{}", driver_id)
}

/// Events delivered over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BusEvent {
    /// A ride moved to a new status.
    #[serde(rename_all = "camelCase")]
    RideStatus {
        ride_id: Uuid,
        status: RideStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        driver_id: Option<Uuid>,
    },
    /// The matched driver's live position, published on the ride topic.
    #[serde(rename_all = "camelCase")]
    DriverLocation { lat: f64, lng: f64 },
    /// A raw ping, published on the driver's location topic.
    DriverPing(DriverPosition),
}

/// A handle on one topic subscription.
///
/// Dropping the subscription unsubscribes; the embedding transport must drop
/// it on client disconnect or the topic channel keeps a receiver alive.
pub struct BusSubscription {
    receiver: broadcast::Receiver<BusEvent>,
}

impl BusSubscription {
    /// Next event on the topic, in publish order.
    ///
    /// Returns None once the topic is closed. A lagged subscriber skips the
    /// overwritten backlog and continues with the oldest retained event.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    metrics::counter!("bus_subscriber_lagged_total").increment(skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking drain of everything currently buffered.
    pub fn drain(&mut self) -> Vec<BusEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Topic-based pub/sub hub.
pub struct UpdateBus {
    topics: RwLock<HashMap<String, broadcast::Sender<BusEvent>>>,
}

impl UpdateBus {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Publish fire-and-forget. Without subscribers the event is dropped.
    pub async fn publish(&self, topic: &str, event: BusEvent) {
        let topics = self.topics.read().await;
        if let Some(sender) = topics.get(topic) {
            // Err means no receivers right now; that is fine.
            let _ = sender.send(event);
        }
    }

    /// Subscribe to a topic. Events published after this call are delivered
    /// in order until the subscription is dropped.
    pub async fn subscribe(&self, topic: &str) -> BusSubscription {
        let mut topics = self.topics.write().await;
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        BusSubscription {
            receiver: sender.subscribe(),
        }
    }

    /// Number of live subscribers on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels whose subscribers are all gone. Returns the number of
    /// topics removed.
    pub async fn prune_idle_topics(&self) -> usize {
        let mut topics = self.topics.write().await;
        let before = topics.len();
        topics.retain(|_, sender| sender.receiver_count() > 0);
        before - topics.len()
    }

    /// Number of live topics.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}
