//! Save-event publishers.

use alias_core::{AliasSaveEvent, SaveHook};
use async_trait::async_trait;
use errors::StorageError;
use redis::AsyncCommands;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Fans save events out to in-process subscribers.
///
/// Events published while nobody is subscribed are dropped.
pub struct BroadcastSaveHook {
    sender: broadcast::Sender<AliasSaveEvent>,
}

impl BroadcastSaveHook {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AliasSaveEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSaveHook {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl SaveHook for BroadcastSaveHook {
    async fn on_save(&self, event: &AliasSaveEvent) {
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!("Save event for {} sent to {} receivers", event.pid, receivers),
            Err(_) => debug!("Save event for {} had no receivers", event.pid),
        }
    }
}

/// Appends save events as JSON to a Redis stream.
pub struct RedisStreamSaveHook {
    connection_manager: redis::aio::ConnectionManager,
    stream_name: String,
}

impl RedisStreamSaveHook {
    pub async fn new(connection_url: &str, stream_name: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(connection_url)
            .map_err(|e| StorageError::connection("Redis", e.to_string()))?;
        let connection_manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StorageError::connection("Redis", e.to_string()))?;
        Ok(Self {
            connection_manager,
            stream_name: stream_name.to_string(),
        })
    }

    pub async fn publish(&self, event: &AliasSaveEvent) -> Result<String, StorageError> {
        let event_json = serde_json::to_string(event)?;
        let mut conn = self.connection_manager.clone();
        let id: String = conn
            .xadd(&self.stream_name, "*", &[("event", event_json)])
            .await
            .map_err(|e| StorageError::query("Redis", e.to_string()))?;
        Ok(id)
    }
}

#[async_trait]
impl SaveHook for RedisStreamSaveHook {
    async fn on_save(&self, event: &AliasSaveEvent) {
        if let Err(e) = self.publish(event).await {
            warn!("Failed to publish save event for {}: {}", event.pid, e);
        }
    }
}
