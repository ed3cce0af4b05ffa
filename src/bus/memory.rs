use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::EventBus;
use crate::envelope::EventEnvelope;
use crate::error::CoreError;

/// In-memory reference `EventBus`: a sink with a `published()` accessor for
/// test assertions, used both by the test suite and the demo binary.
#[derive(Default)]
pub struct MemoryEventBus {
    published: Mutex<Vec<EventEnvelope>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), CoreError> {
        debug!(event_type = %envelope.event_type, event_id = %envelope.event_id, "publishing event");
        self.published.lock().await.push(envelope);
        Ok(())
    }

    async fn publish_batch(&self, envelopes: Vec<EventEnvelope>) -> Result<(), CoreError> {
        debug!(count = envelopes.len(), "publishing event batch");
        self.published.lock().await.extend(envelopes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_batch_appends_all_envelopes() {
        let bus = MemoryEventBus::new();
        let envelopes = vec![
            EventEnvelope::new("file.processed", "ingestion", "user-1", json!({})),
            EventEnvelope::new("file.processed", "ingestion", "user-1", json!({})),
        ];
        bus.publish_batch(envelopes).await.unwrap();
        assert_eq!(bus.published().await.len(), 2);
    }
}
