//! Event bus abstraction: publish single/batched envelopes. Batching is
//! strictly a throughput optimization and gives no ordering guarantee
//! across events.

pub mod memory;

use async_trait::async_trait;

use crate::envelope::EventEnvelope;
use crate::error::CoreError;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), CoreError>;

    async fn publish_batch(&self, envelopes: Vec<EventEnvelope>) -> Result<(), CoreError>;
}
