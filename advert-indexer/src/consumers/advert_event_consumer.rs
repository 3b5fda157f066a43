use std::sync::Arc;

use advert_indexer_kafka::{ConsumeContext, Consumer, ConsumerMessage};
use async_trait::async_trait;
use tracing::debug;

use super::events::AdvertEvent;
use crate::commands::{CommandHandlers, IndexAdvert};

pub struct AdvertEventConsumer {
    handlers: CommandHandlers,
}

impl AdvertEventConsumer {
    pub fn new(handlers: CommandHandlers) -> Arc<Self> {
        Arc::new(Self { handlers })
    }
}

#[async_trait]
impl Consumer for AdvertEventConsumer {
    async fn consume(&self, ctx: &ConsumeContext, message: &ConsumerMessage) -> anyhow::Result<()> {
        let event: AdvertEvent = message.deserialize()?;
        debug!(
            correlation_id = %ctx.correlation_id,
            advert_id = event.id,
            version = event.version,
            "Received advert event"
        );

        self.handlers
            .index_advert
            .handle(&IndexAdvert { id: event.id })
            .await?;
        Ok(())
    }
}
