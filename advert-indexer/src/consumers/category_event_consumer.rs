use std::sync::Arc;

use advert_indexer_kafka::{ConsumeContext, Consumer, ConsumerMessage};
use async_trait::async_trait;
use tracing::debug;

use super::events::CategoryEvent;
use crate::cache::CategoryCache;
use crate::commands::{CommandHandlers, IndexCategory};

/// Re-indexes the category, then refreshes its cache entry so later adverts
/// embed the new name.
pub struct CategoryEventConsumer {
    handlers: CommandHandlers,
    category_cache: Arc<CategoryCache>,
}

impl CategoryEventConsumer {
    pub fn new(handlers: CommandHandlers, category_cache: Arc<CategoryCache>) -> Arc<Self> {
        Arc::new(Self {
            handlers,
            category_cache,
        })
    }
}

#[async_trait]
impl Consumer for CategoryEventConsumer {
    async fn consume(&self, ctx: &ConsumeContext, message: &ConsumerMessage) -> anyhow::Result<()> {
        let event: CategoryEvent = message.deserialize()?;
        debug!(
            correlation_id = %ctx.correlation_id,
            category_id = event.id,
            version = event.version,
            "Received category event"
        );

        self.handlers
            .index_category
            .handle(&IndexCategory { id: event.id })
            .await?;
        self.category_cache.invalidate_by_id(event.id).await?;
        Ok(())
    }
}
