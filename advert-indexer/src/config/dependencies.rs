//! Dependency initialization and wiring for the advert indexer.

use std::sync::Arc;

use advert_indexer_kafka::{ConsumerBuilder, ConsumerGroupConsumers, Consumers};
use advert_indexer_repository::{
    OpenSearchAdvertRepository, OpenSearchCategoryRepository, OpenSearchDocuments,
    RepositoryError,
};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::cache::CategoryCache;
use crate::client::HttpAdvertApiClient;
use crate::commands::CommandHandlers;
use crate::config::settings::{ConnectionMode, OpenSearchSettings, Settings};
use crate::consumers::{AdvertEventConsumer, CategoryEventConsumer, ADVERT_UPDATED, CATEGORY_UPDATED};
use crate::IndexerError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Running consumer groups and the producer they escalate through.
    pub consumers: Consumers,
    pub category_cache: Arc<CategoryCache>,
}

impl Dependencies {
    /// Connect the repositories, build the domain handlers and start every
    /// consumer group.
    pub async fn new(settings: Settings) -> Result<Self, IndexerError> {
        info!(
            opensearch_url = %settings.opensearch.url,
            advert_api_url = %settings.advert_api.url,
            consumer_groups = settings.kafka.consumer_groups.len(),
            clusters = settings.kafka.clusters.len(),
            "Initializing dependencies"
        );

        let documents = OpenSearchDocuments::new(&settings.opensearch.url).await?;
        let advert_repository = Arc::new(OpenSearchAdvertRepository::new(
            documents.clone(),
            settings.opensearch.adverts_index.clone(),
        ));
        let category_repository = Arc::new(OpenSearchCategoryRepository::new(
            documents,
            settings.opensearch.categories_index.clone(),
        ));
        Self::prepare_indices(
            &settings.opensearch,
            &advert_repository,
            &category_repository,
        )
        .await?;
        info!("OpenSearch indices ready");

        let category_cache = Arc::new(CategoryCache::new(
            category_repository.clone(),
            settings.cache.category_ttl(),
            settings.cache.max_categories,
        ));

        let advert_api = Arc::new(HttpAdvertApiClient::new(&settings.advert_api)?);
        let handlers = CommandHandlers::initialize(
            advert_api,
            advert_repository,
            category_repository,
            category_cache.clone(),
        );

        let consumers = ConsumerBuilder::new(
            settings.kafka,
            Self::consumer_registrations(handlers, category_cache.clone()),
        )
        .initialize()
        .await?;
        info!(
            consumer_groups = consumers.consumer_groups.len(),
            error_consumer_groups = consumers.error_consumer_groups.len(),
            "Kafka consumers started"
        );

        Ok(Self {
            consumers,
            category_cache,
        })
    }

    /// The consumers for each consumer group config.
    pub fn consumer_registrations(
        handlers: CommandHandlers,
        category_cache: Arc<CategoryCache>,
    ) -> Vec<ConsumerGroupConsumers> {
        vec![
            ConsumerGroupConsumers::new(ADVERT_UPDATED, AdvertEventConsumer::new(handlers.clone())),
            ConsumerGroupConsumers::new(
                CATEGORY_UPDATED,
                CategoryEventConsumer::new(handlers, category_cache),
            ),
        ]
    }

    /// Unsubscribe every consumer group.
    pub async fn shutdown(self) {
        self.consumers.shutdown().await;
        info!("Dependencies shut down");
    }

    /// Create the indices, retrying according to the connection mode.
    async fn prepare_indices(
        settings: &OpenSearchSettings,
        adverts: &OpenSearchAdvertRepository,
        categories: &OpenSearchCategoryRepository,
    ) -> Result<(), IndexerError> {
        loop {
            match Self::try_prepare_indices(adverts, categories).await {
                Ok(()) => return Ok(()),
                Err(e) => match settings.connection_mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexerError::config(format!(
                            "Failed to prepare OpenSearch indices: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %settings.url,
                            error = %e,
                            retry_interval_ms = settings.retry_interval_ms,
                            "Failed to prepare OpenSearch indices, retrying..."
                        );
                        sleep(settings.retry_interval()).await;
                    }
                },
            }
        }
    }

    async fn try_prepare_indices(
        adverts: &OpenSearchAdvertRepository,
        categories: &OpenSearchCategoryRepository,
    ) -> Result<(), RepositoryError> {
        adverts.ensure_index_exists().await?;
        categories.ensure_index_exists().await
    }
}
