//! Commands issued by the event consumers and their handlers.
//!
//! Handlers are wrapped in an explicit middleware chain; the first
//! middleware in the list is the outermost.

mod index_advert;
mod index_category;
mod middleware;

use std::sync::Arc;

use advert_indexer_repository::{AdvertRepository, CategoryRepository, RepositoryError};
use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CategoryCache;
use crate::client::{AdvertApiClient, ClientError};

pub use index_advert::IndexAdvertHandler;
pub use index_category::IndexCategoryHandler;
pub use middleware::{chain, Middleware, TracingMiddleware};

/// Re-index an advert from the advert API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexAdvert {
    pub id: i64,
}

/// Re-index a category from the advert API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCategory {
    pub id: i64,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait CommandHandler<C: Send + Sync>: Send + Sync {
    async fn handle(&self, command: &C) -> Result<(), CommandError>;
}

/// The handler for every command, each behind its middleware chain.
#[derive(Clone)]
pub struct CommandHandlers {
    pub index_advert: Arc<dyn CommandHandler<IndexAdvert>>,
    pub index_category: Arc<dyn CommandHandler<IndexCategory>>,
}

impl CommandHandlers {
    /// Build the handlers with tracing middleware.
    pub fn initialize(
        advert_api: Arc<dyn AdvertApiClient>,
        advert_repository: Arc<dyn AdvertRepository>,
        category_repository: Arc<dyn CategoryRepository>,
        category_cache: Arc<CategoryCache>,
    ) -> Self {
        let index_advert: Arc<dyn CommandHandler<IndexAdvert>> = Arc::new(IndexAdvertHandler::new(
            advert_api.clone(),
            advert_repository,
            category_cache,
        ));
        let index_category: Arc<dyn CommandHandler<IndexCategory>> =
            Arc::new(IndexCategoryHandler::new(advert_api, category_repository));

        Self {
            index_advert: chain(index_advert, &[Arc::new(TracingMiddleware)]),
            index_category: chain(index_category, &[Arc::new(TracingMiddleware)]),
        }
    }
}
