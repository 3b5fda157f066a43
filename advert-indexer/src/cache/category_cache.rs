//! Category lookups for advert denormalization.
//!
//! Every advert update needs its category; categories change rarely, so they
//! are read from the category index once and kept for a long TTL. A
//! `categoryUpdated` event invalidates and reloads the entry.

use std::sync::Arc;
use std::time::Duration;

use advert_indexer_repository::{AdvertCategory, CategoryRepository, RepositoryError};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::debug;

pub const DEFAULT_CATEGORY_TTL: Duration = Duration::from_secs(72 * 60 * 60);
pub const DEFAULT_MAX_CATEGORIES: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedCategory {
    pub id: i64,
    pub name: String,
    pub version: i16,
    pub cached_at: DateTime<Utc>,
}

impl From<&CachedCategory> for AdvertCategory {
    fn from(category: &CachedCategory) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            version: category.version,
        }
    }
}

pub struct CategoryCache {
    repository: Arc<dyn CategoryRepository>,
    cache: Cache<i64, CachedCategory>,
}

impl CategoryCache {
    pub fn new(repository: Arc<dyn CategoryRepository>, ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_capacity)
            .build();

        Self { repository, cache }
    }

    /// Return the cached category, loading it from the repository on a miss
    /// or after expiry.
    ///
    /// Concurrent misses for the same id share one repository read.
    pub async fn get_by_id(&self, id: i64) -> Result<CachedCategory, RepositoryError> {
        if let Some(cached) = self.cache.get(&id).await {
            return Ok(cached);
        }

        let repository = self.repository.clone();
        self.cache
            .try_get_with(id, async move {
                let category = repository.get(id).await?;
                debug!(category_id = id, "Cached category");
                Ok::<_, RepositoryError>(CachedCategory {
                    id: category.id,
                    name: category.name,
                    version: category.version,
                    cached_at: Utc::now(),
                })
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Drop the entry and load it again.
    pub async fn invalidate_by_id(&self, id: i64) -> Result<(), RepositoryError> {
        self.cache.invalidate(&id).await;
        self.get_by_id(id).await.map(|_| ())
    }

    /// Number of live entries, after pending evictions are applied.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
