use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::types::Advert;

/// Storage for indexed advert documents.
#[async_trait]
pub trait AdvertRepository: Send + Sync {
    /// Fetch an advert document by id.
    ///
    /// Returns `RepositoryError::NotFound` when no document exists.
    async fn get(&self, id: i64) -> Result<Advert, RepositoryError>;

    /// Write the whole advert document, replacing any existing one.
    async fn save(&self, advert: &Advert) -> Result<(), RepositoryError>;
}
