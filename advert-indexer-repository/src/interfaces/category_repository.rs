use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::types::Category;

/// Storage for indexed category documents.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Fetch a category document by id.
    ///
    /// Returns `RepositoryError::NotFound` when no document exists.
    async fn get(&self, id: i64) -> Result<Category, RepositoryError>;

    /// Write the whole category document, replacing any existing one.
    async fn save(&self, category: &Category) -> Result<(), RepositoryError>;
}
