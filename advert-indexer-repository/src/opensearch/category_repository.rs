use async_trait::async_trait;
use tracing::{error, info};

use crate::errors::RepositoryError;
use crate::interfaces::CategoryRepository;
use crate::opensearch::documents::OpenSearchDocuments;
use crate::opensearch::index_config::category_index_settings;
use crate::types::Category;

/// Category documents in OpenSearch.
pub struct OpenSearchCategoryRepository {
    documents: OpenSearchDocuments,
    index: String,
}

impl OpenSearchCategoryRepository {
    pub fn new(documents: OpenSearchDocuments, index: impl Into<String>) -> Self {
        Self {
            documents,
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Create the category index if it does not exist yet.
    pub async fn ensure_index_exists(&self) -> Result<(), RepositoryError> {
        self.documents
            .ensure_index(&self.index, category_index_settings())
            .await
    }
}

#[async_trait]
impl CategoryRepository for OpenSearchCategoryRepository {
    async fn get(&self, id: i64) -> Result<Category, RepositoryError> {
        self.documents.get(&self.index, id).await
    }

    async fn save(&self, category: &Category) -> Result<(), RepositoryError> {
        match self.documents.save(&self.index, category.id, category).await {
            Ok(()) => {
                info!(category_id = category.id, "Indexed category");
                Ok(())
            }
            Err(e) => {
                error!(category_id = category.id, error = %e, "Failed to index category");
                Err(e)
            }
        }
    }
}
