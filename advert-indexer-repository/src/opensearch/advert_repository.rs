use async_trait::async_trait;
use tracing::{error, info};

use crate::errors::RepositoryError;
use crate::interfaces::AdvertRepository;
use crate::opensearch::documents::OpenSearchDocuments;
use crate::opensearch::index_config::advert_index_settings;
use crate::types::Advert;

/// Advert documents in OpenSearch.
pub struct OpenSearchAdvertRepository {
    documents: OpenSearchDocuments,
    index: String,
}

impl OpenSearchAdvertRepository {
    pub fn new(documents: OpenSearchDocuments, index: impl Into<String>) -> Self {
        Self {
            documents,
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Create the advert index if it does not exist yet.
    pub async fn ensure_index_exists(&self) -> Result<(), RepositoryError> {
        self.documents
            .ensure_index(&self.index, advert_index_settings())
            .await
    }
}

#[async_trait]
impl AdvertRepository for OpenSearchAdvertRepository {
    async fn get(&self, id: i64) -> Result<Advert, RepositoryError> {
        self.documents.get(&self.index, id).await
    }

    async fn save(&self, advert: &Advert) -> Result<(), RepositoryError> {
        match self.documents.save(&self.index, advert.id, advert).await {
            Ok(()) => {
                info!(advert_id = advert.id, "Indexed advert");
                Ok(())
            }
            Err(e) => {
                error!(advert_id = advert.id, error = %e, "Failed to index advert");
                Err(e)
            }
        }
    }
}
