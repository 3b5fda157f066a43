use std::sync::Arc;

use advert_indexer_repository::{Category, CategoryRepository};
use async_trait::async_trait;
use chrono::Utc;

use super::{CommandError, CommandHandler, IndexCategory};
use crate::client::AdvertApiClient;

pub struct IndexCategoryHandler {
    advert_api: Arc<dyn AdvertApiClient>,
    category_repository: Arc<dyn CategoryRepository>,
}

impl IndexCategoryHandler {
    pub fn new(
        advert_api: Arc<dyn AdvertApiClient>,
        category_repository: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            advert_api,
            category_repository,
        }
    }
}

#[async_trait]
impl CommandHandler<IndexCategory> for IndexCategoryHandler {
    async fn handle(&self, command: &IndexCategory) -> Result<(), CommandError> {
        let category = self.advert_api.get_category_by_id(command.id).await?;

        let document = Category {
            id: command.id,
            name: category.name,
            version: category.version,
            created_by: String::new(),
            creation_date: String::new(),
            modified_by: String::new(),
            last_modified_date: String::new(),
            indexed_at: Utc::now(),
        };
        self.category_repository.save(&document).await?;
        Ok(())
    }
}
