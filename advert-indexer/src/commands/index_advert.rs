use std::sync::Arc;

use advert_indexer_repository::{Advert, AdvertCategory, AdvertRepository};
use async_trait::async_trait;

use super::{CommandError, CommandHandler, IndexAdvert};
use crate::cache::CategoryCache;
use crate::client::AdvertApiClient;

/// Fetches the advert, denormalizes its category from the cache and saves
/// the whole document.
pub struct IndexAdvertHandler {
    advert_api: Arc<dyn AdvertApiClient>,
    advert_repository: Arc<dyn AdvertRepository>,
    category_cache: Arc<CategoryCache>,
}

impl IndexAdvertHandler {
    pub fn new(
        advert_api: Arc<dyn AdvertApiClient>,
        advert_repository: Arc<dyn AdvertRepository>,
        category_cache: Arc<CategoryCache>,
    ) -> Self {
        Self {
            advert_api,
            advert_repository,
            category_cache,
        }
    }
}

#[async_trait]
impl CommandHandler<IndexAdvert> for IndexAdvertHandler {
    async fn handle(&self, command: &IndexAdvert) -> Result<(), CommandError> {
        let advert = self.advert_api.get_advert_by_id(command.id).await?;
        let category = self.category_cache.get_by_id(advert.category_id).await?;

        let document = Advert {
            id: advert.id,
            title: advert.title,
            description: advert.description,
            version: advert.version,
            category: AdvertCategory::from(&category),
        };
        self.advert_repository.save(&document).await?;
        Ok(())
    }
}
