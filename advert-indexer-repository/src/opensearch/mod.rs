//! OpenSearch implementation of the repositories.

mod advert_repository;
mod category_repository;
mod documents;
mod index_config;

pub use advert_repository::OpenSearchAdvertRepository;
pub use category_repository::OpenSearchCategoryRepository;
pub use documents::OpenSearchDocuments;
pub use index_config::{
    advert_index_settings, category_index_settings, IndexConfig, ADVERT_INDEX, CATEGORY_INDEX,
};
