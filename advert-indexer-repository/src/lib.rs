//! # Advert Indexer Repository
//!
//! Narrow per-entity repositories for the advert indexer. Each repository
//! reads and writes whole documents by id; the OpenSearch implementation
//! routes every document by its own id.

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use errors::RepositoryError;
pub use interfaces::{AdvertRepository, CategoryRepository};
pub use opensearch::{
    IndexConfig, OpenSearchAdvertRepository, OpenSearchCategoryRepository, OpenSearchDocuments,
};
pub use types::{Advert, AdvertCategory, Category};
