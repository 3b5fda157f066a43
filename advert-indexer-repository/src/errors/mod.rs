//! Error types for the advert indexer repository.

mod repository_error;

pub use repository_error::RepositoryError;
