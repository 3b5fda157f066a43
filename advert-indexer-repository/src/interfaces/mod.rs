//! Repository traits.
//!
//! The indexer depends on these traits only, so command handlers can be
//! tested against in-memory implementations.

mod advert_repository;
mod category_repository;

pub use advert_repository::AdvertRepository;
pub use category_repository::CategoryRepository;
