//! In-memory caches.

mod category_cache;

pub use category_cache::{CachedCategory, CategoryCache, DEFAULT_CATEGORY_TTL, DEFAULT_MAX_CATEGORIES};
