//! # Advert Indexer
//!
//! Consumes `advertUpdated` and `categoryUpdated` events from Kafka, fetches
//! the current state from the advert API and indexes it into OpenSearch.
//!
//! ## Architecture
//!
//! 1. **Consumers**: decode events and dispatch commands
//! 2. **Commands**: fetch, denormalize and save documents, behind a
//!    middleware chain
//! 3. **Cache**: in-memory category lookups for advert denormalization
//! 4. **Client**: the upstream advert API
//! 5. **Server**: liveness, readiness and Prometheus metrics
//!
//! Retry and error-topic escalation of failed events is handled by
//! `advert-indexer-kafka`.

pub mod cache;
pub mod client;
pub mod commands;
pub mod config;
pub mod consumers;
pub mod errors;
pub mod server;

pub use config::{Dependencies, Settings};
pub use errors::IndexerError;
