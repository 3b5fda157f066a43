//! Kafka consumers for advert and category events.

mod advert_event_consumer;
mod category_event_consumer;
mod events;

pub use advert_event_consumer::AdvertEventConsumer;
pub use category_event_consumer::CategoryEventConsumer;
pub use events::{AdvertEvent, CategoryEvent};

/// Consumer group config names the consumers are registered under.
pub const ADVERT_UPDATED: &str = "advertUpdated";
pub const CATEGORY_UPDATED: &str = "categoryUpdated";
