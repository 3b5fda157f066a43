use serde::{Deserialize, Serialize};

/// Payload of `advertUpdated` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertEvent {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub version: i16,
}

/// Payload of `categoryUpdated` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEvent {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub version: i16,
}
