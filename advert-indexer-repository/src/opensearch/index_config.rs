//! Index names, settings and mappings.

use serde_json::{json, Value};

/// Default index for advert documents.
pub const ADVERT_INDEX: &str = "adverts";

/// Default index for category documents.
pub const CATEGORY_INDEX: &str = "categories";

/// Names of the indices the repositories write to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub adverts: String,
    pub categories: String,
}

impl IndexConfig {
    pub fn new(adverts: impl Into<String>, categories: impl Into<String>) -> Self {
        Self {
            adverts: adverts.into(),
            categories: categories.into(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(ADVERT_INDEX, CATEGORY_INDEX)
    }
}

/// Settings and mappings for the advert index.
///
/// Title and description are full-text; the embedded category is mapped as
/// an object so adverts can be filtered by category id.
pub fn advert_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "id": { "type": "long" },
                "title": {
                    "type": "text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "description": { "type": "text" },
                "version": { "type": "short" },
                "category": {
                    "properties": {
                        "id": { "type": "long" },
                        "name": { "type": "keyword" },
                        "version": { "type": "short" }
                    }
                }
            }
        }
    })
}

/// Settings and mappings for the category index.
pub fn category_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "id": { "type": "long" },
                "name": { "type": "keyword" },
                "version": { "type": "short" },
                "createdBy": { "type": "keyword" },
                "creationDate": { "type": "keyword" },
                "modifiedBy": { "type": "keyword" },
                "lastModifiedDate": { "type": "keyword" },
                "indexedAt": { "type": "date" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_names() {
        let config = IndexConfig::default();
        assert_eq!(config.adverts, "adverts");
        assert_eq!(config.categories, "categories");
    }

    #[test]
    fn test_advert_mapping_embeds_category() {
        let settings = advert_index_settings();
        assert!(settings["settings"]["number_of_shards"].is_number());
        assert_eq!(settings["mappings"]["properties"]["title"]["type"], "text");
        assert_eq!(
            settings["mappings"]["properties"]["category"]["properties"]["id"]["type"],
            "long"
        );
    }

    #[test]
    fn test_category_mapping_uses_document_field_names() {
        let settings = category_index_settings();
        let properties = &settings["mappings"]["properties"];
        assert_eq!(properties["indexedAt"]["type"], "date");
        assert!(properties["lastModifiedDate"].is_object());
        assert!(properties["indexed_at"].is_null());
    }
}
