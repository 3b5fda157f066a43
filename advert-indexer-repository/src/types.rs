//! Documents stored in the search indices.
//!
//! Field names are camelCase on the wire to stay compatible with the
//! existing `adverts` and `categories` indices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An indexed advert with its category embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advert {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub version: i16,
    pub category: AdvertCategory,
}

/// The category fields denormalized into an advert document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertCategory {
    pub id: i64,
    pub name: String,
    pub version: i16,
}

/// An indexed category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub version: i16,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub last_modified_date: String,
    pub indexed_at: DateTime<Utc>,
}

impl From<&Category> for AdvertCategory {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            version: category.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_advert_serializes_camel_case_with_embedded_category() {
        let advert = Advert {
            id: 7,
            title: "Bike".to_string(),
            description: "Barely used".to_string(),
            version: 3,
            category: AdvertCategory {
                id: 2,
                name: "Sports".to_string(),
                version: 1,
            },
        };

        let value = serde_json::to_value(&advert).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "title": "Bike",
                "description": "Barely used",
                "version": 3,
                "category": {"id": 2, "name": "Sports", "version": 1}
            })
        );
    }

    #[test]
    fn test_category_accepts_missing_audit_fields() {
        let category: Category = serde_json::from_value(json!({
            "id": 2,
            "name": "Sports",
            "version": 4,
            "indexedAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(category.created_by, "");
        assert_eq!(
            category.indexed_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            AdvertCategory::from(&category),
            AdvertCategory {
                id: 2,
                name: "Sports".to_string(),
                version: 4
            }
        );
    }
}
