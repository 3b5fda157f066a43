use async_trait::async_trait;
use serde::Deserialize;

use crate::client::http::{ClientError, HttpClient};
use crate::config::AdvertApiSettings;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertResponse {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: i64,
    pub version: i16,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub last_modified_date: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub version: i16,
}

/// Read access to the advert API.
#[async_trait]
pub trait AdvertApiClient: Send + Sync {
    async fn get_advert_by_id(&self, id: i64) -> Result<AdvertResponse, ClientError>;

    async fn get_category_by_id(&self, id: i64) -> Result<CategoryResponse, ClientError>;
}

pub struct HttpAdvertApiClient {
    http: HttpClient,
}

impl HttpAdvertApiClient {
    pub fn new(settings: &AdvertApiSettings) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpClient::new("advertApiClient", settings)?,
        })
    }
}

#[async_trait]
impl AdvertApiClient for HttpAdvertApiClient {
    async fn get_advert_by_id(&self, id: i64) -> Result<AdvertResponse, ClientError> {
        self.http
            .get_json(&format!("/adverts/{id}"))
            .await
            .map_err(|e| match e {
                ClientError::NotFound(_) => ClientError::NotFound(format!("Advert not found by id: {id}")),
                other => other,
            })
    }

    async fn get_category_by_id(&self, id: i64) -> Result<CategoryResponse, ClientError> {
        self.http
            .get_json(&format!("/categories/{id}"))
            .await
            .map_err(|e| match e {
                ClientError::NotFound(_) => {
                    ClientError::NotFound(format!("Category not found by id: {id}"))
                }
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn settings(server: &MockServer, max_attempts: u32) -> AdvertApiSettings {
        AdvertApiSettings {
            url: server.base_url(),
            max_attempts,
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_advert_decodes_camel_case_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/adverts/42");
                then.status(200).json_body(json!({
                    "id": 42,
                    "title": "Bike",
                    "description": "Barely used",
                    "categoryId": 7,
                    "version": 3,
                    "createdBy": "seller"
                }));
            })
            .await;

        let client = HttpAdvertApiClient::new(&settings(&server, 3)).unwrap();
        let advert = client.get_advert_by_id(42).await.unwrap();

        assert_eq!(advert.category_id, 7);
        assert_eq!(advert.created_by, "seller");
        assert_eq!(advert.last_modified_date, "");
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/categories/9");
                then.status(404);
            })
            .await;

        let client = HttpAdvertApiClient::new(&settings(&server, 5)).unwrap();
        let err = client.get_category_by_id(9).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: Category not found by id: 9");
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_up_to_max_attempts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/adverts/1");
                then.status(503).body("unavailable");
            })
            .await;

        let client = HttpAdvertApiClient::new(&settings(&server, 3)).unwrap();
        let err = client.get_advert_by_id(1).await.unwrap_err();

        assert!(matches!(err, ClientError::Status { status: 503, .. }));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/adverts/1");
                then.status(400).body("bad id");
            })
            .await;

        let client = HttpAdvertApiClient::new(&settings(&server, 3)).unwrap();
        let err = client.get_advert_by_id(1).await.unwrap_err();

        assert!(matches!(err, ClientError::Status { status: 400, .. }));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/categories/2");
                then.status(200).body("not json");
            })
            .await;

        let client = HttpAdvertApiClient::new(&settings(&server, 3)).unwrap();
        let err = client.get_category_by_id(2).await.unwrap_err();

        assert!(matches!(err, ClientError::Decode { .. }));
    }
}
