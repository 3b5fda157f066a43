//! Whole-document reads and writes against OpenSearch.

use opensearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    GetParts, IndexParts, OpenSearch,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::RepositoryError;

/// A thin OpenSearch client that stores whole documents keyed and routed by
/// their id.
///
/// The entity repositories share one of these; cloning is cheap.
#[derive(Clone)]
pub struct OpenSearchDocuments {
    client: OpenSearch,
}

#[derive(Deserialize)]
struct GetDocumentResponse<T> {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<T>,
}

impl OpenSearchDocuments {
    /// Create a client for the OpenSearch server at `url`.
    ///
    /// No request is made; connection problems surface on first use.
    pub async fn new(url: &str) -> Result<Self, RepositoryError> {
        let parsed_url = Url::parse(url).map_err(|e| RepositoryError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| RepositoryError::connection(e.to_string()))?;

        info!(url = %url, "Created OpenSearch client");

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Create `index` with the given settings unless it already exists.
    pub async fn ensure_index(&self, index: &str, settings: Value) -> Result<(), RepositoryError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| RepositoryError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(settings)
            .send()
            .await
            .map_err(|e| RepositoryError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another replica may have created it between the check and the create.
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            error!(index = %index, status = %status, body = %error_body, "Index creation failed");
            return Err(RepositoryError::index_creation(format!(
                "Create index {} failed with status {}: {}",
                index, status, error_body
            )));
        }

        info!(index = %index, "Created index");
        Ok(())
    }

    /// Index `document` under `id`, routed by `id`.
    pub async fn save<T: Serialize + Sync>(
        &self,
        index: &str,
        id: i64,
        document: &T,
    ) -> Result<(), RepositoryError> {
        let doc_id = document_id(id);
        let body =
            serde_json::to_value(document).map_err(|e| RepositoryError::serialization(e.to_string()))?;

        let response = self
            .client
            .index(IndexParts::IndexId(index, &doc_id))
            .routing(&doc_id)
            .body(body)
            .send()
            .await
            .map_err(|e| RepositoryError::index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(index = %index, id, status = %status, body = %error_body, "Index request failed");
            return Err(RepositoryError::index(format!(
                "Index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, id, "Document indexed");
        Ok(())
    }

    /// Fetch the document stored under `id`.
    pub async fn get<T: DeserializeOwned>(&self, index: &str, id: i64) -> Result<T, RepositoryError> {
        let doc_id = document_id(id);

        let response = self
            .client
            .get(GetParts::IndexId(index, &doc_id))
            .routing(&doc_id)
            .send()
            .await
            .map_err(|e| RepositoryError::get(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(RepositoryError::not_found(index, id));
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(index = %index, id, status = %status, body = %error_body, "Get request failed");
            return Err(RepositoryError::get(format!(
                "Get failed with status {}: {}",
                status, error_body
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| RepositoryError::parse(e.to_string()))?;
        parse_get_response(index, id, body)
    }
}

/// Document ids are the entity id in decimal.
pub(crate) fn document_id(id: i64) -> String {
    id.to_string()
}

fn parse_get_response<T: DeserializeOwned>(
    index: &str,
    id: i64,
    body: Value,
) -> Result<T, RepositoryError> {
    let response: GetDocumentResponse<T> =
        serde_json::from_value(body).map_err(|e| RepositoryError::parse(e.to_string()))?;
    match response.source {
        Some(source) if response.found => Ok(source),
        _ => Err(RepositoryError::not_found(index, id)),
    }
}
