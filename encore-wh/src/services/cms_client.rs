//! Headless CMS API client
//!
//! Two calls are needed: a query returning documents, and a patch that sets
//! fields on one document. Both go through the CMS HTTP data API:
//!
//! - `GET  {api_url}/{version}/data/query/{dataset}?query=...` → `{"result": ...}`
//! - `POST {api_url}/{version}/data/mutate/{dataset}` with `{"mutations": [...]}`

use async_trait::async_trait;
use encore_common::config::CmsSettings;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// CMS client errors
#[derive(Debug, Error)]
pub enum CmsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Content store operations used by the processor and backfill
#[async_trait]
pub trait CmsClient: Send + Sync {
    /// Run a query and return the matching documents
    async fn query(&self, query: &str) -> Result<Vec<Value>, CmsError>;

    /// Set top-level fields on a document in one mutation
    async fn patch_set(&self, document_id: &str, set: Value) -> Result<(), CmsError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(rename = "transactionId")]
    transaction_id: Option<String>,
}

/// reqwest-backed CMS client
pub struct HttpCmsClient {
    http_client: reqwest::Client,
    base_url: String,
    dataset: String,
    token: String,
}

impl HttpCmsClient {
    pub fn new(settings: &CmsSettings) -> Result<Self, CmsError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| CmsError::NetworkError(e.to_string()))?;

        let base_url = format!(
            "{}/{}",
            settings.api_url.trim_end_matches('/'),
            settings.api_version.trim_matches('/')
        );

        Ok(Self {
            http_client,
            base_url,
            dataset: settings.dataset.clone(),
            token: settings.token.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CmsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        Err(CmsError::ApiError(status.as_u16(), error_text))
    }
}

#[async_trait]
impl CmsClient for HttpCmsClient {
    async fn query(&self, query: &str) -> Result<Vec<Value>, CmsError> {
        let url = format!("{}/data/query/{}", self.base_url, self.dataset);
        tracing::debug!(url = %url, "Querying CMS");

        let response = self
            .authorize(self.http_client.get(&url).query(&[("query", query)]))
            .send()
            .await
            .map_err(|e| CmsError::NetworkError(e.to_string()))?;

        let body: QueryResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CmsError::ParseError(e.to_string()))?;

        match body.result {
            Value::Array(documents) => Ok(documents),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![single]),
        }
    }

    async fn patch_set(&self, document_id: &str, set: Value) -> Result<(), CmsError> {
        let url = format!("{}/data/mutate/{}", self.base_url, self.dataset);
        let mutation = json!({
            "mutations": [
                { "patch": { "id": document_id, "set": set } }
            ]
        });

        let response = self
            .authorize(self.http_client.post(&url).json(&mutation))
            .send()
            .await
            .map_err(|e| CmsError::NetworkError(e.to_string()))?;

        let body: MutateResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CmsError::ParseError(e.to_string()))?;

        tracing::debug!(
            document_id,
            cms_transaction = body.transaction_id.as_deref().unwrap_or("-"),
            "Patch committed"
        );
        Ok(())
    }
}
