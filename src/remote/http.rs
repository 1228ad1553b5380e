use super::{RemoteRecord, RemoteStore};
use crate::config::RemoteConfig;
use crate::error::{ConfigError, RemoteError};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use uuid::Uuid;

/// Remote store backed by a JSON REST record service.
///
/// ```text
/// POST   {base}/records       save
/// GET    {base}/records       fetch all
/// PUT    {base}/records/{id}  update
/// DELETE {base}/records/{id}  delete
/// ```
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, ConfigError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ConfigError::Message("remote.base_url is required for the http backend".into())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Message(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.base_url)
    }

    fn record_url(&self, id: Uuid) -> String {
        format!("{}/records/{}", self.base_url, id)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        debug!("Remote store answered {}: {}", status, message);
        Err(match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited,
            _ => RemoteError::Rejected {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn backend_name(&self) -> &str {
        "http"
    }

    async fn save(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        let response = self
            .send(self.client.post(self.records_url()).json(record))
            .await?;
        Ok(response.json().await?)
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        let response = self.send(self.client.get(self.records_url())).await?;
        Ok(response.json().await?)
    }

    async fn update(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        let response = self
            .send(self.client.put(self.record_url(record.id())).json(record))
            .await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
        self.send(self.client.delete(self.record_url(id))).await?;
        Ok(())
    }
}
