use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Url};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::ExtractError;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Fetches recipe pages the way a desktop browser would.
///
/// Many recipe sites reject requests that do not look like they come from a
/// browser, so the client sends a browser User-Agent and an HTML Accept header.
pub struct RequestFetcher {
    client: Client,
}

impl RequestFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, ExtractError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| ExtractError::InvalidData(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// GET the page and return its body as UTF-8 text.
    pub async fn fetch(&self, url: &Url) -> Result<String, ExtractError> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExtractError::InvalidData(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::InvalidData(format!(
                "Request failed with status: {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExtractError::InvalidData(e.to_string()))?;

        let html = String::from_utf8(bytes.to_vec())
            .map_err(|_| ExtractError::InvalidData("Page is not valid UTF-8 text".to_string()))?;

        debug!("Fetched {} bytes from {}", html.len(), url);
        Ok(html)
    }
}
