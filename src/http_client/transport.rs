//! Single-attempt HTTP transport behind the session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::Client;
use url::Url;

use super::error::{SessionError, TransportError};

/// One HTTP attempt. No retries, no gating: the session layers those on top.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a URL and return the body as text.
    async fn get(&self, url: &str) -> Result<String, TransportError>;

    /// POST a JSON body and return the response body as text.
    async fn post_json(&self, url: &str, body: &serde_json::Value)
        -> Result<String, TransportError>;
}

/// Shared transport trait object.
pub type BoxedTransport = Arc<dyn Transport>;

/// reqwest-backed transport with a persistent cookie jar.
pub struct ReqwestTransport {
    client: Client,
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    pub fn new(base_url: &Url, user_agent: &str, timeout: Duration) -> Result<Self, SessionError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .default_headers(default_headers(base_url)?)
            .cookie_provider(jar.clone())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| SessionError::Client(e.to_string()))?;

        Ok(Self { client, jar })
    }

    /// The jar backing this transport. Image downloads share it.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }
}

/// Headers the marketplace expects from its own web frontend.
pub fn default_headers(base_url: &Url) -> Result<HeaderMap, SessionError> {
    let origin = base_url.origin().ascii_serialization();
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(
        ORIGIN,
        HeaderValue::from_str(&origin).map_err(|e| SessionError::Client(e.to_string()))?,
    );
    headers.insert(
        REFERER,
        HeaderValue::from_str(base_url.as_str())
            .map_err(|e| SessionError::Client(e.to_string()))?,
    );
    Ok(headers)
}

async fn read_body(response: reqwest::Response) -> Result<String, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("").to_string(),
        });
    }
    Ok(response.text().await?)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let response = self.client.get(url).send().await?;
        read_body(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, TransportError> {
        let response = self.client.post(url).json(body).send().await?;
        read_body(response).await
    }
}
