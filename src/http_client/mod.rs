//! Marketplace session: cookie seeding, a single in-flight request, and
//! retry with exponential backoff.
//!
//! Every call to the marketplace API goes through [`SessionClient`]. The
//! session owns the retry policy; callers see only the final outcome as a
//! [`SessionError`].

mod error;
mod transport;
mod user_agent;

pub use error::{SessionError, TransportError};
pub use transport::{default_headers, BoxedTransport, ReqwestTransport, Transport};
pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// Retry and backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub base_delay: Duration,
    /// Extra factor applied to the delay after a "Forbidden" response.
    pub blocked_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            blocked_multiplier: 10,
        }
    }
}

enum Request<'a> {
    Get(&'a str),
    PostJson(&'a str, serde_json::Value),
}

impl Request<'_> {
    fn url(&self) -> &str {
        match self {
            Self::Get(url) | Self::PostJson(url, _) => url,
        }
    }
}

/// Authenticated-by-cookie session against the marketplace.
///
/// At most one request is in flight at any time, retries included.
pub struct SessionClient {
    transport: BoxedTransport,
    base_url: Url,
    policy: RetryPolicy,
    gate: Semaphore,
    initialized: AtomicBool,
    cookie_jar: Option<Arc<Jar>>,
}

/// Builder for [`SessionClient`].
pub struct SessionClientBuilder {
    base_url: Url,
    user_agent: Option<String>,
    timeout: Duration,
    policy: RetryPolicy,
    transport: Option<BoxedTransport>,
}

impl SessionClientBuilder {
    /// Set the user agent string; `"impersonate"` picks a browser agent.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a prebuilt transport instead of the reqwest one.
    pub fn transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<SessionClient, SessionError> {
        let (transport, cookie_jar): (BoxedTransport, Option<Arc<Jar>>) = match self.transport {
            Some(transport) => (transport, None),
            None => {
                let user_agent = resolve_user_agent(self.user_agent.as_deref());
                let transport = ReqwestTransport::new(&self.base_url, &user_agent, self.timeout)?;
                let jar = transport.cookie_jar();
                (Arc::new(transport), Some(jar))
            }
        };

        Ok(SessionClient {
            transport,
            base_url: self.base_url,
            policy: self.policy,
            gate: Semaphore::new(1),
            initialized: AtomicBool::new(false),
            cookie_jar,
        })
    }
}

impl SessionClient {
    pub fn builder(base_url: Url) -> SessionClientBuilder {
        SessionClientBuilder {
            base_url,
            user_agent: None,
            timeout: Duration::from_secs(30),
            policy: RetryPolicy::default(),
            transport: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Cookie jar of the reqwest transport, if this session owns one.
    pub fn cookie_jar(&self) -> Option<Arc<Jar>> {
        self.cookie_jar.clone()
    }

    /// Resolve a path against the site root.
    pub fn endpoint(&self, path: &str) -> Result<String, SessionError> {
        self.base_url
            .join(path)
            .map(|u| u.to_string())
            .map_err(|e| SessionError::Client(format!("bad endpoint {}: {}", path, e)))
    }

    /// Seed cookies with one GET against the site root. No-op once seeded.
    pub async fn ensure_initialized(&self) -> Result<(), SessionError> {
        let _permit = self.acquire().await?;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.seed_cookies().await
    }

    /// Re-seed cookies unconditionally.
    pub async fn renew_cookies(&self) -> Result<(), SessionError> {
        let _permit = self.acquire().await?;
        self.seed_cookies().await
    }

    /// GET a URL and return the body as text.
    pub async fn get_string(&self, url: &str) -> Result<String, SessionError> {
        self.execute(Request::Get(url)).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(SessionError::Encode)?;
        let text = self.execute(Request::PostJson(url, body)).await?;
        serde_json::from_str(&text).map_err(|source| SessionError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, SessionError> {
        self.gate
            .acquire()
            .await
            .map_err(|_| SessionError::Client("session closed".to_string()))
    }

    /// Caller must hold the gate.
    async fn seed_cookies(&self) -> Result<(), SessionError> {
        let root = self.base_url.as_str();
        debug!("Seeding session cookies from {}", root);
        match self.transport.get(root).await {
            Ok(_) => {
                self.initialized.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => Err(final_error(root, e, 1)),
        }
    }

    async fn execute(&self, request: Request<'_>) -> Result<String, SessionError> {
        let _permit = self.acquire().await?;
        let url = request.url().to_string();

        if !self.initialized.load(Ordering::Acquire) {
            if let Err(e) = self.seed_cookies().await {
                warn!("Cookie seeding failed, continuing without: {}", e);
            }
        }

        let mut delay = self.policy.base_delay;
        let mut attempt = 1;
        loop {
            let result = match &request {
                Request::Get(url) => self.transport.get(url).await,
                Request::PostJson(url, body) => self.transport.post_json(url, body).await,
            };

            let err = match result {
                Ok(body) => return Ok(body),
                Err(e) if e.is_not_found() => return Err(SessionError::NotFound(url)),
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                warn!("Giving up on {} after {} attempts: {}", url, attempt, err);
                return Err(final_error(&url, err, attempt));
            }

            let wait = if err.is_blocked() {
                warn!("Blocked on {} (attempt {}), renewing cookies", url, attempt);
                if let Err(e) = self.seed_cookies().await {
                    warn!("Cookie renewal failed: {}", e);
                }
                scaled_delay(delay, self.policy.blocked_multiplier)
            } else {
                debug!("Attempt {} on {} failed: {}", attempt, url, err);
                delay
            };

            tokio::time::sleep(wait).await;
            delay = scaled_delay(delay, 2);
            attempt += 1;
        }
    }
}

/// Longest single wait between two attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(600);

/// `delay * factor`, saturating and capped at [`MAX_RETRY_DELAY`].
pub(crate) fn scaled_delay(delay: Duration, factor: u32) -> Duration {
    delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

fn final_error(url: &str, err: TransportError, attempts: u32) -> SessionError {
    match err {
        TransportError::Timeout(_) | TransportError::Connection(_) => SessionError::Timeout {
            url: url.to_string(),
            attempts,
        },
        ref e if e.is_blocked() => SessionError::Blocked {
            url: url.to_string(),
            attempts,
        },
        TransportError::Status { status, message } => SessionError::Http {
            url: url.to_string(),
            status,
            message,
        },
    }
}
