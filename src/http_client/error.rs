//! Error types for the marketplace session.

use thiserror::Error;

/// Failure of a single transport attempt, before any retry policy applies.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

impl TransportError {
    /// Anti-bot response: the upstream answered "Forbidden".
    pub fn is_blocked(&self) -> bool {
        match self {
            Self::Status { status, message } => *status == 403 || message.contains("Forbidden"),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Timeout or connection failure (no HTTP response at all).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("").to_string(),
            };
        }
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}

/// Final outcome of a session call once the retry policy is exhausted.
///
/// Callers never retry on top of this; the session owns retry.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out after {attempts} attempts: {url}")]
    Timeout { url: String, attempts: u32 },

    #[error("blocked by upstream after {attempts} attempts: {url}")]
    Blocked { url: String, attempts: u32 },

    #[error("HTTP {status} ({message}) from {url}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid session configuration: {0}")]
    Client(String),
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
