use thiserror::Error;

/// A subscribed feed as seen by the filter job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    /// Category name, empty when the feed is uncategorized
    pub category: String,
}

/// An unread entry. Read-only to the filter job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
}

/// Errors returned by a [`FeedClient`](super::FeedClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Request exceeded the client timeout
    #[error("Request timed out")]
    Timeout,
    /// Credentials were rejected (401/403)
    #[error("Unauthorized: check username/password or API key")]
    Unauthorized,
    /// HTTP response with an unexpected status code
    #[error("HTTP error: status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

impl ClientError {
    /// Whether retrying the next feed in the same pass is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(err)
        }
    }
}
