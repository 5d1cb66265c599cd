use crate::util::{read_limited_bytes, BodyError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_KILLFILE_SIZE: usize = 1024 * 1024; // 1MB

/// Errors raised while fetching raw killfile text.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The local killfile could not be read
    #[error("Failed to read killfile '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// The remote killfile did not answer within the request timeout
    #[error("Request timed out")]
    Timeout,
    /// The remote killfile answered with something other than 200 OK
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The remote killfile exceeded the 1MB size limit
    #[error("Killfile too large")]
    ResponseTooLarge,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Network(err)
        }
    }
}

/// Where killfile text comes from.
#[derive(Clone)]
pub enum RuleSource {
    /// A file on disk, read again on every fetch.
    Local { path: PathBuf },
    /// A document fetched with a single GET.
    Remote { client: reqwest::Client, url: Url },
}

impl RuleSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        RuleSource::Local { path: path.into() }
    }

    /// Remote source with the default 5s connect / 10s request timeouts.
    pub fn remote(url: Url) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SourceError::Network)?;
        Ok(Self::remote_with_client(client, url))
    }

    /// Remote source using a caller-configured HTTP client.
    pub fn remote_with_client(client: reqwest::Client, url: Url) -> Self {
        RuleSource::Remote { client, url }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, RuleSource::Local { .. })
    }

    /// Fetch the raw killfile text.
    pub async fn fetch_text(&self) -> Result<String, SourceError> {
        match self {
            RuleSource::Local { path } => read_local(path).await,
            RuleSource::Remote { client, url } => read_remote(client, url).await,
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Local { path } => write!(f, "{}", path.display()),
            RuleSource::Remote { url, .. } => write!(f, "{url}"),
        }
    }
}

impl fmt::Debug for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Local { path } => f.debug_struct("Local").field("path", path).finish(),
            RuleSource::Remote { url, .. } => f
                .debug_struct("Remote")
                .field("url", &url.as_str())
                .finish_non_exhaustive(),
        }
    }
}

async fn read_local(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn read_remote(client: &reqwest::Client, url: &Url) -> Result<String, SourceError> {
    let response = client.get(url.clone()).send().await?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(SourceError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_KILLFILE_SIZE)
        .await
        .map_err(|e| match e {
            BodyError::Network(err) => SourceError::from(err),
            BodyError::TooLarge => SourceError::ResponseTooLarge,
        })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
