use super::types::{ClientError, Entry, Feed};
use super::FeedClient;
use crate::util::{read_limited_bytes, BodyError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESPONSE_SIZE: usize = 20 * 1024 * 1024; // 20MB
/// Page size for entry listings (Miniflux caps unpaginated listings at 100).
const ENTRIES_PAGE_SIZE: usize = 100;

/// How to authenticate against the Miniflux API.
#[derive(Debug)]
pub enum Credentials {
    /// API key sent as `X-Auth-Token`
    ApiKey(SecretString),
    /// HTTP basic auth
    Basic {
        username: String,
        password: SecretString,
    },
}

/// The authenticated Miniflux user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct FeedPayload {
    id: i64,
    feed_url: String,
    #[serde(default)]
    category: Option<CategoryPayload>,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct EntryPayload {
    id: i64,
    #[serde(default)]
    feed_id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    author: String,
}

#[derive(Debug, Deserialize)]
struct EntriesPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    entries: Vec<EntryPayload>,
}

#[derive(Debug, Serialize)]
struct UpdateEntriesRequest<'a> {
    entry_ids: &'a [i64],
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    error_message: String,
}

impl From<FeedPayload> for Feed {
    fn from(f: FeedPayload) -> Self {
        Feed {
            id: f.id,
            url: f.feed_url,
            category: f.category.map(|c| c.title).unwrap_or_default(),
        }
    }
}

impl From<EntryPayload> for Entry {
    fn from(e: EntryPayload) -> Self {
        Entry {
            id: e.id,
            feed_id: e.feed_id,
            title: e.title,
            content: e.content,
            author: e.author,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Miniflux REST API client.
#[derive(Debug)]
pub struct MinifluxClient {
    http: reqwest::Client,
    base: Url,
    credentials: Credentials,
}

impl MinifluxClient {
    /// Client with the default 5s connect / 30s request timeouts.
    pub fn new(endpoint: Url, credentials: Credentials) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self::with_client(http, endpoint, credentials))
    }

    pub fn with_client(http: reqwest::Client, mut endpoint: Url, credentials: Credentials) -> Self {
        // Url::join replaces the last path segment unless the base ends in '/'
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Self {
            http,
            base: endpoint,
            credentials,
        }
    }

    /// The authenticated user. Used at startup to verify credentials.
    pub async fn me(&self) -> Result<User, ClientError> {
        let url = self.endpoint("v1/me")?;
        self.send_json(self.request(reqwest::Method::GET, url)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Decode(format!("invalid endpoint path {path}: {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Credentials::ApiKey(key) => builder.header("X-Auth-Token", key.expose_secret()),
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized);
        }

        let body = read_limited_bytes(response, MAX_RESPONSE_SIZE)
            .await
            .map_err(|e| match e {
                BodyError::Network(err) => ClientError::from(err),
                BodyError::TooLarge => ClientError::ResponseTooLarge,
            })?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorPayload>(&body)
                .map(|p| p.error_message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let body = self.send(builder).await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl FeedClient for MinifluxClient {
    async fn list_feeds(&self) -> Result<Vec<Feed>, ClientError> {
        let url = self.endpoint("v1/feeds")?;
        let feeds: Vec<FeedPayload> = self.send_json(self.request(reqwest::Method::GET, url)).await?;
        Ok(feeds.into_iter().map(Feed::from).collect())
    }

    async fn list_unread_entries(&self, feed_id: i64) -> Result<Vec<Entry>, ClientError> {
        let mut entries: Vec<Entry> = Vec::new();

        loop {
            let mut url = self.endpoint(&format!("v1/feeds/{feed_id}/entries"))?;
            url.query_pairs_mut()
                .append_pair("status", "unread")
                .append_pair("limit", &ENTRIES_PAGE_SIZE.to_string())
                .append_pair("offset", &entries.len().to_string());

            let page: EntriesPage = self.send_json(self.request(reqwest::Method::GET, url)).await?;
            let received = page.entries.len();
            entries.extend(page.entries.into_iter().map(Entry::from));

            if received < ENTRIES_PAGE_SIZE || entries.len() >= page.total {
                break;
            }
        }

        tracing::debug!(feed_id = feed_id, unread = entries.len(), "Fetched unread entries");
        Ok(entries)
    }

    async fn mark_entries_read(&self, entry_ids: &[i64]) -> Result<(), ClientError> {
        if entry_ids.is_empty() {
            return Ok(());
        }
        let url = self.endpoint("v1/entries")?;
        let body = UpdateEntriesRequest {
            entry_ids,
            status: "read",
        };
        self.send(self.request(reqwest::Method::PUT, url).json(&body))
            .await
            .map(|_| ())
    }

    async fn get_entry(&self, entry_id: i64) -> Result<Entry, ClientError> {
        let url = self.endpoint(&format!("v1/entries/{entry_id}"))?;
        let entry: EntryPayload = self.send_json(self.request(reqwest::Method::GET, url)).await?;
        Ok(entry.into())
    }
}
