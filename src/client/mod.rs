//! Feed backend access.
//!
//! The filter job only talks to the backend through [`FeedClient`], so it can
//! run against Miniflux in production and an in-memory double in tests.

mod miniflux;
mod types;

pub use miniflux::{Credentials, MinifluxClient, User};
pub use types::{ClientError, Entry, Feed};

use async_trait::async_trait;

/// Operations the filter job needs from the feed backend.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// All subscribed feeds.
    async fn list_feeds(&self) -> Result<Vec<Feed>, ClientError>;

    /// Unread entries of one feed.
    async fn list_unread_entries(&self, feed_id: i64) -> Result<Vec<Entry>, ClientError>;

    /// Set the given entries to "read".
    async fn mark_entries_read(&self, entry_ids: &[i64]) -> Result<(), ClientError>;

    /// A single entry by id.
    async fn get_entry(&self, entry_id: i64) -> Result<Entry, ClientError>;
}
