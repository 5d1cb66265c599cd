use super::engine::FilterEngine;
use crate::client::{ClientError, Feed, FeedClient};
use crate::rules::RuleRepository;
use std::fmt;
use std::sync::Arc;

/// Whether a pass marks entries read or only reports what it would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Look matched entries up again and log them; never mark anything read.
    Simulation,
    /// Mark every matched entry read.
    Destructive,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Simulation => f.write_str("simulation"),
            RunMode::Destructive => f.write_str("destructive"),
        }
    }
}

/// Counters for one filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Feeds with at least one applicable rule
    pub feeds_checked: usize,
    /// Feeds no rule applied to (no entries fetched)
    pub feeds_skipped: usize,
    /// Unread entries evaluated across all checked feeds
    pub entries_checked: usize,
    /// Entries at least one rule matched
    pub entries_suppressed: usize,
    /// Entries actually marked read (always 0 in simulation)
    pub entries_marked: usize,
    /// Feeds whose processing stopped on a backend error
    pub failed_feeds: Vec<i64>,
}

/// Runs filter passes: every feed, its applicable rules, its unread entries.
pub struct FilterService {
    client: Arc<dyn FeedClient>,
    rules: Arc<RuleRepository>,
    engine: FilterEngine,
}

impl FilterService {
    pub fn new(client: Arc<dyn FeedClient>, rules: Arc<RuleRepository>) -> Self {
        Self {
            client,
            rules,
            engine: FilterEngine::new(),
        }
    }

    /// Run one full pass over every feed.
    ///
    /// Feed-level failures are logged and the pass moves to the next feed.
    /// Returns `Err` only when the feed list cannot be fetched or the backend
    /// rejects the credentials; feeds already processed stay processed.
    pub async fn run(&self, mode: RunMode) -> Result<RunReport, ClientError> {
        let feeds = self.client.list_feeds().await?;
        tracing::debug!(feeds = feeds.len(), mode = %mode, "Starting filter run");

        let mut report = RunReport::default();
        for feed in &feeds {
            if let Err(e) = self.process_feed(feed, mode, &mut report).await {
                report.failed_feeds.push(feed.id);
                if e.is_fatal() {
                    tracing::error!(feed_id = feed.id, error = %e, "Aborting filter run");
                    return Err(e);
                }
            }
        }

        tracing::info!(
            mode = %mode,
            checked = report.feeds_checked,
            skipped = report.feeds_skipped,
            suppressed = report.entries_suppressed,
            marked = report.entries_marked,
            failed = report.failed_feeds.len(),
            "Filter run finished"
        );
        Ok(report)
    }

    async fn process_feed(
        &self,
        feed: &Feed,
        mode: RunMode,
        report: &mut RunReport,
    ) -> Result<(), ClientError> {
        // Snapshot per feed: a refresh mid-pass affects only later feeds
        let rules = self.rules.rules();
        let applicable = FilterEngine::applicable_rules(&rules, feed);
        if applicable.is_empty() {
            report.feeds_skipped += 1;
            return Ok(());
        }
        report.feeds_checked += 1;

        let entries = self
            .client
            .list_unread_entries(feed.id)
            .await
            .inspect_err(|e| tracing::error!(feed_id = feed.id, error = %e, "Failed to fetch unread entries"))?;
        report.entries_checked += entries.len();

        let matched = self.engine.suppressed_entries(&applicable, &entries);
        for entry_id in &matched {
            tracing::info!(entry_id = entry_id, feed_id = feed.id, "entry matches rules in the killfile");
        }
        report.entries_suppressed += matched.len();

        match mode {
            RunMode::Simulation => self.simulate(feed, &matched).await,
            RunMode::Destructive => self.mark_read(feed, &matched, report).await,
        }
    }

    async fn simulate(&self, feed: &Feed, matched: &[i64]) -> Result<(), ClientError> {
        for &entry_id in matched {
            let entry = self.client.get_entry(entry_id).await.inspect_err(|e| {
                tracing::error!(entry_id = entry_id, feed_id = feed.id, error = %e, "Failed to look up entry")
            })?;
            tracing::info!(
                entry_id = entry_id,
                entry_title = %entry.title,
                "would set status to read"
            );
        }
        Ok(())
    }

    /// Marks entries one at a time, stopping at the first failure.
    async fn mark_read(
        &self,
        feed: &Feed,
        matched: &[i64],
        report: &mut RunReport,
    ) -> Result<(), ClientError> {
        let mut marked = 0;
        for &entry_id in matched {
            tracing::info!(entry_id = entry_id, "set status to read");
            self.client
                .mark_entries_read(&[entry_id])
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        entry_id = entry_id,
                        feed_id = feed.id,
                        error = %e,
                        "error on updating the feed entries"
                    )
                })?;
            marked += 1;
            report.entries_marked += 1;
        }

        if marked > 0 {
            tracing::info!(feed_id = feed.id, affected = marked, "marked all matched feed items as read");
        }
        Ok(())
    }
}
