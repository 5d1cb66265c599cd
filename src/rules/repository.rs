use super::parser::parse_killfile;
use super::rule::{Rule, RuleSet};
use super::source::{RuleSource, SourceError};
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};

/// The active rules plus when they were installed.
#[derive(Debug, Clone)]
struct Cache {
    rules: RuleSet,
    loaded_at: Option<DateTime<Utc>>,
}

/// Owns the active rule set and mediates refreshes from a [`RuleSource`].
///
/// Readers get an `Arc` snapshot, so a refresh swapping the cache never
/// changes a set someone is already iterating. The write lock is held only
/// for the pointer swap, never across I/O.
#[derive(Debug)]
pub struct RuleRepository {
    source: RuleSource,
    cache: RwLock<Cache>,
}

impl RuleRepository {
    /// Repository with an empty cache. Call [`fetch`](Self::fetch) and
    /// [`set_cached_rules`](Self::set_cached_rules) to perform the initial load.
    pub fn new(source: RuleSource) -> Self {
        Self {
            source,
            cache: RwLock::new(Cache {
                rules: Arc::from(Vec::<Rule>::new()),
                loaded_at: None,
            }),
        }
    }

    pub fn source(&self) -> &RuleSource {
        &self.source
    }

    /// Fetch and parse the source without touching the cache.
    ///
    /// Bad killfile lines are logged and skipped; only the fetch itself can fail.
    pub async fn fetch(&self) -> Result<RuleSet, SourceError> {
        let text = self.source.fetch_text().await?;
        let outcome = parse_killfile(&text);
        if !outcome.warnings.is_empty() {
            tracing::warn!(
                source = %self.source,
                skipped = outcome.warnings.len(),
                "Some killfile lines were skipped"
            );
        }
        Ok(Arc::from(outcome.rules))
    }

    /// Re-fetch a remote source and swap the cache.
    ///
    /// Local killfiles are static for the lifetime of the process, so this is a
    /// no-op for them (use [`reload`](Self::reload) to force it). On failure
    /// the current cache is kept.
    pub async fn refresh(&self) -> Result<(), SourceError> {
        if self.source.is_local() {
            tracing::debug!(source = %self.source, "Local killfile, refresh skipped");
            return Ok(());
        }
        self.reload().await
    }

    /// Fetch and swap regardless of the source kind. On failure the current
    /// cache is kept.
    pub async fn reload(&self) -> Result<(), SourceError> {
        let rules = self.fetch().await?;
        tracing::info!(source = %self.source, rules = rules.len(), "Killfile rules refreshed");
        self.set_cached_rules(rules);
        Ok(())
    }

    /// Current rules. Empty until the first successful load.
    pub fn rules(&self) -> RuleSet {
        Arc::clone(&self.read_cache().rules)
    }

    /// When the cache was last replaced, if ever.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.read_cache().loaded_at
    }

    /// Replace the cache wholesale.
    pub fn set_cached_rules(&self, rules: impl Into<RuleSet>) {
        let cache = Cache {
            rules: rules.into(),
            loaded_at: Some(Utc::now()),
        };
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = cache;
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOON: &str = r#"ignore-article "*" "title # Moon""#;
    const SUN: &str = r#"ignore-article "*" "title # Sun"
ignore-article "*" "title # Stars""#;

    fn rule(expr: &str) -> Rule {
        Rule::new("ignore-article", "*", expr).unwrap()
    }

    async fn remote_repo(server: &MockServer) -> RuleRepository {
        let url = Url::parse(&format!("{}/killfile", server.uri())).unwrap();
        RuleRepository::new(RuleSource::remote(url).unwrap())
    }

    #[test]
    fn test_never_loaded_is_empty() {
        let repo = RuleRepository::new(RuleSource::local("/nonexistent"));
        assert!(repo.rules().is_empty());
        assert!(repo.loaded_at().is_none());
    }

    #[test]
    fn test_set_cached_rules_replaces_wholesale() {
        let repo = RuleRepository::new(RuleSource::local("/nonexistent"));
        repo.set_cached_rules(vec![rule("title # a"), rule("title # b")]);
        assert_eq!(repo.rules().len(), 2);

        repo.set_cached_rules(vec![rule("title # c")]);
        let rules = repo.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].raw_expression(), "title # c");
        assert!(repo.loaded_at().is_some());
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let repo = RuleRepository::new(RuleSource::local("/nonexistent"));
        repo.set_cached_rules(vec![rule("title # old")]);
        let snapshot = repo.rules();

        repo.set_cached_rules(vec![rule("title # new"), rule("title # newer")]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].raw_expression(), "title # old");
        assert_eq!(repo.rules().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_does_not_mutate_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOON))
            .mount(&server)
            .await;

        let repo = remote_repo(&server).await;
        let fetched = repo.fetch().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(repo.rules().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_swaps_remote_rules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUN))
            .mount(&server)
            .await;

        let repo = remote_repo(&server).await;
        repo.set_cached_rules(vec![rule("title # Moon")]);
        repo.refresh().await.unwrap();

        let patterns: Vec<_> = repo
            .rules()
            .iter()
            .map(|r| r.expression().pattern().to_string())
            .collect();
        assert_eq!(patterns, vec!["Sun", "Stars"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_rules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let repo = remote_repo(&server).await;
        repo.set_cached_rules(vec![rule("title # Moon")]);
        let before = repo.rules();

        let err = repo.refresh().await.unwrap_err();
        assert!(matches!(err, SourceError::HttpStatus(500)));
        assert_eq!(repo.rules(), before);
    }

    #[tokio::test]
    async fn test_local_refresh_is_noop() {
        let dir = std::env::temp_dir().join("sidekick_repo_test_local_refresh");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("killfile");
        std::fs::write(&file, MOON).unwrap();

        let repo = RuleRepository::new(RuleSource::local(&file));
        let initial = repo.fetch().await.unwrap();
        repo.set_cached_rules(initial);

        std::fs::write(&file, SUN).unwrap();
        repo.refresh().await.unwrap();
        assert_eq!(repo.rules().len(), 1);

        repo.reload().await.unwrap();
        assert_eq!(repo.rules().len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_local_reload_failure_keeps_rules() {
        let repo = RuleRepository::new(RuleSource::local("/tmp/sidekick_test_missing_killfile"));
        repo.set_cached_rules(vec![rule("title # Moon")]);
        assert!(repo.reload().await.is_err());
        assert_eq!(repo.rules().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_sets() {
        let repo = Arc::new(RuleRepository::new(RuleSource::local("/nonexistent")));
        repo.set_cached_rules(vec![rule("title # a")]);

        let writer = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                for i in 0..200 {
                    let rules: Vec<Rule> = if i % 2 == 0 {
                        vec![rule("title # a"), rule("title # b"), rule("title # c")]
                    } else {
                        vec![rule("title # a")]
                    };
                    repo.set_cached_rules(rules);
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..200 {
            let len = repo.rules().len();
            assert!(len == 1 || len == 3, "saw partial rule set of {len}");
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }
}
