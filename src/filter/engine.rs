use crate::client::{Entry, Feed};
use crate::rules::{Comparator, Field, FilterExpression, Rule};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Distinct regex patterns kept compiled.
const REGEX_CACHE_SIZE: usize = 256;

/// A rule could not be evaluated against an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("invalid regular expression {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// Decides which entries the killfile suppresses.
///
/// Compiled regexes are kept in an LRU cache keyed by pattern text; a pattern
/// that fails to compile is cached as invalid so it is reported once, not per
/// entry.
pub struct FilterEngine {
    regexes: Mutex<LruCache<String, Result<Regex, String>>>,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::with_cache_capacity(REGEX_CACHE_SIZE)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            regexes: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Rules whose selector picks this feed, in rule-set order.
    pub fn applicable_rules<'a>(rules: &'a [Rule], feed: &Feed) -> Vec<&'a Rule> {
        rules
            .iter()
            .filter(|rule| rule.selector().applies_to(&feed.url, &feed.category))
            .collect()
    }

    /// Evaluate one expression against one entry.
    ///
    /// `Ok(true)` means the expression asks for the entry to be suppressed.
    pub fn evaluate(&self, expression: &FilterExpression, entry: &Entry) -> Result<bool, MatchError> {
        let target = target_field(entry, expression.field());

        let hit = match expression.comparator() {
            Comparator::Matches | Comparator::NotMatches => {
                self.regex(expression.pattern())?.is_match(target)
            }
            Comparator::ContainsAny | Comparator::ContainsNone => {
                expression.terms().any(|term| target.contains(term))
            }
        };

        Ok(hit != expression.comparator().is_inverted())
    }

    /// Whether any rule suppresses the entry.
    ///
    /// Every rule is evaluated even after a hit so each match is logged. A rule
    /// that cannot be evaluated counts as no match.
    pub fn should_kill(&self, rules: &[&Rule], entry: &Entry) -> bool {
        let mut kill = false;

        for rule in rules {
            match self.evaluate(rule.expression(), entry) {
                Ok(true) => {
                    tracing::debug!(entry_id = entry.id, rule = %rule, "Rule matched entry");
                    kill = true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(entry_id = entry.id, rule = %rule, error = %e, "Rule skipped");
                }
            }
        }

        kill
    }

    /// Ids of the entries suppressed by any of `rules`, in entry order.
    pub fn suppressed_entries(&self, rules: &[&Rule], entries: &[Entry]) -> Vec<i64> {
        entries
            .iter()
            .filter(|entry| self.should_kill(rules, entry))
            .map(|entry| entry.id)
            .collect()
    }

    fn regex(&self, pattern: &str) -> Result<Regex, MatchError> {
        let mut cache = self.regexes.lock().unwrap_or_else(PoisonError::into_inner);

        let compiled = match cache.get(pattern) {
            Some(cached) => cached.clone(),
            None => {
                let compiled = Regex::new(pattern).map_err(|e| e.to_string());
                if let Err(message) = &compiled {
                    tracing::error!(pattern = %pattern, error = %message, "Invalid regular expression in killfile");
                }
                cache.put(pattern.to_string(), compiled.clone());
                compiled
            }
        };

        compiled.map_err(|message| MatchError::InvalidRegex {
            pattern: pattern.to_string(),
            message,
        })
    }
}

fn target_field(entry: &Entry, field: Field) -> &str {
    match field {
        Field::Title => &entry.title,
        Field::Content => &entry.content,
        Field::Author => &entry.author,
    }
}
