use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Grammar of a filter expression: `<field> <comparator> <pattern>`.
///
/// This is the only definition of the grammar. Loading and matching both go
/// through [`FilterExpression::parse`].
static FILTER_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+) (\S+) (.+)$").expect("filter expression grammar is a valid regex")
});

/// Prefix of a category selector, e.g. `category:News,Tech`.
const CATEGORY_PREFIX: &str = "category:";

/// Immutable, cheaply clonable snapshot of the active rules.
pub type RuleSet = Arc<[Rule]>;

// ============================================================================
// Error Types
// ============================================================================

/// Reasons a filter expression is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression is not three space-separated tokens.
    #[error("expected `<field> <comparator> <pattern>`, got {0:?}")]
    Malformed(String),
    /// The first token is not a supported entry field.
    #[error("unknown field {0:?} (expected title, content, description or author)")]
    UnknownField(String),
    /// The second token is not a supported comparator.
    #[error("unknown comparator {0:?} (expected =~, !~, # or !#)")]
    UnknownComparator(String),
    /// A `#`/`!#` pattern with no non-empty term.
    #[error("no terms in {0:?} (expected comma-separated text)")]
    NoTerms(String),
}

// ============================================================================
// Expression Types
// ============================================================================

/// The entry field an expression is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    /// `content`, or its deprecated alias `description`
    Content,
    Author,
}

impl FromStr for Field {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(Field::Title),
            "content" | "description" => Ok(Field::Content),
            "author" => Ok(Field::Author),
            other => Err(ExpressionError::UnknownField(other.to_string())),
        }
    }
}

/// How the pattern is compared with the selected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `=~` regular expression matches
    Matches,
    /// `!~` regular expression does not match
    NotMatches,
    /// `#` contains any of the comma-separated terms
    ContainsAny,
    /// `!#` contains none of the comma-separated terms
    ContainsNone,
}

impl Comparator {
    /// Whether this comparator inverts the verdict of its positive form.
    pub fn is_inverted(self) -> bool {
        matches!(self, Comparator::NotMatches | Comparator::ContainsNone)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Matches => "=~",
            Comparator::NotMatches => "!~",
            Comparator::ContainsAny => "#",
            Comparator::ContainsNone => "!#",
        }
    }
}

impl FromStr for Comparator {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=~" => Ok(Comparator::Matches),
            "!~" => Ok(Comparator::NotMatches),
            "#" => Ok(Comparator::ContainsAny),
            "!#" => Ok(Comparator::ContainsNone),
            other => Err(ExpressionError::UnknownComparator(other.to_string())),
        }
    }
}

/// A validated `<field> <comparator> <pattern>` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    field: Field,
    comparator: Comparator,
    pattern: String,
}

impl FilterExpression {
    /// Parse and validate an expression against the three-token grammar.
    ///
    /// # Examples
    ///
    /// ```
    /// use sidekick::rules::{Comparator, Field, FilterExpression};
    ///
    /// let expr = FilterExpression::parse("title # Moon,Sun").unwrap();
    /// assert_eq!(expr.field(), Field::Title);
    /// assert_eq!(expr.comparator(), Comparator::ContainsAny);
    /// assert_eq!(expr.pattern(), "Moon,Sun");
    ///
    /// assert!(FilterExpression::parse("summary # Moon").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ExpressionError> {
        let caps = FILTER_EXPRESSION
            .captures(raw)
            .ok_or_else(|| ExpressionError::Malformed(raw.to_string()))?;

        let expression = Self {
            field: caps[1].parse()?,
            comparator: caps[2].parse()?,
            pattern: caps[3].to_string(),
        };

        let contains = matches!(
            expression.comparator,
            Comparator::ContainsAny | Comparator::ContainsNone
        );
        if contains && expression.terms().next().is_none() {
            return Err(ExpressionError::NoTerms(expression.pattern));
        }
        Ok(expression)
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// Raw pattern text: a regex for `=~`/`!~`, comma-separated terms for `#`/`!#`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Non-empty comma-separated literal terms of the pattern.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.pattern.split(',').filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Selector
// ============================================================================

/// Which feeds a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `*` applies to every feed
    Wildcard,
    /// Applies to feeds whose URL contains this text
    Url(String),
    /// `category:<a>,<b>` applies to feeds in any listed category.
    /// Names are stored trimmed and lowercased.
    Categories(Vec<String>),
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return Selector::Wildcard;
        }
        match raw.strip_prefix(CATEGORY_PREFIX) {
            Some(list) => Selector::Categories(
                list.split(',')
                    .map(|name| name.trim().to_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect(),
            ),
            None => Selector::Url(raw.to_string()),
        }
    }

    /// Whether a feed with this URL and category name is selected.
    pub fn applies_to(&self, feed_url: &str, category: &str) -> bool {
        match self {
            Selector::Wildcard => true,
            Selector::Url(fragment) => feed_url.contains(fragment.as_str()),
            Selector::Categories(names) => {
                let category = category.trim().to_lowercase();
                names.iter().any(|name| *name == category)
            }
        }
    }
}

// ============================================================================
// Rule
// ============================================================================

/// One killfile rule. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    command: String,
    raw_selector: String,
    selector: Selector,
    raw_expression: String,
    expression: FilterExpression,
}

impl Rule {
    /// Build a rule, validating its filter expression.
    pub fn new(
        command: impl Into<String>,
        selector: impl Into<String>,
        expression: impl Into<String>,
    ) -> Result<Self, ExpressionError> {
        let raw_selector = selector.into();
        let raw_expression = expression.into();
        let expression = FilterExpression::parse(&raw_expression)?;

        Ok(Self {
            command: command.into(),
            selector: Selector::parse(&raw_selector),
            raw_selector,
            raw_expression,
            expression,
        })
    }

    /// Free-text command label (e.g. `ignore-article`). Not used for matching.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The selector as written in the killfile.
    pub fn raw_selector(&self) -> &str {
        &self.raw_selector
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The filter expression as written in the killfile.
    pub fn raw_expression(&self) -> &str {
        &self.raw_expression
    }

    pub fn expression(&self) -> &FilterExpression {
        &self.expression
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" \"{}\"",
            self.command, self.raw_selector, self.raw_expression
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
