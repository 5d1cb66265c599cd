//! Killfile text parser.
//!
//! One rule per line: `<command> "<selector>" "<field> <comparator> <pattern>"`.
//! The selector quotes are optional for older killfiles. Parsing is total:
//! bad lines become [`ParseWarning`]s and never stop the remaining lines from
//! loading.
use super::rule::{ExpressionError, Rule};
use regex::Regex;
use std::sync::LazyLock;

static RULE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(.+?)\s+"?(.+?)"?\s+"(.+)"$"#).expect("killfile line grammar is a valid regex")
});

/// Why a killfile line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarningKind {
    /// The line does not have the `<command> "<selector>" "<expression>"` shape.
    Malformed,
    /// The line has the right shape but its filter expression is invalid.
    InvalidExpression(ExpressionError),
}

/// A skipped killfile line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number
    pub line: usize,
    pub text: String,
    pub kind: ParseWarningKind,
}

/// Result of parsing a killfile: the valid rules in file order plus one
/// warning per skipped line.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub rules: Vec<Rule>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse killfile text into rules.
///
/// Blank lines and lines starting with `#` are comments and produce nothing.
///
/// # Examples
///
/// ```
/// use sidekick::rules::parse_killfile;
///
/// let text = r#"
/// ignore-article "*" "title =~ (?i)sponsored"
/// ignore-article "example.com" "summary # nope"
/// "#;
/// let outcome = parse_killfile(text);
/// assert_eq!(outcome.rules.len(), 1);
/// assert_eq!(outcome.warnings.len(), 1);
/// ```
pub fn parse_killfile(text: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok(rule) => outcome.rules.push(rule),
            Err(kind) => {
                match &kind {
                    ParseWarningKind::Malformed => {
                        tracing::warn!(line = idx + 1, text = %line, "Skipping malformed killfile line");
                    }
                    ParseWarningKind::InvalidExpression(e) => {
                        tracing::error!(line = idx + 1, error = %e, "Invalid filter expression");
                    }
                }
                outcome.warnings.push(ParseWarning {
                    line: idx + 1,
                    text: line.to_string(),
                    kind,
                });
            }
        }
    }

    tracing::debug!(
        rules = outcome.rules.len(),
        skipped = outcome.warnings.len(),
        "Parsed killfile"
    );
    outcome
}

fn parse_line(line: &str) -> Result<Rule, ParseWarningKind> {
    let caps = RULE_LINE.captures(line).ok_or(ParseWarningKind::Malformed)?;
    Rule::new(&caps[1], &caps[2], &caps[3]).map_err(ParseWarningKind::InvalidExpression)
}
