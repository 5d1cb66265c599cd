//! Killfile rules: parsing, sources and the cached active rule set.
//!
//! - [`parser`] turns killfile text into [`Rule`]s plus per-line warnings
//! - [`source`] fetches killfile text from a local file or a remote URL
//! - [`repository`] caches the active [`RuleSet`] and swaps it on refresh
//!
//! The killfile format follows newsboat's killfiles: one
//! `<command> "<selector>" "<field> <comparator> <pattern>"` per line.

mod parser;
mod repository;
mod rule;
mod source;

pub use parser::{parse_killfile, ParseOutcome, ParseWarning, ParseWarningKind};
pub use repository::RuleRepository;
pub use rule::{Comparator, ExpressionError, Field, FilterExpression, Rule, RuleSet, Selector};
pub use source::{RuleSource, SourceError};
