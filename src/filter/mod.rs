//! Killfile evaluation against feed entries.
//!
//! [`FilterEngine`] decides per entry; [`FilterService`] drives a full pass
//! over the backend and applies (or simulates) the "mark read" action.

mod engine;
mod service;

pub use engine::{FilterEngine, MatchError};
pub use service::{FilterService, RunMode, RunReport};
