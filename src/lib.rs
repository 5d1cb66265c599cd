//! Killfile-driven filtering for Miniflux.
//!
//! Periodically walks every subscribed feed, evaluates its unread entries
//! against killfile rules and marks the matches as read.
//!
//! - [`rules`] killfile parsing, rule sources and the cached rule set
//! - [`filter`] per-entry evaluation and the filter pass
//! - [`client`] the feed backend contract and its Miniflux implementation
//! - [`config`], [`logging`], [`scheduler`], [`server`] the process around them

pub mod client;
pub mod config;
pub mod filter;
pub mod logging;
pub mod rules;
pub mod scheduler;
pub mod server;
pub mod util;
