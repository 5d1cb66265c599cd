//! Tracing setup.
//!
//! The subscriber is installed before configuration is read so that config
//! warnings are not lost. Until settings are resolved the filter is
//! `RUST_LOG`, or `info` when unset; afterwards the environment-derived
//! default replaces it unless `RUST_LOG` was given.
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Filter used before the configured environment is known.
const STARTUP_DIRECTIVE: &str = "info";

pub type FilterLayer = reload::Layer<EnvFilter, Registry>;

/// Handle to swap the active filter once settings are resolved.
pub struct Logging {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` was set, so the filter is never replaced
    pinned: bool,
}

impl Logging {
    /// Install the global subscriber.
    pub fn init() -> Self {
        let (filter, pinned) = match EnvFilter::try_from_default_env() {
            Ok(filter) => (filter, true),
            Err(_) => (EnvFilter::new(STARTUP_DIRECTIVE), false),
        };
        let (layer, logging) = Self::new(filter, pinned);
        tracing_subscriber::registry()
            .with(layer)
            .with(fmt::layer())
            .init();
        logging
    }

    /// A reloadable filter layer and its handle, not yet installed.
    pub fn new(filter: EnvFilter, pinned: bool) -> (FilterLayer, Self) {
        let (layer, handle) = reload::Layer::new(filter);
        (layer, Self { handle, pinned })
    }

    /// Switch to `directive` unless `RUST_LOG` pinned the filter.
    pub fn apply_default(&self, directive: &str) -> Result<(), reload::Error> {
        if self.pinned {
            return Ok(());
        }
        self.handle.reload(EnvFilter::new(directive))
    }
}
