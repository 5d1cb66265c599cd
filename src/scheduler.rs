//! Periodic filter runs and killfile refreshes.
//!
//! Both loops stop when the shutdown channel changes (or its sender drops).
//! A run in progress is allowed to finish first.
use crate::filter::{FilterService, RunMode};
use crate::rules::RuleRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// Run the filter job now and then every `every`.
pub async fn run_filter_loop(
    service: Arc<FilterService>,
    mode: RunMode,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = service.run(mode).await {
                    tracing::error!(error = %e, "Filter run failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Filter loop stopped");
}

/// Refresh the killfile every `every`, starting one interval from now.
///
/// Failures keep the current rules and are retried on the next tick.
pub async fn run_refresh_loop(
    rules: Arc<RuleRepository>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = rules.refresh().await {
                    tracing::error!(source = %rules.source(), error = %e, "Killfile refresh failed, keeping current rules");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Refresh loop stopped");
}
