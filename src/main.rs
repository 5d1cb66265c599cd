use anyhow::{Context, Result};
use clap::Parser;
use sidekick::client::{FeedClient, MinifluxClient};
use sidekick::config::{Args, FileConfig, Settings};
use sidekick::filter::FilterService;
use sidekick::logging::Logging;
use sidekick::rules::RuleRepository;
use sidekick::{scheduler, server};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    let logging = Logging::init();
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(args, file).context("Invalid configuration")?;

    logging
        .apply_default(settings.log_directive())
        .context("Failed to apply log filter")?;

    // Credentials are checked before anything is scheduled
    let client = MinifluxClient::new(settings.api_endpoint.clone(), settings.credentials)
        .context("Failed to build Miniflux client")?;
    let user = client
        .me()
        .await
        .context("Failed to log into Miniflux: check api endpoint and credentials")?;
    tracing::info!(
        username = %user.username,
        user_id = user.id,
        is_admin = user.is_admin,
        "user successfully logged in"
    );

    let source = settings
        .rule_location
        .into_source()
        .context("Failed to set up killfile source")?;
    let repository = Arc::new(RuleRepository::new(source));
    let initial = repository
        .fetch()
        .await
        .with_context(|| format!("Failed to load killfile from {}", repository.source()))?;
    tracing::info!(rules = initial.len(), source = %repository.source(), "Loaded killfile");
    repository.set_cached_rules(initial);

    let client: Arc<dyn FeedClient> = Arc::new(client);
    let service = Arc::new(FilterService::new(client, Arc::clone(&repository)));

    if settings.run_once {
        let report = service.run(settings.mode).await.context("Filter run failed")?;
        println!(
            "Checked {} feeds, {} entries matched, {} marked read",
            report.feeds_checked, report.entries_suppressed, report.entries_marked
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let filter_task = tokio::spawn(scheduler::run_filter_loop(
        Arc::clone(&service),
        settings.mode,
        settings.update_interval,
        shutdown_rx.clone(),
    ));
    let refresh_task = match settings.refresh_interval {
        Some(every) if !repository.source().is_local() => Some(tokio::spawn(
            scheduler::run_refresh_loop(Arc::clone(&repository), every, shutdown_rx.clone()),
        )),
        _ => None,
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("Failed to bind status endpoint on port {}", settings.port))?;
    tracing::info!(
        port = settings.port,
        environment = %settings.environment,
        mode = %settings.mode,
        "miniflux-sidekick is running"
    );
    let server_task = tokio::spawn(server::serve(listener, repository, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);

    if let Err(e) = filter_task.await {
        tracing::warn!(error = %e, "Filter loop ended abnormally");
    }
    if let Some(task) = refresh_task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Refresh loop ended abnormally");
        }
    }
    match server_task.await {
        Ok(Err(e)) => tracing::warn!(error = %e, "Status endpoint stopped with error"),
        Err(e) => tracing::warn!(error = %e, "Status endpoint ended abnormally"),
        Ok(Ok(())) => {}
    }

    Ok(())
}
