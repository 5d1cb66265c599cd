//! Minimal HTTP status endpoint.
//!
//! - `GET /` service name
//! - `GET /health` liveness
//! - `GET /rules` the active killfile rules as JSON
use crate::rules::RuleRepository;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Debug, Serialize)]
struct RuleView {
    command: String,
    selector: String,
    filter_expression: String,
}

#[derive(Debug, Serialize)]
struct RulesResponse {
    source: String,
    count: usize,
    loaded_at: Option<DateTime<Utc>>,
    rules: Vec<RuleView>,
}

pub fn router(rules: Arc<RuleRepository>) -> Router {
    Router::new()
        .route("/", get(|| async { "miniflux-sidekick" }))
        .route("/health", get(|| async { "ok" }))
        .route("/rules", get(list_rules))
        .with_state(rules)
}

async fn list_rules(State(repo): State<Arc<RuleRepository>>) -> Json<RulesResponse> {
    let rules = repo.rules();
    Json(RulesResponse {
        source: repo.source().to_string(),
        count: rules.len(),
        loaded_at: repo.loaded_at(),
        rules: rules
            .iter()
            .map(|rule| RuleView {
                command: rule.command().to_string(),
                selector: rule.raw_selector().to_string(),
                filter_expression: rule.raw_expression().to_string(),
            })
            .collect(),
    })
}

/// Serve the status endpoint until the shutdown channel changes.
pub async fn serve(
    listener: TcpListener,
    rules: Arc<RuleRepository>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "Status endpoint listening");
    }
    axum::serve(listener, router(rules))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, RuleSource};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    async fn spawn_server(repo: Arc<RuleRepository>) -> (String, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = watch::channel(false);
        tokio::spawn(serve(listener, repo, rx));
        (base, tx)
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let repo = Arc::new(RuleRepository::new(RuleSource::local("/etc/killfile")));
        let (base, _tx) = spawn_server(repo).await;

        let body = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "miniflux-sidekick");
        let body = reqwest::get(format!("{base}/health")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_rules_empty_before_load() {
        let repo = Arc::new(RuleRepository::new(RuleSource::local("/etc/killfile")));
        let (base, _tx) = spawn_server(repo).await;

        let body = reqwest::get(format!("{base}/rules")).await.unwrap().text().await.unwrap();
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 0);
        assert_eq!(json["loaded_at"], Value::Null);
        assert_eq!(json["rules"], Value::Array(vec![]));
        assert_eq!(json["source"], "/etc/killfile");
    }

    #[tokio::test]
    async fn test_rules_lists_active_set() {
        let repo = Arc::new(RuleRepository::new(RuleSource::local("/etc/killfile")));
        repo.set_cached_rules(vec![
            Rule::new("ignore-article", "*", "title # Moon").unwrap(),
            Rule::new("ignore-article", "category:Tech", "author =~ bot$").unwrap(),
        ]);
        let (base, _tx) = spawn_server(repo).await;

        let body = reqwest::get(format!("{base}/rules")).await.unwrap().text().await.unwrap();
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 2);
        assert!(json["loaded_at"].is_string());
        assert_eq!(json["rules"][1]["selector"], "category:Tech");
        assert_eq!(json["rules"][1]["filter_expression"], "author =~ bot$");
    }
}
