use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::middleware;
use axum::routing::get;
use tracing::info;

use capacity_dashboard::config::AppConfig;
use capacity_dashboard::limit::{self, RequestGate};
use capacity_dashboard::state::AppState;
use capacity_dashboard::storage::CapacityStore;
use capacity_dashboard::{poller, routes, views};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let config = AppConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .context("failed to build async runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    // Fail fast, before binding: a missing or unwritable storage root must
    // never leave a partially started listener behind.
    let store = CapacityStore::open(&config.db_path)
        .with_context(|| format!("storage root {} is unusable", config.db_path.display()))?;
    info!(root = %config.db_path.display(), "opened capacity store");

    let bind_addr = config.bind_addr;
    let gate = Arc::new(RequestGate::new(config.max_concurrent_requests));
    let state = Arc::new(AppState::new(config, store));

    poller::spawn_poller(Arc::clone(&state))?;

    let app = Router::new()
        .route("/", get(views::index))
        .route("/api/data", get(routes::get_data))
        .route("/fragments/charts", get(views::fragment_charts))
        .route("/styles.css", get(views::styles_css))
        .layer(middleware::from_fn_with_state(
            gate,
            limit::limit_concurrency,
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "listening");

    // No termination handler is installed: on signal the process dies and
    // in-flight requests are not drained. The store writes one transaction
    // per snapshot, so a kill loses at most the poll in progress.
    axum::serve(listener, app).await?;
    Ok(())
}
