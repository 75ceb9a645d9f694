use std::path::PathBuf;
use std::sync::Arc;

use action_cache::ActionCache;
use notify_fabric::NotificationFabric;
use session_engine::SessionEngine;
use tracing_subscriber::{fmt, EnvFilter};

use browser_session_engine::config::{self, LogFormat};
use browser_session_engine::{build_router, metrics, ServeState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load(std::env::var("CONFIG_FILE").ok().map(PathBuf::from).as_deref())?;
    init_tracing(&config.log_format);

    metrics::register_metrics();

    let fabric = NotificationFabric::new();
    let cache = Arc::new(ActionCache::in_memory());
    let engine = Arc::new(SessionEngine::new(cache, fabric.clone()));
    let bind_addr = config.bind_addr.clone();
    let state = ServeState::new(Arc::new(config), engine, fabric);

    let router = build_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(target: "browser_session_engine", addr = %bind_addr, "listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

fn init_tracing(log_format: &LogFormat) {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    match log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}
