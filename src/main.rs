use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ecomatrix_locator::config::ConfigSet;
use ecomatrix_locator::handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ConfigSet::load_from_env().context("failed to load configuration")?;
    info!(
        root = ?config.root(),
        locations = config.locations.len(),
        top_n = config.ranking.top_n,
        "configuration loaded"
    );
    info!(
        north = config.service_area.bounds.north,
        south = config.service_area.bounds.south,
        east = config.service_area.bounds.east,
        west = config.service_area.bounds.west,
        "service area"
    );
    info!(
        sample_rate_hz = config.telephony.sample_rate_hz,
        chunk_bytes = config.telephony.bytes_per_chunk(),
        max_sessions = config.telephony.max_sessions,
        "media stream settings"
    );

    let bind_addr = config.server.bind_addr.clone();
    let app_state = AppState::new(config);
    let sessions = Arc::clone(&app_state.sessions);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "WebSocket endpoint: ws://{bind_addr}/media");

    ecomatrix_locator::run_with_listener(listener, app_state)
        .await
        .context("server terminated")?;

    info!(active = sessions.active_sessions(), "server stopped");
    Ok(())
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}
