pub mod config;
pub mod handlers;
pub mod locator;
pub mod models;
pub mod session;
pub mod telephony;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::AppState;

pub fn create_app(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/media", get(handlers::media_stream))
        .route("/passthru", get(handlers::passthru).post(handlers::passthru))
        .route("/api/test", get(handlers::api_test))
        .route("/api/locations", get(handlers::list_locations))
        .route("/api/locations/{id}", get(handlers::location_detail))
        .route("/api/service-area", get(handlers::service_area))
        .route("/api/find-nearby", post(handlers::find_nearby))
        .route("/api/random-location", get(handlers::random_location))
        .route("/api/intent", post(handlers::intent))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handlers::panic_response))
                .layer(cors),
        )
        .with_state(app_state)
}

/// 既存の`TcpListener`でサーバを起動（テストでも使用）
pub async fn run_with_listener(listener: TcpListener, app_state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "EcoMatrix locator listening");
    }
    axum::serve(listener, create_app(app_state)).await
}
