use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

use fingerprint_engine::api;
use fingerprint_engine::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    tracing::info!("starting fingerprint server v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("FINGERPRINT_CONFIG").ok().map(std::path::PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let app = Router::new()
        .route("/health", get(api::health::health_handler))
        .route("/fingerprint", post(api::fingerprint::fingerprint_handler))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
