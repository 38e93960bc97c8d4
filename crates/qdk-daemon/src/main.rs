//! qdk-daemon entry point.
//!
//! Sets up tracing, loads config and secrets, connects the store, wires
//! middleware and starts the HTTP server. Handlers live in `routes.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use qdk_config::{
    load_from_env, report_unused_keys, resolve_delivery_secrets, UnusedKeyPolicy,
};
use qdk_core::{notifier_from_secrets, QuoteDesk, TextRenderer};
use qdk_daemon::{routes, state};
use qdk_db::PgStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_from_env()?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config contains unused keys");
    }
    let cfg = loaded.service()?;

    let secrets = resolve_delivery_secrets(&cfg.delivery)?;
    let notifier = notifier_from_secrets(&secrets)?;

    let pool = qdk_db::connect_from_env().await?;
    let st = qdk_db::status(&pool).await?;
    state::ensure_schema(&st)?;

    let store = Arc::new(PgStore::new(pool));
    let desk = QuoteDesk::new(store.collaborators(Arc::new(TextRenderer), notifier), &cfg);
    let shared = Arc::new(state::AppState::new(desk, loaded.config_hash.clone()));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 4000)));
    info!(config_hash = %loaded.config_hash, "qdk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("QDK_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
