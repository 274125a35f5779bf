//! Web server setup and routing

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api;
use crate::config::TlsConfig;
use crate::state::AppState;

/// Build the dashboard router: JSON API plus the static frontend
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/discover", get(api::discover))
        .route("/api/ping", get(api::ping))
        .route("/api/nmap", get(api::nmap))
        .route("/api/sysinfo", get(api::sysinfo))
        .route("/api/speedtest", get(api::speedtest))
        .route("/api/wol", post(api::wake_on_lan))
        // Frontend
        .fallback_service(ServeDir::new(&state.config.daemon.static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the web server (HTTP or HTTPS depending on config)
pub async fn run(state: Arc<AppState>, bind: &str, tls: Option<&TlsConfig>) -> Result<()> {
    let app = router(state);

    if let Some(tls_config) = tls {
        run_https(app, bind, tls_config).await
    } else {
        run_http(app, bind).await
    }
}

async fn run_http(app: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_https(app: Router, bind: &str, tls: &TlsConfig) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    for (kind, file) in [("certificate", &tls.cert), ("key", &tls.key)] {
        if !Path::new(file).exists() {
            anyhow::bail!("TLS {kind} file not found: {file}");
        }
    }

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
        .await
        .context("failed to load TLS certificate")?;

    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {bind}"))?;
    info!(address = %bind, protocol = "HTTPS", cert = %tls.cert, "Starting web server with TLS");

    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
