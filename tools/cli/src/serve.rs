//! Local HTTP server for the dashboard front-end.

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

/// URL the manifest is published under.
pub const MANIFEST_ROUTE: &str = "/downloaded_ids.json";
/// URL prefix of the synchronized files.
pub const FILES_ROUTE: &str = "/svg_files";

/// Build the router.
///
/// `root`, when given, is served for every other path, usually the
/// dashboard's static pages.
pub fn router(manifest_path: &Path, output_dir: &Path, root: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route_service(MANIFEST_ROUTE, ServeFile::new(manifest_path))
        .nest_service(FILES_ROUTE, ServeDir::new(output_dir));

    if let Some(root) = root {
        app = app.fallback_service(ServeDir::new(root));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    // Cache headers go outermost so CORS preflight replies carry them too.
    app.layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Serving on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down server");
        })
        .await
        .context("Server error")
}
