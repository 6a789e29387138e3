//! Liveness endpoint for external health probes.

use axum::Router;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Result;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn home() -> impl IntoResponse {
    "media relay is running"
}

async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// The probe router: a static banner at `/` and JSON at `/health`.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .layer(CorsLayer::new().allow_origin(Any))
}

/// Serves the liveness endpoint until the process exits.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server dies.
pub async fn serve(host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    log::info!("liveness endpoint on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}
