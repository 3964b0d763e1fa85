//! HTTP surface
//!
//! JSON routes over the agent loop, the single-shot pipeline and the
//! database reports.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/query", post(handlers::query))
        .route("/ask", post(handlers::ask))
        .route("/ask-with-tools", post(handlers::ask_with_tools))
        .route("/test", get(handlers::test_llm))
        .route("/summary", get(handlers::summary))
        .route("/categories", get(handlers::categories))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process stops
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("tabletalk listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
