//! HTTP router.
//!
//! Layers (outermost first): CORS → request tracing → handler.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{endpoints, AppState};

/// Build the service router over `state`.
///
/// NOTE: Path params use `:param` syntax (axum 0.7).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(endpoints::health::check))
        .route(
            "/feedback",
            get(endpoints::feedback::list).post(endpoints::feedback::create),
        )
        .route("/feedback/:id", get(endpoints::feedback::detail))
        .route("/ai_analysis", get(endpoints::analysis::run))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
