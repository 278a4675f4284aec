use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        // Recommendations and explanations
        .route("/recommend", get(handlers::recommend))
        .route("/explain", get(handlers::explain))
        // New users and feedback
        .route("/onboard", post(handlers::onboard))
        .route("/feedback", post(handlers::feedback))
        // Log aggregates
        .route("/analytics", get(handlers::analytics_summary))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}
