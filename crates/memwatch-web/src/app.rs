//! Router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::middleware::{AccessLogLayer, LiveUnitsLayer, MemoryLayer};
use crate::openapi::ApiDoc;
use crate::state::WebState;

pub(crate) fn build_router(state: WebState) -> Router {
    let memory = MemoryLayer::new(state.monitor.clone());
    let live_units = LiveUnitsLayer::new(state.monitor.source().clone());

    // Last .layer() is outermost: the access log times the instrumented
    // request, and CORS/compression see the final headers.
    Router::new()
        .route("/api/v1/health", get(handlers::handle_health))
        .route("/api/v1/health/memory", get(handlers::handle_memory_health))
        // Unversioned paths kept for existing liveness checks.
        .route("/health", get(handlers::handle_health))
        .route("/health/memory", get(handlers::handle_memory_health))
        .route(
            "/api/v1/memory/logs",
            get(handlers::handle_logs).delete(handlers::handle_purge),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(live_units)
        .layer(memory)
        .layer(AccessLogLayer)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}
