//! OpenAPI documentation definition.

use memwatch_core::LogEntry;
use memwatch_core::api::{HealthReport, MemoryReport, PurgeResult, ServiceHealth};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_health,
        crate::handlers::handle_memory_health,
        crate::handlers::handle_logs,
        crate::handlers::handle_purge,
    ),
    components(schemas(ServiceHealth, HealthReport, MemoryReport, LogEntry, PurgeResult)),
    info(
        title = "memwatch API",
        version = "1.0",
        description = "Runtime memory health, per-request memory headers and persisted memory logs"
    )
)]
pub(crate) struct ApiDoc;
