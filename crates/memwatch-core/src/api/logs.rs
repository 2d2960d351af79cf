use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a retention purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PurgeResult {
    /// Number of entries removed.
    pub removed: u64,
}
