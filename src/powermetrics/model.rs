use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::timestamp::Timestamp;

/// Power attributed to one process or activity within a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub command: String,
    pub power: f64,
}

/// One powermetrics report as submitted to `POST /powermetrics`.
///
/// Lives for a single request; it is never mutated after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PowerMetrics {
    /// Identifier of the reporting machine.
    pub pc_id: String,
    /// Aggregate power draw over the window. Must be greater than zero.
    pub combined_power: f64,
    /// Per-task breakdown. Must contain at least one entry.
    pub tasks: Vec<Task>,
    #[schema(value_type = String, example = "2024-01-01 00:00:00")]
    pub start_time: Timestamp,
    /// Must be strictly after `start_time`.
    #[schema(value_type = String, example = "2024-01-01 00:10:00")]
    pub stop_time: Timestamp,
    pub platform: String,
}
