use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::powermetrics::model::{PowerMetrics, Task};

/// One row of `total_consumption`: the parent record of a report.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TotalConsumption {
    pub pc_id: String,
    pub combined_power: f64,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub platform: String,
}

/// One row of `task_consumption`. Carries the same window, device and
/// platform as its parent so the two tables join on those columns.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TaskConsumption {
    pub task_name: String,
    pub power: f64,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub platform: String,
    pub pc_id: String,
}

impl From<&PowerMetrics> for TotalConsumption {
    fn from(p: &PowerMetrics) -> Self {
        Self {
            pc_id: p.pc_id.clone(),
            combined_power: p.combined_power,
            start_time: p.start_time.instant(),
            stop_time: p.stop_time.instant(),
            platform: p.platform.clone(),
        }
    }
}

impl TaskConsumption {
    pub fn for_task(parent: &TotalConsumption, task: &Task) -> Self {
        Self {
            task_name: task.command.clone(),
            power: task.power,
            start_time: parent.start_time,
            stop_time: parent.stop_time,
            platform: parent.platform.clone(),
            pc_id: parent.pc_id.clone(),
        }
    }
}
