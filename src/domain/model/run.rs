use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EndpointId, FlowId, RunId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    /// Stopped by an external signal before the deadline.
    Aborted,
}

/// Persisted record of one load run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: RunId,
    pub flow_id: FlowId,
    pub status: RunStatus,
    pub threads: u32,
    pub duration: u64,
    pub ramp_up_duration: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// One endpoint call made during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLog {
    pub run_id: RunId,
    pub endpoint_id: EndpointId,
    pub step_id: String,
    pub virtual_user: u32,
    pub iteration: u64,
    /// Absent when no response was received.
    pub status_code: Option<u16>,
    pub success: bool,
    pub response_time_ms: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}
