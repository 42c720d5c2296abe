use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted outcome of one workflow step invocation. The workflow only
/// ever sees the typed result of a completed step; this record is owned by
/// the step store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub workflow_id: String,
    pub step_name: String,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Serialized success value, present only once the step has completed.
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl StepRecord {
    pub fn new(workflow_id: impl Into<String>, step_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            step_name: step_name.into(),
            attempt: 1,
            started_at: now,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }
}
