use serde::{Deserialize, Serialize};

/// Parameters a caller supplies to start a deployment. `init_files` and
/// `history_messages` are accepted for shape compatibility but the workflow
/// re-reads the authoritative copies from the project store rather than
/// trusting client-supplied values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentParams {
    pub project_id: String,
    pub organization_id: String,
    pub user_id: String,
    #[serde(default)]
    pub custom_domain: Option<String>,
    #[serde(default)]
    pub init_files: Option<serde_json::Value>,
    #[serde(default)]
    pub history_messages: Option<serde_json::Value>,
}

/// Opaque handle returned by `create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Errored,
    Terminated,
}

/// Full status snapshot returned by `get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub id: String,
    pub status: WorkflowStatus,
    pub current_step: Option<String>,
    pub failed_step: Option<String>,
    pub error_message: Option<String>,
    pub production_deploy_url: Option<String>,
}
