use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment status of a project, advanced only at recognized workflow
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Idle,
    Preparing,
    Building,
    Deploying,
    Deployed,
    Failed,
}

impl Default for DeploymentStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// A project row as owned by an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub organization_id: String,
    pub is_active: bool,
    /// Raw JSON array of history entries; parsed on demand by the materializer.
    pub message_history: serde_json::Value,
    pub production_deploy_url: Option<String>,
    pub workflow_id: Option<String>,
    pub deployment_status: DeploymentStatus,
    pub knowledge: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// A project is a valid deployment target only when active.
    pub fn is_deployable(&self) -> bool {
        self.is_active
    }
}

/// Fields the workflow is permitted to update on a project row. No other
/// field of `Project` is ever mutated by the deployment workflow.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub production_deploy_url: Option<String>,
    pub workflow_id: Option<String>,
    pub deployment_status: Option<DeploymentStatus>,
}
