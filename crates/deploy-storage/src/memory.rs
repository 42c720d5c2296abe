use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use deploy_contracts::{CoreError, Project, ProjectUpdate, RestoreOutcome, StepRecord, SubscriptionLimit, Tier, FREE_PLAN};
use deploy_core::plan_limits::{PlanLimits, StaticPlanLimits};
use deploy_core::stores::{ProjectStore, Resource, StepStore, SubscriptionStore};

/// In-memory project store for tests. Not thread-contended in practice
/// (tests run one workflow at a time per instance) so a coarse mutex over a
/// hash map is sufficient, mirroring the reference's lighter-weight test
/// doubles next to the Postgres implementations.
#[derive(Default)]
pub struct MemoryProjectStore {
    projects: Mutex<HashMap<String, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project: Project) {
        self.projects.lock().unwrap().insert(project.id.clone(), project);
    }

    pub fn get(&self, id: &str) -> Option<Project> {
        self.projects.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn load(&self, project_id: &str, organization_id: &str) -> Result<Project, CoreError> {
        let projects = self.projects.lock().unwrap();
        projects
            .get(project_id)
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))
    }

    async fn update(&self, project_id: &str, update: ProjectUpdate) -> Result<(), CoreError> {
        let mut projects = self.projects.lock().unwrap();
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))?;
        if let Some(url) = update.production_deploy_url {
            project.production_deploy_url = Some(url);
        }
        if let Some(workflow_id) = update.workflow_id {
            project.workflow_id = Some(workflow_id);
        }
        if let Some(status) = update.deployment_status {
            project.deployment_status = status;
        }
        project.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySubscriptionStore {
    rows: Mutex<HashMap<(String, String), SubscriptionLimit>>,
    plan_limits: StaticPlanLimits,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: SubscriptionLimit) {
        self.rows
            .lock()
            .unwrap()
            .insert((row.organization_id.clone(), row.plan_name.clone()), row);
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn now(&self) -> Result<chrono::DateTime<Utc>, CoreError> {
        Ok(Utc::now())
    }

    async fn get_free(&self, organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError> {
        Ok(self.rows.lock().unwrap().get(&(organization_id.to_string(), FREE_PLAN.to_string())).cloned())
    }

    async fn get_active_paid(&self, organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|r| r.organization_id == organization_id && r.plan_name != FREE_PLAN && r.is_active)
            .cloned())
    }

    async fn try_deduct(
        &self,
        organization_id: &str,
        plan_name: &str,
        resource: Resource,
    ) -> Result<Option<SubscriptionLimit>, CoreError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&(organization_id.to_string(), plan_name.to_string())) else {
            return Ok(None);
        };
        if !row.is_active || row.period_expired(Utc::now()) {
            return Ok(None);
        }
        let field = match resource {
            Resource::Deploy => &mut row.deploy_limit,
            Resource::Upload => &mut row.upload_limit,
        };
        if *field <= 0 {
            return Ok(None);
        }
        *field -= 1;
        Ok(Some(row.clone()))
    }

    async fn refresh_and_deduct_free(
        &self,
        organization_id: &str,
        resource: Resource,
    ) -> Result<Option<SubscriptionLimit>, CoreError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&(organization_id.to_string(), FREE_PLAN.to_string())) else {
            return Ok(None);
        };
        let (period_start, period_end) = deploy_core::advance_period(row.period_start, Utc::now());
        row.period_start = period_start;
        row.period_end = period_end;

        let defaults = self.plan_limits.defaults(FREE_PLAN);
        row.ai_nums = defaults.ai_nums;
        row.enhance_nums = defaults.enhance_nums;
        row.upload_limit = defaults.upload_limit;
        row.deploy_limit = defaults.deploy_limit;
        match resource {
            Resource::Deploy => row.deploy_limit -= 1,
            Resource::Upload => row.upload_limit -= 1,
        }
        Ok(Some(row.clone()))
    }

    async fn restore_upload(&self, organization_id: &str) -> Result<RestoreOutcome, CoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&(organization_id.to_string(), FREE_PLAN.to_string())) {
            let cap = self.plan_limits.defaults(FREE_PLAN).upload_limit;
            if row.upload_limit < cap {
                row.upload_limit += 1;
                return Ok(RestoreOutcome { restored_to: Tier::Free, plan_name: row.plan_name.clone() });
            }
        }
        let paid_key = rows
            .keys()
            .find(|(org, plan)| org == organization_id && plan != FREE_PLAN)
            .cloned();
        let Some(key) = paid_key else {
            return Err(CoreError::PersistenceFailure(format!(
                "no subscription row to restore upload quota for organization {organization_id}"
            )));
        };
        let row = rows.get_mut(&key).unwrap();
        let cap = self.plan_limits.defaults(&row.plan_name).upload_limit;
        row.upload_limit = (row.upload_limit + 1).min(cap);
        Ok(RestoreOutcome { restored_to: Tier::Paid, plan_name: row.plan_name.clone() })
    }
}

#[derive(Default)]
pub struct MemoryStepStore {
    records: Mutex<HashMap<(String, String), StepRecord>>,
}

impl MemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StepStore for MemoryStepStore {
    async fn load(&self, workflow_id: &str, step_name: &str) -> Result<Option<StepRecord>, CoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(workflow_id.to_string(), step_name.to_string()))
            .cloned())
    }

    async fn save(&self, record: StepRecord) -> Result<(), CoreError> {
        self.records
            .lock()
            .unwrap()
            .insert((record.workflow_id.clone(), record.step_name.clone()), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_contracts::DeploymentStatus;

    fn project(id: &str, org: &str, active: bool) -> Project {
        let now = Utc::now();
        Project {
            id: id.into(),
            organization_id: org.into(),
            is_active: active,
            message_history: serde_json::json!([]),
            production_deploy_url: None,
            workflow_id: None,
            deployment_status: DeploymentStatus::Idle,
            knowledge: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn load_rejects_wrong_organization() {
        let store = MemoryProjectStore::new();
        store.insert(project("proj-1", "org-1", true));
        let err = store.load("proj-1", "org-2").await.unwrap_err();
        assert!(matches!(err, CoreError::ProjectNotFound(_)));
    }

    #[tokio::test]
    async fn update_only_touches_allowed_fields() {
        let store = MemoryProjectStore::new();
        store.insert(project("proj-1", "org-1", true));
        store
            .update(
                "proj-1",
                ProjectUpdate {
                    production_deploy_url: Some("https://x.libra.sh".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let loaded = store.load("proj-1", "org-1").await.unwrap();
        assert_eq!(loaded.production_deploy_url.as_deref(), Some("https://x.libra.sh"));
        assert!(loaded.is_active);
    }
}
