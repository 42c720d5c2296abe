use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use deploy_contracts::{DeploymentParams, WorkflowInfo, WorkflowInstance, WorkflowStatus};
use deploy_core::sandbox::SandboxProvider;
use deploy_core::stores::{ProjectStore, StepStore, SubscriptionStore};
use deploy_core::workflow::{DeploymentWorkflow, WorkflowConfig};
use tracing::{error, info, instrument};
use uuid::Uuid;

/// The invocation contract callers see: `create` starts a deployment and
/// returns immediately with a handle; `get` polls it. No HTTP surface is
/// exposed here — callers embed this service directly.
pub struct DeploymentService<P, Sub, St>
where
    P: ProjectStore + 'static,
    Sub: SubscriptionStore + 'static,
    St: StepStore + 'static,
{
    project_store: Arc<P>,
    subscription_store: Arc<Sub>,
    step_store: Arc<St>,
    sandbox_provider: Arc<dyn SandboxProvider>,
    config: WorkflowConfig,
    instances: Arc<Mutex<HashMap<String, WorkflowInfo>>>,
}

impl<P, Sub, St> DeploymentService<P, Sub, St>
where
    P: ProjectStore + 'static,
    Sub: SubscriptionStore + 'static,
    St: StepStore + 'static,
{
    pub fn new(
        project_store: Arc<P>,
        subscription_store: Arc<Sub>,
        step_store: Arc<St>,
        sandbox_provider: Arc<dyn SandboxProvider>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            project_store,
            subscription_store,
            step_store,
            sandbox_provider,
            config,
            instances: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[instrument(skip(self, params), fields(project_id = %params.project_id))]
    pub async fn create(&self, params: DeploymentParams) -> WorkflowInstance {
        let workflow_id = Uuid::now_v7().to_string();
        info!(workflow_id = %workflow_id, "starting deployment workflow");

        self.instances.lock().unwrap().insert(
            workflow_id.clone(),
            WorkflowInfo {
                id: workflow_id.clone(),
                status: WorkflowStatus::Running,
                current_step: None,
                failed_step: None,
                error_message: None,
                production_deploy_url: None,
            },
        );

        let workflow = DeploymentWorkflow::new(
            workflow_id.clone(),
            self.project_store.clone(),
            self.subscription_store.clone(),
            self.sandbox_provider.clone(),
            self.step_store.clone(),
            self.config.clone(),
        );
        let instances = self.instances.clone();
        let id_for_task = workflow_id.clone();

        tokio::spawn(async move {
            match workflow.run(params).await {
                Ok(info_result) => {
                    instances.lock().unwrap().insert(id_for_task, info_result);
                }
                Err((failed_step, err)) => {
                    error!(step = %failed_step, error = %err, "deployment workflow failed");
                    let mut instances = instances.lock().unwrap();
                    if let Some(entry) = instances.get_mut(&id_for_task) {
                        entry.status = WorkflowStatus::Errored;
                        entry.failed_step = Some(failed_step);
                        entry.error_message = Some(err.to_string());
                    }
                }
            }
        });

        WorkflowInstance { id: workflow_id, status: WorkflowStatus::Running }
    }

    pub fn get(&self, workflow_id: &str) -> Option<WorkflowInfo> {
        self.instances.lock().unwrap().get(workflow_id).cloned()
    }
}
