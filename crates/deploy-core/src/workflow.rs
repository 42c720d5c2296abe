use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use deploy_contracts::{
    flatten_tree, parse_history, CoreError, DeploymentParams, DeploymentStatus, FileMap,
    ProjectUpdate, WorkflowInfo, WorkflowStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::quota::QuotaLedger;
use crate::retry::policies;
use crate::sandbox::{is_excluded_path, CreateSandboxOptions, ExecOptions, SandboxHandle, SandboxProvider};
use crate::step_executor::{StepError, StepExecutor};
use crate::stores::{ProjectStore, StepStore, SubscriptionStore};

/// The path every file is written under inside the sandbox.
pub const TEMPLATE_ROOT: &str = "/home/user/vite-shadcn-template-builder-libra/";
const DEFAULT_DISPATCHER_DOMAIN: &str = "libra.sh";

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub sandbox_template: String,
    pub dispatcher_base_url: String,
    pub dispatch_namespace: String,
    pub cloudflare_account_id: String,
    pub cloudflare_api_token: String,
}

impl WorkflowConfig {
    /// Host portion of `dispatcher_base_url`, falling back to the constant
    /// default when empty or unparseable (§6 URL convention).
    pub fn dispatcher_domain(&self) -> String {
        extract_host(&self.dispatcher_base_url).unwrap_or_else(|| DEFAULT_DISPATCHER_DOMAIN.to_string())
    }
}

fn extract_host(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_scheme = trimmed.split("://").nth(1).unwrap_or(trimmed);
    let host = without_scheme.split('/').next().unwrap_or("");
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Step1Result {
    project_id: String,
    worker_name: String,
    template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Step2Result {
    sandbox: SandboxHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Step3Result {
    files_synced: usize,
    build_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Step4Result {
    build_success: bool,
    output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Step5Result {
    worker_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Step6Result {
    database_updated: bool,
    sandbox_cleaned: bool,
}

/// The six-step deployment pipeline: validate-and-prepare, create-sandbox,
/// sync-files, build-project, deploy-to-cloudflare,
/// update-database-and-cleanup.
pub struct DeploymentWorkflow<P, Sub, St>
where
    P: ProjectStore,
    Sub: SubscriptionStore,
    St: StepStore,
{
    workflow_id: String,
    project_store: Arc<P>,
    quota: QuotaLedger<Sub>,
    sandbox_provider: Arc<dyn SandboxProvider>,
    step_executor: StepExecutor<St>,
    config: WorkflowConfig,
}

impl<P, Sub, St> DeploymentWorkflow<P, Sub, St>
where
    P: ProjectStore,
    Sub: SubscriptionStore,
    St: StepStore,
{
    pub fn new(
        workflow_id: impl Into<String>,
        project_store: Arc<P>,
        subscription_store: Arc<Sub>,
        sandbox_provider: Arc<dyn SandboxProvider>,
        step_store: Arc<St>,
        config: WorkflowConfig,
    ) -> Self {
        let workflow_id = workflow_id.into();
        Self {
            step_executor: StepExecutor::new(step_store, workflow_id.clone()),
            quota: QuotaLedger::new(subscription_store),
            project_store,
            sandbox_provider,
            config,
            workflow_id,
        }
    }

    #[instrument(skip(self, params), fields(workflow_id = %self.workflow_id, project_id = %params.project_id))]
    pub async fn run(&self, params: DeploymentParams) -> Result<WorkflowInfo, (String, CoreError)> {
        let step1 = self
            .run_step1(&params)
            .await
            .map_err(|e| ("validate-and-prepare".to_string(), unwrap_step_error(e)))?;

        let step2 = self
            .run_step2()
            .await
            .map_err(|e| ("create-sandbox".to_string(), unwrap_step_error(e)))?;

        let step3 = self
            .run_step3(&params, &step2.sandbox)
            .await
            .map_err(|e| ("sync-files".to_string(), unwrap_step_error(e)))?;

        let _ = step3;

        let step4 = self
            .run_step4(&step2.sandbox)
            .await
            .map_err(|e| ("build-project".to_string(), unwrap_step_error(e)))?;

        let _ = step4;

        let step5 = self
            .run_step5(&step1.worker_name, &step2.sandbox)
            .await
            .map_err(|e| ("deploy-to-cloudflare".to_string(), unwrap_step_error(e)))?;

        self.set_status(&params.project_id, DeploymentStatus::Deploying).await.ok();

        let step6 = self
            .run_step6(&params.project_id, &step5.worker_url, &step2.sandbox)
            .await
            .map_err(|e| ("update-database-and-cleanup".to_string(), unwrap_step_error(e)))?;

        info!(sandbox_cleaned = step6.sandbox_cleaned, "deployment workflow completed");

        Ok(WorkflowInfo {
            id: self.workflow_id.clone(),
            status: WorkflowStatus::Completed,
            current_step: None,
            failed_step: None,
            error_message: None,
            production_deploy_url: Some(step5.worker_url),
        })
    }

    async fn set_status(&self, project_id: &str, status: DeploymentStatus) -> Result<(), CoreError> {
        self.project_store
            .update(
                project_id,
                ProjectUpdate { deployment_status: Some(status), ..Default::default() },
            )
            .await
    }

    async fn run_step1(&self, params: &DeploymentParams) -> Result<Step1Result, StepError> {
        let workflow_id = self.workflow_id.clone();
        let project_id = params.project_id.clone();
        let organization_id = params.organization_id.clone();
        let user_id = params.user_id.clone();
        self.step_executor
            .do_step("validate-and-prepare", policies::validate_and_prepare(), || {
                let workflow_id = workflow_id.clone();
                let project_id = project_id.clone();
                let organization_id = organization_id.clone();
                let user_id = user_id.clone();
                async move {
                    if user_id.trim().is_empty() {
                        return Err(CoreError::InvalidInput("userId must not be empty".to_string()));
                    }
                    if self.config.cloudflare_account_id.trim().is_empty()
                        || self.config.cloudflare_api_token.trim().is_empty()
                    {
                        return Err(CoreError::InvalidInput(
                            "edge provider credentials must not be empty".to_string(),
                        ));
                    }

                    let project = self.project_store.load(&project_id, &organization_id).await?;

                    // Deduct quota at most once per workflow attempt: if this
                    // workflow already claimed the project (a prior attempt
                    // within this step succeeded at the deduction but failed
                    // afterward), skip re-deducting.
                    if project.workflow_id.as_deref() != Some(workflow_id.as_str()) {
                        let deducted = self.quota.deduct_deploy(&organization_id).await?;
                        if !deducted {
                            return Err(CoreError::QuotaExhausted { organization_id: organization_id.clone() });
                        }
                        self.project_store
                            .update(
                                &project_id,
                                ProjectUpdate {
                                    workflow_id: Some(workflow_id.clone()),
                                    deployment_status: Some(DeploymentStatus::Preparing),
                                    ..Default::default()
                                },
                            )
                            .await?;
                    }

                    if !project.is_deployable() {
                        return Err(CoreError::ProjectInactive(project.id.clone()));
                    }

                    Ok(Step1Result {
                        project_id: project.id.clone(),
                        worker_name: format!("{}-worker", project.id),
                        template: self.config.sandbox_template.clone(),
                    })
                }
            })
            .await
    }

    async fn run_step2(&self) -> Result<Step2Result, StepError> {
        let mut env = HashMap::new();
        env.insert("CLOUDFLARE_ACCOUNT_ID".to_string(), self.config.cloudflare_account_id.clone());
        env.insert("CLOUDFLARE_API_TOKEN".to_string(), self.config.cloudflare_api_token.clone());
        let template = self.config.sandbox_template.clone();
        self.step_executor
            .do_step("create-sandbox", policies::create_sandbox(), || {
                let env = env.clone();
                let template = template.clone();
                async move {
                    let handle = self
                        .sandbox_provider
                        .create(CreateSandboxOptions { template, timeout: Duration::from_secs(180), env })
                        .await?;
                    Ok(Step2Result { sandbox: handle })
                }
            })
            .await
    }

    async fn run_step3(&self, params: &DeploymentParams, sandbox: &SandboxHandle) -> Result<Step3Result, StepError> {
        let project_id = params.project_id.clone();
        let organization_id = params.organization_id.clone();
        let template = self.config.sandbox_template.clone();
        self.step_executor
            .do_step("sync-files", policies::sync_files(), || {
                let project_id = project_id.clone();
                let organization_id = organization_id.clone();
                let template = template.clone();
                async move {
                    let project = self.project_store.load(&project_id, &organization_id).await?;
                    let init_files = flatten_tree(&crate::templates::load(&template));
                    let history = parse_history(&project.message_history);
                    let materialized = crate::materializer::materialize(&init_files, &history);

                    let mut to_write = FileMap::new();
                    for (path, entry) in materialized {
                        if is_excluded_path(&path) {
                            continue;
                        }
                        let prefixed = format!("{TEMPLATE_ROOT}{path}");
                        to_write.insert(prefixed, entry);
                    }

                    let outcome = self.sandbox_provider.write_files(sandbox, &to_write).await?;
                    if !outcome.success {
                        let failed: Vec<String> = outcome
                            .results
                            .iter()
                            .filter(|r| !r.success)
                            .map(|r| r.path.clone())
                            .collect();
                        return Err(CoreError::ProviderUnavailable(format!(
                            "failed to write files: {}",
                            failed.join(", ")
                        )));
                    }

                    Ok(Step3Result { files_synced: to_write.len(), build_ready: true })
                }
            })
            .await
    }

    async fn run_step4(&self, sandbox: &SandboxHandle) -> Result<Step4Result, StepError> {
        self.step_executor
            .do_step("build-project", policies::build_project(), || async move {
                let install = self
                    .sandbox_provider
                    .execute_command(
                        sandbox,
                        &format!("cd {TEMPLATE_ROOT} && bun install"),
                        ExecOptions { timeout: Duration::from_secs(60) },
                    )
                    .await?;
                if install.exit_code != 0 {
                    return Err(CoreError::BuildFailure { exit_code: install.exit_code, stderr: install.stderr });
                }

                let build = self
                    .sandbox_provider
                    .execute_command(
                        sandbox,
                        &format!("cd {TEMPLATE_ROOT} && bun run build"),
                        ExecOptions { timeout: Duration::from_secs(60) },
                    )
                    .await?;
                if build.exit_code != 0 {
                    return Err(CoreError::BuildFailure { exit_code: build.exit_code, stderr: build.stderr });
                }

                Ok(Step4Result { build_success: true, output: build.stdout })
            })
            .await
    }

    async fn run_step5(&self, worker_name: &str, sandbox: &SandboxHandle) -> Result<Step5Result, StepError> {
        let worker_name = worker_name.to_string();
        let namespace = self.config.dispatch_namespace.clone();
        let dispatcher_domain = self.config.dispatcher_domain();
        self.step_executor
            .do_step("deploy-to-cloudflare", policies::deploy_to_cloudflare(), || {
                let worker_name = worker_name.clone();
                let namespace = namespace.clone();
                let dispatcher_domain = dispatcher_domain.clone();
                async move {
                    let command = format!(
                        "cd {TEMPLATE_ROOT} && bun wrangler deploy --dispatch-namespace {namespace} --name {worker_name}"
                    );
                    let outcome = self
                        .sandbox_provider
                        .execute_command(sandbox, &command, ExecOptions { timeout: Duration::from_secs(60) })
                        .await?;
                    if outcome.exit_code != 0 {
                        return Err(CoreError::DeployFailure { exit_code: outcome.exit_code, stderr: outcome.stderr });
                    }
                    Ok(Step5Result { worker_url: format!("https://{worker_name}.{dispatcher_domain}") })
                }
            })
            .await
    }

    async fn run_step6(
        &self,
        project_id: &str,
        worker_url: &str,
        sandbox: &SandboxHandle,
    ) -> Result<Step6Result, StepError> {
        let project_id = project_id.to_string();
        let worker_url = worker_url.to_string();
        let sandbox = sandbox.clone();
        self.step_executor
            .do_step("update-database-and-cleanup", policies::update_database_and_cleanup(), || {
                let project_id = project_id.clone();
                let worker_url = worker_url.clone();
                let sandbox = sandbox.clone();
                async move {
                    self.project_store
                        .update(
                            &project_id,
                            ProjectUpdate {
                                production_deploy_url: Some(worker_url.clone()),
                                deployment_status: Some(DeploymentStatus::Deployed),
                                ..Default::default()
                            },
                        )
                        .await
                        .map_err(|e| CoreError::PersistenceFailure(e.to_string()))?;

                    let sandbox_cleaned = if sandbox.is_mock() {
                        true
                    } else {
                        match self.sandbox_provider.terminate(&sandbox, Duration::from_secs(30)).await {
                            Ok(success) => success,
                            Err(err) => {
                                warn!(error = %err, "sandbox termination failed, leaving cleanup to provider timeout");
                                false
                            }
                        }
                    };

                    Ok(Step6Result { database_updated: true, sandbox_cleaned })
                }
            })
            .await
    }
}

fn unwrap_step_error(err: StepError) -> CoreError {
    match err {
        StepError::Failed(core_err) => core_err,
        StepError::Store(core_err) => core_err,
        StepError::Serialization(e) => CoreError::PersistenceFailure(e.to_string()),
    }
}
