use thiserror::Error;

/// Error taxonomy shared by the quota ledger, sandbox layer, and workflow.
/// `retryable` is the single source of truth the step executor consults
/// when deciding whether to spend another attempt.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("quota exhausted for organization {organization_id}")]
    QuotaExhausted { organization_id: String },

    #[error("project {0} not found")]
    ProjectNotFound(String),

    #[error("project {0} is not active")]
    ProjectInactive(String),

    #[error("invalid deployment input: {0}")]
    InvalidInput(String),

    #[error("sandbox provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("sandbox timed out after {0}s")]
    SandboxTimeout(u64),

    #[error("build failed (exit {exit_code}): {stderr}")]
    BuildFailure { exit_code: i32, stderr: String },

    #[error("deploy failed (exit {exit_code}): {stderr}")]
    DeployFailure { exit_code: i32, stderr: String },

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("cancellation requested")]
    CancellationRequested,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Whether a step failing with this error should consume another retry
    /// attempt. Unclassified errors (`Other`) default to retryable.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            CoreError::QuotaExhausted { .. }
                | CoreError::ProjectNotFound(_)
                | CoreError::ProjectInactive(_)
                | CoreError::InvalidInput(_)
                | CoreError::CancellationRequested
        )
    }
}
