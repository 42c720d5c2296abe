use async_trait::async_trait;
use deploy_contracts::{
    CoreError, Project, ProjectUpdate, RestoreOutcome, StepRecord, SubscriptionLimit,
};

/// Transactional reads/writes of the `project` table. Implementations never
/// open cross-row transactions; every call is scoped to one project.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn load(&self, project_id: &str, organization_id: &str) -> Result<Project, CoreError>;

    async fn update(&self, project_id: &str, update: ProjectUpdate) -> Result<(), CoreError>;
}

/// Which quota counter an operation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Deploy,
    Upload,
}

/// The quota side of persistence: atomic deduction and restoration over the
/// FREE/paid subscription rows of one organization. The business rules
/// (priority, period refresh, over-restoration guard) live in
/// [`crate::quota::QuotaLedger`]; this trait is the storage seam beneath it.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Database-side current time. Used by [`crate::quota::QuotaLedger`] to
    /// decide which deduction path to take so that routing agrees with the
    /// `NOW()`-based precondition inside `try_deduct`'s SQL, regardless of
    /// clock skew on the calling node.
    async fn now(&self) -> Result<chrono::DateTime<chrono::Utc>, CoreError>;

    /// The organization's FREE-tier row, if one exists.
    async fn get_free(&self, organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError>;

    /// The organization's active non-FREE row, if one exists.
    async fn get_active_paid(&self, organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError>;

    /// Atomically decrement `resource` by one for the named tier, iff the
    /// row is active, has headroom, and its period has not elapsed.
    /// Returns `Ok(None)` (not an error) when the precondition fails.
    async fn try_deduct(
        &self,
        organization_id: &str,
        plan_name: &str,
        resource: Resource,
    ) -> Result<Option<SubscriptionLimit>, CoreError>;

    /// Under a row lock: if the FREE row's period has elapsed, advance it
    /// to the next period and reset quotas to plan defaults; then deduct
    /// one unit of `resource` in the same transaction. Returns `None` if
    /// there is no FREE row at all.
    async fn refresh_and_deduct_free(
        &self,
        organization_id: &str,
        resource: Resource,
    ) -> Result<Option<SubscriptionLimit>, CoreError>;

    /// Increment upload quota by one, preferring FREE (bounded by its plan
    /// default) and falling back to the active paid row.
    async fn restore_upload(&self, organization_id: &str) -> Result<RestoreOutcome, CoreError>;
}

/// Per-step persisted outcome, keyed by `(workflow_id, step_name)`.
#[async_trait]
pub trait StepStore: Send + Sync {
    async fn load(&self, workflow_id: &str, step_name: &str) -> Result<Option<StepRecord>, CoreError>;

    async fn save(&self, record: StepRecord) -> Result<(), CoreError>;
}
