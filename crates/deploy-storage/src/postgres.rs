use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deploy_contracts::{
    CoreError, DeploymentStatus, Project, ProjectUpdate, RestoreOutcome, StepRecord,
    SubscriptionLimit, Tier, FREE_PLAN,
};
use deploy_core::plan_limits::{PlanLimits, StaticPlanLimits};
use deploy_core::stores::{ProjectStore, Resource, StepStore, SubscriptionStore};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

/// Thin wrapper around a `PgPool`, mirroring the reference storage crate's
/// `Database` struct.
#[derive(Clone)]
pub struct Pg {
    pool: PgPool,
}

impl Pg {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn infra(err: sqlx::Error) -> CoreError {
    CoreError::PersistenceFailure(err.to_string())
}

// ============================================================
// Project store
// ============================================================

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: String,
    organization_id: String,
    is_active: bool,
    message_history: serde_json::Value,
    production_deploy_url: Option<String>,
    workflow_id: Option<String>,
    deployment_status: String,
    knowledge: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            organization_id: row.organization_id,
            is_active: row.is_active,
            message_history: row.message_history,
            production_deploy_url: row.production_deploy_url,
            workflow_id: row.workflow_id,
            deployment_status: parse_status(&row.deployment_status),
            knowledge: row.knowledge,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn parse_status(s: &str) -> DeploymentStatus {
    match s {
        "preparing" => DeploymentStatus::Preparing,
        "building" => DeploymentStatus::Building,
        "deploying" => DeploymentStatus::Deploying,
        "deployed" => DeploymentStatus::Deployed,
        "failed" => DeploymentStatus::Failed,
        _ => DeploymentStatus::Idle,
    }
}

fn status_str(s: DeploymentStatus) -> &'static str {
    match s {
        DeploymentStatus::Idle => "idle",
        DeploymentStatus::Preparing => "preparing",
        DeploymentStatus::Building => "building",
        DeploymentStatus::Deploying => "deploying",
        DeploymentStatus::Deployed => "deployed",
        DeploymentStatus::Failed => "failed",
    }
}

pub struct PgProjectStore {
    db: Pg,
}

impl PgProjectStore {
    pub fn new(db: Pg) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    #[instrument(skip(self), level = "debug")]
    async fn load(&self, project_id: &str, organization_id: &str) -> Result<Project, CoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, organization_id, is_active, message_history, production_deploy_url,
                   workflow_id, deployment_status, knowledge, created_at, updated_at
            FROM project
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(project_id)
        .bind(organization_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(infra)?;

        row.map(Project::from)
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))
    }

    #[instrument(skip(self, update), level = "debug")]
    async fn update(&self, project_id: &str, update: ProjectUpdate) -> Result<(), CoreError> {
        let status = update.deployment_status.map(status_str);
        let result = sqlx::query(
            r#"
            UPDATE project
            SET production_deploy_url = COALESCE($2, production_deploy_url),
                workflow_id = COALESCE($3, workflow_id),
                deployment_status = COALESCE($4, deployment_status),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .bind(update.production_deploy_url)
        .bind(update.workflow_id)
        .bind(status)
        .execute(self.db.pool())
        .await
        .map_err(infra)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProjectNotFound(project_id.to_string()));
        }
        Ok(())
    }
}

// ============================================================
// Subscription store
// ============================================================

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Result<SubscriptionLimit, CoreError> {
    Ok(SubscriptionLimit {
        id: row.try_get("id").map_err(infra)?,
        organization_id: row.try_get("organization_id").map_err(infra)?,
        plan_name: row.try_get("plan_name").map_err(infra)?,
        plan_id: row.try_get("plan_id").map_err(infra)?,
        is_active: row.try_get("is_active").map_err(infra)?,
        ai_nums: row.try_get("ai_nums").map_err(infra)?,
        enhance_nums: row.try_get("enhance_nums").map_err(infra)?,
        upload_limit: row.try_get("upload_limit").map_err(infra)?,
        deploy_limit: row.try_get("deploy_limit").map_err(infra)?,
        seats: row.try_get("seats").map_err(infra)?,
        project_nums: row.try_get("project_nums").map_err(infra)?,
        period_start: row.try_get("period_start").map_err(infra)?,
        period_end: row.try_get("period_end").map_err(infra)?,
        created_at: row.try_get("created_at").map_err(infra)?,
        updated_at: row.try_get("updated_at").map_err(infra)?,
    })
}

pub struct PgSubscriptionStore {
    db: Pg,
    plan_limits: StaticPlanLimits,
}

impl PgSubscriptionStore {
    pub fn new(db: Pg) -> Self {
        Self { db, plan_limits: StaticPlanLimits }
    }

    fn resource_column(resource: Resource) -> &'static str {
        match resource {
            Resource::Deploy => "deploy_limit",
            Resource::Upload => "upload_limit",
        }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn now(&self) -> Result<DateTime<Utc>, CoreError> {
        let row = sqlx::query("SELECT NOW() as now").fetch_one(self.db.pool()).await.map_err(infra)?;
        row.try_get::<DateTime<Utc>, _>("now").map_err(infra)
    }

    async fn get_free(&self, organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError> {
        let row = sqlx::query(
            "SELECT * FROM subscription_limit WHERE organization_id = $1 AND plan_name = $2 AND is_active = true LIMIT 1",
        )
        .bind(organization_id)
        .bind(FREE_PLAN)
        .fetch_optional(self.db.pool())
        .await
        .map_err(infra)?;
        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn get_active_paid(&self, organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError> {
        let row = sqlx::query(
            "SELECT * FROM subscription_limit WHERE organization_id = $1 AND plan_name <> $2 AND is_active = true LIMIT 1",
        )
        .bind(organization_id)
        .bind(FREE_PLAN)
        .fetch_optional(self.db.pool())
        .await
        .map_err(infra)?;
        row.as_ref().map(row_to_subscription).transpose()
    }

    #[instrument(skip(self), level = "debug")]
    async fn try_deduct(
        &self,
        organization_id: &str,
        plan_name: &str,
        resource: Resource,
    ) -> Result<Option<SubscriptionLimit>, CoreError> {
        let column = Self::resource_column(resource);
        // `column` is one of two static strings, never user input.
        let sql = format!(
            r#"
            UPDATE subscription_limit
            SET {column} = {column} - 1
            WHERE organization_id = $1 AND plan_name = $2 AND is_active = true
              AND {column} > 0 AND period_end >= NOW()
            RETURNING *
            "#
        );
        let row = sqlx::query(&sql)
            .bind(organization_id)
            .bind(plan_name)
            .fetch_optional(self.db.pool())
            .await
            .map_err(infra)?;
        row.as_ref().map(row_to_subscription).transpose()
    }

    #[instrument(skip(self), level = "debug")]
    async fn refresh_and_deduct_free(
        &self,
        organization_id: &str,
        resource: Resource,
    ) -> Result<Option<SubscriptionLimit>, CoreError> {
        let mut tx = self.db.pool().begin().await.map_err(infra)?;

        let now_row = sqlx::query("SELECT NOW() as now").fetch_one(&mut *tx).await.map_err(infra)?;
        let now: DateTime<Utc> = now_row.try_get("now").map_err(infra)?;

        let current = sqlx::query(
            "SELECT * FROM subscription_limit WHERE organization_id = $1 AND plan_name = $2 AND is_active = true FOR UPDATE",
        )
        .bind(organization_id)
        .bind(FREE_PLAN)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infra)?;

        let Some(current) = current else {
            return Ok(None);
        };
        let current = row_to_subscription(&current)?;

        let (period_start, period_end) = deploy_core::advance_period(current.period_start, now);

        let defaults = self.plan_limits.defaults(FREE_PLAN);
        let column = Self::resource_column(resource);
        let reset_value = match resource {
            Resource::Deploy => defaults.deploy_limit,
            Resource::Upload => defaults.upload_limit,
        } - 1;

        let sql = format!(
            r#"
            UPDATE subscription_limit
            SET period_start = $3, period_end = $4,
                ai_nums = $5, enhance_nums = $6, upload_limit = $7, deploy_limit = $8,
                {column} = $9
            WHERE organization_id = $1 AND plan_name = $2
            RETURNING *
            "#
        );
        let row = sqlx::query(&sql)
            .bind(organization_id)
            .bind(FREE_PLAN)
            .bind(period_start)
            .bind(period_end)
            .bind(defaults.ai_nums)
            .bind(defaults.enhance_nums)
            .bind(defaults.upload_limit)
            .bind(defaults.deploy_limit)
            .bind(reset_value)
            .fetch_one(&mut *tx)
            .await
            .map_err(infra)?;

        let result = row_to_subscription(&row)?;
        tx.commit().await.map_err(infra)?;
        Ok(Some(result))
    }

    #[instrument(skip(self), level = "debug")]
    async fn restore_upload(&self, organization_id: &str) -> Result<RestoreOutcome, CoreError> {
        let mut tx = self.db.pool().begin().await.map_err(infra)?;

        let free = sqlx::query(
            "SELECT * FROM subscription_limit WHERE organization_id = $1 AND plan_name = $2 AND is_active = true FOR UPDATE",
        )
        .bind(organization_id)
        .bind(FREE_PLAN)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infra)?;

        if let Some(row) = free.as_ref() {
            let free_row = row_to_subscription(row)?;
            let cap = self.plan_limits.defaults(FREE_PLAN).upload_limit;
            if free_row.upload_limit < cap {
                let updated = sqlx::query(
                    "UPDATE subscription_limit SET upload_limit = upload_limit + 1 WHERE organization_id = $1 AND plan_name = $2 RETURNING *",
                )
                .bind(organization_id)
                .bind(FREE_PLAN)
                .fetch_one(&mut *tx)
                .await
                .map_err(infra)?;
                let result = row_to_subscription(&updated)?;
                tx.commit().await.map_err(infra)?;
                return Ok(RestoreOutcome { restored_to: Tier::Free, plan_name: result.plan_name });
            }
        }

        let paid = sqlx::query(
            "SELECT * FROM subscription_limit WHERE organization_id = $1 AND plan_name <> $2 AND is_active = true FOR UPDATE",
        )
        .bind(organization_id)
        .bind(FREE_PLAN)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infra)?;

        let Some(paid_row) = paid else {
            return Err(CoreError::PersistenceFailure(format!(
                "no subscription row to restore upload quota for organization {organization_id}"
            )));
        };
        let paid = row_to_subscription(&paid_row)?;
        let cap = self.plan_limits.defaults(&paid.plan_name).upload_limit;
        let updated = sqlx::query(
            "UPDATE subscription_limit SET upload_limit = LEAST(upload_limit + 1, $3) WHERE organization_id = $1 AND plan_name = $2 RETURNING *",
        )
        .bind(organization_id)
        .bind(&paid.plan_name)
        .bind(cap)
        .fetch_one(&mut *tx)
        .await
        .map_err(infra)?;
        let result = row_to_subscription(&updated)?;
        tx.commit().await.map_err(infra)?;
        Ok(RestoreOutcome { restored_to: Tier::Paid, plan_name: result.plan_name })
    }
}

// ============================================================
// Step store
// ============================================================

pub struct PgStepStore {
    db: Pg,
}

impl PgStepStore {
    pub fn new(db: Pg) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StepStore for PgStepStore {
    async fn load(&self, workflow_id: &str, step_name: &str) -> Result<Option<StepRecord>, CoreError> {
        let row = sqlx::query(
            "SELECT workflow_id, step_name, attempt, started_at, finished_at, result, error FROM workflow_steps WHERE workflow_id = $1 AND step_name = $2",
        )
        .bind(workflow_id)
        .bind(step_name)
        .fetch_optional(self.db.pool())
        .await
        .map_err(infra)?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(StepRecord {
            workflow_id: row.try_get("workflow_id").map_err(infra)?,
            step_name: row.try_get("step_name").map_err(infra)?,
            attempt: row.try_get::<i32, _>("attempt").map_err(infra)? as u32,
            started_at: row.try_get("started_at").map_err(infra)?,
            finished_at: row.try_get("finished_at").map_err(infra)?,
            result: row.try_get("result").map_err(infra)?,
            error: row.try_get("error").map_err(infra)?,
        }))
    }

    async fn save(&self, record: StepRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_steps (workflow_id, step_name, attempt, started_at, finished_at, result, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (workflow_id, step_name) DO UPDATE
            SET attempt = EXCLUDED.attempt,
                finished_at = EXCLUDED.finished_at,
                result = EXCLUDED.result,
                error = EXCLUDED.error
            "#,
        )
        .bind(&record.workflow_id)
        .bind(&record.step_name)
        .bind(record.attempt as i32)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(&record.result)
        .bind(&record.error)
        .execute(self.db.pool())
        .await
        .map_err(infra)?;
        Ok(())
    }
}
