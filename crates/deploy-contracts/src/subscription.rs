use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The distinguished free-tier plan name. An organization's FREE row is the
/// tier the quota ledger always tries first.
pub const FREE_PLAN: &str = "FREE";

/// Per-organization, per-plan quota row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionLimit {
    pub id: String,
    pub organization_id: String,
    pub plan_name: String,
    pub plan_id: String,
    pub is_active: bool,
    pub ai_nums: i64,
    pub enhance_nums: i64,
    pub upload_limit: i64,
    pub deploy_limit: i64,
    pub seats: i64,
    pub project_nums: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionLimit {
    pub fn is_free(&self) -> bool {
        self.plan_name == FREE_PLAN
    }

    pub fn period_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.period_end
    }
}

/// Default quota allotment for a plan tier, used both to seed new rows and
/// to reset a FREE row on period refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanDefaults {
    pub ai_nums: i64,
    pub enhance_nums: i64,
    pub upload_limit: i64,
    pub deploy_limit: i64,
    pub seats: i64,
    pub project_nums: i64,
}

/// Which tier a quota ledger operation acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Paid,
}

/// Outcome of a successful restore: which tier absorbed the increment and
/// under which plan name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub restored_to: Tier,
    pub plan_name: String,
}
