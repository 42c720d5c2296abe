use deploy_contracts::{PlanDefaults, FREE_PLAN};

/// Default quota allotments by plan name, backing FREE-period refresh
/// (§4.A) and the over-restoration guard. Not spelled out operationally by
/// the distilled spec but implied by it: the refresh step has to reset to
/// *something*.
pub trait PlanLimits: Send + Sync {
    fn defaults(&self, plan_name: &str) -> PlanDefaults;
}

/// Static defaults table. A production deployment would likely back this
/// with a `plan` table, but no such table is in scope for this spec.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPlanLimits;

impl PlanLimits for StaticPlanLimits {
    fn defaults(&self, plan_name: &str) -> PlanDefaults {
        if plan_name == FREE_PLAN {
            PlanDefaults {
                ai_nums: 50,
                enhance_nums: 10,
                upload_limit: 5,
                deploy_limit: 3,
                seats: 1,
                project_nums: 3,
            }
        } else {
            PlanDefaults {
                ai_nums: 1000,
                enhance_nums: 200,
                upload_limit: 100,
                deploy_limit: 50,
                seats: 10,
                project_nums: 50,
            }
        }
    }
}
