use std::sync::Arc;

use deploy_contracts::{CoreError, RestoreOutcome};
use tracing::instrument;

use crate::stores::{Resource, SubscriptionStore};

/// Atomic, priority-ordered quota ledger: FREE tier is always consumed
/// before paid, and a FREE row past its period is refreshed in the same
/// transaction that deducts the current request.
pub struct QuotaLedger<S: SubscriptionStore> {
    store: Arc<S>,
}

impl<S: SubscriptionStore> QuotaLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn deduct_deploy(&self, organization_id: &str) -> Result<bool, CoreError> {
        self.deduct(organization_id, Resource::Deploy).await
    }

    pub async fn deduct_upload(&self, organization_id: &str) -> Result<bool, CoreError> {
        self.deduct(organization_id, Resource::Upload).await
    }

    #[instrument(skip(self), fields(organization_id))]
    async fn deduct(&self, organization_id: &str, resource: Resource) -> Result<bool, CoreError> {
        if let Some(free) = self.store.get_free(organization_id).await? {
            if !free.is_active {
                // fall through to paid
            } else if free.period_expired(self.store.now().await?) {
                if self
                    .store
                    .refresh_and_deduct_free(organization_id, resource)
                    .await?
                    .is_some()
                {
                    return Ok(true);
                }
            } else if self
                .store
                .try_deduct(organization_id, &free.plan_name, resource)
                .await?
                .is_some()
            {
                return Ok(true);
            }
        }

        if let Some(paid) = self.store.get_active_paid(organization_id).await? {
            if self
                .store
                .try_deduct(organization_id, &paid.plan_name, resource)
                .await?
                .is_some()
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub async fn restore_upload(&self, organization_id: &str) -> Result<RestoreOutcome, CoreError> {
        self.store.restore_upload(organization_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use deploy_contracts::{SubscriptionLimit, FREE_PLAN};
    use std::sync::Mutex;

    struct FakeStore {
        free: Mutex<Option<SubscriptionLimit>>,
        paid: Mutex<Option<SubscriptionLimit>>,
    }

    fn row(plan_name: &str, deploy_limit: i64, expired: bool) -> SubscriptionLimit {
        let now = Utc::now();
        SubscriptionLimit {
            id: "sub-1".into(),
            organization_id: "org-1".into(),
            plan_name: plan_name.into(),
            plan_id: "plan-1".into(),
            is_active: true,
            ai_nums: 10,
            enhance_nums: 10,
            upload_limit: 10,
            deploy_limit,
            seats: 1,
            project_nums: 3,
            period_start: now - ChronoDuration::days(30),
            period_end: if expired { now - ChronoDuration::days(1) } else { now + ChronoDuration::days(1) },
            created_at: now,
            updated_at: now,
        }
    }

    #[async_trait]
    impl SubscriptionStore for FakeStore {
        async fn now(&self) -> Result<chrono::DateTime<Utc>, CoreError> {
            Ok(Utc::now())
        }

        async fn get_free(&self, _organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError> {
            Ok(self.free.lock().unwrap().clone())
        }

        async fn get_active_paid(&self, _organization_id: &str) -> Result<Option<SubscriptionLimit>, CoreError> {
            Ok(self.paid.lock().unwrap().clone())
        }

        async fn try_deduct(
            &self,
            _organization_id: &str,
            plan_name: &str,
            _resource: Resource,
        ) -> Result<Option<SubscriptionLimit>, CoreError> {
            let mut guard = if plan_name == FREE_PLAN { self.free.lock().unwrap() } else { self.paid.lock().unwrap() };
            if let Some(row) = guard.as_mut() {
                if row.deploy_limit > 0 && !row.period_expired(Utc::now()) {
                    row.deploy_limit -= 1;
                    return Ok(Some(row.clone()));
                }
            }
            Ok(None)
        }

        async fn refresh_and_deduct_free(
            &self,
            _organization_id: &str,
            _resource: Resource,
        ) -> Result<Option<SubscriptionLimit>, CoreError> {
            let mut guard = self.free.lock().unwrap();
            if let Some(row) = guard.as_mut() {
                row.period_start = Utc::now();
                row.period_end = Utc::now() + ChronoDuration::days(30);
                row.deploy_limit = 2; // defaults(3) - 1
                return Ok(Some(row.clone()));
            }
            Ok(None)
        }

        async fn restore_upload(&self, _organization_id: &str) -> Result<RestoreOutcome, CoreError> {
            unimplemented!("not exercised in these tests")
        }
    }

    #[tokio::test]
    async fn prefers_free_tier_when_available() {
        let store = Arc::new(FakeStore {
            free: Mutex::new(Some(row(FREE_PLAN, 3, false))),
            paid: Mutex::new(Some(row("PRO", 10, false))),
        });
        let ledger = QuotaLedger::new(store.clone());
        assert!(ledger.deduct_deploy("org-1").await.unwrap());
        assert_eq!(store.free.lock().unwrap().as_ref().unwrap().deploy_limit, 2);
        assert_eq!(store.paid.lock().unwrap().as_ref().unwrap().deploy_limit, 10);
    }

    #[tokio::test]
    async fn falls_back_to_paid_when_free_exhausted() {
        let store = Arc::new(FakeStore {
            free: Mutex::new(Some(row(FREE_PLAN, 0, false))),
            paid: Mutex::new(Some(row("PRO", 10, false))),
        });
        let ledger = QuotaLedger::new(store.clone());
        assert!(ledger.deduct_deploy("org-1").await.unwrap());
        assert_eq!(store.paid.lock().unwrap().as_ref().unwrap().deploy_limit, 9);
    }

    #[tokio::test]
    async fn fails_when_all_tiers_exhausted() {
        let store = Arc::new(FakeStore {
            free: Mutex::new(Some(row(FREE_PLAN, 0, false))),
            paid: Mutex::new(None),
        });
        let ledger = QuotaLedger::new(store);
        assert!(!ledger.deduct_deploy("org-1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_free_period_is_refreshed_and_deducted() {
        let store = Arc::new(FakeStore {
            free: Mutex::new(Some(row(FREE_PLAN, 0, true))),
            paid: Mutex::new(None),
        });
        let ledger = QuotaLedger::new(store.clone());
        assert!(ledger.deduct_deploy("org-1").await.unwrap());
        let refreshed = store.free.lock().unwrap().clone().unwrap();
        assert_eq!(refreshed.deploy_limit, 2);
        assert!(refreshed.period_end > Utc::now());
    }
}
