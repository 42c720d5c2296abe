use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use deploy_contracts::{CoreError, StepRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::retry::StepPolicy;
use crate::stores::StepStore;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("step exhausted retries: {0}")]
    Failed(#[source] CoreError),
    #[error("step store error: {0}")]
    Store(#[source] CoreError),
    #[error("failed to (de)serialize step result: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable step runner implementing the `Do(name, policy, fn)` contract:
/// on resume, a completed step's persisted result is returned without
/// re-invoking `fn`; on failure, attempts are retried with backoff up to
/// the policy's limit and bounded by its timeout.
pub struct StepExecutor<S: StepStore> {
    store: Arc<S>,
    workflow_id: String,
}

impl<S: StepStore> StepExecutor<S> {
    pub fn new(store: Arc<S>, workflow_id: impl Into<String>) -> Self {
        Self {
            store,
            workflow_id: workflow_id.into(),
        }
    }

    #[instrument(skip(self, f), fields(workflow_id = %self.workflow_id, step = %step_name))]
    pub async fn do_step<T, F, Fut>(
        &self,
        step_name: &str,
        policy: StepPolicy,
        f: F,
    ) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if let Some(record) = self
            .store
            .load(&self.workflow_id, step_name)
            .await
            .map_err(StepError::Store)?
        {
            if let Some(result) = record.result {
                info!("resuming with persisted step result");
                return Ok(serde_json::from_value(result)?);
            }
        }

        let mut attempt: u32 = 1;
        loop {
            let started_at = Utc::now();
            let outcome = match tokio::time::timeout(policy.timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(CoreError::SandboxTimeout(policy.timeout.as_secs())),
            };

            match outcome {
                Ok(value) => {
                    let serialized = serde_json::to_value(&value)?;
                    let mut record = StepRecord::new(&self.workflow_id, step_name, started_at);
                    record.attempt = attempt;
                    record.finished_at = Some(Utc::now());
                    record.result = Some(serialized);
                    self.store.save(record).await.map_err(StepError::Store)?;
                    return Ok(value);
                }
                Err(err) => {
                    let retryable = err.retryable() && policy.has_attempts_remaining(attempt);
                    if !retryable {
                        let mut record = StepRecord::new(&self.workflow_id, step_name, started_at);
                        record.attempt = attempt;
                        record.finished_at = Some(Utc::now());
                        record.error = Some(err.to_string());
                        self.store.save(record).await.map_err(StepError::Store)?;
                        return Err(StepError::Failed(err));
                    }
                    warn!(attempt, error = %err, "step attempt failed, retrying");
                    tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct InMemoryStepStore {
        records: Mutex<Vec<StepRecord>>,
    }

    #[async_trait]
    impl StepStore for InMemoryStepStore {
        async fn load(
            &self,
            workflow_id: &str,
            step_name: &str,
        ) -> Result<Option<StepRecord>, CoreError> {
            let records = self.records.lock().await;
            Ok(records
                .iter()
                .rev()
                .find(|r| r.workflow_id == workflow_id && r.step_name == step_name)
                .cloned())
        }

        async fn save(&self, record: StepRecord) -> Result<(), CoreError> {
            self.records.lock().await.push(record);
            Ok(())
        }
    }

    fn fast_policy(max_attempts: u32) -> StepPolicy {
        StepPolicy::new(max_attempts, Duration::from_millis(1), Backoff::Linear, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_and_persists() {
        let store = Arc::new(InMemoryStepStore::default());
        let executor = StepExecutor::new(store.clone(), "wf-1");
        let result = executor
            .do_step("step-a", fast_policy(3), || async { Ok::<_, CoreError>(42u32) })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert!(store.load("wf-1", "step-a").await.unwrap().unwrap().is_complete());
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let store = Arc::new(InMemoryStepStore::default());
        let executor = StepExecutor::new(store, "wf-2");
        let calls = AtomicU32::new(0);
        let result = executor
            .do_step("step-b", fast_policy(3), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CoreError::ProviderUnavailable("flaky".into()))
                    } else {
                        Ok::<_, CoreError>("done".to_string())
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_does_not_retry() {
        let store = Arc::new(InMemoryStepStore::default());
        let executor = StepExecutor::new(store, "wf-3");
        let calls = AtomicU32::new(0);
        let result = executor
            .do_step("step-c", fast_policy(5), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(CoreError::QuotaExhausted { organization_id: "org-1".into() }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resume_does_not_reinvoke_fn() {
        let store = Arc::new(InMemoryStepStore::default());
        let executor = StepExecutor::new(store.clone(), "wf-4");
        let calls = AtomicU32::new(0);
        let make = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CoreError>(7u32) }
        };
        let first = executor.do_step("step-d", fast_policy(3), make).await.unwrap();
        let second = executor.do_step("step-d", fast_policy(3), make).await.unwrap();
        assert_eq!(first, 7);
        assert_eq!(second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
