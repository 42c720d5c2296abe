use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use deploy_contracts::{CoreError, FileMap};
use deploy_core::sandbox::{
    CreateSandboxOptions, ExecOptions, ExecOutcome, FileWriteResult, SandboxHandle, SandboxProvider,
    WriteFilesOutcome,
};

/// Local, in-process sandbox used by tests and local development. Ids are
/// prefixed `sandbox-` so the workflow's step 6 skips termination for them,
/// matching the mock-sandbox convention in the reference spec.
#[derive(Default)]
pub struct MockSandboxProvider {
    next_id: AtomicU64,
    written: Mutex<HashMap<String, FileMap>>,
}

impl MockSandboxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_written_to(&self, sandbox_id: &str) -> Option<FileMap> {
        self.written.lock().unwrap().get(sandbox_id).cloned()
    }
}

#[async_trait]
impl SandboxProvider for MockSandboxProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(&self, _options: CreateSandboxOptions) -> Result<SandboxHandle, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SandboxHandle { id: format!("sandbox-{id}"), provider: "mock".into() })
    }

    async fn connect(&self, id: &str) -> Result<SandboxHandle, CoreError> {
        Ok(SandboxHandle { id: id.to_string(), provider: "mock".into() })
    }

    async fn write_files(&self, handle: &SandboxHandle, files: &FileMap) -> Result<WriteFilesOutcome, CoreError> {
        self.written.lock().unwrap().insert(handle.id.clone(), files.clone());
        let results = files
            .keys()
            .map(|path| FileWriteResult { path: path.clone(), success: true, error: None })
            .collect();
        Ok(WriteFilesOutcome { success: true, results })
    }

    async fn execute_command(
        &self,
        _handle: &SandboxHandle,
        _command: &str,
        _options: ExecOptions,
    ) -> Result<ExecOutcome, CoreError> {
        Ok(ExecOutcome { exit_code: 0, stdout: String::new(), stderr: String::new() })
    }

    async fn terminate(&self, handle: &SandboxHandle, _timeout: Duration) -> Result<bool, CoreError> {
        self.written.lock().unwrap().remove(&handle.id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_mock_prefixed_ids() {
        let provider = MockSandboxProvider::new();
        let handle = provider
            .create(CreateSandboxOptions { template: "t".into(), timeout: Duration::from_secs(1), env: HashMap::new() })
            .await
            .unwrap();
        assert!(handle.is_mock());
    }

    #[tokio::test]
    async fn write_files_records_the_file_map() {
        let provider = MockSandboxProvider::new();
        let handle = provider
            .create(CreateSandboxOptions { template: "t".into(), timeout: Duration::from_secs(1), env: HashMap::new() })
            .await
            .unwrap();
        let mut files = FileMap::new();
        files.insert(
            "src/App.tsx".into(),
            deploy_contracts::FileEntry { content: "x".into(), is_binary: false, parent_path: Some("src".into()) },
        );
        let outcome = provider.write_files(&handle, &files).await.unwrap();
        assert!(outcome.success);
        assert_eq!(provider.files_written_to(&handle.id).unwrap(), files);
    }
}
