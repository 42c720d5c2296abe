use std::time::Duration;

use async_trait::async_trait;
use deploy_contracts::{CoreError, FileMap};
use deploy_core::sandbox::{
    CreateSandboxOptions, ExecOptions, ExecOutcome, FileWriteResult, SandboxHandle, SandboxProvider,
    WriteFilesOutcome,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// A sandbox provider backed by a REST API, shared by the e2b and daytona
/// adapters — both expose create/exec/write/terminate over HTTP, differing
/// only in base URL and auth header. New vendors plug in by constructing
/// another `HttpSandboxProvider` rather than a bespoke client.
pub struct HttpSandboxProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl HttpSandboxProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    template: &'a str,
    timeout_ms: u64,
    env: std::collections::HashMap<String, String>,
}

#[derive(Deserialize)]
struct CreateResponse {
    sandbox_id: String,
}

#[derive(Serialize)]
struct WriteFilesRequest<'a> {
    files: Vec<WriteFileEntry<'a>>,
}

#[derive(Serialize)]
struct WriteFileEntry<'a> {
    path: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WriteFilesResponse {
    results: Vec<WriteFileResult>,
}

#[derive(Deserialize)]
struct WriteFileResult {
    path: String,
    success: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct ExecRequest<'a> {
    command: &'a str,
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct ExecResponse {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

fn provider_unavailable(err: reqwest::Error) -> CoreError {
    CoreError::ProviderUnavailable(err.to_string())
}

#[async_trait]
impl SandboxProvider for HttpSandboxProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, options), fields(provider = %self.name))]
    async fn create(&self, options: CreateSandboxOptions) -> Result<SandboxHandle, CoreError> {
        let response = self
            .client
            .post(self.url("/sandboxes"))
            .bearer_auth(&self.api_key)
            .json(&CreateRequest {
                template: &options.template,
                timeout_ms: options.timeout.as_millis() as u64,
                env: options.env,
            })
            .send()
            .await
            .map_err(provider_unavailable)?
            .error_for_status()
            .map_err(provider_unavailable)?
            .json::<CreateResponse>()
            .await
            .map_err(provider_unavailable)?;

        Ok(SandboxHandle { id: response.sandbox_id, provider: self.name.clone() })
    }

    async fn connect(&self, id: &str) -> Result<SandboxHandle, CoreError> {
        self.client
            .get(self.url(&format!("/sandboxes/{id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(provider_unavailable)?
            .error_for_status()
            .map_err(provider_unavailable)?;
        Ok(SandboxHandle { id: id.to_string(), provider: self.name.clone() })
    }

    async fn write_files(&self, handle: &SandboxHandle, files: &FileMap) -> Result<WriteFilesOutcome, CoreError> {
        let entries: Vec<WriteFileEntry> = files
            .iter()
            .map(|(path, entry)| WriteFileEntry { path, content: &entry.content })
            .collect();

        let response = self
            .client
            .post(self.url(&format!("/sandboxes/{}/files", handle.id)))
            .bearer_auth(&self.api_key)
            .json(&WriteFilesRequest { files: entries })
            .send()
            .await
            .map_err(provider_unavailable)?
            .error_for_status()
            .map_err(provider_unavailable)?
            .json::<WriteFilesResponse>()
            .await
            .map_err(provider_unavailable)?;

        let results: Vec<FileWriteResult> = response
            .results
            .into_iter()
            .map(|r| FileWriteResult { path: r.path, success: r.success, error: r.error })
            .collect();
        let success = results.iter().all(|r| r.success);
        Ok(WriteFilesOutcome { success, results })
    }

    async fn execute_command(
        &self,
        handle: &SandboxHandle,
        command: &str,
        options: ExecOptions,
    ) -> Result<ExecOutcome, CoreError> {
        let response = self
            .client
            .post(self.url(&format!("/sandboxes/{}/exec", handle.id)))
            .bearer_auth(&self.api_key)
            .timeout(options.timeout)
            .json(&ExecRequest { command, timeout_ms: options.timeout.as_millis() as u64 })
            .send()
            .await
            .map_err(provider_unavailable)?
            .error_for_status()
            .map_err(provider_unavailable)?
            .json::<ExecResponse>()
            .await
            .map_err(provider_unavailable)?;

        Ok(ExecOutcome { exit_code: response.exit_code, stdout: response.stdout, stderr: response.stderr })
    }

    async fn terminate(&self, handle: &SandboxHandle, timeout: Duration) -> Result<bool, CoreError> {
        let result = self
            .client
            .delete(self.url(&format!("/sandboxes/{}", handle.id)))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .send()
            .await;

        match result.and_then(|r| r.error_for_status()) {
            Ok(_) => Ok(true),
            Err(err) => {
                warn!(error = %err, sandbox_id = %handle.id, "sandbox termination request failed");
                Ok(false)
            }
        }
    }
}

/// Static provider-name -> template-name mapping (§4.C); the core never
/// chooses templates itself.
pub fn template_for(provider: &str) -> &'static str {
    match provider {
        "e2b" => "libra-vite-shadcn-e2b",
        "daytona" => "libra-vite-shadcn-daytona",
        _ => "libra-vite-shadcn-default",
    }
}
