use std::collections::HashMap;
use std::sync::Arc;

use deploy_core::sandbox::SandboxProvider;
use once_cell::sync::OnceCell;

use crate::mock::MockSandboxProvider;
use crate::providers::HttpSandboxProvider;

/// Provider name -> sandbox template name, as described in §4.C.
pub type TemplateMap = HashMap<String, String>;

/// Process-wide sandbox-factory registry (§9 Design Notes): initialized
/// lazily on first request from `SANDBOX_BUILDER_DEFAULT_PROVIDER` and the
/// provider-specific credentials, never torn down.
pub struct SandboxRegistry {
    providers: HashMap<String, Arc<dyn SandboxProvider>>,
    default_provider: String,
}

static REGISTRY: OnceCell<SandboxRegistry> = OnceCell::new();

impl SandboxRegistry {
    fn build_from_env() -> Self {
        let default_provider = std::env::var("SANDBOX_BUILDER_DEFAULT_PROVIDER").unwrap_or_else(|_| "mock".into());

        let mut providers: HashMap<String, Arc<dyn SandboxProvider>> = HashMap::new();
        providers.insert("mock".into(), Arc::new(MockSandboxProvider::new()));

        if let (Ok(base_url), Ok(api_key)) = (std::env::var("E2B_BASE_URL"), std::env::var("E2B_API_KEY")) {
            providers.insert("e2b".into(), Arc::new(HttpSandboxProvider::new("e2b", base_url, api_key)));
        }
        if let (Ok(base_url), Ok(api_key)) = (std::env::var("DAYTONA_BASE_URL"), std::env::var("DAYTONA_API_KEY")) {
            providers.insert("daytona".into(), Arc::new(HttpSandboxProvider::new("daytona", base_url, api_key)));
        }

        Self { providers, default_provider }
    }

    /// Lazily initialize (once, process-wide) and return the registry.
    pub fn global() -> &'static SandboxRegistry {
        REGISTRY.get_or_init(Self::build_from_env)
    }

    pub fn default_provider(&self) -> Result<Arc<dyn SandboxProvider>, anyhow::Error> {
        self.get(&self.default_provider)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SandboxProvider>, anyhow::Error> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no sandbox provider registered for '{name}'"))
    }
}
