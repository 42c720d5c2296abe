use anyhow::Context;
use deploy_core::workflow::WorkflowConfig;

/// Deployment service configuration, loaded from the process environment.
/// Required variables fail fast with a descriptive error (mirrors the
/// reference's `RunnerConfig::from_env` idiom); optional variables fall
/// back to documented defaults.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub database_url: String,
    pub sandbox_provider: String,
    pub dispatcher_base_url: String,
    pub dispatch_namespace: String,
    pub cloudflare_account_id: String,
    pub cloudflare_api_token: String,
}

impl DeploymentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let sandbox_provider =
            std::env::var("SANDBOX_BUILDER_DEFAULT_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let dispatcher_base_url = std::env::var("NEXT_PUBLIC_DISPATCHER_URL").unwrap_or_default();
        let dispatch_namespace = std::env::var("CLOUDFLARE_DISPATCH_NAMESPACE").unwrap_or_else(|_| "libra-dispatch".to_string());
        let cloudflare_account_id = std::env::var("CLOUDFLARE_ACCOUNT_ID").unwrap_or_default();
        let cloudflare_api_token = std::env::var("CLOUDFLARE_API_TOKEN").unwrap_or_default();

        Ok(Self {
            database_url,
            sandbox_provider,
            dispatcher_base_url,
            dispatch_namespace,
            cloudflare_account_id,
            cloudflare_api_token,
        })
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            sandbox_template: deploy_sandbox::providers::template_for(&self.sandbox_provider).to_string(),
            dispatcher_base_url: self.dispatcher_base_url.clone(),
            dispatch_namespace: self.dispatch_namespace.clone(),
            cloudflare_account_id: self.cloudflare_account_id.clone(),
            cloudflare_api_token: self.cloudflare_api_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_domain_falls_back_to_default() {
        let config = WorkflowConfig {
            sandbox_template: "t".into(),
            dispatcher_base_url: String::new(),
            dispatch_namespace: "ns".into(),
            cloudflare_account_id: String::new(),
            cloudflare_api_token: String::new(),
        };
        assert_eq!(config.dispatcher_domain(), "libra.sh");
    }

    #[test]
    fn dispatcher_domain_extracted_from_configured_url() {
        let config = WorkflowConfig {
            sandbox_template: "t".into(),
            dispatcher_base_url: "https://dispatch.example.com/v1".into(),
            dispatch_namespace: "ns".into(),
            cloudflare_account_id: String::new(),
            cloudflare_api_token: String::new(),
        };
        assert_eq!(config.dispatcher_domain(), "dispatch.example.com");
    }
}
