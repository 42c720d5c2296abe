use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use deploy_contracts::DeploymentParams;
use deploy_sandbox::registry::SandboxRegistry;
use deploy_storage::postgres::{Pg, PgProjectStore, PgStepStore, PgSubscriptionStore};
use deploy_worker::{DeploymentConfig, DeploymentService};

#[derive(Parser)]
#[command(name = "deploy-cli", about = "Drive the deployment workflow from the command line")]
struct Cli {
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a deployment for a project and wait for it to finish.
    Deploy {
        project_id: String,
        #[arg(long)]
        org_id: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        custom_domain: Option<String>,
    },
    /// Look up the current status of a previously started workflow.
    Status { workflow_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    deploy_worker::init_tracing();
    let cli = Cli::parse();

    let mut config = DeploymentConfig::from_env()?;
    if let Some(url) = cli.database_url.clone() {
        config.database_url = url;
    }

    let pg = Pg::connect(&config.database_url).await?;
    let project_store = Arc::new(PgProjectStore::new(pg.clone()));
    let subscription_store = Arc::new(PgSubscriptionStore::new(pg.clone()));
    let step_store = Arc::new(PgStepStore::new(pg));
    let sandbox_provider = SandboxRegistry::global().default_provider()?;

    let service = DeploymentService::new(
        project_store,
        subscription_store,
        step_store,
        sandbox_provider,
        config.workflow_config(),
    );

    match cli.command {
        Commands::Deploy { project_id, org_id, user_id, custom_domain } => {
            let instance = service
                .create(DeploymentParams {
                    project_id,
                    organization_id: org_id,
                    user_id,
                    custom_domain,
                    init_files: None,
                    history_messages: None,
                })
                .await;

            loop {
                let info = service.get(&instance.id).expect("just-created instance");
                if !matches!(info.status, deploy_contracts::WorkflowStatus::Running) {
                    print_info(&info, &cli.output);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
        Commands::Status { workflow_id } => match service.get(&workflow_id) {
            Some(info) => print_info(&info, &cli.output),
            None => println!("no workflow found with id {workflow_id}"),
        },
    }

    Ok(())
}

fn print_info(info: &deploy_contracts::WorkflowInfo, format: &OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(info).unwrap()),
        OutputFormat::Text => {
            println!("workflow {}: {:?}", info.id, info.status);
            if let Some(url) = &info.production_deploy_url {
                println!("deployed to {url}");
            }
            if let Some(step) = &info.failed_step {
                println!("failed at step {step}: {}", info.error_message.as_deref().unwrap_or(""));
            }
        }
    }
}
