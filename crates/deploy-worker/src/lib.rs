// Wires the core workflow engine to concrete storage and sandbox adapters
// and exposes the create/get invocation contract (§6). No HTTP surface is
// defined here; that plumbing lives outside this crate's scope.

pub mod config;
pub mod service;

pub use config::DeploymentConfig;
pub use service::DeploymentService;

/// Initialize the tracing subscriber the way the reference API binary does:
/// `RUST_LOG`-driven `EnvFilter` plus a plain formatting layer.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .try_init();
}
