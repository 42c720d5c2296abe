// Pluggable sandbox provider implementations.
//
// The core workflow only depends on `deploy_core::SandboxProvider`; this
// crate supplies the concrete backends and the provider registry that picks
// one by configuration.

pub mod mock;
pub mod providers;
pub mod registry;

pub use mock::MockSandboxProvider;
pub use registry::{SandboxRegistry, TemplateMap};
