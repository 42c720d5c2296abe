// Storage layer for the deployment orchestration service: Postgres-backed
// adapters for production use, and in-memory adapters for fast unit tests.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryProjectStore, MemoryStepStore, MemorySubscriptionStore};
pub use postgres::{PgProjectStore, PgStepStore, PgSubscriptionStore};
