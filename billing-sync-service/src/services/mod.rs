//! Services module for billing-sync-service.

pub mod billing_api;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;

pub use billing_api::{BillingApi, BillingClient};
pub use database::PgStore;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::LedgerStore;
