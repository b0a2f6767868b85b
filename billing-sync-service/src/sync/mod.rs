//! Reconciliation engine and bulk synchronization jobs.

pub mod companies;
pub mod credit_notes;
pub mod exports;
pub mod family;
pub mod invoices;
pub mod jobs;
pub mod journal;
pub mod partners;
pub mod payments;
pub mod subscriptions;
pub mod timestamps;
pub mod webhook;

pub use credit_notes::CreditNoteOutcome;
pub use exports::{ItemRequest, RemoteItemOutcome};
pub use invoices::InvoiceOutcome;
pub use jobs::{BatchPolicy, JobSummary, SyncJob};
pub use journal::route;
pub use subscriptions::{PlanChange, SubscriptionOutcome};
pub use webhook::{EventKind, WebhookEvent, WebhookOutcome};

use crate::services::{BillingApi, LedgerStore};
use std::sync::Arc;
use std::time::Duration;

/// Settings the engine needs beyond its two collaborators.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub default_company_name: String,
    pub race_retry_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            default_company_name: "Main Company".to_string(),
            race_retry_delay: Duration::from_millis(900),
        }
    }
}

/// One synchronization action: a remote client handle, the ledger, and settings.
#[derive(Clone)]
pub struct Reconciler {
    api: Arc<dyn BillingApi>,
    store: Arc<dyn LedgerStore>,
    settings: SyncSettings,
}

impl Reconciler {
    pub fn new(
        api: Arc<dyn BillingApi>,
        store: Arc<dyn LedgerStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            api,
            store,
            settings,
        }
    }

    pub fn api(&self) -> &dyn BillingApi {
        self.api.as_ref()
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }
}
