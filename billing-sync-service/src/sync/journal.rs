//! Journal selection for documents and payments.

use crate::error::{SyncError, SyncResult};
use crate::models::{Journal, JournalConfig, JournalRole};
use crate::services::LedgerStore;
use tracing::{debug, instrument};
use uuid::Uuid;

async fn configured_journal(
    store: &dyn LedgerStore,
    config: Option<JournalConfig>,
    role: JournalRole,
) -> SyncResult<Option<Journal>> {
    match config {
        Some(config) => store.get_journal(config.journal_for(role)).await,
        None => Ok(None),
    }
}

/// Picks the journal for `role`: the (company, family) configuration, then any
/// configuration of the company, then the company's first sale or bank journal.
#[instrument(skip(store), fields(role = role.as_str()))]
pub async fn route(
    store: &dyn LedgerStore,
    role: JournalRole,
    company_id: Uuid,
    family_id: Option<Uuid>,
) -> SyncResult<Journal> {
    if let Some(family_id) = family_id {
        let exact = store.find_journal_config(company_id, family_id).await?;
        if let Some(journal) = configured_journal(store, exact, role).await? {
            debug!(journal_id = %journal.journal_id, "Journal from family configuration");
            return Ok(journal);
        }
    }

    let company_wide = store.first_journal_config(company_id).await?;
    if let Some(journal) = configured_journal(store, company_wide, role).await? {
        debug!(journal_id = %journal.journal_id, "Journal from company configuration");
        return Ok(journal);
    }

    let fallback_type = role.fallback_type();
    store
        .first_journal_of_type(company_id, fallback_type)
        .await?
        .ok_or_else(|| {
            SyncError::Configuration(format!(
                "No {} journal configured for company {}",
                fallback_type.as_str(),
                company_id
            ))
        })
}
