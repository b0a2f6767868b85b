//! Local ledger persistence boundary.

use crate::error::SyncResult;
use crate::models::{
    AccountMove, Company, Currency, Family, Journal, JournalConfig, JournalType, LogContext,
    MoveLine, MoveState, MoveType, NewCompany, NewJournal, NewJournalConfig, NewMove, NewPartner,
    NewPayment, NewProduct, NewSubscription, NewSyncLog, NewTax, Partner, Payment, Product,
    Subscription, SyncLog, Tax,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Every write commits on its own; a failure mid-batch leaves earlier records in place.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn health_check(&self) -> SyncResult<()>;

    // Companies and currencies
    async fn find_company_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Company>>;
    async fn find_company_by_name(&self, name: &str) -> SyncResult<Option<Company>>;
    async fn create_company(&self, company: NewCompany) -> SyncResult<Company>;
    async fn list_companies(&self) -> SyncResult<Vec<Company>>;
    async fn find_currency(&self, code: &str) -> SyncResult<Option<Currency>>;
    async fn create_currency(&self, currency: Currency) -> SyncResult<Currency>;

    // Partners
    async fn find_partner_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Partner>>;
    async fn find_partner_by_name(&self, name: &str) -> SyncResult<Option<Partner>>;
    async fn create_partner(&self, partner: NewPartner) -> SyncResult<Partner>;
    async fn update_partner(&self, partner_id: Uuid, partner: NewPartner) -> SyncResult<Partner>;
    /// All partners in creation order.
    async fn list_partners(&self) -> SyncResult<Vec<Partner>>;

    // Catalog
    async fn find_product_by_item_id(&self, item_id: &str) -> SyncResult<Option<Product>>;
    /// Insert or refresh the product keyed by remote item id.
    async fn upsert_product(&self, product: NewProduct) -> SyncResult<Product>;
    async fn find_family_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Family>>;
    async fn upsert_family(&self, remote_id: &str, name: &str) -> SyncResult<Family>;
    /// Insert or refresh the tax keyed by (remote tax name, company).
    async fn upsert_tax(&self, tax: NewTax) -> SyncResult<Tax>;
    async fn list_taxes(&self, company_id: Uuid) -> SyncResult<Vec<Tax>>;

    // Journals
    async fn create_journal(&self, journal: NewJournal) -> SyncResult<Journal>;
    async fn get_journal(&self, journal_id: Uuid) -> SyncResult<Option<Journal>>;
    async fn list_journals(&self, company_id: Option<Uuid>) -> SyncResult<Vec<Journal>>;
    /// First journal of the given type for a company, in creation order.
    async fn first_journal_of_type(
        &self,
        company_id: Uuid,
        journal_type: JournalType,
    ) -> SyncResult<Option<Journal>>;
    async fn create_journal_config(&self, config: NewJournalConfig) -> SyncResult<JournalConfig>;
    async fn list_journal_configs(&self, company_id: Option<Uuid>)
        -> SyncResult<Vec<JournalConfig>>;
    /// First configuration for exactly this (company, family).
    async fn find_journal_config(
        &self,
        company_id: Uuid,
        family_id: Uuid,
    ) -> SyncResult<Option<JournalConfig>>;
    /// First configuration for the company, whatever its family.
    async fn first_journal_config(&self, company_id: Uuid) -> SyncResult<Option<JournalConfig>>;

    // Invoices and credit notes
    async fn find_move(
        &self,
        remote_id: &str,
        company_id: Uuid,
        move_type: MoveType,
    ) -> SyncResult<Option<AccountMove>>;
    /// Create a draft document with its lines.
    async fn create_move(&self, new_move: NewMove) -> SyncResult<AccountMove>;
    /// Replace header fields and lines of an existing document.
    async fn replace_move_content(&self, move_id: Uuid, new_move: NewMove)
        -> SyncResult<AccountMove>;
    async fn set_move_state(&self, move_id: Uuid, state: MoveState) -> SyncResult<AccountMove>;
    async fn move_lines(&self, move_id: Uuid) -> SyncResult<Vec<MoveLine>>;
    async fn list_moves(&self, move_type: Option<MoveType>) -> SyncResult<Vec<AccountMove>>;

    /// Record a payment and reduce the document's residual by its amount.
    async fn register_payment(&self, payment: NewPayment) -> SyncResult<Payment>;
    async fn payments_for_move(&self, move_id: Uuid) -> SyncResult<Vec<Payment>>;

    // Subscriptions
    async fn upsert_subscription(&self, subscription: NewSubscription)
        -> SyncResult<Subscription>;
    async fn find_subscription(&self, remote_id: &str) -> SyncResult<Option<Subscription>>;
    /// Overwrite status and plan after a change made on the platform.
    async fn update_subscription_terms(
        &self,
        remote_id: &str,
        status: &str,
        plan_item_price_id: Option<&str>,
    ) -> SyncResult<Subscription>;

    // Sync logs (append-only)
    async fn insert_sync_log(&self, log: NewSyncLog) -> SyncResult<SyncLog>;
    async fn list_sync_logs(&self, context: Option<LogContext>) -> SyncResult<Vec<SyncLog>>;
}
