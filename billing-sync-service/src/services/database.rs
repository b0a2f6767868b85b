//! PostgreSQL ledger store for billing-sync-service.

use crate::error::{SyncError, SyncResult};
use crate::models::{
    AccountMove, Company, Currency, Family, Journal, JournalConfig, JournalType, LogContext,
    MoveLine, MoveState, MoveType, NewCompany, NewJournal, NewJournalConfig, NewMove, NewPartner,
    NewPayment, NewProduct, NewSubscription, NewSyncLog, NewTax, Partner, Payment, Product,
    Subscription, SyncLog, Tax,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::LedgerStore;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const MOVE_COLUMNS: &str = "move_id, remote_id, move_type, company_id, partner_id, journal_id, \
    family_id, state, invoice_date, due_date, currency_code, amount_total, amount_residual, \
    remote_subscription_id, reference_invoice_remote_id, reversed_move_id, created_utc, updated_utc";

const PARTNER_COLUMNS: &str = "partner_id, remote_customer_id, name, email, phone, street, city, \
    zip, country, company_id, created_utc, updated_utc";

const PRODUCT_COLUMNS: &str = "product_id, remote_item_id, name, description, list_price, \
    currency_code, family_id, created_utc, updated_utc";

const CONFIG_COLUMNS: &str = "config_id, company_id, family_id, invoice_journal_id, \
    invoice_payment_journal_id, credit_note_journal_id, credit_note_payment_journal_id, created_utc";

const SUBSCRIPTION_COLUMNS: &str = "subscription_id, remote_id, partner_id, status, start_date, \
    end_date, billing_period, billing_period_unit, billing_cycles, plan_item_price_id, \
    created_utc, updated_utc";

fn db_error(operation: &str, e: sqlx::Error) -> SyncError {
    SyncError::Store(anyhow::anyhow!("Failed to {}: {}", operation, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(skip(database_url), fields(service = "billing-sync-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> SyncResult<Self> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> SyncResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SyncError::Store(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn insert_lines(
        tx: &mut Transaction<'_, Postgres>,
        move_id: Uuid,
        new_move: &NewMove,
    ) -> SyncResult<()> {
        for (position, line) in new_move.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO move_lines (line_id, move_id, product_id, remote_line_id, description,
                    quantity, price_unit, tax_amount, deferred_start, deferred_end, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(move_id)
            .bind(line.product_id)
            .bind(&line.remote_line_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.price_unit)
            .bind(line.tax_amount)
            .bind(line.deferred_start)
            .bind(line.deferred_end)
            .bind(position as i32)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("insert move line", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> SyncResult<()> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("run health check", e))?;

        timer.observe_duration();
        Ok(())
    }

    // =========================================================================
    // Companies and currencies
    // =========================================================================

    #[instrument(skip(self))]
    async fn find_company_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Company>> {
        sqlx::query_as::<_, Company>(
            "SELECT company_id, remote_id, name, currency_code, created_utc FROM companies WHERE remote_id = $1",
        )
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find company", e))
    }

    #[instrument(skip(self))]
    async fn find_company_by_name(&self, name: &str) -> SyncResult<Option<Company>> {
        sqlx::query_as::<_, Company>(
            "SELECT company_id, remote_id, name, currency_code, created_utc FROM companies WHERE name = $1 ORDER BY created_utc LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find company", e))
    }

    #[instrument(skip(self, company), fields(name = %company.name))]
    async fn create_company(&self, company: NewCompany) -> SyncResult<Company> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_company"])
            .start_timer();

        let created = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (company_id, remote_id, name, currency_code)
            VALUES ($1, $2, $3, $4)
            RETURNING company_id, remote_id, name, currency_code, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&company.remote_id)
        .bind(&company.name)
        .bind(&company.currency_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create company", e))?;

        timer.observe_duration();
        info!(company_id = %created.company_id, "Company created");
        Ok(created)
    }

    async fn list_companies(&self) -> SyncResult<Vec<Company>> {
        sqlx::query_as::<_, Company>(
            "SELECT company_id, remote_id, name, currency_code, created_utc FROM companies ORDER BY created_utc",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list companies", e))
    }

    async fn find_currency(&self, code: &str) -> SyncResult<Option<Currency>> {
        sqlx::query_as::<_, Currency>(
            "SELECT code, symbol, rounding, active FROM currencies WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find currency", e))
    }

    #[instrument(skip(self, currency), fields(code = %currency.code))]
    async fn create_currency(&self, currency: Currency) -> SyncResult<Currency> {
        sqlx::query_as::<_, Currency>(
            r#"
            INSERT INTO currencies (code, symbol, rounding, active)
            VALUES ($1, $2, $3, $4)
            RETURNING code, symbol, rounding, active
            "#,
        )
        .bind(&currency.code)
        .bind(&currency.symbol)
        .bind(currency.rounding)
        .bind(currency.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create currency", e))
    }

    // =========================================================================
    // Partners
    // =========================================================================

    #[instrument(skip(self))]
    async fn find_partner_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Partner>> {
        sqlx::query_as::<_, Partner>(&format!(
            "SELECT {} FROM partners WHERE remote_customer_id = $1 ORDER BY created_utc LIMIT 1",
            PARTNER_COLUMNS
        ))
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find partner", e))
    }

    #[instrument(skip(self))]
    async fn find_partner_by_name(&self, name: &str) -> SyncResult<Option<Partner>> {
        sqlx::query_as::<_, Partner>(&format!(
            "SELECT {} FROM partners WHERE name = $1 ORDER BY created_utc LIMIT 1",
            PARTNER_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find partner", e))
    }

    #[instrument(skip(self, partner), fields(name = %partner.name))]
    async fn create_partner(&self, partner: NewPartner) -> SyncResult<Partner> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_partner"])
            .start_timer();

        let created = sqlx::query_as::<_, Partner>(&format!(
            r#"
            INSERT INTO partners (partner_id, remote_customer_id, name, email, phone, street, city,
                zip, country, company_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PARTNER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&partner.remote_customer_id)
        .bind(&partner.name)
        .bind(&partner.email)
        .bind(&partner.phone)
        .bind(&partner.street)
        .bind(&partner.city)
        .bind(&partner.zip)
        .bind(&partner.country)
        .bind(partner.company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create partner", e))?;

        timer.observe_duration();
        Ok(created)
    }

    #[instrument(skip(self, partner), fields(partner_id = %partner_id))]
    async fn update_partner(&self, partner_id: Uuid, partner: NewPartner) -> SyncResult<Partner> {
        sqlx::query_as::<_, Partner>(&format!(
            r#"
            UPDATE partners
            SET remote_customer_id = $2, name = $3, email = $4, phone = $5, street = $6,
                city = $7, zip = $8, country = $9, company_id = $10, updated_utc = NOW()
            WHERE partner_id = $1
            RETURNING {}
            "#,
            PARTNER_COLUMNS
        ))
        .bind(partner_id)
        .bind(&partner.remote_customer_id)
        .bind(&partner.name)
        .bind(&partner.email)
        .bind(&partner.phone)
        .bind(&partner.street)
        .bind(&partner.city)
        .bind(&partner.zip)
        .bind(&partner.country)
        .bind(partner.company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("update partner", e))
    }

    async fn list_partners(&self) -> SyncResult<Vec<Partner>> {
        sqlx::query_as::<_, Partner>(&format!(
            "SELECT {} FROM partners ORDER BY created_utc",
            PARTNER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list partners", e))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn find_product_by_item_id(&self, item_id: &str) -> SyncResult<Option<Product>> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE remote_item_id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find product", e))
    }

    #[instrument(skip(self, product), fields(item_id = %product.remote_item_id))]
    async fn upsert_product(&self, product: NewProduct) -> SyncResult<Product> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_product"])
            .start_timer();

        let stored = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (product_id, remote_item_id, name, description, list_price,
                currency_code, family_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (remote_item_id) DO UPDATE
            SET name = EXCLUDED.name, description = EXCLUDED.description,
                list_price = EXCLUDED.list_price, currency_code = EXCLUDED.currency_code,
                family_id = EXCLUDED.family_id, updated_utc = NOW()
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&product.remote_item_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.list_price)
        .bind(&product.currency_code)
        .bind(product.family_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("upsert product", e))?;

        timer.observe_duration();
        Ok(stored)
    }

    async fn find_family_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Family>> {
        sqlx::query_as::<_, Family>(
            "SELECT family_id, remote_id, name FROM families WHERE remote_id = $1",
        )
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find family", e))
    }

    #[instrument(skip(self))]
    async fn upsert_family(&self, remote_id: &str, name: &str) -> SyncResult<Family> {
        sqlx::query_as::<_, Family>(
            r#"
            INSERT INTO families (family_id, remote_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (remote_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING family_id, remote_id, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(remote_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("upsert family", e))
    }

    #[instrument(skip(self, tax), fields(tax = %tax.remote_key, company_id = %tax.company_id))]
    async fn upsert_tax(&self, tax: NewTax) -> SyncResult<Tax> {
        sqlx::query_as::<_, Tax>(
            r#"
            INSERT INTO taxes (tax_id, remote_key, name, rate, company_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (remote_key, company_id) DO UPDATE
            SET name = EXCLUDED.name, rate = EXCLUDED.rate
            RETURNING tax_id, remote_key, name, rate, company_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&tax.remote_key)
        .bind(&tax.name)
        .bind(tax.rate)
        .bind(tax.company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("upsert tax", e))
    }

    async fn list_taxes(&self, company_id: Uuid) -> SyncResult<Vec<Tax>> {
        sqlx::query_as::<_, Tax>(
            "SELECT tax_id, remote_key, name, rate, company_id FROM taxes WHERE company_id = $1 ORDER BY remote_key",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list taxes", e))
    }

    // =========================================================================
    // Journals
    // =========================================================================

    #[instrument(skip(self, journal), fields(company_id = %journal.company_id))]
    async fn create_journal(&self, journal: NewJournal) -> SyncResult<Journal> {
        sqlx::query_as::<_, Journal>(
            r#"
            INSERT INTO journals (journal_id, company_id, name, journal_type)
            VALUES ($1, $2, $3, $4)
            RETURNING journal_id, company_id, name, journal_type, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(journal.company_id)
        .bind(&journal.name)
        .bind(journal.journal_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create journal", e))
    }

    async fn get_journal(&self, journal_id: Uuid) -> SyncResult<Option<Journal>> {
        sqlx::query_as::<_, Journal>(
            "SELECT journal_id, company_id, name, journal_type, created_utc FROM journals WHERE journal_id = $1",
        )
        .bind(journal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get journal", e))
    }

    async fn list_journals(&self, company_id: Option<Uuid>) -> SyncResult<Vec<Journal>> {
        sqlx::query_as::<_, Journal>(
            r#"
            SELECT journal_id, company_id, name, journal_type, created_utc
            FROM journals
            WHERE ($1::uuid IS NULL OR company_id = $1)
            ORDER BY created_utc, journal_id
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list journals", e))
    }

    #[instrument(skip(self))]
    async fn first_journal_of_type(
        &self,
        company_id: Uuid,
        journal_type: JournalType,
    ) -> SyncResult<Option<Journal>> {
        sqlx::query_as::<_, Journal>(
            r#"
            SELECT journal_id, company_id, name, journal_type, created_utc
            FROM journals
            WHERE company_id = $1 AND journal_type = $2
            ORDER BY created_utc, journal_id
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .bind(journal_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find journal by type", e))
    }

    #[instrument(skip(self, config), fields(company_id = %config.company_id))]
    async fn create_journal_config(&self, config: NewJournalConfig) -> SyncResult<JournalConfig> {
        sqlx::query_as::<_, JournalConfig>(&format!(
            r#"
            INSERT INTO journal_configs (config_id, company_id, family_id, invoice_journal_id,
                invoice_payment_journal_id, credit_note_journal_id, credit_note_payment_journal_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            CONFIG_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(config.company_id)
        .bind(config.family_id)
        .bind(config.invoice_journal_id)
        .bind(config.invoice_payment_journal_id)
        .bind(config.credit_note_journal_id)
        .bind(config.credit_note_payment_journal_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create journal config", e))
    }

    async fn list_journal_configs(
        &self,
        company_id: Option<Uuid>,
    ) -> SyncResult<Vec<JournalConfig>> {
        sqlx::query_as::<_, JournalConfig>(&format!(
            "SELECT {} FROM journal_configs WHERE ($1::uuid IS NULL OR company_id = $1) ORDER BY created_utc, config_id",
            CONFIG_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list journal configs", e))
    }

    async fn find_journal_config(
        &self,
        company_id: Uuid,
        family_id: Uuid,
    ) -> SyncResult<Option<JournalConfig>> {
        sqlx::query_as::<_, JournalConfig>(&format!(
            "SELECT {} FROM journal_configs WHERE company_id = $1 AND family_id = $2 ORDER BY created_utc, config_id LIMIT 1",
            CONFIG_COLUMNS
        ))
        .bind(company_id)
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find journal config", e))
    }

    async fn first_journal_config(&self, company_id: Uuid) -> SyncResult<Option<JournalConfig>> {
        sqlx::query_as::<_, JournalConfig>(&format!(
            "SELECT {} FROM journal_configs WHERE company_id = $1 ORDER BY created_utc, config_id LIMIT 1",
            CONFIG_COLUMNS
        ))
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find journal config", e))
    }

    // =========================================================================
    // Invoices and credit notes
    // =========================================================================

    #[instrument(skip(self), fields(move_type = move_type.as_str()))]
    async fn find_move(
        &self,
        remote_id: &str,
        company_id: Uuid,
        move_type: MoveType,
    ) -> SyncResult<Option<AccountMove>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_move"])
            .start_timer();

        let found = sqlx::query_as::<_, AccountMove>(&format!(
            "SELECT {} FROM account_moves WHERE remote_id = $1 AND company_id = $2 AND move_type = $3",
            MOVE_COLUMNS
        ))
        .bind(remote_id)
        .bind(company_id)
        .bind(move_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find move", e))?;

        timer.observe_duration();
        Ok(found)
    }

    #[instrument(skip(self, new_move), fields(remote_id = %new_move.remote_id))]
    async fn create_move(&self, new_move: NewMove) -> SyncResult<AccountMove> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_move"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        let move_id = Uuid::new_v4();
        let total = new_move.amount_total();
        let created = sqlx::query_as::<_, AccountMove>(&format!(
            r#"
            INSERT INTO account_moves (move_id, remote_id, move_type, company_id, partner_id,
                journal_id, family_id, state, invoice_date, due_date, currency_code, amount_total,
                amount_residual, remote_subscription_id, reference_invoice_remote_id,
                reversed_move_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft', $8, $9, $10, $11, $11, $12, $13, $14)
            RETURNING {}
            "#,
            MOVE_COLUMNS
        ))
        .bind(move_id)
        .bind(&new_move.remote_id)
        .bind(new_move.move_type.as_str())
        .bind(new_move.company_id)
        .bind(new_move.partner_id)
        .bind(new_move.journal_id)
        .bind(new_move.family_id)
        .bind(new_move.invoice_date)
        .bind(new_move.due_date)
        .bind(&new_move.currency_code)
        .bind(total)
        .bind(&new_move.remote_subscription_id)
        .bind(&new_move.reference_invoice_remote_id)
        .bind(new_move.reversed_move_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create move", e))?;

        Self::insert_lines(&mut tx, move_id, &new_move).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit move", e))?;

        timer.observe_duration();
        info!(move_id = %move_id, "Move created");
        Ok(created)
    }

    #[instrument(skip(self, new_move), fields(move_id = %move_id))]
    async fn replace_move_content(
        &self,
        move_id: Uuid,
        new_move: NewMove,
    ) -> SyncResult<AccountMove> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        sqlx::query("DELETE FROM move_lines WHERE move_id = $1")
            .bind(move_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete move lines", e))?;

        Self::insert_lines(&mut tx, move_id, &new_move).await?;

        let updated = sqlx::query_as::<_, AccountMove>(&format!(
            r#"
            UPDATE account_moves
            SET partner_id = $2, journal_id = $3, family_id = $4, invoice_date = $5,
                due_date = $6, currency_code = $7, amount_total = $8,
                amount_residual = $8 - COALESCE(
                    (SELECT SUM(amount) FROM payments WHERE payments.move_id = $1), 0),
                remote_subscription_id = $9, reference_invoice_remote_id = $10,
                reversed_move_id = $11, updated_utc = NOW()
            WHERE move_id = $1
            RETURNING {}
            "#,
            MOVE_COLUMNS
        ))
        .bind(move_id)
        .bind(new_move.partner_id)
        .bind(new_move.journal_id)
        .bind(new_move.family_id)
        .bind(new_move.invoice_date)
        .bind(new_move.due_date)
        .bind(&new_move.currency_code)
        .bind(new_move.amount_total())
        .bind(&new_move.remote_subscription_id)
        .bind(&new_move.reference_invoice_remote_id)
        .bind(new_move.reversed_move_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("update move", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit move", e))?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(state = state.as_str()))]
    async fn set_move_state(&self, move_id: Uuid, state: MoveState) -> SyncResult<AccountMove> {
        sqlx::query_as::<_, AccountMove>(&format!(
            "UPDATE account_moves SET state = $2, updated_utc = NOW() WHERE move_id = $1 RETURNING {}",
            MOVE_COLUMNS
        ))
        .bind(move_id)
        .bind(state.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("update move state", e))
    }

    async fn move_lines(&self, move_id: Uuid) -> SyncResult<Vec<MoveLine>> {
        sqlx::query_as::<_, MoveLine>(
            r#"
            SELECT line_id, move_id, product_id, remote_line_id, description, quantity,
                price_unit, tax_amount, deferred_start, deferred_end
            FROM move_lines
            WHERE move_id = $1
            ORDER BY position
            "#,
        )
        .bind(move_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list move lines", e))
    }

    async fn list_moves(&self, move_type: Option<MoveType>) -> SyncResult<Vec<AccountMove>> {
        sqlx::query_as::<_, AccountMove>(&format!(
            "SELECT {} FROM account_moves WHERE ($1::text IS NULL OR move_type = $1) ORDER BY created_utc",
            MOVE_COLUMNS
        ))
        .bind(move_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list moves", e))
    }

    #[instrument(skip(self, payment), fields(move_id = %payment.move_id, amount = %payment.amount))]
    async fn register_payment(&self, payment: NewPayment) -> SyncResult<Payment> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["register_payment"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        let created = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, move_id, journal_id, amount, payment_date,
                remote_txn_id, memo)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING payment_id, move_id, journal_id, amount, payment_date, remote_txn_id, memo,
                created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment.move_id)
        .bind(payment.journal_id)
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(&payment.remote_txn_id)
        .bind(&payment.memo)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("insert payment", e))?;

        sqlx::query(
            "UPDATE account_moves SET amount_residual = amount_residual - $2, updated_utc = NOW() WHERE move_id = $1",
        )
        .bind(payment.move_id)
        .bind(payment.amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update residual", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit payment", e))?;

        timer.observe_duration();
        Ok(created)
    }

    async fn payments_for_move(&self, move_id: Uuid) -> SyncResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, move_id, journal_id, amount, payment_date, remote_txn_id, memo,
                created_utc
            FROM payments
            WHERE move_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(move_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list payments", e))
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    #[instrument(skip(self, subscription), fields(remote_id = %subscription.remote_id))]
    async fn upsert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> SyncResult<Subscription> {
        sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (subscription_id, remote_id, partner_id, status, start_date,
                end_date, billing_period, billing_period_unit, billing_cycles, plan_item_price_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (remote_id) DO UPDATE
            SET partner_id = EXCLUDED.partner_id, status = EXCLUDED.status,
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date,
                billing_period = EXCLUDED.billing_period,
                billing_period_unit = EXCLUDED.billing_period_unit,
                billing_cycles = EXCLUDED.billing_cycles,
                plan_item_price_id = EXCLUDED.plan_item_price_id, updated_utc = NOW()
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&subscription.remote_id)
        .bind(subscription.partner_id)
        .bind(&subscription.status)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.billing_period)
        .bind(subscription.billing_period_unit.as_str())
        .bind(subscription.billing_cycles)
        .bind(&subscription.plan_item_price_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("upsert subscription", e))
    }

    async fn find_subscription(&self, remote_id: &str) -> SyncResult<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE remote_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find subscription", e))
    }

    #[instrument(skip(self))]
    async fn update_subscription_terms(
        &self,
        remote_id: &str,
        status: &str,
        plan_item_price_id: Option<&str>,
    ) -> SyncResult<Subscription> {
        sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET status = $2, plan_item_price_id = $3, updated_utc = NOW()
            WHERE remote_id = $1
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(remote_id)
        .bind(status)
        .bind(plan_item_price_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("update subscription terms", e))
    }

    // =========================================================================
    // Sync logs
    // =========================================================================

    #[instrument(skip(self, log), fields(context = log.context.as_str(), status = log.status.as_str()))]
    async fn insert_sync_log(&self, log: NewSyncLog) -> SyncResult<SyncLog> {
        sqlx::query_as::<_, SyncLog>(
            r#"
            INSERT INTO sync_logs (log_id, table_name, record_count, status, duration_ms,
                initiated_at, error_message, context)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING log_id, table_name, record_count, status, duration_ms, initiated_at,
                error_message, context
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&log.table_name)
        .bind(log.record_count)
        .bind(log.status.as_str())
        .bind(log.duration_ms)
        .bind(log.initiated_at)
        .bind(&log.error_message)
        .bind(log.context.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("insert sync log", e))
    }

    async fn list_sync_logs(&self, context: Option<LogContext>) -> SyncResult<Vec<SyncLog>> {
        sqlx::query_as::<_, SyncLog>(
            r#"
            SELECT log_id, table_name, record_count, status, duration_ms, initiated_at,
                error_message, context
            FROM sync_logs
            WHERE ($1::text IS NULL OR context = $1)
            ORDER BY initiated_at DESC
            "#,
        )
        .bind(context.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list sync logs", e))
    }
}
