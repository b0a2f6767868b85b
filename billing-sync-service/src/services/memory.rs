//! In-memory ledger store for tests and `STORE_BACKEND=memory` deployments.

use crate::error::{SyncError, SyncResult};
use crate::models::{
    AccountMove, Company, Currency, Family, Journal, JournalConfig, JournalType, LogContext,
    MoveLine, MoveState, MoveType, NewCompany, NewJournal, NewJournalConfig, NewMove, NewPartner,
    NewPayment, NewProduct, NewSubscription, NewSyncLog, NewTax, Partner, Payment, Product,
    Subscription, SyncLog, Tax,
};
use crate::services::store::LedgerStore;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    companies: Vec<Company>,
    currencies: Vec<Currency>,
    partners: Vec<Partner>,
    products: Vec<Product>,
    families: Vec<Family>,
    taxes: Vec<Tax>,
    journals: Vec<Journal>,
    journal_configs: Vec<JournalConfig>,
    moves: Vec<AccountMove>,
    lines: Vec<MoveLine>,
    payments: Vec<Payment>,
    subscriptions: Vec<Subscription>,
    sync_logs: Vec<SyncLog>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &str, id: Uuid) -> SyncError {
    SyncError::Store(anyhow::anyhow!("{} {} not found", what, id))
}

fn build_lines(move_id: Uuid, new_move: &NewMove) -> Vec<MoveLine> {
    new_move
        .lines
        .iter()
        .map(|line| MoveLine {
            line_id: Uuid::new_v4(),
            move_id,
            product_id: line.product_id,
            remote_line_id: line.remote_line_id.clone(),
            description: line.description.clone(),
            quantity: line.quantity,
            price_unit: line.price_unit,
            tax_amount: line.tax_amount,
            deferred_start: line.deferred_start,
            deferred_end: line.deferred_end,
        })
        .collect()
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn health_check(&self) -> SyncResult<()> {
        Ok(())
    }

    async fn find_company_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Company>> {
        let tables = self.tables.read().await;
        Ok(tables
            .companies
            .iter()
            .find(|c| c.remote_id.as_deref() == Some(remote_id))
            .cloned())
    }

    async fn find_company_by_name(&self, name: &str) -> SyncResult<Option<Company>> {
        let tables = self.tables.read().await;
        Ok(tables.companies.iter().find(|c| c.name == name).cloned())
    }

    async fn create_company(&self, company: NewCompany) -> SyncResult<Company> {
        let mut tables = self.tables.write().await;
        let created = Company {
            company_id: Uuid::new_v4(),
            remote_id: company.remote_id,
            name: company.name,
            currency_code: company.currency_code,
            created_utc: Utc::now(),
        };
        tables.companies.push(created.clone());
        Ok(created)
    }

    async fn list_companies(&self) -> SyncResult<Vec<Company>> {
        Ok(self.tables.read().await.companies.clone())
    }

    async fn find_currency(&self, code: &str) -> SyncResult<Option<Currency>> {
        let tables = self.tables.read().await;
        Ok(tables.currencies.iter().find(|c| c.code == code).cloned())
    }

    async fn create_currency(&self, currency: Currency) -> SyncResult<Currency> {
        let mut tables = self.tables.write().await;
        if tables.currencies.iter().any(|c| c.code == currency.code) {
            return Err(SyncError::Store(anyhow::anyhow!(
                "currency {} already exists",
                currency.code
            )));
        }
        tables.currencies.push(currency.clone());
        Ok(currency)
    }

    async fn find_partner_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Partner>> {
        let tables = self.tables.read().await;
        Ok(tables
            .partners
            .iter()
            .find(|p| p.remote_customer_id.as_deref() == Some(remote_id))
            .cloned())
    }

    async fn find_partner_by_name(&self, name: &str) -> SyncResult<Option<Partner>> {
        let tables = self.tables.read().await;
        Ok(tables.partners.iter().find(|p| p.name == name).cloned())
    }

    async fn create_partner(&self, partner: NewPartner) -> SyncResult<Partner> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let created = Partner {
            partner_id: Uuid::new_v4(),
            remote_customer_id: partner.remote_customer_id,
            name: partner.name,
            email: partner.email,
            phone: partner.phone,
            street: partner.street,
            city: partner.city,
            zip: partner.zip,
            country: partner.country,
            company_id: partner.company_id,
            created_utc: now,
            updated_utc: now,
        };
        tables.partners.push(created.clone());
        Ok(created)
    }

    async fn update_partner(&self, partner_id: Uuid, partner: NewPartner) -> SyncResult<Partner> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .partners
            .iter_mut()
            .find(|p| p.partner_id == partner_id)
            .ok_or_else(|| not_found("partner", partner_id))?;
        existing.remote_customer_id = partner.remote_customer_id;
        existing.name = partner.name;
        existing.email = partner.email;
        existing.phone = partner.phone;
        existing.street = partner.street;
        existing.city = partner.city;
        existing.zip = partner.zip;
        existing.country = partner.country;
        existing.company_id = partner.company_id;
        existing.updated_utc = Utc::now();
        Ok(existing.clone())
    }

    async fn list_partners(&self) -> SyncResult<Vec<Partner>> {
        let tables = self.tables.read().await;
        Ok(tables.partners.clone())
    }

    async fn find_product_by_item_id(&self, item_id: &str) -> SyncResult<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .find(|p| p.remote_item_id == item_id)
            .cloned())
    }

    async fn upsert_product(&self, product: NewProduct) -> SyncResult<Product> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables
            .products
            .iter_mut()
            .find(|p| p.remote_item_id == product.remote_item_id)
        {
            existing.name = product.name;
            existing.description = product.description;
            existing.list_price = product.list_price;
            existing.currency_code = product.currency_code;
            existing.family_id = product.family_id;
            existing.updated_utc = now;
            return Ok(existing.clone());
        }
        let created = Product {
            product_id: Uuid::new_v4(),
            remote_item_id: product.remote_item_id,
            name: product.name,
            description: product.description,
            list_price: product.list_price,
            currency_code: product.currency_code,
            family_id: product.family_id,
            created_utc: now,
            updated_utc: now,
        };
        tables.products.push(created.clone());
        Ok(created)
    }

    async fn find_family_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<Family>> {
        let tables = self.tables.read().await;
        Ok(tables
            .families
            .iter()
            .find(|f| f.remote_id == remote_id)
            .cloned())
    }

    async fn upsert_family(&self, remote_id: &str, name: &str) -> SyncResult<Family> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.families.iter_mut().find(|f| f.remote_id == remote_id) {
            existing.name = name.to_string();
            return Ok(existing.clone());
        }
        let created = Family {
            family_id: Uuid::new_v4(),
            remote_id: remote_id.to_string(),
            name: name.to_string(),
        };
        tables.families.push(created.clone());
        Ok(created)
    }

    async fn upsert_tax(&self, tax: NewTax) -> SyncResult<Tax> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .taxes
            .iter_mut()
            .find(|t| t.remote_key == tax.remote_key && t.company_id == tax.company_id)
        {
            existing.name = tax.name;
            existing.rate = tax.rate;
            return Ok(existing.clone());
        }
        let created = Tax {
            tax_id: Uuid::new_v4(),
            remote_key: tax.remote_key,
            name: tax.name,
            rate: tax.rate,
            company_id: tax.company_id,
        };
        tables.taxes.push(created.clone());
        Ok(created)
    }

    async fn list_taxes(&self, company_id: Uuid) -> SyncResult<Vec<Tax>> {
        let tables = self.tables.read().await;
        Ok(tables
            .taxes
            .iter()
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn create_journal(&self, journal: NewJournal) -> SyncResult<Journal> {
        let mut tables = self.tables.write().await;
        let created = Journal {
            journal_id: Uuid::new_v4(),
            company_id: journal.company_id,
            name: journal.name,
            journal_type: journal.journal_type,
            created_utc: Utc::now(),
        };
        tables.journals.push(created.clone());
        Ok(created)
    }

    async fn get_journal(&self, journal_id: Uuid) -> SyncResult<Option<Journal>> {
        let tables = self.tables.read().await;
        Ok(tables
            .journals
            .iter()
            .find(|j| j.journal_id == journal_id)
            .cloned())
    }

    async fn list_journals(&self, company_id: Option<Uuid>) -> SyncResult<Vec<Journal>> {
        let tables = self.tables.read().await;
        Ok(tables
            .journals
            .iter()
            .filter(|j| company_id.map_or(true, |id| j.company_id == id))
            .cloned()
            .collect())
    }

    async fn first_journal_of_type(
        &self,
        company_id: Uuid,
        journal_type: JournalType,
    ) -> SyncResult<Option<Journal>> {
        let tables = self.tables.read().await;
        Ok(tables
            .journals
            .iter()
            .find(|j| j.company_id == company_id && j.journal_type == journal_type)
            .cloned())
    }

    async fn create_journal_config(&self, config: NewJournalConfig) -> SyncResult<JournalConfig> {
        let mut tables = self.tables.write().await;
        let created = JournalConfig {
            config_id: Uuid::new_v4(),
            company_id: config.company_id,
            family_id: config.family_id,
            invoice_journal_id: config.invoice_journal_id,
            invoice_payment_journal_id: config.invoice_payment_journal_id,
            credit_note_journal_id: config.credit_note_journal_id,
            credit_note_payment_journal_id: config.credit_note_payment_journal_id,
            created_utc: Utc::now(),
        };
        tables.journal_configs.push(created.clone());
        Ok(created)
    }

    async fn list_journal_configs(
        &self,
        company_id: Option<Uuid>,
    ) -> SyncResult<Vec<JournalConfig>> {
        let tables = self.tables.read().await;
        Ok(tables
            .journal_configs
            .iter()
            .filter(|c| company_id.map_or(true, |id| c.company_id == id))
            .cloned()
            .collect())
    }

    async fn find_journal_config(
        &self,
        company_id: Uuid,
        family_id: Uuid,
    ) -> SyncResult<Option<JournalConfig>> {
        let tables = self.tables.read().await;
        Ok(tables
            .journal_configs
            .iter()
            .find(|c| c.company_id == company_id && c.family_id == Some(family_id))
            .cloned())
    }

    async fn first_journal_config(&self, company_id: Uuid) -> SyncResult<Option<JournalConfig>> {
        let tables = self.tables.read().await;
        Ok(tables
            .journal_configs
            .iter()
            .find(|c| c.company_id == company_id)
            .cloned())
    }

    async fn find_move(
        &self,
        remote_id: &str,
        company_id: Uuid,
        move_type: MoveType,
    ) -> SyncResult<Option<AccountMove>> {
        let tables = self.tables.read().await;
        Ok(tables
            .moves
            .iter()
            .find(|m| {
                m.remote_id == remote_id && m.company_id == company_id && m.move_type == move_type
            })
            .cloned())
    }

    async fn create_move(&self, new_move: NewMove) -> SyncResult<AccountMove> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let move_id = Uuid::new_v4();
        let total = new_move.amount_total();
        let lines = build_lines(move_id, &new_move);
        let created = AccountMove {
            move_id,
            remote_id: new_move.remote_id,
            move_type: new_move.move_type,
            company_id: new_move.company_id,
            partner_id: new_move.partner_id,
            journal_id: new_move.journal_id,
            family_id: new_move.family_id,
            state: MoveState::Draft,
            invoice_date: new_move.invoice_date,
            due_date: new_move.due_date,
            currency_code: new_move.currency_code,
            amount_total: total,
            amount_residual: total,
            remote_subscription_id: new_move.remote_subscription_id,
            reference_invoice_remote_id: new_move.reference_invoice_remote_id,
            reversed_move_id: new_move.reversed_move_id,
            created_utc: now,
            updated_utc: now,
        };
        tables.moves.push(created.clone());
        tables.lines.extend(lines);
        Ok(created)
    }

    async fn replace_move_content(
        &self,
        move_id: Uuid,
        new_move: NewMove,
    ) -> SyncResult<AccountMove> {
        let mut tables = self.tables.write().await;
        let paid: rust_decimal::Decimal = tables
            .payments
            .iter()
            .filter(|p| p.move_id == move_id)
            .map(|p| p.amount)
            .sum();
        let lines = build_lines(move_id, &new_move);
        let total = new_move.amount_total();
        let existing = tables
            .moves
            .iter_mut()
            .find(|m| m.move_id == move_id)
            .ok_or_else(|| not_found("move", move_id))?;
        existing.partner_id = new_move.partner_id;
        existing.journal_id = new_move.journal_id;
        existing.family_id = new_move.family_id;
        existing.invoice_date = new_move.invoice_date;
        existing.due_date = new_move.due_date;
        existing.currency_code = new_move.currency_code;
        existing.remote_subscription_id = new_move.remote_subscription_id;
        existing.reference_invoice_remote_id = new_move.reference_invoice_remote_id;
        existing.reversed_move_id = new_move.reversed_move_id;
        existing.amount_total = total;
        existing.amount_residual = total - paid;
        existing.updated_utc = Utc::now();
        let updated = existing.clone();
        tables.lines.retain(|l| l.move_id != move_id);
        tables.lines.extend(lines);
        Ok(updated)
    }

    async fn set_move_state(&self, move_id: Uuid, state: MoveState) -> SyncResult<AccountMove> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .moves
            .iter_mut()
            .find(|m| m.move_id == move_id)
            .ok_or_else(|| not_found("move", move_id))?;
        existing.state = state;
        existing.updated_utc = Utc::now();
        Ok(existing.clone())
    }

    async fn move_lines(&self, move_id: Uuid) -> SyncResult<Vec<MoveLine>> {
        let tables = self.tables.read().await;
        Ok(tables
            .lines
            .iter()
            .filter(|l| l.move_id == move_id)
            .cloned()
            .collect())
    }

    async fn list_moves(&self, move_type: Option<MoveType>) -> SyncResult<Vec<AccountMove>> {
        let tables = self.tables.read().await;
        Ok(tables
            .moves
            .iter()
            .filter(|m| move_type.map_or(true, |t| m.move_type == t))
            .cloned()
            .collect())
    }

    async fn register_payment(&self, payment: NewPayment) -> SyncResult<Payment> {
        let mut tables = self.tables.write().await;
        let target = tables
            .moves
            .iter_mut()
            .find(|m| m.move_id == payment.move_id)
            .ok_or_else(|| not_found("move", payment.move_id))?;
        target.amount_residual -= payment.amount;
        target.updated_utc = Utc::now();
        let created = Payment {
            payment_id: Uuid::new_v4(),
            move_id: payment.move_id,
            journal_id: payment.journal_id,
            amount: payment.amount,
            payment_date: payment.payment_date,
            remote_txn_id: payment.remote_txn_id,
            memo: payment.memo,
            created_utc: Utc::now(),
        };
        tables.payments.push(created.clone());
        Ok(created)
    }

    async fn payments_for_move(&self, move_id: Uuid) -> SyncResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.move_id == move_id)
            .cloned()
            .collect())
    }

    async fn upsert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> SyncResult<Subscription> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables
            .subscriptions
            .iter_mut()
            .find(|s| s.remote_id == subscription.remote_id)
        {
            existing.partner_id = subscription.partner_id;
            existing.status = subscription.status;
            existing.start_date = subscription.start_date;
            existing.end_date = subscription.end_date;
            existing.billing_period = subscription.billing_period;
            existing.billing_period_unit = subscription.billing_period_unit.as_str().to_string();
            existing.billing_cycles = subscription.billing_cycles;
            existing.plan_item_price_id = subscription.plan_item_price_id;
            existing.updated_utc = now;
            return Ok(existing.clone());
        }
        let created = Subscription {
            subscription_id: Uuid::new_v4(),
            remote_id: subscription.remote_id,
            partner_id: subscription.partner_id,
            status: subscription.status,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            billing_period: subscription.billing_period,
            billing_period_unit: subscription.billing_period_unit.as_str().to_string(),
            billing_cycles: subscription.billing_cycles,
            plan_item_price_id: subscription.plan_item_price_id,
            created_utc: now,
            updated_utc: now,
        };
        tables.subscriptions.push(created.clone());
        Ok(created)
    }

    async fn find_subscription(&self, remote_id: &str) -> SyncResult<Option<Subscription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .iter()
            .find(|s| s.remote_id == remote_id)
            .cloned())
    }

    async fn update_subscription_terms(
        &self,
        remote_id: &str,
        status: &str,
        plan_item_price_id: Option<&str>,
    ) -> SyncResult<Subscription> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .subscriptions
            .iter_mut()
            .find(|s| s.remote_id == remote_id)
            .ok_or_else(|| SyncError::Store(anyhow::anyhow!("subscription {} not found", remote_id)))?;
        existing.status = status.to_string();
        existing.plan_item_price_id = plan_item_price_id.map(str::to_string);
        existing.updated_utc = Utc::now();
        Ok(existing.clone())
    }

    async fn insert_sync_log(&self, log: NewSyncLog) -> SyncResult<SyncLog> {
        let mut tables = self.tables.write().await;
        let created = SyncLog {
            log_id: Uuid::new_v4(),
            table_name: log.table_name,
            record_count: log.record_count,
            status: log.status,
            duration_ms: log.duration_ms,
            initiated_at: log.initiated_at,
            error_message: log.error_message,
            context: log.context,
        };
        tables.sync_logs.push(created.clone());
        Ok(created)
    }

    async fn list_sync_logs(&self, context: Option<LogContext>) -> SyncResult<Vec<SyncLog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sync_logs
            .iter()
            .filter(|l| context.map_or(true, |c| l.context == c))
            .cloned()
            .collect())
    }
}
