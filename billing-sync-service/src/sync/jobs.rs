//! Manual "sync now" jobs. Every invocation writes exactly one sync log row.

use super::Reconciler;
use crate::error::{SyncError, SyncResult};
use crate::models::remote::{RemoteInvoice, RemoteItem};
use crate::models::{
    from_minor_units, Currency, LogContext, NewProduct, NewSyncLog, NewTax, Product, SyncStatus,
};
use crate::services::metrics::{record_error, record_sync_job, record_synced_records};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJob {
    Customers,
    Taxes,
    Currencies,
    Items,
    ItemFamilies,
    Invoices,
    CreditNotes,
    Subscriptions,
    Companies,
    /// Pushes local partners to the platform. Not part of [`SyncJob::ALL`].
    ExportCustomers,
}

/// What a job does when one record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Log the failure, collect it into the sync log, keep going.
    ContinueOnError,
    /// The first failure ends the job.
    AbortOnError,
}

impl SyncJob {
    pub const ALL: [SyncJob; 9] = [
        SyncJob::Customers,
        SyncJob::Taxes,
        SyncJob::Currencies,
        SyncJob::Items,
        SyncJob::ItemFamilies,
        SyncJob::Invoices,
        SyncJob::CreditNotes,
        SyncJob::Subscriptions,
        SyncJob::Companies,
    ];

    /// Path segment used by the trigger endpoint. Only jobs in [`SyncJob::ALL`] resolve.
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|job| job.slug() == slug)
    }

    pub fn slug(&self) -> &'static str {
        match self {
            SyncJob::Customers => "customers",
            SyncJob::Taxes => "taxes",
            SyncJob::Currencies => "currencies",
            SyncJob::Items => "items",
            SyncJob::ItemFamilies => "item-families",
            SyncJob::Invoices => "invoices",
            SyncJob::CreditNotes => "credit-notes",
            SyncJob::Subscriptions => "subscriptions",
            SyncJob::Companies => "companies",
            SyncJob::ExportCustomers => "customers-export",
        }
    }

    pub fn context(&self) -> LogContext {
        match self {
            SyncJob::Customers | SyncJob::ExportCustomers => LogContext::Customers,
            SyncJob::Taxes => LogContext::Taxes,
            SyncJob::Currencies => LogContext::Currencies,
            SyncJob::Items => LogContext::Items,
            SyncJob::ItemFamilies => LogContext::ItemFamilies,
            SyncJob::Invoices => LogContext::Invoices,
            SyncJob::CreditNotes => LogContext::CreditNotes,
            SyncJob::Subscriptions => LogContext::Subscriptions,
            SyncJob::Companies => LogContext::Companies,
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            SyncJob::Customers => "Customers",
            SyncJob::Taxes => "Taxes",
            SyncJob::Currencies => "Currencies",
            SyncJob::Items => "Products",
            SyncJob::ItemFamilies => "Item Families",
            SyncJob::Invoices => "Account Invoice",
            SyncJob::CreditNotes => "Credit Notes",
            SyncJob::Subscriptions => "Subscriptions",
            SyncJob::Companies => "Companies",
            SyncJob::ExportCustomers => "Customer Export",
        }
    }

    pub fn policy(&self) -> BatchPolicy {
        match self {
            SyncJob::Customers
            | SyncJob::Items
            | SyncJob::CreditNotes
            | SyncJob::Subscriptions
            | SyncJob::ExportCustomers => BatchPolicy::ContinueOnError,
            SyncJob::Invoices
            | SyncJob::Taxes
            | SyncJob::Currencies
            | SyncJob::ItemFamilies
            | SyncJob::Companies => BatchPolicy::AbortOnError,
        }
    }
}

/// Per-record bookkeeping for one job run.
#[derive(Debug)]
pub struct BatchReport {
    policy: BatchPolicy,
    processed: u32,
    errors: Vec<String>,
}

impl BatchReport {
    pub fn new(policy: BatchPolicy) -> Self {
        Self {
            policy,
            processed: 0,
            errors: Vec::new(),
        }
    }

    /// Count a record outcome. Returns `Err` when the failure ends the batch.
    pub fn record<T>(&mut self, label: &str, result: SyncResult<T>) -> SyncResult<Option<T>> {
        match result {
            Ok(value) => {
                self.processed += 1;
                Ok(Some(value))
            }
            Err(SyncError::NoBillableLines(id)) => {
                warn!(record = %label, "No billable lines");
                self.errors.push(format!("{}: no billable lines for {}", label, id));
                Ok(None)
            }
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => match self.policy {
                BatchPolicy::ContinueOnError => {
                    warn!(record = %label, error = %e, "Record failed, continuing");
                    record_error(e.kind());
                    self.errors.push(format!("{}: {}", label, e));
                    Ok(None)
                }
                BatchPolicy::AbortOnError => Err(e),
            },
        }
    }

    pub fn processed(&self) -> u32 {
        self.processed
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Response body of a trigger.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job: SyncJob,
    pub status: SyncStatus,
    pub record_count: u32,
    pub errors: Vec<String>,
    pub duration_ms: i64,
    pub log_id: Uuid,
}

impl Reconciler {
    #[instrument(skip(self), fields(job = job.slug()))]
    pub async fn run_job(&self, job: SyncJob) -> SyncResult<JobSummary> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let mut report = BatchReport::new(job.policy());

        info!("Starting sync job");
        let result = match job {
            SyncJob::Customers => self.sync_customers(&mut report).await,
            SyncJob::Taxes => self.sync_taxes(&mut report).await,
            SyncJob::Currencies => self.sync_currencies(&mut report).await,
            SyncJob::Items => self.sync_items(&mut report).await,
            SyncJob::ItemFamilies => self.sync_item_families(&mut report).await,
            SyncJob::Invoices => self.sync_invoices(&mut report).await,
            SyncJob::CreditNotes => self.sync_all_credit_notes(&mut report).await,
            SyncJob::Subscriptions => self.sync_subscriptions(&mut report).await,
            SyncJob::Companies => self.sync_companies(&mut report).await,
            SyncJob::ExportCustomers => self.export_customers(&mut report).await,
        };
        let duration_ms = timer.elapsed().as_millis() as i64;

        let (status, error_message) = match &result {
            Ok(()) if report.errors().is_empty() => (SyncStatus::Success, None),
            Ok(()) => (SyncStatus::Success, Some(report.errors().join("; "))),
            Err(e) => (SyncStatus::Failure, Some(e.to_string())),
        };

        let log = self
            .store()
            .insert_sync_log(NewSyncLog {
                table_name: job.table_name().to_string(),
                record_count: report.processed() as i32,
                status,
                duration_ms,
                initiated_at: started_at,
                error_message,
                context: job.context(),
            })
            .await?;

        record_sync_job(job.slug(), status.as_str());
        record_synced_records(job.context().as_str(), u64::from(report.processed()));

        if let Err(e) = result {
            error!(error = %e, "Sync job failed");
            record_error(e.kind());
            return Err(e);
        }

        info!(
            record_count = report.processed(),
            failed = report.errors().len(),
            duration_ms = duration_ms,
            "Sync job completed"
        );
        Ok(JobSummary {
            job,
            status,
            record_count: report.processed(),
            errors: report.errors,
            duration_ms,
            log_id: log.log_id,
        })
    }

    async fn sync_customers(&self, report: &mut BatchReport) -> SyncResult<()> {
        for customer in self.api().list_customers().await? {
            let result = self.upsert_customer(&customer).await;
            report.record(&customer.id, result)?;
        }
        Ok(())
    }

    async fn sync_taxes(&self, report: &mut BatchReport) -> SyncResult<()> {
        for invoice in self.api().list_invoices().await? {
            let taxes = match self.taxes_for_invoice(&invoice).await {
                Ok(taxes) => taxes,
                Err(e) => {
                    report.record::<()>(&invoice.id, Err(e))?;
                    continue;
                }
            };
            for tax in taxes {
                let label = tax.remote_key.clone();
                let result = self.store().upsert_tax(tax).await;
                report.record(&label, result)?;
            }
        }
        Ok(())
    }

    /// Taxes charged on an invoice, one per tax name. Zero amounts and lines
    /// exempt from tax are left out.
    async fn taxes_for_invoice(&self, invoice: &RemoteInvoice) -> SyncResult<Vec<NewTax>> {
        if invoice.line_item_taxes.is_empty() {
            return Ok(Vec::new());
        }
        let company = self
            .resolve_company(invoice.business_entity_id.as_deref())
            .await?;
        let exempt: HashSet<&str> = invoice
            .line_items
            .iter()
            .filter(|line| line.tax_exempt_reason.is_some())
            .filter_map(|line| line.id.as_deref())
            .collect();

        let mut seen = HashSet::new();
        let mut taxes = Vec::new();
        for line_tax in &invoice.line_item_taxes {
            if line_tax.tax_amount.unwrap_or(0) == 0 {
                continue;
            }
            if line_tax
                .line_item_id
                .as_deref()
                .is_some_and(|id| exempt.contains(id))
            {
                continue;
            }
            if !seen.insert(line_tax.tax_name.clone()) {
                continue;
            }
            taxes.push(NewTax {
                remote_key: line_tax.tax_name.clone(),
                name: line_tax.tax_name.clone(),
                rate: line_tax.tax_rate.unwrap_or(Decimal::ZERO),
                company_id: company.company_id,
            });
        }
        Ok(taxes)
    }

    /// Only missing currencies are created; the count is what was created.
    async fn sync_currencies(&self, report: &mut BatchReport) -> SyncResult<()> {
        for currency in self.api().list_currencies().await? {
            if !currency.enabled {
                continue;
            }
            if self
                .store()
                .find_currency(&currency.currency_code)
                .await?
                .is_some()
            {
                continue;
            }
            let result = self
                .store()
                .create_currency(Currency::from_code(&currency.currency_code))
                .await;
            report.record(&currency.currency_code, result)?;
        }
        Ok(())
    }

    async fn sync_items(&self, report: &mut BatchReport) -> SyncResult<()> {
        for item in self.api().list_items().await? {
            let result = self.sync_item(&item).await;
            report.record(&item.id, result)?;
        }
        Ok(())
    }

    /// Product snapshot from the item's first price, linked to its family.
    pub async fn sync_item(&self, item: &RemoteItem) -> SyncResult<Product> {
        let prices = self.api().list_item_prices_for_item(&item.id).await?;
        let first_price = prices.first();

        let family_id = match item.item_family_id.as_deref() {
            Some(remote_family) => Some(self.family_for_remote_id(remote_family).await?.family_id),
            None => None,
        };

        self.store()
            .upsert_product(NewProduct {
                remote_item_id: item.id.clone(),
                name: item.name.clone().unwrap_or_else(|| item.id.clone()),
                description: item.description.clone(),
                list_price: first_price
                    .and_then(|p| p.price)
                    .map(from_minor_units)
                    .unwrap_or(Decimal::ZERO),
                currency_code: first_price.and_then(|p| p.currency_code.clone()),
                family_id,
            })
            .await
    }

    async fn sync_item_families(&self, report: &mut BatchReport) -> SyncResult<()> {
        for family in self.api().list_item_families().await? {
            let name = family.name.clone().unwrap_or_else(|| family.id.clone());
            let result = self.store().upsert_family(&family.id, &name).await;
            report.record(&family.id, result)?;
        }
        Ok(())
    }

    async fn sync_invoices(&self, report: &mut BatchReport) -> SyncResult<()> {
        for invoice in self.api().list_invoices().await? {
            let result = self.sync_invoice(&invoice).await;
            report.record(&invoice.id, result)?;
        }
        Ok(())
    }

    async fn sync_all_credit_notes(&self, report: &mut BatchReport) -> SyncResult<()> {
        for credit_note in self.api().list_credit_notes().await? {
            let result = self.sync_credit_note(&credit_note).await;
            report.record(&credit_note.id, result)?;
        }
        Ok(())
    }

    async fn sync_subscriptions(&self, report: &mut BatchReport) -> SyncResult<()> {
        for subscription in self.api().list_subscriptions().await? {
            let result = self.sync_subscription(&subscription).await;
            report.record(&subscription.id, result)?;
        }
        Ok(())
    }

    async fn sync_companies(&self, report: &mut BatchReport) -> SyncResult<()> {
        for entity in self.api().list_business_entities().await? {
            let result = self.get_or_create_company(&entity).await;
            report.record(&entity.id, result)?;
        }
        Ok(())
    }
}
