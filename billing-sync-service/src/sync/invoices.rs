//! Invoice reconciliation: create, refresh and post local invoices from remote
//! snapshots.
//!
//! A local invoice moves absent -> draft -> posted inside a single call. Once
//! posted it is never rewritten by the sync path; later snapshots only add
//! payments.

use super::journal::route;
use super::timestamps::{to_date, to_deferred_date};
use super::Reconciler;
use crate::error::{SyncError, SyncResult};
use crate::models::remote::{RemoteInvoice, RemoteLineItem};
use crate::models::{
    AccountMove, Company, JournalRole, MoveState, MoveType, NewMove, NewMoveLine, NewProduct,
    SyncWrite,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const FALLBACK_PRODUCT_NAME: &str = "Billing Product";
const FALLBACK_LINE_DESCRIPTION: &str = "Billing Item";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "document", rename_all = "snake_case")]
pub enum InvoiceOutcome {
    Created(AccountMove),
    Updated(AccountMove),
    /// The local document could not be rewritten; returned as stored.
    Unchanged(AccountMove),
}

impl InvoiceOutcome {
    pub fn document(&self) -> &AccountMove {
        match self {
            InvoiceOutcome::Created(m) | InvoiceOutcome::Updated(m) | InvoiceOutcome::Unchanged(m) => {
                m
            }
        }
    }

    fn with_document(self, document: AccountMove) -> Self {
        match self {
            InvoiceOutcome::Created(_) => InvoiceOutcome::Created(document),
            InvoiceOutcome::Updated(_) => InvoiceOutcome::Updated(document),
            InvoiceOutcome::Unchanged(_) => InvoiceOutcome::Unchanged(document),
        }
    }
}

/// Sign applied to line prices: credit notes are stored negative.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LineSign {
    Positive,
    Negative,
}

impl Reconciler {
    /// Reconcile one remote invoice and register its linked payments when paid.
    pub async fn sync_invoice(&self, invoice: &RemoteInvoice) -> SyncResult<InvoiceOutcome> {
        self.reconcile_invoice(invoice, true).await
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    pub(crate) async fn reconcile_invoice(
        &self,
        invoice: &RemoteInvoice,
        register_linked_payments: bool,
    ) -> SyncResult<InvoiceOutcome> {
        let company = self
            .resolve_company(invoice.business_entity_id.as_deref())
            .await?;
        let existing = self
            .store()
            .find_move(&invoice.id, company.company_id, MoveType::Invoice)
            .await?;

        let outcome = match existing {
            None => {
                let new_move = self.prepare_invoice(invoice, &company).await?;
                let draft = self.store().create_move(new_move).await?;
                info!(move_id = %draft.move_id, "Invoice created");
                InvoiceOutcome::Created(self.post(draft).await?)
            }
            Some(local) if local.state.permits(SyncWrite::ReplaceContent) => {
                let new_move = self.prepare_invoice(invoice, &company).await?;
                let draft = self
                    .store()
                    .replace_move_content(local.move_id, new_move)
                    .await?;
                info!(move_id = %draft.move_id, "Draft invoice refreshed");
                InvoiceOutcome::Updated(self.post(draft).await?)
            }
            Some(local) => {
                let blocked = SyncError::LocalWrite(format!(
                    "invoice {} is {}",
                    local.move_id,
                    local.state.as_str()
                ));
                warn!(error = %blocked, "Skipping rewrite of local invoice");
                InvoiceOutcome::Unchanged(local)
            }
        };

        if register_linked_payments && invoice.is_paid() && !invoice.linked_payments.is_empty() {
            let payments = self
                .register_payments(outcome.document(), &invoice.linked_payments)
                .await?;
            if !payments.is_empty() {
                let refreshed = self
                    .store()
                    .find_move(&invoice.id, company.company_id, MoveType::Invoice)
                    .await?;
                if let Some(document) = refreshed {
                    return Ok(outcome.with_document(document));
                }
            }
        }

        Ok(outcome)
    }

    pub(crate) async fn post(&self, document: AccountMove) -> SyncResult<AccountMove> {
        if !document.state.permits(SyncWrite::Post) {
            return Ok(document);
        }
        self.store()
            .set_move_state(document.move_id, MoveState::Posted)
            .await
    }

    async fn prepare_invoice(
        &self,
        invoice: &RemoteInvoice,
        company: &Company,
    ) -> SyncResult<NewMove> {
        if invoice.line_items.is_empty() {
            return Err(SyncError::NoBillableLines(invoice.id.clone()));
        }
        let partner = self
            .get_or_create_partner(
                invoice.customer_id.as_deref(),
                invoice.billing_address.as_ref(),
                Some(company.company_id),
            )
            .await?;
        let family = self.resolve_family(&invoice.line_items).await;
        let family_id = family.map(|f| f.family_id);
        let journal = route(
            self.store(),
            JournalRole::Invoice,
            company.company_id,
            family_id,
        )
        .await?;

        let lines = self
            .prepare_lines(
                &invoice.line_items,
                invoice.currency_code.as_deref(),
                LineSign::Positive,
            )
            .await?;

        Ok(NewMove {
            remote_id: invoice.id.clone(),
            move_type: MoveType::Invoice,
            company_id: company.company_id,
            partner_id: partner.partner_id,
            journal_id: journal.journal_id,
            family_id,
            invoice_date: to_date(invoice.date),
            due_date: to_date(invoice.due_date),
            currency_code: invoice.currency_code.clone(),
            remote_subscription_id: invoice.subscription_id.clone(),
            reference_invoice_remote_id: None,
            reversed_move_id: None,
            lines,
        })
    }

    /// Map remote lines to local ones, creating products on demand.
    pub(crate) async fn prepare_lines(
        &self,
        line_items: &[RemoteLineItem],
        currency_code: Option<&str>,
        sign: LineSign,
    ) -> SyncResult<Vec<NewMoveLine>> {
        let mut lines = Vec::with_capacity(line_items.len());
        for item in line_items {
            let product_id = self.product_for_line(item, currency_code).await?;
            let description = if item.description.trim().is_empty() {
                FALLBACK_LINE_DESCRIPTION.to_string()
            } else {
                item.description.clone()
            };
            let line = match sign {
                LineSign::Positive => NewMoveLine {
                    product_id,
                    remote_line_id: item.id.clone(),
                    description,
                    quantity: item.quantity(),
                    price_unit: item.unit_price(),
                    tax_amount: item.tax(),
                    deferred_start: to_deferred_date(item.date_from),
                    deferred_end: to_deferred_date(item.date_to),
                },
                LineSign::Negative => {
                    let amount = item
                        .amount
                        .map(crate::models::from_minor_units)
                        .unwrap_or_else(|| item.unit_price() * item.quantity());
                    NewMoveLine {
                        product_id,
                        remote_line_id: item.id.clone(),
                        description,
                        quantity: Decimal::ONE,
                        price_unit: -amount,
                        tax_amount: -item.tax(),
                        deferred_start: to_deferred_date(item.date_from),
                        deferred_end: to_deferred_date(item.date_to),
                    }
                }
            };
            lines.push(line);
        }
        Ok(lines)
    }

    async fn product_for_line(
        &self,
        item: &RemoteLineItem,
        currency_code: Option<&str>,
    ) -> SyncResult<Option<Uuid>> {
        let Some(item_id) = self.resolve_item_id(item).await else {
            return Ok(None);
        };
        if let Some(product) = self.store().find_product_by_item_id(&item_id).await? {
            return Ok(Some(product.product_id));
        }

        let name = if item.description.trim().is_empty() {
            FALLBACK_PRODUCT_NAME.to_string()
        } else {
            item.description.clone()
        };
        let product = self
            .store()
            .upsert_product(NewProduct {
                remote_item_id: item_id,
                name,
                description: None,
                list_price: item.unit_price(),
                currency_code: currency_code.map(str::to_string),
                family_id: None,
            })
            .await?;
        info!(product_id = %product.product_id, item_id = %product.remote_item_id, "Product created");
        Ok(Some(product.product_id))
    }
}
