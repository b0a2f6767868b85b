//! Credit note synchronization. Each remote credit note is created at most once
//! per company and never refreshed afterwards.

use super::invoices::LineSign;
use super::journal::route;
use super::timestamps::to_date;
use super::Reconciler;
use crate::error::{SyncError, SyncResult};
use crate::models::remote::RemoteCreditNote;
use crate::models::{AccountMove, JournalRole, MoveType, NewMove};
use serde::Serialize;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "document", rename_all = "snake_case")]
pub enum CreditNoteOutcome {
    Created(AccountMove),
    AlreadyPresent(AccountMove),
}

impl CreditNoteOutcome {
    pub fn document(&self) -> &AccountMove {
        match self {
            CreditNoteOutcome::Created(m) | CreditNoteOutcome::AlreadyPresent(m) => m,
        }
    }
}

impl Reconciler {
    #[instrument(skip(self, credit_note), fields(credit_note_id = %credit_note.id))]
    pub async fn sync_credit_note(
        &self,
        credit_note: &RemoteCreditNote,
    ) -> SyncResult<CreditNoteOutcome> {
        let company = self
            .resolve_company(credit_note.business_entity_id.as_deref())
            .await?;

        if let Some(existing) = self
            .store()
            .find_move(&credit_note.id, company.company_id, MoveType::CreditNote)
            .await?
        {
            debug!(move_id = %existing.move_id, "Credit note already present");
            return Ok(CreditNoteOutcome::AlreadyPresent(existing));
        }

        if credit_note.line_items.is_empty() {
            return Err(SyncError::NoBillableLines(credit_note.id.clone()));
        }

        let original = match &credit_note.reference_invoice_id {
            Some(invoice_id) => {
                self.store()
                    .find_move(invoice_id, company.company_id, MoveType::Invoice)
                    .await?
            }
            None => None,
        };

        let partner = match &original {
            Some(invoice) if credit_note.customer_id.is_none() => invoice.partner_id,
            _ => {
                self.get_or_create_partner(
                    credit_note.customer_id.as_deref(),
                    credit_note.billing_address.as_ref(),
                    Some(company.company_id),
                )
                .await?
                .partner_id
            }
        };

        let family_id = self
            .resolve_family(&credit_note.line_items)
            .await
            .map(|f| f.family_id);
        let journal = route(
            self.store(),
            JournalRole::CreditNote,
            company.company_id,
            family_id,
        )
        .await?;

        let lines = self
            .prepare_lines(
                &credit_note.line_items,
                credit_note.currency_code.as_deref(),
                LineSign::Negative,
            )
            .await?;

        let draft = self
            .store()
            .create_move(NewMove {
                remote_id: credit_note.id.clone(),
                move_type: MoveType::CreditNote,
                company_id: company.company_id,
                partner_id: partner,
                journal_id: journal.journal_id,
                family_id,
                invoice_date: to_date(credit_note.date),
                due_date: None,
                currency_code: credit_note.currency_code.clone(),
                remote_subscription_id: credit_note.subscription_id.clone(),
                reference_invoice_remote_id: credit_note.reference_invoice_id.clone(),
                reversed_move_id: original.as_ref().map(|m| m.move_id),
                lines,
            })
            .await?;
        let posted = self.post(draft).await?;
        info!(move_id = %posted.move_id, "Credit note created");
        Ok(CreditNoteOutcome::Created(posted))
    }

    /// Sync the credit notes issued against one remote invoice.
    #[instrument(skip(self))]
    pub async fn sync_credit_notes_for_invoice(
        &self,
        invoice_id: &str,
    ) -> SyncResult<Vec<CreditNoteOutcome>> {
        let credit_notes = self.api().list_credit_notes_for_invoice(invoice_id).await?;
        let mut outcomes = Vec::with_capacity(credit_notes.len());
        for credit_note in &credit_notes {
            outcomes.push(self.sync_credit_note(credit_note).await?);
        }
        Ok(outcomes)
    }
}
