//! Payment registration against posted invoices.

use super::journal::route;
use super::timestamps::to_date;
use super::Reconciler;
use crate::error::{SyncError, SyncResult};
use crate::models::remote::RemoteLinkedPayment;
use crate::models::{from_minor_units, AccountMove, JournalRole, NewPayment, Payment, SyncWrite};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPayment {
    pub txn_id: String,
    pub amount: Decimal,
    pub payment_date: Option<NaiveDate>,
}

/// Payments to register against `residual`, in order: each is capped to what
/// remains, and planning stops once nothing remains. Transactions already
/// registered and non-positive amounts are skipped.
pub fn plan_payments(
    residual: Decimal,
    linked: &[RemoteLinkedPayment],
    registered_txn_ids: &HashSet<String>,
) -> Vec<PlannedPayment> {
    let mut remaining = residual;
    let mut planned = Vec::new();

    for payment in linked {
        if remaining <= Decimal::ZERO {
            break;
        }
        if registered_txn_ids.contains(&payment.txn_id) {
            continue;
        }
        let applied = from_minor_units(payment.applied_amount);
        if applied <= Decimal::ZERO {
            continue;
        }
        let amount = applied.min(remaining);
        remaining -= amount;
        planned.push(PlannedPayment {
            txn_id: payment.txn_id.clone(),
            amount,
            payment_date: to_date(payment.txn_date),
        });
    }

    planned
}

impl Reconciler {
    #[instrument(skip(self, document, linked), fields(move_id = %document.move_id))]
    pub async fn register_payments(
        &self,
        document: &AccountMove,
        linked: &[RemoteLinkedPayment],
    ) -> SyncResult<Vec<Payment>> {
        if !document.state.permits(SyncWrite::RegisterPayment) {
            let blocked = SyncError::LocalWrite(format!(
                "cannot register payments on {} invoice {}",
                document.state.as_str(),
                document.move_id
            ));
            warn!(error = %blocked, "Skipping payment registration");
            return Ok(Vec::new());
        }
        if document.is_fully_paid() {
            info!("Invoice already fully paid");
            return Ok(Vec::new());
        }
        if document.amount_residual <= Decimal::ZERO {
            info!(residual = %document.amount_residual, "No residual left to pay");
            return Ok(Vec::new());
        }

        let registered: HashSet<String> = self
            .store()
            .payments_for_move(document.move_id)
            .await?
            .into_iter()
            .filter_map(|p| p.remote_txn_id)
            .collect();

        let planned = plan_payments(document.amount_residual, linked, &registered);
        if planned.is_empty() {
            return Ok(Vec::new());
        }

        let journal = route(
            self.store(),
            JournalRole::InvoicePayment,
            document.company_id,
            document.family_id,
        )
        .await?;

        let mut payments = Vec::with_capacity(planned.len());
        for plan in planned {
            let payment = self
                .store()
                .register_payment(NewPayment {
                    move_id: document.move_id,
                    journal_id: journal.journal_id,
                    amount: plan.amount,
                    payment_date: plan
                        .payment_date
                        .unwrap_or_else(|| Utc::now().date_naive()),
                    remote_txn_id: Some(plan.txn_id.clone()),
                    memo: document.remote_id.clone(),
                })
                .await?;
            info!(
                payment_id = %payment.payment_id,
                txn_id = %plan.txn_id,
                amount = %payment.amount,
                "Payment registered"
            );
            payments.push(payment);
        }

        Ok(payments)
    }
}
