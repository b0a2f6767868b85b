//! Push events from the billing platform.

use super::invoices::InvoiceOutcome;
use super::Reconciler;
use crate::error::SyncResult;
use crate::models::remote::{RemoteInvoice, RemoteLinkedPayment, RemoteTransaction};
use crate::models::{LogContext, MoveState, MoveType, NewSyncLog, SyncStatus};
use crate::services::metrics::{record_error, record_synced_records, record_webhook_event};
use chrono::Utc;
use serde::Deserialize;
use std::time::Instant;
use tracing::{error, info, instrument};

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event_type: Option<String>,
    #[serde(default)]
    pub content: EventContent,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventContent {
    pub invoice: Option<RemoteInvoice>,
    pub transaction: Option<RemoteTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    InvoiceGenerated,
    InvoiceUpdated,
    PaymentSucceeded,
}

impl EventKind {
    pub fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "invoice_generated" => Some(EventKind::InvoiceGenerated),
            "invoice_updated" => Some(EventKind::InvoiceUpdated),
            "payment_succeeded" => Some(EventKind::PaymentSucceeded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::InvoiceGenerated => "invoice_generated",
            EventKind::InvoiceUpdated => "invoice_updated",
            EventKind::PaymentSucceeded => "payment_succeeded",
        }
    }
}

#[derive(Debug)]
pub enum WebhookOutcome {
    Ignored(&'static str),
    Processed {
        kind: EventKind,
        outcome: InvoiceOutcome,
        payments: usize,
    },
}

impl Reconciler {
    /// Process one event and write its sync log. Ignored events leave no log.
    #[instrument(skip(self, event), fields(event_type = ?event.event_type))]
    pub async fn handle_webhook(&self, event: WebhookEvent) -> SyncResult<WebhookOutcome> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let event_type = event.event_type.clone().unwrap_or_default();

        let result = self.process_event(event).await;
        let duration_ms = timer.elapsed().as_millis() as i64;

        let (status, record_count, error_message) = match &result {
            Ok(WebhookOutcome::Ignored(reason)) => {
                info!(reason = reason, "Webhook event ignored");
                record_webhook_event(&event_type, "ignored");
                return result;
            }
            Ok(WebhookOutcome::Processed { .. }) => {
                record_webhook_event(&event_type, "processed");
                record_synced_records(LogContext::Webhook.as_str(), 1);
                (SyncStatus::Success, 1, None)
            }
            Err(e) => {
                error!(error = %e, "Webhook event failed");
                record_webhook_event(&event_type, "failed");
                record_error(e.kind());
                (SyncStatus::Failure, 0, Some(e.to_string()))
            }
        };

        self.store()
            .insert_sync_log(NewSyncLog {
                table_name: format!("Webhook {}", event_type),
                record_count,
                status,
                duration_ms,
                initiated_at: started_at,
                error_message,
                context: LogContext::Webhook,
            })
            .await?;

        result
    }

    /// Route an event to the engine. Only subscription invoices are handled.
    pub async fn process_event(&self, event: WebhookEvent) -> SyncResult<WebhookOutcome> {
        let Some(kind) = event.event_type.as_deref().and_then(EventKind::parse) else {
            return Ok(WebhookOutcome::Ignored("unrecognized event type"));
        };
        let Some(invoice) = event.content.invoice else {
            return Ok(WebhookOutcome::Ignored("event carries no invoice"));
        };
        if invoice.subscription_id.as_deref().map_or(true, str::is_empty) {
            return Ok(WebhookOutcome::Ignored("invoice has no subscription"));
        }

        match kind {
            EventKind::InvoiceGenerated => {
                let outcome = self.sync_invoice(&invoice).await?;
                Ok(WebhookOutcome::Processed {
                    kind,
                    outcome,
                    payments: 0,
                })
            }
            EventKind::InvoiceUpdated => {
                let outcome = self.reconcile_invoice(&invoice, false).await?;
                Ok(WebhookOutcome::Processed {
                    kind,
                    outcome,
                    payments: 0,
                })
            }
            EventKind::PaymentSucceeded => {
                self.payment_succeeded(&invoice, event.content.transaction.as_ref())
                    .await
            }
        }
    }

    async fn payment_succeeded(
        &self,
        invoice: &RemoteInvoice,
        transaction: Option<&RemoteTransaction>,
    ) -> SyncResult<WebhookOutcome> {
        let company = self
            .resolve_company(invoice.business_entity_id.as_deref())
            .await?;

        let mut local = self
            .store()
            .find_move(&invoice.id, company.company_id, MoveType::Invoice)
            .await?;
        if local.is_none() {
            // The generated event may still be in flight.
            tokio::time::sleep(self.settings().race_retry_delay).await;
            local = self
                .store()
                .find_move(&invoice.id, company.company_id, MoveType::Invoice)
                .await?;
        }

        let outcome = match local {
            Some(document) if document.state == MoveState::Posted => {
                InvoiceOutcome::Unchanged(document)
            }
            _ => self.reconcile_invoice(invoice, false).await?,
        };

        let linked = match transaction {
            Some(txn) => vec![RemoteLinkedPayment {
                txn_id: txn.id.clone(),
                applied_amount: txn.amount,
                txn_date: txn.date,
                txn_status: txn.status.clone(),
            }],
            None => invoice.linked_payments.clone(),
        };
        let payments = self.register_payments(outcome.document(), &linked).await?;

        Ok(WebhookOutcome::Processed {
            kind: EventKind::PaymentSucceeded,
            outcome,
            payments: payments.len(),
        })
    }
}
