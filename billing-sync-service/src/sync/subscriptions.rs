//! Subscription records and the invoices billed under them.

use super::timestamps::{billing_cycles, to_date};
use super::Reconciler;
use crate::error::{SyncError, SyncResult};
use crate::models::remote::RemoteSubscription;
use crate::models::{NewSubscription, PeriodUnit, Subscription};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Direction of a plan change. Both go through the same platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChange {
    Upgrade,
    Downgrade,
}

/// Status recorded when the platform's cancel response carries none.
const CANCELLED_STATUS: &str = "cancelled";

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionOutcome {
    pub subscription: Subscription,
    pub invoices_synced: u32,
    pub invoices_skipped: u32,
}

impl Reconciler {
    /// Cycles are computed before anything is written, so an unsupported
    /// billing unit leaves neither the subscription nor its invoices behind.
    #[instrument(skip(self, remote), fields(subscription_id = %remote.id))]
    pub async fn sync_subscription(
        &self,
        remote: &RemoteSubscription,
    ) -> SyncResult<SubscriptionOutcome> {
        let unit_name = remote.billing_period_unit.as_deref().ok_or_else(|| {
            SyncError::UnsupportedData(format!("subscription {} has no billing unit", remote.id))
        })?;
        let unit = PeriodUnit::parse(unit_name)?;
        let period = remote.billing_period.unwrap_or(1);

        let start_date = to_date(remote.start_date);
        let end_date = to_date(remote.end_date)
            .or_else(|| to_date(remote.cancelled_at))
            .or_else(|| to_date(remote.current_term_end));
        let cycles = match (start_date, end_date) {
            (Some(start), Some(end)) => Some(billing_cycles(start, end, period, unit_name)?),
            _ => None,
        };

        let partner = match remote.customer_id.as_deref() {
            Some(customer_id) => Some(
                self.get_or_create_partner(Some(customer_id), None, None)
                    .await?,
            ),
            None => None,
        };

        let subscription = self
            .store()
            .upsert_subscription(NewSubscription {
                remote_id: remote.id.clone(),
                partner_id: partner.map(|p| p.partner_id),
                status: remote
                    .status
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                start_date,
                end_date,
                billing_period: period,
                billing_period_unit: unit,
                billing_cycles: cycles.map(|c| c as i32),
                plan_item_price_id: remote.plan_item_price_id().map(str::to_string),
            })
            .await?;

        let mut invoices_synced = 0;
        let mut invoices_skipped = 0;
        for invoice in self.api().list_invoices_for_subscription(&remote.id).await? {
            match self.sync_invoice(&invoice).await {
                Ok(_) => invoices_synced += 1,
                Err(SyncError::NoBillableLines(id)) => {
                    warn!(invoice_id = %id, "Invoice has no billable lines");
                    invoices_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            cycles = ?cycles,
            invoices_synced = invoices_synced,
            "Subscription synchronized"
        );
        Ok(SubscriptionOutcome {
            subscription,
            invoices_synced,
            invoices_skipped,
        })
    }

    /// Move a known subscription onto another plan price on the platform and
    /// record the plan and status it comes back with.
    #[instrument(skip(self))]
    pub async fn change_subscription_plan(
        &self,
        remote_id: &str,
        item_price_id: &str,
        change: PlanChange,
    ) -> SyncResult<Subscription> {
        let local = self.known_subscription(remote_id).await?;
        let remote = self
            .api()
            .update_subscription_plan(remote_id, item_price_id)
            .await?;

        let status = remote.status.as_deref().unwrap_or(&local.status);
        let plan = remote.plan_item_price_id().unwrap_or(item_price_id);
        let updated = self
            .store()
            .update_subscription_terms(remote_id, status, Some(plan))
            .await?;
        info!(change = ?change, plan = %plan, status = %status, "Subscription plan changed");
        Ok(updated)
    }

    /// Cancel at the end of the current term. The plan is kept.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(&self, remote_id: &str) -> SyncResult<Subscription> {
        let local = self.known_subscription(remote_id).await?;
        let remote = self.api().cancel_subscription(remote_id).await?;

        let status = remote.status.as_deref().unwrap_or(CANCELLED_STATUS);
        let plan = remote
            .plan_item_price_id()
            .or(local.plan_item_price_id.as_deref());
        let updated = self
            .store()
            .update_subscription_terms(remote_id, status, plan)
            .await?;
        info!(status = %status, "Subscription cancellation scheduled");
        Ok(updated)
    }

    async fn known_subscription(&self, remote_id: &str) -> SyncResult<Subscription> {
        self.store()
            .find_subscription(remote_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("subscription {}", remote_id)))
    }
}
