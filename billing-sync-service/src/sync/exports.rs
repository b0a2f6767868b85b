//! Records created on the billing platform from the local ledger.

use super::jobs::BatchReport;
use super::Reconciler;
use crate::error::{SyncError, SyncResult};
use crate::models::remote::{CustomerDraft, ItemDraft, ItemFamilyDraft, RemoteItem, RemoteItemFamily};
use crate::models::{LogContext, NewPartner, NewProduct, NewSyncLog, Partner, Product, SyncStatus};
use crate::services::metrics::record_error;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, instrument};

/// Prefix of platform customer ids minted for exported partners.
const EXPORTED_CUSTOMER_PREFIX: &str = "erp_";

/// A catalog item to create on the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRequest {
    /// Defaults to the name. Lowercased, spaces become underscores.
    pub item_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// Existing platform family; a dedicated family is created when absent.
    pub family_id: Option<String>,
    pub list_price: Option<Decimal>,
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteItemOutcome {
    pub product: Product,
    pub item_created: bool,
    pub family_created: bool,
}

pub fn normalize_item_id(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

impl Reconciler {
    /// Partners not yet known to the platform. Each export links the partner to
    /// the new customer id.
    pub(crate) async fn export_customers(&self, report: &mut BatchReport) -> SyncResult<()> {
        for partner in self.store().list_partners().await? {
            if partner.remote_customer_id.is_some() {
                continue;
            }
            let result = self.export_partner(&partner).await;
            report.record(&partner.name, result)?;
        }
        Ok(())
    }

    #[instrument(skip(self, partner), fields(partner_id = %partner.partner_id))]
    pub async fn export_partner(&self, partner: &Partner) -> SyncResult<Partner> {
        let email = partner
            .email
            .clone()
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| {
                SyncError::UnsupportedData(format!("partner {} has no email address", partner.name))
            })?;

        let customer = self
            .api()
            .create_customer(&CustomerDraft {
                id: format!("{}{}", EXPORTED_CUSTOMER_PREFIX, partner.partner_id.simple()),
                first_name: partner.name.clone(),
                email,
                company: Some(partner.name.clone()),
                phone: partner.phone.clone(),
            })
            .await?;

        let linked = self
            .store()
            .update_partner(
                partner.partner_id,
                NewPartner {
                    remote_customer_id: Some(customer.id.clone()),
                    name: partner.name.clone(),
                    email: partner.email.clone(),
                    phone: partner.phone.clone(),
                    street: partner.street.clone(),
                    city: partner.city.clone(),
                    zip: partner.zip.clone(),
                    country: partner.country.clone(),
                    company_id: partner.company_id,
                },
            )
            .await?;
        info!(customer_id = %customer.id, "Partner exported");
        Ok(linked)
    }

    /// Create (or link) an item and its family on the platform, then mirror it
    /// as a local product. Writes one sync log.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_remote_item(&self, request: &ItemRequest) -> SyncResult<RemoteItemOutcome> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let result = self.push_item(request).await;

        let (status, record_count, error_message) = match &result {
            Ok(_) => (SyncStatus::Success, 1, None),
            Err(e) => {
                error!(error = %e, "Item creation failed");
                record_error(e.kind());
                (SyncStatus::Failure, 0, Some(e.to_string()))
            }
        };
        self.store()
            .insert_sync_log(NewSyncLog {
                table_name: "Remote Item".to_string(),
                record_count,
                status,
                duration_ms: timer.elapsed().as_millis() as i64,
                initiated_at: started_at,
                error_message,
                context: LogContext::Items,
            })
            .await?;

        result
    }

    async fn push_item(&self, request: &ItemRequest) -> SyncResult<RemoteItemOutcome> {
        let item_id = normalize_item_id(request.item_id.as_deref().unwrap_or(&request.name));
        if item_id.is_empty() {
            return Err(SyncError::UnsupportedData(
                "item id or name is required".to_string(),
            ));
        }

        let (remote_family, family_created) = match &request.family_id {
            Some(family_id) => (self.api().retrieve_item_family(family_id).await?, false),
            None => {
                self.find_or_create_remote_family(ItemFamilyDraft {
                    id: format!("{}-family", item_id),
                    name: format!("{} family", request.name),
                    description: Some(format!("Created for item {}", item_id)),
                })
                .await?
            }
        };
        let family_name = remote_family
            .name
            .clone()
            .unwrap_or_else(|| remote_family.id.clone());
        let family = self
            .store()
            .upsert_family(&remote_family.id, &family_name)
            .await?;

        let (remote_item, item_created) = match self.api().retrieve_item(&item_id).await {
            Ok(existing) => (existing, false),
            Err(e) if e.is_not_found() => {
                let created = self
                    .api()
                    .create_item(&ItemDraft {
                        id: item_id.clone(),
                        name: request.name.clone(),
                        description: request.description.clone(),
                        item_type: "plan".to_string(),
                        item_family_id: remote_family.id.clone(),
                    })
                    .await?;
                (created, true)
            }
            Err(e) => return Err(e),
        };

        let product = self.mirror_item(&remote_item, request, family.family_id).await?;
        info!(
            item_id = %remote_item.id,
            item_created = item_created,
            family_created = family_created,
            "Item available on the billing platform"
        );
        Ok(RemoteItemOutcome {
            product,
            item_created,
            family_created,
        })
    }

    async fn find_or_create_remote_family(
        &self,
        draft: ItemFamilyDraft,
    ) -> SyncResult<(RemoteItemFamily, bool)> {
        match self.api().retrieve_item_family(&draft.id).await {
            Ok(existing) => Ok((existing, false)),
            Err(e) if e.is_not_found() => Ok((self.api().create_item_family(&draft).await?, true)),
            Err(e) => Err(e),
        }
    }

    /// A product already mirrored keeps its price.
    async fn mirror_item(
        &self,
        item: &RemoteItem,
        request: &ItemRequest,
        family_id: uuid::Uuid,
    ) -> SyncResult<Product> {
        let existing = self.store().find_product_by_item_id(&item.id).await?;
        let (list_price, currency_code) = match existing {
            Some(product) => (product.list_price, product.currency_code),
            None => (
                request.list_price.unwrap_or(Decimal::ZERO),
                request.currency_code.clone(),
            ),
        };
        self.store()
            .upsert_product(NewProduct {
                remote_item_id: item.id.clone(),
                name: item.name.clone().unwrap_or_else(|| request.name.clone()),
                description: item.description.clone().or_else(|| request.description.clone()),
                list_price,
                currency_code,
                family_id: Some(family_id),
            })
            .await
    }
}
