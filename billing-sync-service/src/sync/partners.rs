//! Customer lookup and creation.

use super::Reconciler;
use crate::error::SyncResult;
use crate::models::remote::{RemoteBillingAddress, RemoteCustomer};
use crate::models::{NewPartner, Partner};
use tracing::{debug, info};
use uuid::Uuid;

const FALLBACK_PARTNER_NAME: &str = "Billing Customer";

fn address_fields(partner: &mut NewPartner, address: &RemoteBillingAddress) {
    partner.phone = address.phone.clone();
    partner.street = address.line1.clone();
    partner.city = address.city.clone();
    partner.zip = address.zip.clone();
    partner.country = address.country.clone();
    if partner.email.is_none() {
        partner.email = address.email.clone();
    }
}

impl Reconciler {
    /// Looks up by remote customer id, then by derived display name, and creates
    /// the partner when neither matches. A name match is returned as is.
    pub async fn get_or_create_partner(
        &self,
        customer_id: Option<&str>,
        billing_address: Option<&RemoteBillingAddress>,
        company_id: Option<Uuid>,
    ) -> SyncResult<Partner> {
        if let Some(id) = customer_id {
            if let Some(partner) = self.store().find_partner_by_remote_id(id).await? {
                return Ok(partner);
            }
        }

        let name = billing_address
            .and_then(RemoteBillingAddress::display_name)
            .or_else(|| customer_id.map(str::to_string))
            .unwrap_or_else(|| FALLBACK_PARTNER_NAME.to_string());

        if let Some(partner) = self.store().find_partner_by_name(&name).await? {
            debug!(partner_id = %partner.partner_id, name = %name, "Partner matched by name");
            return Ok(partner);
        }

        let mut new_partner = NewPartner {
            remote_customer_id: customer_id.map(str::to_string),
            name,
            company_id,
            ..Default::default()
        };
        if let Some(address) = billing_address {
            address_fields(&mut new_partner, address);
        }

        let partner = self.store().create_partner(new_partner).await?;
        info!(partner_id = %partner.partner_id, "Partner created");
        Ok(partner)
    }

    /// Customer job upsert keyed by remote customer id.
    pub async fn upsert_customer(&self, customer: &RemoteCustomer) -> SyncResult<Partner> {
        let mut fields = NewPartner {
            remote_customer_id: Some(customer.id.clone()),
            name: customer
                .display_name()
                .unwrap_or_else(|| customer.id.clone()),
            email: customer.email.clone(),
            ..Default::default()
        };
        if let Some(address) = &customer.billing_address {
            address_fields(&mut fields, address);
        }
        if customer.phone.is_some() {
            fields.phone = customer.phone.clone();
        }

        match self.store().find_partner_by_remote_id(&customer.id).await? {
            Some(existing) => {
                fields.company_id = existing.company_id;
                self.store()
                    .update_partner(existing.partner_id, fields)
                    .await
            }
            None => self.store().create_partner(fields).await,
        }
    }
}
