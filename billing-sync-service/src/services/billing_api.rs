//! Client for the subscription-billing platform's REST API.
//!
//! A `BillingClient` is built once per action from the configured credentials
//! and handed to every call site that talks to the platform.

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::remote::{
    CustomerDraft, ItemDraft, ItemFamilyDraft, ListPage, RemoteBusinessEntity, RemoteCreditNote,
    RemoteCurrency, RemoteCustomer, RemoteErrorBody, RemoteInvoice, RemoteItem, RemoteItemFamily,
    RemoteItemPrice, RemoteSubscription,
};
use crate::services::metrics::REMOTE_API_DURATION;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Remote operations used by the reconciliation engine and bulk jobs.
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// Lists a single customer to validate credentials.
    async fn test_connection(&self) -> SyncResult<()>;

    async fn list_customers(&self) -> SyncResult<Vec<RemoteCustomer>>;
    async fn retrieve_customer(&self, id: &str) -> SyncResult<RemoteCustomer>;

    async fn list_invoices(&self) -> SyncResult<Vec<RemoteInvoice>>;
    async fn list_invoices_for_subscription(
        &self,
        subscription_id: &str,
    ) -> SyncResult<Vec<RemoteInvoice>>;
    async fn retrieve_invoice(&self, id: &str) -> SyncResult<RemoteInvoice>;

    async fn list_credit_notes(&self) -> SyncResult<Vec<RemoteCreditNote>>;
    async fn list_credit_notes_for_invoice(
        &self,
        invoice_id: &str,
    ) -> SyncResult<Vec<RemoteCreditNote>>;

    async fn list_subscriptions(&self) -> SyncResult<Vec<RemoteSubscription>>;

    async fn list_items(&self) -> SyncResult<Vec<RemoteItem>>;
    async fn retrieve_item(&self, id: &str) -> SyncResult<RemoteItem>;
    async fn list_item_prices_for_item(&self, item_id: &str) -> SyncResult<Vec<RemoteItemPrice>>;
    async fn retrieve_item_price(&self, id: &str) -> SyncResult<RemoteItemPrice>;

    async fn list_item_families(&self) -> SyncResult<Vec<RemoteItemFamily>>;
    async fn retrieve_item_family(&self, id: &str) -> SyncResult<RemoteItemFamily>;

    async fn list_currencies(&self) -> SyncResult<Vec<RemoteCurrency>>;

    async fn list_business_entities(&self) -> SyncResult<Vec<RemoteBusinessEntity>>;
    async fn retrieve_business_entity(&self, id: &str) -> SyncResult<RemoteBusinessEntity>;

    async fn create_customer(&self, customer: &CustomerDraft) -> SyncResult<RemoteCustomer>;
    async fn create_item_family(&self, family: &ItemFamilyDraft) -> SyncResult<RemoteItemFamily>;
    async fn create_item(&self, item: &ItemDraft) -> SyncResult<RemoteItem>;
    /// Replace the subscription's plan with another item price.
    async fn update_subscription_plan(
        &self,
        subscription_id: &str,
        item_price_id: &str,
    ) -> SyncResult<RemoteSubscription>;
    /// Cancel at the end of the current term.
    async fn cancel_subscription(&self, subscription_id: &str) -> SyncResult<RemoteSubscription>;
}

/// HTTP implementation of [`BillingApi`].
#[derive(Clone)]
pub struct BillingClient {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
    page_size: u32,
}

impl BillingClient {
    /// Build a client handle; missing credentials are a configuration error.
    pub fn new(client: Client, config: &RemoteConfig) -> SyncResult<Self> {
        if !config.is_configured() {
            return Err(SyncError::Configuration(
                "Billing API key and site are not configured".to_string(),
            ));
        }
        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
            page_size: config.page_size.clamp(1, 100),
        })
    }

    /// Build the shared reqwest client with the configured timeout.
    pub fn http_client(config: &RemoteConfig) -> SyncResult<Client> {
        Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to build HTTP client: {}", e)))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> SyncResult<serde_json::Value> {
        let request = self.client.get(format!("{}/{}", self.base_url, path)).query(query);
        self.execute(request, path).await
    }

    /// Write endpoints take form-encoded bodies.
    async fn post<F: Serialize + ?Sized>(&self, path: &str, form: &F) -> SyncResult<serde_json::Value> {
        let request = self.client.post(format!("{}/{}", self.base_url, path)).form(form);
        self.execute(request, path).await
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> SyncResult<serde_json::Value> {
        let endpoint = path.split('/').next().unwrap_or(path);
        let timer = std::time::Instant::now();

        let response = request
            .basic_auth(self.api_key.expose_secret(), Some(""))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        REMOTE_API_DURATION
            .with_label_values(&[endpoint, status.as_str()])
            .observe(timer.elapsed().as_secs_f64());
        debug!(status = %status, path = %path, "Billing API response");

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                SyncError::UnsupportedData(format!("Malformed response from {}: {}", path, e))
            })
        } else {
            let error: RemoteErrorBody =
                serde_json::from_str(&body).unwrap_or_else(|_| RemoteErrorBody {
                    message: Some(body.clone()),
                    api_error_code: None,
                    error_code: None,
                    http_status_code: None,
                });
            warn!(
                status = %status,
                code = ?error.api_error_code,
                message = ?error.message,
                "Billing API request failed"
            );
            Err(SyncError::remote(
                error.http_status_code.unwrap_or(status.as_u16()),
                error
                    .api_error_code
                    .or(error.error_code)
                    .unwrap_or_else(|| "unknown".to_string()),
                error.message.unwrap_or_default(),
            ))
        }
    }

    /// Fetch every page of a list endpoint, unwrapping `{<key>: {...}}` entries.
    #[instrument(skip(self, filters), fields(path = %path))]
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        filters: &[(&str, String)],
    ) -> SyncResult<Vec<T>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = filters.to_vec();
            query.push(("limit", self.page_size.to_string()));
            if let Some(next) = &offset {
                query.push(("offset", next.clone()));
            }

            let body = self.get(path, &query).await?;
            let page: ListPage = serde_json::from_value(body).map_err(|e| {
                SyncError::UnsupportedData(format!("Malformed list from {}: {}", path, e))
            })?;

            for entry in page.list {
                records.push(unwrap_entry(entry, key)?);
            }

            match page.next_offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        debug!(count = records.len(), "Fetched remote records");
        Ok(records)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn retrieve<T: DeserializeOwned>(&self, path: &str, key: &str) -> SyncResult<T> {
        let body = self.get(path, &[]).await?;
        unwrap_entry(body, key)
    }
}

fn unwrap_entry<T: DeserializeOwned>(mut entry: serde_json::Value, key: &str) -> SyncResult<T> {
    let inner = entry
        .get_mut(key)
        .map(serde_json::Value::take)
        .ok_or_else(|| SyncError::UnsupportedData(format!("Response entry lacks '{}'", key)))?;
    serde_json::from_value(inner)
        .map_err(|e| SyncError::UnsupportedData(format!("Invalid {} record: {}", key, e)))
}

#[async_trait]
impl BillingApi for BillingClient {
    async fn test_connection(&self) -> SyncResult<()> {
        self.get("customers", &[("limit", "1".to_string())]).await?;
        Ok(())
    }

    async fn list_customers(&self) -> SyncResult<Vec<RemoteCustomer>> {
        self.list_all("customers", "customer", &[]).await
    }

    async fn retrieve_customer(&self, id: &str) -> SyncResult<RemoteCustomer> {
        self.retrieve(&format!("customers/{}", id), "customer").await
    }

    async fn list_invoices(&self) -> SyncResult<Vec<RemoteInvoice>> {
        self.list_all("invoices", "invoice", &[]).await
    }

    async fn list_invoices_for_subscription(
        &self,
        subscription_id: &str,
    ) -> SyncResult<Vec<RemoteInvoice>> {
        self.list_all(
            "invoices",
            "invoice",
            &[("subscription_id[is]", subscription_id.to_string())],
        )
        .await
    }

    async fn retrieve_invoice(&self, id: &str) -> SyncResult<RemoteInvoice> {
        self.retrieve(&format!("invoices/{}", id), "invoice").await
    }

    async fn list_credit_notes(&self) -> SyncResult<Vec<RemoteCreditNote>> {
        self.list_all("credit_notes", "credit_note", &[]).await
    }

    async fn list_credit_notes_for_invoice(
        &self,
        invoice_id: &str,
    ) -> SyncResult<Vec<RemoteCreditNote>> {
        self.list_all(
            "credit_notes",
            "credit_note",
            &[("reference_invoice_id[is]", invoice_id.to_string())],
        )
        .await
    }

    async fn list_subscriptions(&self) -> SyncResult<Vec<RemoteSubscription>> {
        self.list_all("subscriptions", "subscription", &[]).await
    }

    async fn list_items(&self) -> SyncResult<Vec<RemoteItem>> {
        self.list_all("items", "item", &[]).await
    }

    async fn retrieve_item(&self, id: &str) -> SyncResult<RemoteItem> {
        self.retrieve(&format!("items/{}", id), "item").await
    }

    async fn list_item_prices_for_item(&self, item_id: &str) -> SyncResult<Vec<RemoteItemPrice>> {
        self.list_all(
            "item_prices",
            "item_price",
            &[("item_id[is]", item_id.to_string())],
        )
        .await
    }

    async fn retrieve_item_price(&self, id: &str) -> SyncResult<RemoteItemPrice> {
        self.retrieve(&format!("item_prices/{}", id), "item_price")
            .await
    }

    async fn list_item_families(&self) -> SyncResult<Vec<RemoteItemFamily>> {
        self.list_all("item_families", "item_family", &[]).await
    }

    async fn retrieve_item_family(&self, id: &str) -> SyncResult<RemoteItemFamily> {
        self.retrieve(&format!("item_families/{}", id), "item_family")
            .await
    }

    async fn list_currencies(&self) -> SyncResult<Vec<RemoteCurrency>> {
        self.list_all("currencies/list", "currency", &[]).await
    }

    async fn list_business_entities(&self) -> SyncResult<Vec<RemoteBusinessEntity>> {
        self.list_all("business_entities", "business_entity", &[])
            .await
    }

    async fn retrieve_business_entity(&self, id: &str) -> SyncResult<RemoteBusinessEntity> {
        self.retrieve(&format!("business_entities/{}", id), "business_entity")
            .await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn create_customer(&self, customer: &CustomerDraft) -> SyncResult<RemoteCustomer> {
        let body = self.post("customers", customer).await?;
        unwrap_entry(body, "customer")
    }

    #[instrument(skip(self, family), fields(family_id = %family.id))]
    async fn create_item_family(&self, family: &ItemFamilyDraft) -> SyncResult<RemoteItemFamily> {
        let body = self.post("item_families", family).await?;
        unwrap_entry(body, "item_family")
    }

    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn create_item(&self, item: &ItemDraft) -> SyncResult<RemoteItem> {
        let body = self.post("items", item).await?;
        unwrap_entry(body, "item")
    }

    #[instrument(skip(self))]
    async fn update_subscription_plan(
        &self,
        subscription_id: &str,
        item_price_id: &str,
    ) -> SyncResult<RemoteSubscription> {
        let body = self
            .post(
                &format!("subscriptions/{}/update_for_items", subscription_id),
                &[("subscription_items[item_price_id][0]", item_price_id)],
            )
            .await?;
        unwrap_entry(body, "subscription")
    }

    #[instrument(skip(self))]
    async fn cancel_subscription(&self, subscription_id: &str) -> SyncResult<RemoteSubscription> {
        let body = self
            .post(
                &format!("subscriptions/{}/cancel_for_items", subscription_id),
                &[("end_of_term", "true")],
            )
            .await?;
        unwrap_entry(body, "subscription")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn remote_config(api_key: &str) -> RemoteConfig {
        RemoteConfig {
            site: "acme-test".to_string(),
            api_key: Secret::new(api_key.to_string()),
            api_base_url: None,
            request_timeout: Duration::from_secs(5),
            page_size: 500,
        }
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let result = BillingClient::new(Client::new(), &remote_config(""));
        assert!(matches!(result, Err(SyncError::Configuration(_))));
    }

    #[test]
    fn page_size_is_capped_at_platform_maximum() {
        let client = BillingClient::new(Client::new(), &remote_config("key")).unwrap();
        assert_eq!(client.page_size, 100);
        assert_eq!(client.base_url, "https://acme-test.chargebee.com/api/v2");
    }

    #[test]
    fn entries_are_unwrapped_by_key() {
        let customer: RemoteCustomer =
            unwrap_entry(serde_json::json!({"customer": {"id": "cus_9"}}), "customer").unwrap();
        assert_eq!(customer.id, "cus_9");
        let missing = unwrap_entry::<RemoteCustomer>(serde_json::json!({"card": {}}), "customer");
        assert!(matches!(missing, Err(SyncError::UnsupportedData(_))));
    }
}
