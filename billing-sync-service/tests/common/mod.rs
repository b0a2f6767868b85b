#![allow(dead_code)]

use async_trait::async_trait;
use billing_sync_service::config::{
    BillingSyncConfig, DatabaseConfig, RemoteConfig, StoreBackend, WebhookConfig,
};
use billing_sync_service::error::{SyncError, SyncResult};
use billing_sync_service::models::remote::{
    CustomerDraft, ItemDraft, ItemFamilyDraft, RemoteBusinessEntity, RemoteCreditNote,
    RemoteCurrency, RemoteCustomer, RemoteInvoice, RemoteItem, RemoteItemFamily, RemoteItemPrice,
    RemoteSubscription,
};
use billing_sync_service::models::{Company, Journal, JournalType, NewJournal};
use billing_sync_service::services::{BillingApi, LedgerStore, MemoryStore};
use billing_sync_service::startup::Application;
use billing_sync_service::sync::{Reconciler, SyncSettings};
use secrecy::Secret;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WEBHOOK_USER: &str = "hooks";
pub const WEBHOOK_PASSWORD: &str = "s3cret";

/// In-process stand-in for the billing platform.
#[derive(Default)]
pub struct FakeBillingApi {
    pub invoices: Mutex<Vec<RemoteInvoice>>,
    pub credit_notes: Mutex<Vec<RemoteCreditNote>>,
    pub subscriptions: Mutex<Vec<RemoteSubscription>>,
    pub customers: Mutex<Vec<RemoteCustomer>>,
    pub items: Mutex<HashMap<String, RemoteItem>>,
    pub item_prices: Mutex<HashMap<String, RemoteItemPrice>>,
    pub families: Mutex<HashMap<String, RemoteItemFamily>>,
    pub currencies: Mutex<Vec<RemoteCurrency>>,
    pub business_entities: Mutex<Vec<RemoteBusinessEntity>>,
}

fn not_found(kind: &str, id: &str) -> SyncError {
    SyncError::remote(404, "resource_not_found", format!("{} {} not found", kind, id))
}

impl FakeBillingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_invoice(&self, invoice: RemoteInvoice) {
        self.invoices.lock().unwrap().push(invoice);
    }

    pub fn add_credit_note(&self, credit_note: RemoteCreditNote) {
        self.credit_notes.lock().unwrap().push(credit_note);
    }

    pub fn add_subscription(&self, subscription: RemoteSubscription) {
        self.subscriptions.lock().unwrap().push(subscription);
    }

    /// Registers an item in a family, with a price `<item>-USD-monthly`.
    pub fn add_item(&self, item_id: &str, family_id: Option<&str>) {
        self.items.lock().unwrap().insert(
            item_id.to_string(),
            serde_json::from_value(json!({
                "id": item_id,
                "name": format!("{} item", item_id),
                "item_family_id": family_id,
                "type": "plan",
            }))
            .unwrap(),
        );
        let price_id = format!("{}-USD-monthly", item_id);
        self.item_prices.lock().unwrap().insert(
            price_id.clone(),
            serde_json::from_value(json!({
                "id": price_id,
                "item_id": item_id,
                "price": 5000,
                "currency_code": "USD",
            }))
            .unwrap(),
        );
        if let Some(family_id) = family_id {
            self.families.lock().unwrap().insert(
                family_id.to_string(),
                serde_json::from_value(json!({"id": family_id, "name": format!("{} family", family_id)}))
                    .unwrap(),
            );
        }
    }
}

#[async_trait]
impl BillingApi for FakeBillingApi {
    async fn test_connection(&self) -> SyncResult<()> {
        Ok(())
    }

    async fn list_customers(&self) -> SyncResult<Vec<RemoteCustomer>> {
        Ok(self.customers.lock().unwrap().clone())
    }

    async fn retrieve_customer(&self, id: &str) -> SyncResult<RemoteCustomer> {
        self.customers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found("customer", id))
    }

    async fn list_invoices(&self) -> SyncResult<Vec<RemoteInvoice>> {
        Ok(self.invoices.lock().unwrap().clone())
    }

    async fn list_invoices_for_subscription(
        &self,
        subscription_id: &str,
    ) -> SyncResult<Vec<RemoteInvoice>> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.subscription_id.as_deref() == Some(subscription_id))
            .cloned()
            .collect())
    }

    async fn retrieve_invoice(&self, id: &str) -> SyncResult<RemoteInvoice> {
        self.invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| not_found("invoice", id))
    }

    async fn list_credit_notes(&self) -> SyncResult<Vec<RemoteCreditNote>> {
        Ok(self.credit_notes.lock().unwrap().clone())
    }

    async fn list_credit_notes_for_invoice(
        &self,
        invoice_id: &str,
    ) -> SyncResult<Vec<RemoteCreditNote>> {
        Ok(self
            .credit_notes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.reference_invoice_id.as_deref() == Some(invoice_id))
            .cloned()
            .collect())
    }

    async fn list_subscriptions(&self) -> SyncResult<Vec<RemoteSubscription>> {
        Ok(self.subscriptions.lock().unwrap().clone())
    }

    async fn list_items(&self) -> SyncResult<Vec<RemoteItem>> {
        Ok(self.items.lock().unwrap().values().cloned().collect())
    }

    async fn retrieve_item(&self, id: &str) -> SyncResult<RemoteItem> {
        self.items
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("item", id))
    }

    async fn list_item_prices_for_item(&self, item_id: &str) -> SyncResult<Vec<RemoteItemPrice>> {
        Ok(self
            .item_prices
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.item_id.as_deref() == Some(item_id))
            .cloned()
            .collect())
    }

    async fn retrieve_item_price(&self, id: &str) -> SyncResult<RemoteItemPrice> {
        self.item_prices
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("item_price", id))
    }

    async fn list_item_families(&self) -> SyncResult<Vec<RemoteItemFamily>> {
        Ok(self.families.lock().unwrap().values().cloned().collect())
    }

    async fn retrieve_item_family(&self, id: &str) -> SyncResult<RemoteItemFamily> {
        self.families
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("item_family", id))
    }

    async fn list_currencies(&self) -> SyncResult<Vec<RemoteCurrency>> {
        Ok(self.currencies.lock().unwrap().clone())
    }

    async fn list_business_entities(&self) -> SyncResult<Vec<RemoteBusinessEntity>> {
        Ok(self.business_entities.lock().unwrap().clone())
    }

    async fn retrieve_business_entity(&self, id: &str) -> SyncResult<RemoteBusinessEntity> {
        self.business_entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| not_found("business_entity", id))
    }

    async fn create_customer(&self, customer: &CustomerDraft) -> SyncResult<RemoteCustomer> {
        let mut customers = self.customers.lock().unwrap();
        if customers.iter().any(|c| c.id == customer.id) {
            return Err(SyncError::remote(400, "duplicate_entry", "customer id exists"));
        }
        let created: RemoteCustomer = serde_json::from_value(json!({
            "id": customer.id,
            "first_name": customer.first_name,
            "email": customer.email,
            "company": customer.company,
            "phone": customer.phone,
        }))
        .unwrap();
        customers.push(created.clone());
        Ok(created)
    }

    async fn create_item_family(&self, family: &ItemFamilyDraft) -> SyncResult<RemoteItemFamily> {
        let created: RemoteItemFamily = serde_json::from_value(json!({
            "id": family.id,
            "name": family.name,
            "description": family.description,
        }))
        .unwrap();
        self.families
            .lock()
            .unwrap()
            .insert(family.id.clone(), created.clone());
        Ok(created)
    }

    async fn create_item(&self, item: &ItemDraft) -> SyncResult<RemoteItem> {
        if !self.families.lock().unwrap().contains_key(&item.item_family_id) {
            return Err(not_found("item_family", &item.item_family_id));
        }
        let created: RemoteItem = serde_json::from_value(json!({
            "id": item.id,
            "name": item.name,
            "description": item.description,
            "item_family_id": item.item_family_id,
            "type": item.item_type,
            "status": "active",
        }))
        .unwrap();
        self.items
            .lock()
            .unwrap()
            .insert(item.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_subscription_plan(
        &self,
        subscription_id: &str,
        item_price_id: &str,
    ) -> SyncResult<RemoteSubscription> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or_else(|| not_found("subscription", subscription_id))?;
        subscription.subscription_items = vec![serde_json::from_value(json!({
            "item_price_id": item_price_id,
            "item_type": "plan",
            "quantity": 1,
        }))
        .unwrap()];
        Ok(subscription.clone())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> SyncResult<RemoteSubscription> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or_else(|| not_found("subscription", subscription_id))?;
        subscription.status = Some("non_renewing".to_string());
        Ok(subscription.clone())
    }
}

pub fn test_settings() -> SyncSettings {
    SyncSettings {
        default_company_name: "Main Company".to_string(),
        race_retry_delay: Duration::from_millis(20),
    }
}

pub struct TestEngine {
    pub api: Arc<FakeBillingApi>,
    pub store: Arc<MemoryStore>,
    pub reconciler: Reconciler,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        let api = FakeBillingApi::new();
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(api.clone(), store.clone(), settings);
        Self {
            api,
            store,
            reconciler,
        }
    }

    /// The default company with one sale and one bank journal.
    pub async fn with_default_journals(self) -> (Self, Company, Journal, Journal) {
        let (company, sale, bank) = seed_default_journals(self.store.clone()).await;
        (self, company, sale, bank)
    }
}

/// Creates the default company with one sale and one bank journal.
pub async fn seed_default_journals(store: Arc<MemoryStore>) -> (Company, Journal, Journal) {
    let reconciler = Reconciler::new(FakeBillingApi::new(), store.clone(), test_settings());
    let company = reconciler.resolve_company(None).await.unwrap();
    let sale = store
        .create_journal(NewJournal {
            company_id: company.company_id,
            name: "Customer Invoices".to_string(),
            journal_type: JournalType::Sale,
        })
        .await
        .unwrap();
    let bank = store
        .create_journal(NewJournal {
            company_id: company.company_id,
            name: "Bank".to_string(),
            journal_type: JournalType::Bank,
        })
        .await
        .unwrap();
    (company, sale, bank)
}

pub fn line(id: &str, price_id: &str, unit_amount: i64) -> Value {
    json!({
        "id": id,
        "description": format!("Line {}", id),
        "quantity": 1,
        "unit_amount": unit_amount,
        "amount": unit_amount,
        "tax_amount": 0,
        "entity_type": "plan_item_price",
        "entity_id": price_id,
    })
}

/// A subscription invoice for the default company. Amounts are minor units.
pub fn invoice(id: &str, status: &str, lines: Vec<Value>) -> RemoteInvoice {
    invoice_json(id, status, lines, json!([]))
}

pub fn invoice_json(id: &str, status: &str, lines: Vec<Value>, linked: Value) -> RemoteInvoice {
    serde_json::from_value(json!({
        "id": id,
        "subscription_id": "sub_1",
        "customer_id": "cus_1",
        "status": status,
        "date": 1_700_000_000,
        "due_date": 1_702_592_000,
        "currency_code": "USD",
        "line_items": lines,
        "linked_payments": linked,
        "billing_address": {"first_name": "Ada", "last_name": "Lovelace"},
    }))
    .unwrap()
}

pub fn linked_payment(txn_id: &str, applied_amount: i64) -> Value {
    json!({
        "txn_id": txn_id,
        "applied_amount": applied_amount,
        "txn_date": 1_700_100_000,
        "txn_status": "success",
    })
}

pub fn test_config(api_base_url: &str, credentials: bool) -> BillingSyncConfig {
    BillingSyncConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service_name: "billing-sync-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            backend: StoreBackend::Memory,
            url: None,
            max_connections: 1,
            min_connections: 1,
        },
        remote: RemoteConfig {
            site: "acme-test".to_string(),
            api_key: Secret::new("test_key".to_string()),
            api_base_url: Some(api_base_url.to_string()),
            request_timeout: Duration::from_secs(5),
            page_size: 100,
        },
        webhook: WebhookConfig {
            enabled: true,
            username: credentials.then(|| WEBHOOK_USER.to_string()),
            password: credentials.then(|| Secret::new(WEBHOOK_PASSWORD.to_string())),
            race_retry_delay: Duration::from_millis(20),
        },
        default_company_name: "Main Company".to_string(),
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Serve the application on a random port, talking to `api_base_url`.
    pub async fn spawn(api_base_url: &str, credentials: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let app = Application::build_with_store(test_config(api_base_url, credentials), store.clone())
            .await
            .expect("Failed to build test application");

        let address = format!("http://127.0.0.1:{}", app.port());
        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Self {
            address,
            store,
            client,
        }
    }

    pub async fn post_webhook(&self, body: &Value, auth: Option<(&str, &str)>) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/webhooks/billing", self.address))
            .json(body);
        if let Some((user, password)) = auth {
            request = request.basic_auth(user, Some(password));
        }
        request.send().await.expect("Failed to send webhook")
    }
}
