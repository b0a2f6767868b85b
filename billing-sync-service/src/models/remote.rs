//! Typed snapshots of records returned by the billing platform, and the
//! drafts sent to it.
//!
//! Field presence varies by entity and API version, so everything that is not
//! an identifier is optional. Unknown fields are ignored.

use super::from_minor_units;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One page of a list endpoint: `{list: [{<entity>: {...}}], next_offset?}`.
#[derive(Debug, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub list: Vec<serde_json::Value>,
    pub next_offset: Option<String>,
}

/// Error body returned by the platform on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct RemoteErrorBody {
    pub message: Option<String>,
    pub api_error_code: Option<String>,
    pub error_code: Option<String>,
    pub http_status_code: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    Paid,
    Posted,
    PaymentDue,
    NotPaid,
    Voided,
    Pending,
    Other(String),
}

impl From<String> for InvoiceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "paid" => InvoiceStatus::Paid,
            "posted" => InvoiceStatus::Posted,
            "payment_due" => InvoiceStatus::PaymentDue,
            "not_paid" => InvoiceStatus::NotPaid,
            "voided" => InvoiceStatus::Voided,
            "pending" => InvoiceStatus::Pending,
            _ => InvoiceStatus::Other(value),
        }
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        match status {
            InvoiceStatus::Paid => "paid".to_string(),
            InvoiceStatus::Posted => "posted".to_string(),
            InvoiceStatus::PaymentDue => "payment_due".to_string(),
            InvoiceStatus::NotPaid => "not_paid".to_string(),
            InvoiceStatus::Voided => "voided".to_string(),
            InvoiceStatus::Pending => "pending".to_string(),
            InvoiceStatus::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteBillingAddress {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl RemoteBillingAddress {
    /// "first last", trimmed; `None` when both halves are blank.
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLineItem {
    pub id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub unit_amount: i64,
    pub amount: Option<i64>,
    pub tax_amount: Option<i64>,
    pub tax_exempt_reason: Option<String>,
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
    #[serde(default)]
    pub entity_type: String,
    pub entity_id: Option<String>,
}

impl RemoteLineItem {
    /// The referenced price id when the line points at an item price.
    pub fn price_id(&self) -> Option<&str> {
        if self.entity_type.ends_with("_item_price") {
            self.entity_id.as_deref()
        } else {
            None
        }
    }

    /// The referenced item id when the line points directly at an item.
    pub fn item_id(&self) -> Option<&str> {
        if self.entity_type.ends_with("_item_price") {
            None
        } else {
            self.entity_id.as_deref()
        }
    }

    pub fn quantity(&self) -> Decimal {
        Decimal::from(self.quantity.unwrap_or(1))
    }

    pub fn unit_price(&self) -> Decimal {
        from_minor_units(self.unit_amount)
    }

    pub fn tax(&self) -> Decimal {
        from_minor_units(self.tax_amount.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLineItemTax {
    pub line_item_id: Option<String>,
    pub tax_name: String,
    pub tax_rate: Option<Decimal>,
    pub tax_amount: Option<i64>,
    pub tax_juris_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLinkedPayment {
    pub txn_id: String,
    #[serde(default)]
    pub applied_amount: i64,
    pub txn_date: Option<i64>,
    pub txn_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTransaction {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    pub date: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteInvoice {
    pub id: String,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub business_entity_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub date: Option<i64>,
    pub due_date: Option<i64>,
    pub currency_code: Option<String>,
    pub total: Option<i64>,
    pub amount_due: Option<i64>,
    #[serde(default)]
    pub line_items: Vec<RemoteLineItem>,
    #[serde(default)]
    pub line_item_taxes: Vec<RemoteLineItemTax>,
    #[serde(default)]
    pub linked_payments: Vec<RemoteLinkedPayment>,
    pub billing_address: Option<RemoteBillingAddress>,
}

impl RemoteInvoice {
    pub fn is_paid(&self) -> bool {
        self.status == Some(InvoiceStatus::Paid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCreditNote {
    pub id: String,
    pub reference_invoice_id: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub business_entity_id: Option<String>,
    pub status: Option<String>,
    pub date: Option<i64>,
    pub currency_code: Option<String>,
    pub total: Option<i64>,
    #[serde(default)]
    pub line_items: Vec<RemoteLineItem>,
    pub billing_address: Option<RemoteBillingAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCustomer {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub business_entity_id: Option<String>,
    pub billing_address: Option<RemoteBillingAddress>,
}

impl RemoteCustomer {
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
        self.billing_address
            .as_ref()
            .and_then(RemoteBillingAddress::display_name)
            .or_else(|| self.company.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub item_family_id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteItemPrice {
    pub id: String,
    pub item_id: Option<String>,
    pub name: Option<String>,
    pub price: Option<i64>,
    pub currency_code: Option<String>,
    pub period: Option<i32>,
    pub period_unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteItemFamily {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCurrency {
    pub currency_code: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteBusinessEntity {
    pub id: String,
    pub name: Option<String>,
    pub currency_code: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub item_price_id: String,
    pub item_type: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub billing_period: Option<i32>,
    pub billing_period_unit: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub current_term_end: Option<i64>,
    #[serde(default)]
    pub subscription_items: Vec<SubscriptionEntry>,
}

impl RemoteSubscription {
    /// The plan entry's price id, if any.
    pub fn plan_item_price_id(&self) -> Option<&str> {
        self.subscription_items
            .iter()
            .find(|entry| entry.item_type.as_deref() == Some("plan"))
            .or_else(|| self.subscription_items.first())
            .map(|entry| entry.item_price_id.as_str())
    }
}

/// Customer fields sent when exporting a local partner.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDraft {
    pub id: String,
    pub first_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFamilyDraft {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDraft {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    pub item_family_id: String,
}
