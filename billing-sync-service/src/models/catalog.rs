//! Products, item families and taxes mirrored from the billing catalog.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Classification grouping of products; only used to route journals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Family {
    pub family_id: Uuid,
    pub remote_id: String,
    pub name: String,
}

/// A billable item, keyed by the remote item id (never the price id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub remote_item_id: String,
    pub name: String,
    pub description: Option<String>,
    pub list_price: Decimal,
    pub currency_code: Option<String>,
    pub family_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub remote_item_id: String,
    pub name: String,
    pub description: Option<String>,
    pub list_price: Decimal,
    pub currency_code: Option<String>,
    pub family_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tax {
    pub tax_id: Uuid,
    pub remote_key: String,
    pub name: String,
    /// Percentage, e.g. `18.0`.
    pub rate: Decimal,
    pub company_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewTax {
    pub remote_key: String,
    pub name: String,
    pub rate: Decimal,
    pub company_id: Uuid,
}
