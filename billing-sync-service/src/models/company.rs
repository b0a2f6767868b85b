//! Companies (remote business entities) and currencies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub company_id: Uuid,
    /// Remote business entity id; `None` for the default company.
    pub remote_id: Option<String>,
    pub name: String,
    pub currency_code: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub remote_id: Option<String>,
    pub name: String,
    pub currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub rounding: Decimal,
    pub active: bool,
}

impl Currency {
    /// Currency created on demand from an ISO code alone.
    pub fn from_code(code: &str) -> Self {
        Self {
            code: code.to_string(),
            symbol: code.to_string(),
            rounding: Decimal::new(1, 2),
            active: true,
        }
    }
}
