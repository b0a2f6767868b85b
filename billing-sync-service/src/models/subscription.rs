//! Local subscription records and billing period units.

use crate::error::SyncError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

impl PeriodUnit {
    /// Parse a remote billing period unit; anything unknown is unsupported data.
    pub fn parse(unit: &str) -> Result<Self, SyncError> {
        match unit {
            "day" => Ok(PeriodUnit::Day),
            "week" => Ok(PeriodUnit::Week),
            "month" => Ok(PeriodUnit::Month),
            "year" => Ok(PeriodUnit::Year),
            other => Err(SyncError::UnsupportedData(format!(
                "billing period unit '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub remote_id: String,
    pub partner_id: Option<Uuid>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub billing_period: i32,
    pub billing_period_unit: String,
    pub billing_cycles: Option<i32>,
    pub plan_item_price_id: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub remote_id: String,
    pub partner_id: Option<Uuid>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub billing_period: i32,
    pub billing_period_unit: PeriodUnit,
    pub billing_cycles: Option<i32>,
    pub plan_item_price_id: Option<String>,
}
