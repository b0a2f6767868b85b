//! Append-only record of every batch or webhook operation.

use super::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which synchronization produced a log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogContext {
    Currencies,
    Items,
    #[serde(rename = "itemsfamily")]
    ItemFamilies,
    Customers,
    Taxes,
    Invoices,
    CreditNotes,
    Subscriptions,
    Companies,
    Webhook,
}

impl LogContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogContext::Currencies => "currencies",
            LogContext::Items => "items",
            LogContext::ItemFamilies => "itemsfamily",
            LogContext::Customers => "customers",
            LogContext::Taxes => "taxes",
            LogContext::Invoices => "invoices",
            LogContext::CreditNotes => "credit_notes",
            LogContext::Subscriptions => "subscriptions",
            LogContext::Companies => "companies",
            LogContext::Webhook => "webhook",
        }
    }
}

impl TryFrom<String> for LogContext {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let context = match value.as_str() {
            "currencies" => LogContext::Currencies,
            "items" => LogContext::Items,
            "itemsfamily" => LogContext::ItemFamilies,
            "customers" => LogContext::Customers,
            "taxes" => LogContext::Taxes,
            "invoices" => LogContext::Invoices,
            "credit_notes" => LogContext::CreditNotes,
            "subscriptions" => LogContext::Subscriptions,
            "companies" => LogContext::Companies,
            "webhook" => LogContext::Webhook,
            _ => {
                return Err(UnknownVariant {
                    kind: "log_context",
                    value,
                })
            }
        };
        Ok(context)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failure,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failure => "failure",
        }
    }
}

impl TryFrom<String> for SyncStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "success" => Ok(SyncStatus::Success),
            "failure" => Ok(SyncStatus::Failure),
            _ => Err(UnknownVariant {
                kind: "sync_status",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncLog {
    pub log_id: Uuid,
    pub table_name: String,
    pub record_count: i32,
    #[sqlx(try_from = "String")]
    pub status: SyncStatus,
    pub duration_ms: i64,
    pub initiated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    #[sqlx(try_from = "String")]
    pub context: LogContext,
}

#[derive(Debug, Clone)]
pub struct NewSyncLog {
    pub table_name: String,
    pub record_count: i32,
    pub status: SyncStatus,
    pub duration_ms: i64,
    pub initiated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub context: LogContext,
}
