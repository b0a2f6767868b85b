//! Local invoices and credit notes, their lines and the payments applied to them.

use super::UnknownVariant;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of accounting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    Invoice,
    CreditNote,
}

impl MoveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveType::Invoice => "invoice",
            MoveType::CreditNote => "credit_note",
        }
    }
}

impl TryFrom<String> for MoveType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "invoice" => Ok(MoveType::Invoice),
            "credit_note" => Ok(MoveType::CreditNote),
            _ => Err(UnknownVariant {
                kind: "move_type",
                value,
            }),
        }
    }
}

/// Posting state of a local document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    Draft,
    Posted,
    Cancelled,
}

/// Writes the synchronization path may attempt on an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncWrite {
    ReplaceContent,
    Post,
    RegisterPayment,
}

impl MoveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveState::Draft => "draft",
            MoveState::Posted => "posted",
            MoveState::Cancelled => "cancelled",
        }
    }

    /// Transition table for the sync path. Posted documents are immutable apart
    /// from payments; cancelled documents accept nothing.
    pub fn permits(&self, write: SyncWrite) -> bool {
        matches!(
            (self, write),
            (MoveState::Draft, SyncWrite::ReplaceContent)
                | (MoveState::Draft, SyncWrite::Post)
                | (MoveState::Posted, SyncWrite::RegisterPayment)
        )
    }
}

impl TryFrom<String> for MoveState {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(MoveState::Draft),
            "posted" => Ok(MoveState::Posted),
            "cancelled" => Ok(MoveState::Cancelled),
            _ => Err(UnknownVariant {
                kind: "move_state",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    NotPaid,
    Partial,
    Paid,
}

/// Local invoice or credit note mirroring one remote document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountMove {
    pub move_id: Uuid,
    pub remote_id: String,
    #[sqlx(try_from = "String")]
    pub move_type: MoveType,
    pub company_id: Uuid,
    pub partner_id: Uuid,
    pub journal_id: Uuid,
    pub family_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub state: MoveState,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency_code: Option<String>,
    pub amount_total: Decimal,
    pub amount_residual: Decimal,
    pub remote_subscription_id: Option<String>,
    pub reference_invoice_remote_id: Option<String>,
    pub reversed_move_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl AccountMove {
    pub fn payment_state(&self) -> PaymentState {
        if self.amount_residual <= Decimal::ZERO {
            PaymentState::Paid
        } else if self.amount_residual < self.amount_total {
            PaymentState::Partial
        } else {
            PaymentState::NotPaid
        }
    }

    pub fn is_fully_paid(&self) -> bool {
        self.state == MoveState::Posted
            && self.amount_total > Decimal::ZERO
            && self.payment_state() == PaymentState::Paid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MoveLine {
    pub line_id: Uuid,
    pub move_id: Uuid,
    pub product_id: Option<Uuid>,
    pub remote_line_id: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub price_unit: Decimal,
    pub tax_amount: Decimal,
    pub deferred_start: Option<NaiveDate>,
    pub deferred_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMoveLine {
    pub product_id: Option<Uuid>,
    pub remote_line_id: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub price_unit: Decimal,
    pub tax_amount: Decimal,
    pub deferred_start: Option<NaiveDate>,
    pub deferred_end: Option<NaiveDate>,
}

impl NewMoveLine {
    pub fn subtotal(&self) -> Decimal {
        self.quantity * self.price_unit + self.tax_amount
    }
}

/// Header and lines used both to create a document and to refresh a draft.
#[derive(Debug, Clone)]
pub struct NewMove {
    pub remote_id: String,
    pub move_type: MoveType,
    pub company_id: Uuid,
    pub partner_id: Uuid,
    pub journal_id: Uuid,
    pub family_id: Option<Uuid>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency_code: Option<String>,
    pub remote_subscription_id: Option<String>,
    pub reference_invoice_remote_id: Option<String>,
    pub reversed_move_id: Option<Uuid>,
    pub lines: Vec<NewMoveLine>,
}

impl NewMove {
    pub fn amount_total(&self) -> Decimal {
        self.lines.iter().map(NewMoveLine::subtotal).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub move_id: Uuid,
    pub journal_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub remote_txn_id: Option<String>,
    pub memo: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub move_id: Uuid,
    pub journal_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub remote_txn_id: Option<String>,
    pub memo: String,
}
