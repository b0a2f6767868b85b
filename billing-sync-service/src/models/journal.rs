//! Journals and the per-(company, family) journal configuration table.

use super::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalType {
    Sale,
    Purchase,
    Bank,
    Cash,
    General,
}

impl JournalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalType::Sale => "sale",
            JournalType::Purchase => "purchase",
            JournalType::Bank => "bank",
            JournalType::Cash => "cash",
            JournalType::General => "general",
        }
    }
}

impl TryFrom<String> for JournalType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "sale" => Ok(JournalType::Sale),
            "purchase" => Ok(JournalType::Purchase),
            "bank" => Ok(JournalType::Bank),
            "cash" => Ok(JournalType::Cash),
            "general" => Ok(JournalType::General),
            _ => Err(UnknownVariant {
                kind: "journal_type",
                value,
            }),
        }
    }
}

/// The four roles a journal configuration assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalRole {
    Invoice,
    InvoicePayment,
    CreditNote,
    CreditNotePayment,
}

impl JournalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalRole::Invoice => "invoice",
            JournalRole::InvoicePayment => "invoice_payment",
            JournalRole::CreditNote => "credit_note",
            JournalRole::CreditNotePayment => "credit_note_payment",
        }
    }

    /// Journal type searched when no configuration row applies.
    pub fn fallback_type(&self) -> JournalType {
        match self {
            JournalRole::Invoice | JournalRole::CreditNote => JournalType::Sale,
            JournalRole::InvoicePayment | JournalRole::CreditNotePayment => JournalType::Bank,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Journal {
    pub journal_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub journal_type: JournalType,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJournal {
    pub company_id: Uuid,
    pub name: String,
    pub journal_type: JournalType,
}

/// Maps a company (and optionally a family) to the journals used for each role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JournalConfig {
    pub config_id: Uuid,
    pub company_id: Uuid,
    pub family_id: Option<Uuid>,
    pub invoice_journal_id: Uuid,
    pub invoice_payment_journal_id: Uuid,
    pub credit_note_journal_id: Uuid,
    pub credit_note_payment_journal_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl JournalConfig {
    pub fn journal_for(&self, role: JournalRole) -> Uuid {
        match role {
            JournalRole::Invoice => self.invoice_journal_id,
            JournalRole::InvoicePayment => self.invoice_payment_journal_id,
            JournalRole::CreditNote => self.credit_note_journal_id,
            JournalRole::CreditNotePayment => self.credit_note_payment_journal_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJournalConfig {
    pub company_id: Uuid,
    pub family_id: Option<Uuid>,
    pub invoice_journal_id: Uuid,
    pub invoice_payment_journal_id: Uuid,
    pub credit_note_journal_id: Uuid,
    pub credit_note_payment_journal_id: Uuid,
}
