//! Domain models for billing-sync-service.

pub mod account_move;
pub mod catalog;
pub mod company;
pub mod journal;
pub mod partner;
pub mod remote;
pub mod subscription;
pub mod sync_log;

pub use account_move::{
    AccountMove, MoveLine, MoveState, MoveType, NewMove, NewMoveLine, NewPayment, Payment,
    PaymentState, SyncWrite,
};
pub use catalog::{Family, NewProduct, NewTax, Product, Tax};
pub use company::{Company, Currency, NewCompany};
pub use journal::{Journal, JournalConfig, JournalRole, JournalType, NewJournal, NewJournalConfig};
pub use partner::{NewPartner, Partner};
pub use subscription::{NewSubscription, PeriodUnit, Subscription};
pub use sync_log::{LogContext, NewSyncLog, SyncLog, SyncStatus};

use rust_decimal::Decimal;
use thiserror::Error;

/// A stored enum column held a value this build does not know.
#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Convert a remote integer minor-unit amount into a decimal major-unit amount.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
