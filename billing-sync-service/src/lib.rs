//! Billing Sync Service - mirrors invoices, payments and catalog data from the
//! subscription-billing platform into the accounting ledger.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod sync;
