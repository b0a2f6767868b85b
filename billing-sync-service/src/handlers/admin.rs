//! Administration of journals, journal configurations, partners and sync logs.

use crate::models::{
    Company, Journal, JournalConfig, LogContext, NewJournal, NewJournalConfig, NewPartner,
    Partner, SyncLog,
};
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CompanyFilter {
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SyncLogFilter {
    pub context: Option<String>,
}

pub async fn list_companies(State(state): State<AppState>) -> Result<Json<Vec<Company>>, AppError> {
    Ok(Json(state.store.list_companies().await?))
}

pub async fn list_partners(State(state): State<AppState>) -> Result<Json<Vec<Partner>>, AppError> {
    Ok(Json(state.store.list_partners().await?))
}

/// A partner created here has no platform customer until the next customer export.
pub async fn create_partner(
    State(state): State<AppState>,
    Json(payload): Json<NewPartner>,
) -> Result<(StatusCode, Json<Partner>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Partner name is required"
        )));
    }
    let partner = state.store.create_partner(payload).await?;
    tracing::info!(partner_id = %partner.partner_id, "Partner created");
    Ok((StatusCode::CREATED, Json(partner)))
}

pub async fn list_journals(
    State(state): State<AppState>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Json<Vec<Journal>>, AppError> {
    Ok(Json(state.store.list_journals(filter.company_id).await?))
}

pub async fn create_journal(
    State(state): State<AppState>,
    Json(payload): Json<NewJournal>,
) -> Result<(StatusCode, Json<Journal>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Journal name is required"
        )));
    }
    let journal = state.store.create_journal(payload).await?;
    tracing::info!(journal_id = %journal.journal_id, "Journal created");
    Ok((StatusCode::CREATED, Json(journal)))
}

pub async fn list_journal_configs(
    State(state): State<AppState>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Json<Vec<JournalConfig>>, AppError> {
    Ok(Json(
        state.store.list_journal_configs(filter.company_id).await?,
    ))
}

/// Every referenced journal must exist and belong to the configured company.
pub async fn create_journal_config(
    State(state): State<AppState>,
    Json(payload): Json<NewJournalConfig>,
) -> Result<(StatusCode, Json<JournalConfig>), AppError> {
    for journal_id in [
        payload.invoice_journal_id,
        payload.invoice_payment_journal_id,
        payload.credit_note_journal_id,
        payload.credit_note_payment_journal_id,
    ] {
        match state.store.get_journal(journal_id).await? {
            Some(journal) if journal.company_id == payload.company_id => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Journal {} belongs to another company",
                    journal_id
                )))
            }
            None => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Journal {} not found",
                    journal_id
                )))
            }
        }
    }

    let config = state.store.create_journal_config(payload).await?;
    tracing::info!(config_id = %config.config_id, "Journal configuration created");
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn list_sync_logs(
    State(state): State<AppState>,
    Query(filter): Query<SyncLogFilter>,
) -> Result<Json<Vec<SyncLog>>, AppError> {
    let context = match filter.context {
        Some(tag) => Some(LogContext::try_from(tag).map_err(|e| AppError::BadRequest(e.into()))?),
        None => None,
    };
    Ok(Json(state.store.list_sync_logs(context).await?))
}
