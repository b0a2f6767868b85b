//! Manual synchronization triggers.

use crate::startup::AppState;
use crate::sync::{CreditNoteOutcome, JobSummary, SyncJob};
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

/// `POST /sync/{entity}`: run one bulk job to completion.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<Json<JobSummary>, AppError> {
    let job = SyncJob::from_slug(&entity)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Unknown sync job '{}'", entity)))?;

    tracing::info!(job = job.slug(), "Manual sync triggered");
    let reconciler = state.reconciler()?;
    let summary = reconciler.run_job(job).await?;
    Ok(Json(summary))
}

/// `POST /sync/credit-notes/{invoice_id}`: credit notes issued against one invoice.
pub async fn sync_invoice_credit_notes(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Vec<CreditNoteOutcome>>, AppError> {
    let reconciler = state.reconciler()?;
    let outcomes = reconciler.sync_credit_notes_for_invoice(&invoice_id).await?;
    Ok(Json(outcomes))
}

pub async fn test_connection(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let reconciler = state.reconciler()?;
    reconciler.api().test_connection().await?;
    tracing::info!("Billing API connection verified");
    Ok(Json(json!({ "status": "connected" })))
}
