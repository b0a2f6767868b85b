//! Actions that write to the billing platform.

use crate::models::Subscription;
use crate::startup::AppState;
use crate::sync::{ItemRequest, JobSummary, PlanChange, RemoteItemOutcome, SyncJob};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct PlanChangeRequest {
    pub item_price_id: String,
}

/// `POST /export/customers`: create platform customers for unlinked partners.
pub async fn export_customers(State(state): State<AppState>) -> Result<Json<JobSummary>, AppError> {
    tracing::info!("Customer export triggered");
    let reconciler = state.reconciler()?;
    let summary = reconciler.run_job(SyncJob::ExportCustomers).await?;
    Ok(Json(summary))
}

/// `POST /items`
pub async fn create_item(
    State(state): State<AppState>,
    Json(request): Json<ItemRequest>,
) -> Result<(StatusCode, Json<RemoteItemOutcome>), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Item name is required")));
    }
    let reconciler = state.reconciler()?;
    let outcome = reconciler.create_remote_item(&request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn upgrade_subscription(
    state: State<AppState>,
    path: Path<String>,
    body: Json<PlanChangeRequest>,
) -> Result<Json<Subscription>, AppError> {
    change_plan(state, path, body, PlanChange::Upgrade).await
}

pub async fn downgrade_subscription(
    state: State<AppState>,
    path: Path<String>,
    body: Json<PlanChangeRequest>,
) -> Result<Json<Subscription>, AppError> {
    change_plan(state, path, body, PlanChange::Downgrade).await
}

async fn change_plan(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Json(body): Json<PlanChangeRequest>,
    change: PlanChange,
) -> Result<Json<Subscription>, AppError> {
    let item_price_id = body.item_price_id.trim();
    if item_price_id.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "item_price_id is required"
        )));
    }
    let reconciler = state.reconciler()?;
    let subscription = reconciler
        .change_subscription_plan(&subscription_id, item_price_id, change)
        .await?;
    Ok(Json(subscription))
}

/// `POST /subscriptions/{id}/cancel`: cancel at the end of the current term.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<Subscription>, AppError> {
    let reconciler = state.reconciler()?;
    let subscription = reconciler.cancel_subscription(&subscription_id).await?;
    Ok(Json(subscription))
}
