//! Webhook ingress for billing platform events.
//!
//! The platform only sees `200` with an empty body, whatever happened to the
//! event. The one exception is a request failing configured basic auth.

use crate::startup::AppState;
use crate::sync::WebhookEvent;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use service_core::utils::basic_auth::verify_basic_auth;

pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some((username, password)) = state.config.webhook.credentials() {
        if !verify_basic_auth(&headers, username, password) {
            tracing::warn!("Webhook rejected: invalid credentials");
            return StatusCode::UNAUTHORIZED;
        }
    }

    if !state.config.webhook.enabled {
        tracing::debug!("Webhooks disabled, ignoring event");
        return StatusCode::OK;
    }

    if body.is_empty() {
        tracing::debug!("Empty webhook payload");
        return StatusCode::OK;
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable webhook payload");
            return StatusCode::OK;
        }
    };

    let reconciler = match state.reconciler() {
        Ok(reconciler) => reconciler,
        Err(e) => {
            tracing::error!(error = %e, "Cannot process webhook");
            return StatusCode::OK;
        }
    };

    if let Err(e) = reconciler.handle_webhook(event).await {
        tracing::error!(error = %e, kind = e.kind(), "Webhook processing failed");
    }

    StatusCode::OK
}
