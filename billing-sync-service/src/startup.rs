//! Application startup and lifecycle management.

use crate::config::{BillingSyncConfig, StoreBackend};
use crate::error::SyncResult;
use crate::handlers;
use crate::services::{init_metrics, BillingClient, LedgerStore, MemoryStore, PgStore};
use crate::sync::{Reconciler, SyncSettings};
use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::{install_http_metrics_recorder, metrics_middleware},
    tracing::{request_id, request_id_middleware},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub config: Arc<BillingSyncConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: BillingSyncConfig, store: Arc<dyn LedgerStore>) -> SyncResult<Self> {
        let http = BillingClient::http_client(&config.remote)?;
        Ok(Self {
            store,
            config: Arc::new(config),
            http,
        })
    }

    /// Engine for one action, with a client handle built from current credentials.
    pub fn reconciler(&self) -> SyncResult<Reconciler> {
        let client = BillingClient::new(self.http.clone(), &self.config.remote)?;
        Ok(Reconciler::new(
            Arc::new(client),
            self.store.clone(),
            SyncSettings {
                default_company_name: self.config.default_company_name.clone(),
                race_retry_delay: self.config.webhook.race_retry_delay,
            },
        ))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/webhooks/billing", post(handlers::webhook::billing_webhook))
        .route("/sync/test-connection", post(handlers::sync::test_connection))
        .route(
            "/sync/credit-notes/:invoice_id",
            post(handlers::sync::sync_invoice_credit_notes),
        )
        .route("/sync/:entity", post(handlers::sync::trigger_sync))
        .route(
            "/journals",
            get(handlers::admin::list_journals).post(handlers::admin::create_journal),
        )
        .route(
            "/journal-configs",
            get(handlers::admin::list_journal_configs)
                .post(handlers::admin::create_journal_config),
        )
        .route("/companies", get(handlers::admin::list_companies))
        .route(
            "/partners",
            get(handlers::admin::list_partners).post(handlers::admin::create_partner),
        )
        .route("/export/customers", post(handlers::outbound::export_customers))
        .route("/items", post(handlers::outbound::create_item))
        .route(
            "/subscriptions/:subscription_id/upgrade",
            post(handlers::outbound::upgrade_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/downgrade",
            post(handlers::outbound::downgrade_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/cancel",
            post(handlers::outbound::cancel_subscription),
        )
        .route("/sync-logs", get(handlers::admin::list_sync_logs))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request_id(request.headers()).unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect the configured store and bind the listener.
    pub async fn build(config: BillingSyncConfig) -> Result<Self, AppError> {
        let store: Arc<dyn LedgerStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let url = config.database.url.as_ref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?;
                let store = PgStore::connect(
                    url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await?;
                store.run_migrations().await?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory ledger store, data is not persisted");
                Arc::new(MemoryStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    pub async fn build_with_store(
        config: BillingSyncConfig,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self, AppError> {
        init_metrics();
        install_http_metrics_recorder();

        if config.remote.is_configured() {
            tracing::info!(base_url = %config.remote.base_url(), "Billing API configured");
        } else {
            tracing::warn!("Billing API credentials not configured - sync actions will fail");
        }
        if config.webhook.credentials().is_none() {
            tracing::warn!("Webhook basic auth not configured - accepting unauthenticated events");
        }

        let address = config.common.bind_address();
        let state = AppState::new(config, store)?;

        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Billing sync service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.state)).await
    }

    /// Run until `shutdown` resolves, letting in-flight requests finish.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}
