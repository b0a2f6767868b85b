use billing_sync_service::config::BillingSyncConfig;
use billing_sync_service::startup::Application;
use service_core::observability::{init_tracing, init_tracing_without_otlp};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = BillingSyncConfig::from_env()?;
    match config.otlp_endpoint.as_deref() {
        Some(endpoint) => init_tracing(&config.service_name, &config.log_level, endpoint),
        None => init_tracing_without_otlp(&config.log_level),
    }

    tracing::info!(
        service = %config.service_name,
        backend = ?config.database.backend,
        webhooks_enabled = config.webhook.enabled,
        "Starting billing sync service"
    );

    let application = Application::build(config).await?;
    application.run_with_shutdown(shutdown_signal()).await?;

    tracing::info!("Billing sync service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
