//! Error taxonomy for synchronization work.

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing credentials or a missing default journal. Blocks the triggering action.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Remote API error ({status}) {code}: {message}")]
    RemoteApi {
        status: u16,
        code: String,
        message: String,
    },

    /// A write the sync path is not allowed to perform on a local document.
    #[error("Local write rejected: {0}")]
    LocalWrite(String),

    #[error("Unsupported data: {0}")]
    UnsupportedData(String),

    #[error("No billable lines for remote document {0}")]
    NoBillableLines(String),

    /// A local record an action refers to does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    pub fn remote(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::RemoteApi {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SyncError::Configuration(_))
    }

    /// The platform answered 404 for the requested record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::RemoteApi { status: 404, .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "configuration",
            SyncError::RemoteApi { .. } => "remote_api",
            SyncError::LocalWrite(_) => "local_write",
            SyncError::UnsupportedData(_) => "unsupported_data",
            SyncError::NoBillableLines(_) => "no_billable_lines",
            SyncError::NotFound(_) => "not_found",
            SyncError::Store(_) => "store",
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
        SyncError::remote(status, "transport", err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Store(anyhow::Error::new(err))
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Configuration(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
            SyncError::RemoteApi { .. } => {
                tracing::error!(error = %err, "Remote billing API failure");
                AppError::BadGateway(
                    "Synchronization failed, check the sync logs for details".to_string(),
                )
            }
            SyncError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            SyncError::Store(e) => AppError::DatabaseError(e),
            other => AppError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
