//! Configuration module for billing-sync-service.

use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BillingSyncConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub webhook: WebhookConfig,
    /// Company used for remote records that carry no business entity.
    pub default_company_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<Secret<String>>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub site: String,
    pub api_key: Secret<String>,
    /// Overrides `https://{site}.chargebee.com/api/v2`.
    pub api_base_url: Option<String>,
    pub request_timeout: Duration,
    pub page_size: u32,
}

impl RemoteConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
            && (!self.site.is_empty() || self.api_base_url.is_some())
    }

    pub fn base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.chargebee.com/api/v2", self.site),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    /// Delay before re-looking-up an invoice a payment event arrived ahead of.
    pub race_retry_delay: Duration,
}

impl WebhookConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.expose_secret().as_str())),
            _ => None,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl BillingSyncConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Unknown STORE_BACKEND '{}'",
                    other
                )))
            }
        };

        let database_url = env::var("DATABASE_URL").ok().map(Secret::new);
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_URL is required"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "billing-sync-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2),
            },
            remote: RemoteConfig {
                site: env::var("BILLING_SITE").unwrap_or_default(),
                api_key: Secret::new(env::var("BILLING_API_KEY").unwrap_or_default()),
                api_base_url: env::var("BILLING_API_BASE_URL").ok(),
                request_timeout: Duration::from_secs(env_parse("BILLING_TIMEOUT_SECS", 30)),
                page_size: env_parse("BILLING_PAGE_SIZE", 100),
            },
            webhook: WebhookConfig {
                enabled: env_flag("WEBHOOK_ENABLED", false),
                username: env::var("WEBHOOK_USERNAME").ok(),
                password: env::var("WEBHOOK_PASSWORD").ok().map(Secret::new),
                race_retry_delay: Duration::from_millis(env_parse(
                    "WEBHOOK_RACE_RETRY_DELAY_MS",
                    900,
                )),
            },
            default_company_name: env::var("DEFAULT_COMPANY_NAME")
                .unwrap_or_else(|_| "Main Company".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(site: &str, key: &str, base: Option<&str>) -> RemoteConfig {
        RemoteConfig {
            site: site.to_string(),
            api_key: Secret::new(key.to_string()),
            api_base_url: base.map(str::to_string),
            request_timeout: Duration::from_secs(5),
            page_size: 100,
        }
    }

    #[test]
    fn base_url_defaults_to_site_host() {
        let config = remote("acme-test", "key", None);
        assert_eq!(config.base_url(), "https://acme-test.chargebee.com/api/v2");
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let config = remote("", "key", Some("http://127.0.0.1:9000/"));
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
        assert!(config.is_configured());
    }

    #[test]
    fn missing_key_is_not_configured() {
        assert!(!remote("acme-test", "", None).is_configured());
    }
}
