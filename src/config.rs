//! read gateway configuration from a file, the environment, or explicit values

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::errors::Error;

pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/token/refresh/";

const DEFAULT_PUBLIC_ENDPOINTS: &[&str] = &[
    "/api/auth/register/",
    "/api/auth/login/",
    "/api/auth/verify-email/",
    "/api/auth/password-reset/",
    "/api/auth/password-reset/confirm/",
];

#[derive(Clone, Debug, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_public_endpoints")]
    pub public_endpoints: Vec<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_public_endpoints() -> Vec<String> {
    DEFAULT_PUBLIC_ENDPOINTS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_user_agent() -> String {
    format!("receipt-gateway/{}", env!("CARGO_PKG_VERSION"))
}

impl GatewayConfig {
    pub fn from_values(
        base_url: impl Into<String>,
        refresh_path: Option<String>,
        public_endpoints: Option<Vec<String>>,
        request_timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: refresh_path.unwrap_or_else(default_refresh_path),
            public_endpoints: public_endpoints.unwrap_or_else(default_public_endpoints),
            request_timeout_secs,
            user_agent: default_user_agent(),
        }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatewayConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// # ENV Vars
    /// * `RECEIPTS_API_URL` - Base URL of the receipts API (required)
    /// * `RECEIPTS_REFRESH_PATH` - Path of the credential refresh endpoint
    /// * `RECEIPTS_PUBLIC_ENDPOINTS` - Comma-separated paths sent without credentials
    /// * `RECEIPTS_REQUEST_TIMEOUT_SECS` - Per-request transport timeout
    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("RECEIPTS_API_URL")
            .map_err(|_| Error::Config("Missing RECEIPTS_API_URL env var".to_string()))?;
        let refresh_path = std::env::var("RECEIPTS_REFRESH_PATH").ok();
        let public_endpoints = std::env::var("RECEIPTS_PUBLIC_ENDPOINTS").ok().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        });
        let request_timeout_secs = match std::env::var("RECEIPTS_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|e| {
                Error::Config(format!(
                    "Invalid RECEIPTS_REQUEST_TIMEOUT_SECS '{}': {}",
                    raw, e
                ))
            })?),
            Err(_) => None,
        };
        let config = Self::from_values(base_url, refresh_path, public_endpoints, request_timeout_secs);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.base()?;
        if self.refresh_path.trim().is_empty() {
            return Err(Error::Config("Refresh path must not be empty".into()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::Config("Request timeout must be > 0".into()));
        }
        Ok(())
    }

    /// Parsed base URL; bare hosts are assumed to be https.
    pub fn base(&self) -> Result<Url, Error> {
        let raw = if self.base_url.contains("://") {
            self.base_url.clone()
        } else {
            format!("https://{}", self.base_url)
        };
        Url::parse(&raw)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Public endpoints, always including the refresh endpoint itself.
    pub fn public_endpoint_list(&self) -> Vec<String> {
        let mut endpoints = self.public_endpoints.clone();
        if !endpoints.iter().any(|e| e == &self.refresh_path) {
            endpoints.push(self.refresh_path.clone());
        }
        endpoints
    }
}
