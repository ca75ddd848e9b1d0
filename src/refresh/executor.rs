use std::future::Future;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::credentials::{CredentialPair, CredentialStore};
use crate::errors::{Error, RefreshError};
use crate::transport::{build_client, join_target};

/// Exchanges a refresh credential for a new pair. Implementations hold no
/// shared state; the coordinator guarantees at most one call in flight.
pub trait RefreshExecutor: Send + Sync + 'static {
    /// The wire call alone.
    fn exchange(
        &self,
        refresh: &str,
    ) -> impl Future<Output = Result<CredentialPair, RefreshError>> + Send;

    /// Exchanges and writes the new pair into `store` before resolving.
    fn execute(
        &self,
        store: &dyn CredentialStore,
        refresh: &str,
    ) -> impl Future<Output = Result<CredentialPair, RefreshError>> + Send {
        async move {
            let pair = self.exchange(refresh).await?;
            store.set(pair.clone());
            Ok(pair)
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

pub struct HttpRefreshExecutor {
    client: Client,
    url: Url,
}

impl HttpRefreshExecutor {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, Error> {
        let client = build_client(config)?;
        let url = join_target(&config.base()?, &config.refresh_path)?;
        Ok(Self::new(client, url))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl RefreshExecutor for HttpRefreshExecutor {
    async fn exchange(&self, refresh: &str) -> Result<CredentialPair, RefreshError> {
        let resp = self
            .client
            .post(self.url.clone())
            .json(&RefreshRequest { refresh })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "refresh.rejected");
            return Err(RefreshError::Rejected { status, body });
        }

        let body = resp.bytes().await?;
        let parsed: RefreshResponse =
            serde_json::from_slice(&body).map_err(|e| RefreshError::Malformed(e.to_string()))?;
        if parsed.access.is_empty() {
            return Err(RefreshError::Malformed("empty access credential".into()));
        }
        // An empty rotated value counts as no rotation.
        let next_refresh = parsed.refresh.filter(|r| !r.is_empty());
        let rotated = next_refresh.is_some();
        let pair = CredentialPair {
            access: parsed.access,
            refresh: next_refresh.unwrap_or_else(|| refresh.to_string()),
        };
        info!(access_len = pair.access.len(), rotated, "refresh.exchanged");
        Ok(pair)
    }
}
