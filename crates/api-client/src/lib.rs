// In crates/api-client/src/lib.rs

use app_config::types::BridgeSettings;
use async_trait::async_trait;
use core_types::Login;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod error;
pub mod retry;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use types::*;

use crate::retry::with_retry;

/// Commands and queries the engine sends to the trading venue bridge.
#[async_trait]
pub trait VenueBridge: Send + Sync {
    /// Reads live equity/balance for a batch of accounts and lets the bridge
    /// act on any account whose equity is at or below its `min_equity_limit`.
    async fn check_bulk(&self, requests: &[StopOutRequest]) -> Result<Vec<BulkCheckResult>>;

    async fn disable_account(&self, login: Login) -> Result<()>;

    async fn enable_account(&self, login: Login) -> Result<()>;

    async fn adjust_balance(&self, login: Login, amount: f64, comment: &str) -> Result<()>;

    async fn change_leverage(&self, login: Login, leverage: u32) -> Result<()>;
}

impl BridgeClient {
    /// Constructs a new client from `BridgeSettings`.
    pub fn new(settings: &BridgeSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;

        Ok(BridgeClient {
            http_client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                delay: Duration::from_millis(settings.retry_delay_ms),
            },
        })
    }

    /// POSTs a JSON body and decodes the JSON answer.
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(url = %url, "Calling bridge");

        let response = self
            .http_client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::ApiError {
                status: status.as_u16(),
                msg: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn command<B: Serialize + Sync>(&self, operation: &'static str, body: &B) -> Result<()> {
        with_retry(self.retry, operation, || self.post::<_, serde_json::Value>(operation, body)).await?;
        Ok(())
    }
}

#[async_trait]
impl VenueBridge for BridgeClient {
    async fn check_bulk(&self, requests: &[StopOutRequest]) -> Result<Vec<BulkCheckResult>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let response: BulkCheckResponse =
            with_retry(self.retry, "check-bulk", || self.post("check-bulk", requests)).await?;

        Ok(response
            .into_results()
            .into_iter()
            .map(BulkCheckResult::from)
            .collect())
    }

    async fn disable_account(&self, login: Login) -> Result<()> {
        self.command("disable-account", &AccountCommand { login }).await
    }

    async fn enable_account(&self, login: Login) -> Result<()> {
        self.command("enable-account", &AccountCommand { login }).await
    }

    async fn adjust_balance(&self, login: Login, amount: f64, comment: &str) -> Result<()> {
        let body = AdjustBalanceCommand {
            login,
            amount,
            comment: comment.to_string(),
        };
        self.command("adjust-balance", &body).await
    }

    async fn change_leverage(&self, login: Login, leverage: u32) -> Result<()> {
        self.command("change-leverage", &ChangeLeverageCommand { login, leverage })
            .await
    }
}
