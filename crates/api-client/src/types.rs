// In crates/api-client/src/types.rs

use core_types::Login;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client for the venue bridge.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    /// The persistent HTTP client, carrying the request timeout.
    pub http_client: Client,
    /// Sent as `X-API-Key` on every request.
    pub api_key: String,
    pub base_url: String,
    pub retry: RetryPolicy,
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(100),
        }
    }
}

/// One entry of a `check-bulk` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopOutRequest {
    pub login: Login,
    /// Equity at or below which the bridge reports the account as failed.
    pub min_equity_limit: f64,
    pub disable_account: bool,
    pub close_positions: bool,
}

impl StopOutRequest {
    /// A request that only reads live figures and never acts on the account.
    pub fn check_only(login: Login) -> Self {
        Self {
            login,
            min_equity_limit: -999_999_999.0,
            disable_account: false,
            close_positions: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BulkCheckStatus {
    Safe,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Raw `check-bulk` result item as sent by the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBulkResult {
    pub login: i64,
    pub status: BulkCheckStatus,
    #[serde(default)]
    pub equity: f64,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// The bridge answers either with a bare list or with `{"results": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BulkCheckResponse {
    List(Vec<WireBulkResult>),
    Wrapped { results: Vec<WireBulkResult> },
}

impl BulkCheckResponse {
    pub fn into_results(self) -> Vec<WireBulkResult> {
        match self {
            BulkCheckResponse::List(items) => items,
            BulkCheckResponse::Wrapped { results } => results,
        }
    }
}

/// Live figures for one account, converted to ledger precision.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkCheckResult {
    pub login: Login,
    pub status: BulkCheckStatus,
    pub equity: Decimal,
    pub balance: Decimal,
    pub actions: Vec<String>,
}

impl From<WireBulkResult> for BulkCheckResult {
    fn from(wire: WireBulkResult) -> Self {
        let to_money = |v: f64| {
            Decimal::from_f64(v)
                .map(|d| d.round_dp(2))
                .unwrap_or(Decimal::ZERO)
        };
        Self {
            login: Login(wire.login),
            status: wire.status,
            equity: to_money(wire.equity),
            balance: to_money(wire.balance),
            actions: wire.actions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccountCommand {
    pub login: Login,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AdjustBalanceCommand {
    pub login: Login,
    pub amount: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChangeLeverageCommand {
    pub login: Login,
    pub leverage: u32,
}
