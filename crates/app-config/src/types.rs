// In crates/app-config/src/types.rs

use crate::{Error, Result};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the database connection.
    pub database: DatabaseSettings,
    /// Settings for the trade event channel.
    pub events: EventSettings,
    /// Settings for the venue bridge RPC.
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub risk: RiskSettings,
}

impl Settings {
    /// Rejects values that would make a cycle meaningless.
    pub fn validate(&self) -> Result<()> {
        let percents = [
            ("risk.default_total_loss_percent", self.risk.default_total_loss_percent),
            ("risk.default_daily_loss_percent", self.risk.default_daily_loss_percent),
            ("risk.competition_total_loss_percent", self.risk.competition_total_loss_percent),
            ("risk.competition_daily_loss_percent", self.risk.competition_daily_loss_percent),
            ("risk.default_max_single_win_percent", self.risk.default_max_single_win_percent),
        ];
        for (name, value) in percents {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::Invalid(format!("{name} must be within 0..=100, got {value}")));
            }
        }
        if self.bridge.chunk_size == 0 {
            return Err(Error::Invalid("bridge.chunk_size must be positive".into()));
        }
        if self.events.worker_concurrency == 0 {
            return Err(Error::Invalid("events.worker_concurrency must be positive".into()));
        }
        if self.risk.volume_scale <= 0.0 {
            return Err(Error::Invalid("risk.volume_scale must be positive".into()));
        }
        if self.scheduler.daily_reset_hour_utc > 23 {
            return Err(Error::Invalid("scheduler.daily_reset_hour_utc must be within 0..=23".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EventSettings {
    /// Redis connection URL carrying the trade event channel.
    pub redis_url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Upper bound on accounts processed at the same time.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BridgeSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_bridge_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Accounts per `check-bulk` request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_pause_ms")]
    pub chunk_pause_ms: u64,
    /// Equity the bridge reports when it could not reach the account.
    #[serde(default = "default_placeholder_equity")]
    pub placeholder_equity: f64,
    /// Let the bridge disable accounts that fail the sweep floor.
    #[serde(default = "default_true")]
    pub delegate_stop_out: bool,
    /// Let the bridge also flatten positions on such a stop-out.
    #[serde(default)]
    pub close_positions_on_stop_out: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SchedulerSettings {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub daily_reset_hour_utc: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            daily_reset_hour_utc: 0,
        }
    }
}

/// Fallback risk parameters and data-quality tolerances.
#[derive(Deserialize, Debug, Clone)]
pub struct RiskSettings {
    #[serde(default = "default_total_loss_percent")]
    pub default_total_loss_percent: f64,
    #[serde(default = "default_daily_loss_percent")]
    pub default_daily_loss_percent: f64,
    #[serde(default = "default_competition_total_loss_percent")]
    pub competition_total_loss_percent: f64,
    #[serde(default = "default_competition_daily_loss_percent")]
    pub competition_daily_loss_percent: f64,
    #[serde(default = "default_min_trade_duration_seconds")]
    pub default_min_trade_duration_seconds: i64,
    #[serde(default = "default_max_single_win_percent")]
    pub default_max_single_win_percent: f64,
    #[serde(default = "default_true")]
    pub default_allow_martingale: bool,
    #[serde(default = "default_true")]
    pub default_allow_hedging: bool,
    /// Trades older than `created_at - buffer` belong to a previous owner of the login.
    #[serde(default = "default_ghost_trade_buffer_secs")]
    pub ghost_trade_buffer_secs: i64,
    /// Venue volume units per lot.
    #[serde(default = "default_volume_scale")]
    pub volume_scale: f64,
    #[serde(default = "default_rule_cache_ttl_secs")]
    pub rule_cache_ttl_secs: u64,
    #[serde(default = "default_martingale_window_secs")]
    pub martingale_window_secs: i64,
    /// History considered when looking for a martingale predecessor.
    #[serde(default = "default_session_lookback_hours")]
    pub session_lookback_hours: i64,
    /// Overlaps at or below this are treated as sequential trades.
    #[serde(default = "default_hedging_tolerance_ms")]
    pub hedging_tolerance_ms: i64,
    /// Send a disable command to the bridge after a breach.
    #[serde(default = "default_true")]
    pub disable_on_breach: bool,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            default_total_loss_percent: default_total_loss_percent(),
            default_daily_loss_percent: default_daily_loss_percent(),
            competition_total_loss_percent: default_competition_total_loss_percent(),
            competition_daily_loss_percent: default_competition_daily_loss_percent(),
            default_min_trade_duration_seconds: default_min_trade_duration_seconds(),
            default_max_single_win_percent: default_max_single_win_percent(),
            default_allow_martingale: true,
            default_allow_hedging: true,
            ghost_trade_buffer_secs: default_ghost_trade_buffer_secs(),
            volume_scale: default_volume_scale(),
            rule_cache_ttl_secs: default_rule_cache_ttl_secs(),
            martingale_window_secs: default_martingale_window_secs(),
            session_lookback_hours: default_session_lookback_hours(),
            hedging_tolerance_ms: default_hedging_tolerance_ms(),
            disable_on_breach: true,
        }
    }
}

/// Helper functions for serde defaults
fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    5
}

fn default_channel() -> String {
    "events:trade_update".to_string()
}

fn default_worker_concurrency() -> usize {
    50
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_bridge_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_chunk_size() -> usize {
    100
}

fn default_chunk_pause_ms() -> u64 {
    200
}

fn default_placeholder_equity() -> f64 {
    100_000.0
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_total_loss_percent() -> f64 {
    10.0
}

fn default_daily_loss_percent() -> f64 {
    5.0
}

fn default_competition_total_loss_percent() -> f64 {
    20.0
}

fn default_competition_daily_loss_percent() -> f64 {
    10.0
}

fn default_min_trade_duration_seconds() -> i64 {
    120
}

fn default_max_single_win_percent() -> f64 {
    50.0
}

fn default_ghost_trade_buffer_secs() -> i64 {
    60
}

fn default_volume_scale() -> f64 {
    10_000.0
}

fn default_rule_cache_ttl_secs() -> u64 {
    300
}

fn default_martingale_window_secs() -> i64 {
    300
}

fn default_session_lookback_hours() -> i64 {
    24
}

fn default_hedging_tolerance_ms() -> i64 {
    2_000
}
