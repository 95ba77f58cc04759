// In crates/engine/src/daily_reset.rs

use crate::job::JobGuard;
use crate::sweep::{ChunkPolicy, check_in_chunks, is_missing_at_venue};
use anyhow::Result;
use api_client::{StopOutRequest, VenueBridge};
use app_config::Settings;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use core_types::{Account, Login};
use database::Store;
use risk::drawdown::is_equity_glitch;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::sync::Arc;

/// The first `hour:00` UTC strictly after `now`.
pub fn next_reset_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc()
        + ChronoDuration::hours(i64::from(hour.min(23)));
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

#[derive(Debug, Clone)]
pub struct DailyResetConfig {
    pub chunks: ChunkPolicy,
    /// Equity the bridge reports when it could not read the account.
    pub placeholder_equity: Decimal,
    pub hour_utc: u32,
}

impl Default for DailyResetConfig {
    fn default() -> Self {
        Self {
            chunks: ChunkPolicy::default(),
            placeholder_equity: Decimal::from(100_000),
            hour_utc: 0,
        }
    }
}

impl DailyResetConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            chunks: ChunkPolicy::from(&settings.bridge),
            placeholder_equity: Decimal::from_f64(settings.bridge.placeholder_equity)
                .unwrap_or(defaults.placeholder_equity),
            hour_utc: settings.scheduler.daily_reset_hour_utc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub accounts: usize,
    pub reset: usize,
    pub skipped: usize,
    pub failed_chunks: usize,
}

/// Re-bases `start_of_day_equity` on every active account from live equity.
pub struct DailyReset {
    store: Arc<dyn Store>,
    bridge: Arc<dyn VenueBridge>,
    config: DailyResetConfig,
    guard: JobGuard,
}

impl DailyReset {
    pub fn new(store: Arc<dyn Store>, bridge: Arc<dyn VenueBridge>, config: DailyResetConfig) -> Self {
        Self {
            store,
            bridge,
            config,
            guard: JobGuard::new("daily_reset"),
        }
    }

    /// Sleeps until each configured UTC hour and runs one reset per day.
    pub async fn run(self: Arc<Self>) {
        loop {
            let now = Utc::now();
            let next = next_reset_after(now, self.config.hour_utc);
            tracing::info!(next = %next, "Daily reset scheduled.");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self.run_once().await {
                Ok(Some(report)) => tracing::info!(?report, "Daily reset finished."),
                Ok(None) => {}
                Err(e) => tracing::error!(error = ?e, "Daily reset aborted."),
            }
        }
    }

    pub async fn run_once(&self) -> Result<Option<ResetReport>> {
        let Some(_permit) = self.guard.try_start() else {
            return Ok(None);
        };

        let accounts = self.store.list_active_accounts().await?;
        let mut report = ResetReport {
            accounts: accounts.len(),
            ..Default::default()
        };
        if accounts.is_empty() {
            return Ok(Some(report));
        }

        let requests: Vec<StopOutRequest> = accounts
            .iter()
            .map(|a| StopOutRequest::check_only(a.login))
            .collect();
        let (results, failed_chunks) =
            check_in_chunks(self.bridge.as_ref(), &requests, self.config.chunks).await;
        report.failed_chunks = failed_chunks;

        let by_login: HashMap<Login, &Account> = accounts.iter().map(|a| (a.login, a)).collect();
        for result in &results {
            let Some(account) = by_login.get(&result.login) else {
                continue;
            };
            if is_missing_at_venue(result)
                || is_equity_glitch(result.equity, result.balance, account.initial_balance)
            {
                report.skipped += 1;
                continue;
            }
            if result.equity == self.config.placeholder_equity
                && account.initial_balance != self.config.placeholder_equity
            {
                tracing::warn!(login = %account.login, equity = %result.equity, "Bridge returned placeholder equity. Keeping previous start of day.");
                report.skipped += 1;
                continue;
            }

            match self
                .store
                .reset_start_of_day(account.id, result.equity, result.balance)
                .await
            {
                Ok(()) => report.reset += 1,
                Err(e) => tracing::error!(login = %account.login, error = %e, "Failed to reset start of day."),
            }
        }

        Ok(Some(report))
    }
}
