// In crates/engine/src/sweep.rs

use crate::job::JobGuard;
use crate::rules_cache::RulesCache;
use anyhow::Result;
use api_client::{BulkCheckResult, BulkCheckStatus, StopOutRequest, VenueBridge};
use app_config::Settings;
use core_types::{Account, Login};
use database::Store;
use risk::RuleDefaults;
use risk::drawdown::{breach_levels, is_equity_glitch};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// How the bridge is called during batch jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub chunk_size: usize,
    pub pause: Duration,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            pause: Duration::from_millis(200),
        }
    }
}

impl From<&app_config::types::BridgeSettings> for ChunkPolicy {
    fn from(settings: &app_config::types::BridgeSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size.max(1),
            pause: Duration::from_millis(settings.chunk_pause_ms),
        }
    }
}

/// Sends `requests` to `check-bulk` one chunk at a time.
///
/// A chunk that fails after the client's retries is logged and skipped.
/// Returns the collected results and the number of failed chunks.
pub(crate) async fn check_in_chunks(
    bridge: &dyn VenueBridge,
    requests: &[StopOutRequest],
    policy: ChunkPolicy,
) -> (Vec<BulkCheckResult>, usize) {
    let mut results = Vec::with_capacity(requests.len());
    let mut failed = 0;
    for (i, chunk) in requests.chunks(policy.chunk_size.max(1)).enumerate() {
        if i > 0 && !policy.pause.is_zero() {
            tokio::time::sleep(policy.pause).await;
        }
        match bridge.check_bulk(chunk).await {
            Ok(batch) => results.extend(batch),
            Err(e) => {
                failed += 1;
                tracing::warn!(chunk = i, size = chunk.len(), error = %e, "check-bulk chunk failed. Skipping.");
            }
        }
    }
    (results, failed)
}

/// Asks the bridge to disable a breached account and records the
/// confirmation. Without it the account stays pending for the next sweep.
pub(crate) async fn disable_at_venue(
    store: &dyn Store,
    bridge: &dyn VenueBridge,
    account_id: Uuid,
    login: Login,
) -> Result<()> {
    bridge.disable_account(login).await?;
    store.mark_venue_disabled(account_id).await?;
    tracing::info!(%login, "Breached account disabled on the bridge.");
    Ok(())
}

/// A result with zero equity and zero balance means the bridge could not
/// find the account at all.
pub(crate) fn is_missing_at_venue(result: &BulkCheckResult) -> bool {
    result.equity.is_zero() && result.balance.is_zero()
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub chunks: ChunkPolicy,
    /// Ask the bridge to disable accounts at or below their floor.
    pub delegate_stop_out: bool,
    /// Ask the bridge to also close open positions on a stop-out.
    pub close_positions: bool,
    /// Re-send disables the bridge has not confirmed for breached accounts.
    pub retry_venue_disables: bool,
    pub defaults: RuleDefaults,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            chunks: ChunkPolicy::default(),
            delegate_stop_out: true,
            close_positions: false,
            retry_venue_disables: true,
            defaults: RuleDefaults::default(),
        }
    }
}

impl SweepConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            chunks: ChunkPolicy::from(&settings.bridge),
            delegate_stop_out: settings.bridge.delegate_stop_out,
            close_positions: settings.bridge.close_positions_on_stop_out,
            retry_venue_disables: settings.risk.disable_on_breach,
            defaults: RuleDefaults::from_settings(&settings.risk)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub accounts: usize,
    pub updated: usize,
    /// Results dropped by the missing-account or zero-equity guards.
    pub skipped: usize,
    /// Accounts the bridge reported at or below their floor.
    pub stopped_out: usize,
    pub failed_chunks: usize,
    /// Breached accounts whose pending venue disable went through this cycle.
    pub venue_disables: usize,
}

/// Periodic pass over every active account that refreshes live equity and
/// hands each account's effective floor to the bridge.
///
/// The sweep never writes `status`. A stop-out performed by the bridge comes
/// back through the event channel as an `account_breached` event.
pub struct DrawdownSweep {
    store: Arc<dyn Store>,
    bridge: Arc<dyn VenueBridge>,
    rules: Arc<RulesCache>,
    config: SweepConfig,
    guard: JobGuard,
}

impl DrawdownSweep {
    pub fn new(
        store: Arc<dyn Store>,
        bridge: Arc<dyn VenueBridge>,
        rules: Arc<RulesCache>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            bridge,
            rules,
            config,
            guard: JobGuard::new("drawdown_sweep"),
        }
    }

    /// Ticks every `every`. Each tick runs in its own task so that an overrun
    /// is detected by the job guard rather than delaying the timer.
    pub async fn run(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_secs = every.as_secs(), "Drawdown sweep scheduled.");

        loop {
            ticker.tick().await;
            let job = self.clone();
            tokio::spawn(async move {
                match job.run_once().await {
                    Ok(Some(report)) => tracing::info!(?report, "Drawdown sweep finished."),
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = ?e, "Drawdown sweep aborted. Retrying next cycle."),
                }
            });
        }
    }

    /// One sweep cycle. Returns `None` when a previous cycle is still running.
    pub async fn run_once(&self) -> Result<Option<SweepReport>> {
        let Some(_permit) = self.guard.try_start() else {
            return Ok(None);
        };

        let venue_disables = if self.config.retry_venue_disables {
            self.retry_venue_disables().await
        } else {
            0
        };

        let accounts = self.store.list_active_accounts().await?;
        let mut report = SweepReport {
            accounts: accounts.len(),
            venue_disables,
            ..Default::default()
        };
        if accounts.is_empty() {
            return Ok(Some(report));
        }

        let table = self.rules.snapshot().await?;
        let requests: Vec<StopOutRequest> = accounts
            .iter()
            .map(|account| {
                let rules = risk::resolve(
                    account.risk_group.as_deref(),
                    &account.account_type,
                    &table,
                    &self.config.defaults,
                );
                let levels = breach_levels(
                    account.initial_balance,
                    account.start_of_day_or_current(),
                    &rules,
                );
                StopOutRequest {
                    login: account.login,
                    min_equity_limit: levels.effective_floor.to_f64().unwrap_or(0.0),
                    disable_account: self.config.delegate_stop_out,
                    close_positions: self.config.delegate_stop_out && self.config.close_positions,
                }
            })
            .collect();

        let (results, failed_chunks) =
            check_in_chunks(self.bridge.as_ref(), &requests, self.config.chunks).await;
        report.failed_chunks = failed_chunks;

        let by_login: HashMap<Login, &Account> = accounts.iter().map(|a| (a.login, a)).collect();
        for result in &results {
            let Some(account) = by_login.get(&result.login) else {
                tracing::warn!(login = %result.login, "check-bulk returned an unknown login.");
                continue;
            };
            if is_missing_at_venue(result)
                || is_equity_glitch(result.equity, result.balance, account.initial_balance)
            {
                tracing::debug!(login = %account.login, equity = %result.equity, balance = %result.balance, "Skipping unusable live reading.");
                report.skipped += 1;
                continue;
            }

            if result.status == BulkCheckStatus::Failed {
                report.stopped_out += 1;
                tracing::warn!(login = %account.login, equity = %result.equity, actions = ?result.actions, "Bridge reported account at or below its floor.");
            }

            match self
                .store
                .update_equity(account.id, result.balance, result.equity)
                .await
            {
                Ok(()) => report.updated += 1,
                Err(e) => tracing::error!(login = %account.login, error = %e, "Failed to store live equity."),
            }
        }

        Ok(Some(report))
    }
    /// Re-sends the disable for every breached account the bridge has not
    /// confirmed. Returns how many went through.
    async fn retry_venue_disables(&self) -> usize {
        let pending = match self.store.pending_venue_disables().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load accounts awaiting a venue disable.");
                return 0;
            }
        };

        let mut disabled = 0;
        for account in &pending {
            match disable_at_venue(self.store.as_ref(), self.bridge.as_ref(), account.id, account.login).await {
                Ok(()) => disabled += 1,
                Err(e) => tracing::warn!(login = %account.login, error = ?e, "Venue disable still failing."),
            }
        }
        disabled
    }
}
