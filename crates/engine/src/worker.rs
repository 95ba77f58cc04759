// In crates/engine/src/worker.rs

use crate::notify::{Notification, Notifier};
use crate::reconciler::{LedgerReconciler, ReconcileParams};
use crate::rules_cache::RulesCache;
use crate::sweep::disable_at_venue;
use anyhow::Result;
use api_client::VenueBridge;
use app_config::Settings;
use chrono::{DateTime, Utc};
use core_types::{Account, AccountStatus, RiskRuleSet, Severity, Violation, ViolationType};
use database::Store;
use events::{RawTrade, StatusEventKind, TradeEvent};
use futures::{Stream, StreamExt};
use risk::drawdown::{self, is_equity_glitch};
use risk::{BehaviorDetector, BehaviorParams, DrawdownLevels, DrawdownOutcome, RuleDefaults, TradeContext};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::json;
use std::sync::Arc;

/// Tunables of the event worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Events processed at the same time.
    pub concurrency: usize,
    pub disable_on_breach: bool,
    pub defaults: RuleDefaults,
    pub behavior: BehaviorParams,
    pub reconcile: ReconcileParams,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            disable_on_breach: true,
            defaults: RuleDefaults::default(),
            behavior: BehaviorParams::default(),
            reconcile: ReconcileParams::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            concurrency: settings.events.worker_concurrency,
            disable_on_breach: settings.risk.disable_on_breach,
            defaults: RuleDefaults::from_settings(&settings.risk)?,
            behavior: BehaviorParams::from(&settings.risk),
            reconcile: ReconcileParams::from(&settings.risk),
        })
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// No account carries the login. The event is dropped.
    UnknownAccount,
    /// The account is no longer active, nothing is evaluated.
    Inactive(AccountStatus),
    Evaluated {
        upserted: u64,
        stale_closed: u64,
        /// New violation rows written.
        violations: usize,
        /// `None` when the recomputed figures were not written.
        equity: Option<Decimal>,
        /// This event moved the account from active to breached.
        breached: bool,
    },
    StatusApplied {
        transitioned: bool,
    },
}

/// Consumes trade events and drives each account through
/// reconcile, recompute, evaluate and apply.
pub struct EventWorker {
    store: Arc<dyn Store>,
    bridge: Arc<dyn VenueBridge>,
    notifier: Arc<dyn Notifier>,
    rules: Arc<RulesCache>,
    detector: BehaviorDetector,
    reconciler: LedgerReconciler,
    config: WorkerConfig,
}

impl EventWorker {
    pub fn new(
        store: Arc<dyn Store>,
        bridge: Arc<dyn VenueBridge>,
        notifier: Arc<dyn Notifier>,
        rules: Arc<RulesCache>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            reconciler: LedgerReconciler::new(store.clone(), config.reconcile),
            detector: BehaviorDetector::new(config.behavior),
            store,
            bridge,
            notifier,
            rules,
            config,
        }
    }

    /// Processes events until the stream ends, up to `concurrency` at a time.
    pub async fn run<S>(self: Arc<Self>, events: S)
    where
        S: Stream<Item = TradeEvent>,
    {
        tracing::info!(concurrency = self.config.concurrency, checks = ?self.detector.check_names(), "Event worker started.");
        events
            .for_each_concurrent(self.config.concurrency.max(1), |event| {
                let worker = self.clone();
                async move { worker.handle(event).await }
            })
            .await;
        tracing::warn!("Event stream ended.");
    }

    /// Processes one event. Errors stay inside this account's unit of work.
    pub async fn handle(&self, event: TradeEvent) {
        let login = event.login;
        match self.process(&event).await {
            Ok(outcome) => tracing::debug!(%login, ?outcome, "Event processed."),
            Err(e) => tracing::error!(%login, error = ?e, "Failed to process event."),
        }
    }

    pub async fn process(&self, event: &TradeEvent) -> Result<EventOutcome> {
        let Some(account) = self.store.get_account_by_login(event.login).await? else {
            tracing::warn!(login = %event.login, "No account for login. Dropping event.");
            return Ok(EventOutcome::UnknownAccount);
        };

        if let Some(kind) = event.event {
            return self.apply_status_event(&account, kind, event).await;
        }

        if !account.is_active() {
            tracing::debug!(login = %account.login, status = account.status.as_str(), "Skipping inactive account.");
            return Ok(EventOutcome::Inactive(account.status));
        }

        if let Some(published) = event.published_at() {
            let lag_ms = (Utc::now() - published).num_milliseconds();
            tracing::trace!(login = %account.login, lag_ms, "Event received.");
        }
        self.evaluate_batch(&account, &event.trades, Utc::now()).await
    }

    async fn evaluate_batch(
        &self,
        account: &Account,
        batch: &[RawTrade],
        now: DateTime<Utc>,
    ) -> Result<EventOutcome> {
        let table = self.rules.snapshot().await?;
        let rules = risk::resolve(
            account.risk_group.as_deref(),
            &account.account_type,
            &table,
            &self.config.defaults,
        );

        // --- 1. Reconcile ---
        let report = self.reconciler.reconcile(account, batch, now).await?;

        // --- 2. Recompute ---
        let ledger = self.store.ledger_trades(account.id).await?;
        let snapshot = risk::equity::compute(account.initial_balance, &ledger);

        // --- 3. Drawdown ---
        let outcome = drawdown::evaluate(account, snapshot.equity, snapshot.balance, &rules);
        let mut breached = false;
        let mut violations = 0;
        let equity = match outcome {
            DrawdownOutcome::Skipped => {
                tracing::warn!(login = %account.login, equity = %snapshot.equity, balance = %snapshot.balance, "Zero-equity reading. Skipping update.");
                None
            }
            DrawdownOutcome::Within(_) => {
                self.store
                    .update_equity(account.id, snapshot.balance, snapshot.equity)
                    .await?;
                self.check_profit_target(account, snapshot.equity, &rules).await;
                Some(snapshot.equity)
            }
            DrawdownOutcome::Breached { levels, violation_type } => {
                self.store
                    .update_equity(account.id, snapshot.balance, snapshot.equity)
                    .await?;
                breached = self
                    .apply_breach(account, snapshot.equity, &levels, violation_type, now)
                    .await?;
                if breached {
                    violations += 1;
                }
                Some(snapshot.equity)
            }
        };

        // --- 4. Behavioral checks on the trades of this batch ---
        let ctx = TradeContext {
            rules: &rules,
            ledger: &ledger,
            initial_balance: account.initial_balance,
            now,
        };
        for trade in report.trades.iter().filter(|t| t.is_market_trade()) {
            for finding in self.detector.evaluate(trade, &ctx) {
                let violation = finding.into_violation(account.id, now);
                if self.store.record_violation(&violation).await? {
                    violations += 1;
                    tracing::info!(
                        login = %account.login,
                        ticket = trade.ticket,
                        violation = violation.violation_type.as_str(),
                        severity = violation.severity.as_str(),
                        "Recorded behavioral violation."
                    );
                }
            }
        }

        Ok(EventOutcome::Evaluated {
            upserted: report.upserted,
            stale_closed: report.stale_closed,
            violations,
            equity,
            breached,
        })
    }

    /// Breach effects, in order: status with its violation, notification,
    /// venue disable.
    ///
    /// Status and violation land in one store write, so a failure leaves the
    /// account active and the next delivery re-evaluates it. Returns `false`
    /// when another path already moved the account off `active`.
    async fn apply_breach(
        &self,
        account: &Account,
        equity: Decimal,
        levels: &DrawdownLevels,
        violation_type: ViolationType,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let description = match violation_type {
            ViolationType::MaxDrawdown => format!(
                "Equity {equity} reached the max drawdown floor {}",
                levels.total_floor
            ),
            _ => format!(
                "Equity {equity} reached the daily loss floor {}",
                levels.daily_floor
            ),
        };
        let violation = Violation {
            account_id: account.id,
            trade_ticket: None,
            violation_type,
            severity: Severity::Breach,
            description: description.clone(),
            symbol: None,
            details: json!({
                "equity": equity,
                "total_floor": levels.total_floor,
                "daily_floor": levels.daily_floor,
                "effective_floor": levels.effective_floor,
            }),
            created_at: now,
        };
        if !self.store.breach_account(account.id, &violation).await? {
            return Ok(false);
        }
        tracing::warn!(
            login = %account.login,
            %equity,
            floor = %levels.effective_floor,
            reason = violation_type.as_str(),
            "Account breached."
        );

        self.send(Notification::AccountBreached {
            login: account.login,
            reason: description,
            equity: Some(equity),
        })
        .await;

        if self.config.disable_on_breach {
            self.spawn_venue_disable(account);
        }
        Ok(true)
    }

    /// Disables the account at the venue without holding up the event.
    /// Until the bridge confirms, the account stays in the store's pending
    /// list and the drawdown sweep tries again.
    fn spawn_venue_disable(&self, account: &Account) {
        let store = self.store.clone();
        let bridge = self.bridge.clone();
        let (account_id, login) = (account.id, account.login);
        tokio::spawn(async move {
            if let Err(e) = disable_at_venue(store.as_ref(), bridge.as_ref(), account_id, login).await {
                tracing::warn!(%login, error = ?e, "Failed to disable breached account on the bridge. Retrying on the next sweep.");
            }
        });
    }

    async fn check_profit_target(&self, account: &Account, equity: Decimal, rules: &RiskRuleSet) {
        let before = drawdown::profit_progress(account.initial_balance, account.current_equity, rules);
        let after = drawdown::profit_progress(account.initial_balance, equity, rules);
        if after.reached && !before.reached {
            tracing::info!(login = %account.login, profit = %after.profit, target = %after.target_amount, "Profit target reached.");
            self.send(Notification::ProfitTargetReached {
                login: account.login,
                profit: after.profit,
                target: after.target_amount,
            })
            .await;
        }
    }

    /// Applies a bridge-originated status event through the same ratchet.
    async fn apply_status_event(
        &self,
        account: &Account,
        kind: StatusEventKind,
        event: &TradeEvent,
    ) -> Result<EventOutcome> {
        let equity = event
            .equity
            .and_then(Decimal::from_f64)
            .map(|e| e.round_dp(2))
            .filter(|e| !is_equity_glitch(*e, account.current_balance, account.initial_balance));

        let (transitioned, notification) = match kind {
            StatusEventKind::AccountPassed => (
                self.store
                    .transition_status(account.id, AccountStatus::Passed)
                    .await?,
                Notification::AccountPassed {
                    login: account.login,
                    equity,
                },
            ),
            StatusEventKind::AccountBreached => {
                let reason = event
                    .reason
                    .clone()
                    .unwrap_or_else(|| "breached on the bridge".to_string());
                let violation = Violation {
                    account_id: account.id,
                    trade_ticket: None,
                    violation_type: ViolationType::BridgeBreach,
                    severity: Severity::Breach,
                    description: reason.clone(),
                    symbol: None,
                    details: json!({ "equity": equity, "source": "bridge" }),
                    created_at: Utc::now(),
                };
                let transitioned = self.store.breach_account(account.id, &violation).await?;
                if transitioned {
                    // The bridge disabled the account itself.
                    if let Err(e) = self.store.mark_venue_disabled(account.id).await {
                        tracing::warn!(login = %account.login, error = %e, "Failed to mark account as disabled at the venue.");
                    }
                }
                (
                    transitioned,
                    Notification::AccountBreached {
                        login: account.login,
                        reason,
                        equity,
                    },
                )
            }
        };
        if !transitioned {
            tracing::debug!(login = %account.login, status = account.status.as_str(), "Redundant status event.");
            return Ok(EventOutcome::StatusApplied { transitioned: false });
        }
        tracing::info!(login = %account.login, event = ?kind, "Bridge status event applied.");

        self.send(notification).await;
        if let Some(equity) = equity {
            self.store
                .update_equity(account.id, account.current_balance, equity)
                .await?;
        }

        Ok(EventOutcome::StatusApplied { transitioned: true })
    }

    async fn send(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!(login = %notification.login(), error = ?e, "Notification dispatch failed.");
        }
    }
}
