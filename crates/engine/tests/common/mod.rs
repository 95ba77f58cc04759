// In crates/engine/tests/common/mod.rs

#![allow(dead_code)]

use api_client::{BulkCheckResult, BulkCheckStatus, StopOutRequest, VenueBridge};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use core_types::{Account, AccountStatus, GroupRule, Login, Trade, Violation};
use database::{AuditEntry, MemoryStore, Store};
use engine::notify::{Notification, Notifier};
use engine::rules_cache::RulesCache;
use engine::worker::{EventWorker, WorkerConfig};
use events::{RawSide, RawTrade, TradeEvent};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// An active account with no type rule, so the 10% / 5% defaults apply.
pub fn account(login: i64, initial: Decimal) -> Account {
    Account {
        id: Uuid::new_v4(),
        login: Login(login),
        user_id: None,
        initial_balance: initial,
        current_balance: initial,
        current_equity: initial,
        start_of_day_equity: None,
        status: AccountStatus::Active,
        risk_group: None,
        account_type: "challenge".to_string(),
        created_at: t0(),
    }
}

/// A buy of one lot opened `open_min` minutes after [`t0`], optionally
/// closed `close_min` minutes after it.
pub fn trade(ticket: i64, open_min: i64, close_min: Option<i64>, profit: f64) -> RawTrade {
    let at = |min: i64| (t0() + chrono::Duration::minutes(min)).timestamp();
    RawTrade {
        ticket,
        symbol: "EURUSD".to_string(),
        side: RawSide::Code(0),
        volume: Some(10_000.0),
        price: Some(1.1),
        profit: Some(profit),
        time: Some(at(open_min)),
        close_time: close_min.map(at),
        ..Default::default()
    }
}

pub fn event(login: i64, trades: Vec<RawTrade>) -> TradeEvent {
    TradeEvent {
        login: Login(login),
        trades,
        timestamp: None,
        event: None,
        reason: None,
        equity: None,
    }
}

/// A bridge that answers `check-bulk` from a script and records every call.
#[derive(Default)]
pub struct ScriptedBridge {
    live: Mutex<HashMap<Login, (Decimal, Decimal, BulkCheckStatus)>>,
    failing_calls: Mutex<HashSet<usize>>,
    failing_disables: AtomicUsize,
    pub calls: Mutex<Vec<Vec<StopOutRequest>>>,
    pub disabled: Mutex<Vec<Login>>,
    pub enabled: Mutex<Vec<Login>>,
}

impl ScriptedBridge {
    pub fn set_live(&self, login: i64, equity: Decimal, balance: Decimal, status: BulkCheckStatus) {
        self.live
            .lock()
            .unwrap()
            .insert(Login(login), (equity, balance, status));
    }

    /// The `n`th `check-bulk` call (zero-based) fails.
    pub fn fail_call(&self, n: usize) {
        self.failing_calls.lock().unwrap().insert(n);
    }

    /// The next `n` `disable-account` calls fail.
    pub fn fail_disables(&self, n: usize) {
        self.failing_disables.store(n, Ordering::SeqCst);
    }

    pub fn disabled(&self) -> Vec<Login> {
        self.disabled.lock().unwrap().clone()
    }
}

#[async_trait]
impl VenueBridge for ScriptedBridge {
    async fn check_bulk(&self, requests: &[StopOutRequest]) -> api_client::Result<Vec<BulkCheckResult>> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(requests.to_vec());
            calls.len() - 1
        };
        if self.failing_calls.lock().unwrap().contains(&n) {
            return Err(api_client::Error::ApiError {
                status: 503,
                msg: "bridge unavailable".to_string(),
            });
        }

        let live = self.live.lock().unwrap();
        Ok(requests
            .iter()
            .filter_map(|r| {
                live.get(&r.login).map(|(equity, balance, status)| BulkCheckResult {
                    login: r.login,
                    status: *status,
                    equity: *equity,
                    balance: *balance,
                    actions: Vec::new(),
                })
            })
            .collect())
    }

    async fn disable_account(&self, login: Login) -> api_client::Result<()> {
        if take_one(&self.failing_disables) {
            return Err(api_client::Error::RetriesExhausted {
                operation: "disable-account",
                attempts: 3,
                last: "bridge unavailable".to_string(),
            });
        }
        self.disabled.lock().unwrap().push(login);
        Ok(())
    }

    async fn enable_account(&self, login: Login) -> api_client::Result<()> {
        self.enabled.lock().unwrap().push(login);
        Ok(())
    }

    async fn adjust_balance(&self, _login: Login, _amount: f64, _comment: &str) -> api_client::Result<()> {
        Ok(())
    }

    async fn change_leverage(&self, _login: Login, _leverage: u32) -> api_client::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Wraps a [`MemoryStore`] and fails the next `n` breach writes.
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    failing_breaches: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, failing_breaches: usize) -> Self {
        Self {
            inner,
            failing_breaches: AtomicUsize::new(failing_breaches),
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get_account_by_login(&self, login: Login) -> database::Result<Option<Account>> {
        self.inner.get_account_by_login(login).await
    }

    async fn list_active_accounts(&self) -> database::Result<Vec<Account>> {
        self.inner.list_active_accounts().await
    }

    async fn load_rule_table(&self) -> database::Result<Vec<GroupRule>> {
        self.inner.load_rule_table().await
    }

    async fn upsert_trades(&self, trades: &[Trade]) -> database::Result<u64> {
        self.inner.upsert_trades(trades).await
    }

    async fn close_stale_trades(
        &self,
        account_id: Uuid,
        live_open_tickets: &[i64],
        closed_at: DateTime<Utc>,
    ) -> database::Result<u64> {
        self.inner
            .close_stale_trades(account_id, live_open_tickets, closed_at)
            .await
    }

    async fn ledger_trades(&self, account_id: Uuid) -> database::Result<Vec<Trade>> {
        self.inner.ledger_trades(account_id).await
    }

    async fn update_equity(&self, account_id: Uuid, balance: Decimal, equity: Decimal) -> database::Result<()> {
        self.inner.update_equity(account_id, balance, equity).await
    }

    async fn reset_start_of_day(
        &self,
        account_id: Uuid,
        start_of_day_equity: Decimal,
        balance: Decimal,
    ) -> database::Result<()> {
        self.inner
            .reset_start_of_day(account_id, start_of_day_equity, balance)
            .await
    }

    async fn transition_status(&self, account_id: Uuid, to: AccountStatus) -> database::Result<bool> {
        self.inner.transition_status(account_id, to).await
    }

    async fn breach_account(&self, account_id: Uuid, violation: &Violation) -> database::Result<bool> {
        if take_one(&self.failing_breaches) {
            return Err(database::Error::NotFound("connection reset".to_string()));
        }
        self.inner.breach_account(account_id, violation).await
    }

    async fn pending_venue_disables(&self) -> database::Result<Vec<Account>> {
        self.inner.pending_venue_disables().await
    }

    async fn mark_venue_disabled(&self, account_id: Uuid) -> database::Result<()> {
        self.inner.mark_venue_disabled(account_id).await
    }

    async fn reinstate(&self, account_id: Uuid) -> database::Result<bool> {
        self.inner.reinstate(account_id).await
    }

    async fn record_violation(&self, violation: &Violation) -> database::Result<bool> {
        self.inner.record_violation(violation).await
    }

    async fn insert_audit_log(&self, entry: &AuditEntry) -> database::Result<()> {
        self.inner.insert_audit_log(entry).await
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub bridge: Arc<ScriptedBridge>,
    pub notifier: Arc<RecordingNotifier>,
    pub rules: Arc<RulesCache>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            rules: Arc::new(RulesCache::new(store.clone(), Duration::from_secs(300))),
            store,
            bridge: Arc::new(ScriptedBridge::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn worker(&self) -> EventWorker {
        self.worker_with(WorkerConfig::default())
    }

    pub fn worker_with(&self, config: WorkerConfig) -> EventWorker {
        self.worker_on(self.store.clone(), config)
    }

    /// A worker writing through `store` instead of the harness store.
    pub fn worker_on(&self, store: Arc<dyn Store>, config: WorkerConfig) -> EventWorker {
        EventWorker::new(
            store,
            self.bridge.clone(),
            self.notifier.clone(),
            self.rules.clone(),
            config,
        )
    }

    pub async fn add(&self, account: Account) -> Account {
        self.store.insert_account(account.clone()).await;
        account
    }
}

/// Lets fire-and-forget tasks spawned by the worker run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
