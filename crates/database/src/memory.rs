// In crates/database/src/memory.rs

use crate::types::AuditEntry;
use crate::{Error, Result, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, AccountStatus, GroupRule, Login, Trade, Violation};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    trades: BTreeMap<(Uuid, i64), Trade>,
    rules: Vec<GroupRule>,
    violations: Vec<Violation>,
    audit_log: Vec<AuditEntry>,
    failing_logins: HashSet<Login>,
    venue_disabled: HashSet<Uuid>,
}

impl Inner {
    fn insert_violation(&mut self, violation: &Violation) -> bool {
        let exists = self.violations.iter().any(|v| {
            v.account_id == violation.account_id
                && v.trade_ticket.unwrap_or(0) == violation.trade_ticket.unwrap_or(0)
                && v.violation_type == violation.violation_type
        });
        if !exists {
            self.violations.push(violation.clone());
        }
        !exists
    }
}

/// An in-process [`Store`] with the same semantics as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_account(&self, account: Account) {
        self.inner.lock().await.accounts.insert(account.id, account);
    }

    pub async fn set_rule_table(&self, rules: Vec<GroupRule>) {
        self.inner.lock().await.rules = rules;
    }

    /// Makes every lookup of `login` fail, to exercise per-account isolation.
    pub async fn fail_login(&self, login: Login) {
        self.inner.lock().await.failing_logins.insert(login);
    }

    pub async fn account(&self, account_id: Uuid) -> Option<Account> {
        self.inner.lock().await.accounts.get(&account_id).cloned()
    }

    pub async fn trades(&self, account_id: Uuid) -> Vec<Trade> {
        self.inner
            .lock()
            .await
            .trades
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn violations(&self) -> Vec<Violation> {
        self.inner.lock().await.violations.clone()
    }

    pub async fn audit_log(&self) -> Vec<AuditEntry> {
        self.inner.lock().await.audit_log.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_account_by_login(&self, login: Login) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        if inner.failing_logins.contains(&login) {
            return Err(Error::NotFound(format!("account lookup failed for login {login}")));
        }
        Ok(inner.accounts.values().find(|a| a.login == login).cloned())
    }

    async fn list_active_accounts(&self) -> Result<Vec<Account>> {
        let inner = self.inner.lock().await;
        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.login);
        Ok(accounts)
    }

    async fn load_rule_table(&self) -> Result<Vec<GroupRule>> {
        Ok(self.inner.lock().await.rules.clone())
    }

    async fn upsert_trades(&self, trades: &[Trade]) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        for trade in trades {
            inner
                .trades
                .insert((trade.account_id, trade.ticket), trade.clone());
        }
        Ok(trades.len() as u64)
    }

    async fn close_stale_trades(
        &self,
        account_id: Uuid,
        live_open_tickets: &[i64],
        closed_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut closed = 0;
        for trade in inner.trades.values_mut() {
            if trade.account_id == account_id
                && trade.is_open()
                && !live_open_tickets.contains(&trade.ticket)
            {
                trade.close_time = Some(closed_at);
                closed += 1;
            }
        }
        Ok(closed)
    }

    async fn ledger_trades(&self, account_id: Uuid) -> Result<Vec<Trade>> {
        let mut trades = self.trades(account_id).await;
        trades.sort_by_key(|t| (t.open_time, t.ticket));
        Ok(trades)
    }

    async fn update_equity(&self, account_id: Uuid, balance: Decimal, equity: Decimal) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| Error::NotFound(format!("account {account_id}")))?;
        account.current_balance = balance;
        account.current_equity = equity;
        Ok(())
    }

    async fn reset_start_of_day(
        &self,
        account_id: Uuid,
        start_of_day_equity: Decimal,
        balance: Decimal,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| Error::NotFound(format!("account {account_id}")))?;
        account.start_of_day_equity = Some(start_of_day_equity);
        account.current_equity = start_of_day_equity;
        account.current_balance = balance;
        Ok(())
    }

    async fn transition_status(&self, account_id: Uuid, to: AccountStatus) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.accounts.get_mut(&account_id) {
            Some(account) if account.status == AccountStatus::Active => {
                account.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn breach_account(&self, account_id: Uuid, violation: &Violation) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.accounts.get_mut(&account_id) {
            Some(account) if account.status == AccountStatus::Active => {
                account.status = AccountStatus::Breached;
            }
            _ => return Ok(false),
        }
        inner.insert_violation(violation);
        Ok(true)
    }

    async fn pending_venue_disables(&self) -> Result<Vec<Account>> {
        let inner = self.inner.lock().await;
        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| a.status == AccountStatus::Breached && !inner.venue_disabled.contains(&a.id))
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.login);
        Ok(accounts)
    }

    async fn mark_venue_disabled(&self, account_id: Uuid) -> Result<()> {
        self.inner.lock().await.venue_disabled.insert(account_id);
        Ok(())
    }

    async fn reinstate(&self, account_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.accounts.get_mut(&account_id) {
            Some(account)
                if matches!(account.status, AccountStatus::Breached | AccountStatus::Disabled) =>
            {
                account.status = AccountStatus::Active;
            }
            _ => return Ok(false),
        }
        inner.venue_disabled.remove(&account_id);
        Ok(true)
    }

    async fn record_violation(&self, violation: &Violation) -> Result<bool> {
        Ok(self.inner.lock().await.insert_violation(violation))
    }

    async fn insert_audit_log(&self, entry: &AuditEntry) -> Result<()> {
        self.inner.lock().await.audit_log.push(entry.clone());
        Ok(())
    }
}
