// In crates/database/src/store.rs

use crate::Result;
use crate::types::AuditEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, AccountStatus, GroupRule, Login, Trade, Violation};
use rust_decimal::Decimal;
use uuid::Uuid;

/// The persistence seam between the engine and storage.
///
/// Account `status` is only ever changed through [`Store::transition_status`]
/// and [`Store::reinstate`]. The equity writers deliberately take no status.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_account_by_login(&self, login: Login) -> Result<Option<Account>>;

    async fn list_active_accounts(&self) -> Result<Vec<Account>>;

    /// Full snapshot of the per-group rule table.
    async fn load_rule_table(&self) -> Result<Vec<GroupRule>>;

    /// Inserts or updates each trade by `(account_id, ticket)`. Returns rows written.
    async fn upsert_trades(&self, trades: &[Trade]) -> Result<u64>;

    /// Closes every locally open trade whose ticket is not in `live_open_tickets`.
    /// Only `close_time` is written.
    async fn close_stale_trades(
        &self,
        account_id: Uuid,
        live_open_tickets: &[i64],
        closed_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Every trade of the account, open and closed, ordered by open time.
    async fn ledger_trades(&self, account_id: Uuid) -> Result<Vec<Trade>>;

    async fn update_equity(&self, account_id: Uuid, balance: Decimal, equity: Decimal) -> Result<()>;

    /// Re-bases the day: start-of-day equity plus the live balance and equity.
    async fn reset_start_of_day(
        &self,
        account_id: Uuid,
        start_of_day_equity: Decimal,
        balance: Decimal,
    ) -> Result<()>;

    /// Moves an `active` account to `to`. Returns `false` when the account was
    /// no longer active, which makes repeated breaches no-ops.
    async fn transition_status(&self, account_id: Uuid, to: AccountStatus) -> Result<bool>;

    /// Moves an `active` account to `breached` and stores `violation` in the
    /// same write. Returns `false`, and writes nothing, when the account was
    /// no longer active.
    async fn breach_account(&self, account_id: Uuid, violation: &Violation) -> Result<bool>;

    /// Breached accounts the venue has not confirmed as disabled.
    async fn pending_venue_disables(&self) -> Result<Vec<Account>>;

    async fn mark_venue_disabled(&self, account_id: Uuid) -> Result<()>;

    /// Administrative reversal of a breach or disable. Clears the venue
    /// disable marker.
    async fn reinstate(&self, account_id: Uuid) -> Result<bool>;

    /// Stores a violation unless the same `(account, ticket, type)` exists.
    /// Returns `true` when a new row was written.
    async fn record_violation(&self, violation: &Violation) -> Result<bool>;

    async fn insert_audit_log(&self, entry: &AuditEntry) -> Result<()>;
}
