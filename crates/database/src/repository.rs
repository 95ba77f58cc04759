// In crates/database/src/repository.rs

use crate::types::{AccountRow, AuditEntry, GroupRuleRow, TradeRow};
use crate::{Db, Error, Result, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, AccountStatus, GroupRule, Login, Trade, Violation};
use rust_decimal::Decimal;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = r#"
    id, login, user_id, initial_balance, current_balance, current_equity,
    start_of_day_equity, status, risk_group, account_type, created_at
"#;

const TRADE_COLUMNS: &str = r#"
    account_id, ticket, symbol, side, lots, open_price, close_price,
    open_time, close_time, profit_loss, commission, swap
"#;

#[async_trait]
impl Store for Db {
    async fn get_account_by_login(&self, login: Login) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE login = $1"
        ))
        .bind(login.0)
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(row.map(Account::try_from).transpose()?)
    }

    async fn list_active_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE status = 'active' ORDER BY login"
        ))
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.into_iter()
            .map(|row| Account::try_from(row).map_err(Error::from))
            .collect()
    }

    async fn load_rule_table(&self) -> Result<Vec<GroupRule>> {
        let rows = sqlx::query_as::<_, GroupRuleRow>(
            r#"
            SELECT group_name, max_total_loss_percent, max_daily_loss_percent,
                   profit_target_percent, allow_martingale, allow_hedging,
                   min_trade_duration_seconds, max_single_win_percent,
                   max_single_loss_percent, consistency_enabled
            FROM risk_groups
            "#,
        )
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(rows.into_iter().map(GroupRule::from).collect())
    }

    async fn upsert_trades(&self, trades: &[Trade]) -> Result<u64> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;
        let mut written = 0;

        for trade in trades {
            let result = sqlx::query(
                r#"
                INSERT INTO trades (account_id, ticket, symbol, side, lots, open_price, close_price,
                                    open_time, close_time, profit_loss, commission, swap, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
                ON CONFLICT (account_id, ticket) DO UPDATE SET
                    symbol = EXCLUDED.symbol,
                    side = EXCLUDED.side,
                    lots = EXCLUDED.lots,
                    open_price = EXCLUDED.open_price,
                    close_price = EXCLUDED.close_price,
                    open_time = EXCLUDED.open_time,
                    close_time = EXCLUDED.close_time,
                    profit_loss = EXCLUDED.profit_loss,
                    commission = EXCLUDED.commission,
                    swap = EXCLUDED.swap,
                    updated_at = NOW()
                "#,
            )
            .bind(trade.account_id)
            .bind(trade.ticket)
            .bind(&trade.symbol)
            .bind(trade.side.as_str())
            .bind(trade.lots)
            .bind(trade.open_price)
            .bind(trade.close_price)
            .bind(trade.open_time)
            .bind(trade.close_time)
            .bind(trade.profit_loss)
            .bind(trade.commission)
            .bind(trade.swap)
            .execute(&mut *tx)
            .await
            .map_err(Error::OperationFailed)?;

            written += result.rows_affected();
        }

        tx.commit().await.map_err(Error::OperationFailed)?;
        Ok(written)
    }

    async fn close_stale_trades(
        &self,
        account_id: Uuid,
        live_open_tickets: &[i64],
        closed_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET close_time = $3, updated_at = NOW()
            WHERE account_id = $1
              AND close_time IS NULL
              AND NOT (ticket = ANY($2))
            "#,
        )
        .bind(account_id)
        .bind(live_open_tickets)
        .bind(closed_at)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(result.rows_affected())
    }

    async fn ledger_trades(&self, account_id: Uuid) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE account_id = $1 ORDER BY open_time, ticket"
        ))
        .bind(account_id)
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.into_iter()
            .map(|row| Trade::try_from(row).map_err(Error::from))
            .collect()
    }

    async fn update_equity(&self, account_id: Uuid, balance: Decimal, equity: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET current_balance = $2, current_equity = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(balance)
        .bind(equity)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(())
    }

    async fn reset_start_of_day(
        &self,
        account_id: Uuid,
        start_of_day_equity: Decimal,
        balance: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET start_of_day_equity = $2, current_equity = $2, current_balance = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(start_of_day_equity)
        .bind(balance)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(())
    }

    async fn transition_status(&self, account_id: Uuid, to: AccountStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(account_id)
        .bind(to.as_str())
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(result.rows_affected() == 1)
    }

    async fn breach_account(&self, account_id: Uuid, violation: &Violation) -> Result<bool> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;

        let moved = sqlx::query(
            r#"
            UPDATE accounts
            SET status = 'breached', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::OperationFailed)?
        .rows_affected();

        if moved != 1 {
            tx.rollback().await.map_err(Error::OperationFailed)?;
            return Ok(false);
        }

        insert_violation(&mut *tx, violation).await?;
        tx.commit().await.map_err(Error::OperationFailed)?;
        Ok(true)
    }

    async fn pending_venue_disables(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE status = 'breached' AND venue_disabled_at IS NULL ORDER BY login"
        ))
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.into_iter()
            .map(|row| Account::try_from(row).map_err(Error::from))
            .collect()
    }

    async fn mark_venue_disabled(&self, account_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE accounts SET venue_disabled_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(account_id)
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        Ok(())
    }

    async fn reinstate(&self, account_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = 'active', venue_disabled_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status IN ('breached', 'disabled')
            "#,
        )
        .bind(account_id)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_violation(&self, violation: &Violation) -> Result<bool> {
        // The unique index settles races between concurrent writers.
        Ok(insert_violation(&self.0, violation).await? == 1)
    }

    async fn insert_audit_log(&self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_logs (source, level, message, details)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&entry.source)
        .bind(&entry.level)
        .bind(&entry.message)
        .bind(&entry.details)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(())
    }
}

async fn insert_violation<'e, E>(executor: E, violation: &Violation) -> Result<u64>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO violations (account_id, trade_ticket, violation_type, severity,
                                description, symbol, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(violation.account_id)
    .bind(violation.trade_ticket)
    .bind(violation.violation_type.as_str())
    .bind(violation.severity.as_str())
    .bind(&violation.description)
    .bind(&violation.symbol)
    .bind(&violation.details)
    .bind(violation.created_at)
    .execute(executor)
    .await
    .map_err(Error::OperationFailed)?;

    Ok(result.rows_affected())
}
