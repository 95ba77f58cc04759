// In crates/database/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{Account, AccountStatus, GroupRule, Login, Side, Trade};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Raw `accounts` row. Status is decoded at this boundary so the rest of the
/// engine never sees an unknown label.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub login: i64,
    pub user_id: Option<Uuid>,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub current_equity: Decimal,
    pub start_of_day_equity: Option<Decimal>,
    pub status: String,
    pub risk_group: Option<String>,
    pub account_type: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = core_types::Error;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            login: Login(row.login),
            user_id: row.user_id,
            initial_balance: row.initial_balance,
            current_balance: row.current_balance,
            current_equity: row.current_equity,
            start_of_day_equity: row.start_of_day_equity,
            status: row.status.parse::<AccountStatus>()?,
            risk_group: row.risk_group,
            account_type: row.account_type,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TradeRow {
    pub account_id: Uuid,
    pub ticket: i64,
    pub symbol: String,
    pub side: String,
    pub lots: Decimal,
    pub open_price: Decimal,
    pub close_price: Option<Decimal>,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub profit_loss: Decimal,
    pub commission: Decimal,
    pub swap: Decimal,
}

impl TryFrom<TradeRow> for Trade {
    type Error = core_types::Error;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(Trade {
            account_id: row.account_id,
            ticket: row.ticket,
            symbol: row.symbol,
            side: row.side.parse::<Side>()?,
            lots: row.lots,
            open_price: row.open_price,
            close_price: row.close_price,
            open_time: row.open_time,
            close_time: row.close_time,
            profit_loss: row.profit_loss,
            commission: row.commission,
            swap: row.swap,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupRuleRow {
    pub group_name: String,
    pub max_total_loss_percent: Option<Decimal>,
    pub max_daily_loss_percent: Option<Decimal>,
    pub profit_target_percent: Option<Decimal>,
    pub allow_martingale: Option<bool>,
    pub allow_hedging: Option<bool>,
    pub min_trade_duration_seconds: Option<i64>,
    pub max_single_win_percent: Option<Decimal>,
    pub max_single_loss_percent: Option<Decimal>,
    pub consistency_enabled: Option<bool>,
}

impl From<GroupRuleRow> for GroupRule {
    fn from(row: GroupRuleRow) -> Self {
        GroupRule {
            group_name: row.group_name,
            max_total_loss_percent: row.max_total_loss_percent,
            max_daily_loss_percent: row.max_daily_loss_percent,
            profit_target_percent: row.profit_target_percent,
            allow_martingale: row.allow_martingale,
            allow_hedging: row.allow_hedging,
            min_trade_duration_seconds: row.min_trade_duration_seconds,
            max_single_win_percent: row.max_single_win_percent,
            max_single_loss_percent: row.max_single_loss_percent,
            consistency_enabled: row.consistency_enabled,
        }
    }
}

/// An entry for the `system_logs` audit table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub source: String,
    pub level: String,
    pub message: String,
    pub details: serde_json::Value,
}
