// In crates/core-types/src/types.rs

use crate::Error;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The account number assigned by the trading venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Login(pub i64);

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an evaluated account.
///
/// `Breached` and `Disabled` are terminal for the engine: only an explicit
/// administrative action moves an account back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Breached,
    Disabled,
    Passed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Breached => "breached",
            AccountStatus::Disabled => "disabled",
            AccountStatus::Passed => "passed",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "breached" | "failed" => Ok(AccountStatus::Breached),
            "disabled" => Ok(AccountStatus::Disabled),
            "passed" => Ok(AccountStatus::Passed),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// An evaluated trading account as tracked in the local ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub login: Login,
    pub user_id: Option<Uuid>,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub current_equity: Decimal,
    /// Equity snapshot taken at the last daily reset. `None` until the first reset.
    pub start_of_day_equity: Option<Decimal>,
    pub status: AccountStatus,
    /// Venue group label, e.g. `demo\S\1-SF`.
    pub risk_group: Option<String>,
    /// Product type, e.g. `prime_2_step_phase_1` or `competition`.
    pub account_type: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Start-of-day equity with the fallbacks used when no reset has run yet.
    pub fn start_of_day_or_current(&self) -> Decimal {
        match self.start_of_day_equity {
            Some(sod) if sod > Decimal::ZERO => sod,
            _ if self.current_equity > Decimal::ZERO => self.current_equity,
            _ => self.initial_balance,
        }
    }
}

/// Direction of a trade. `Balance` marks deposits, withdrawals and credit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
    Balance,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
            Side::Balance => "balance",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Balance => Side::Balance,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "0" => Ok(Side::Buy),
            "sell" | "1" => Ok(Side::Sell),
            "balance" => Ok(Side::Balance),
            other => Err(Error::UnknownSide(other.to_string())),
        }
    }
}

/// A reconciled trade. Identity is `(account_id, ticket)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub account_id: Uuid,
    pub ticket: i64,
    pub symbol: String,
    pub side: Side,
    pub lots: Decimal,
    pub open_price: Decimal,
    pub close_price: Option<Decimal>,
    pub open_time: DateTime<Utc>,
    /// `None` while the position is open.
    pub close_time: Option<DateTime<Utc>>,
    pub profit_loss: Decimal,
    /// Half of the round-trip cost, as reported by the venue.
    pub commission: Decimal,
    pub swap: Decimal,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.close_time.is_none()
    }

    /// Balance operations never take part in statistics or risk checks.
    pub fn is_market_trade(&self) -> bool {
        self.lots > Decimal::ZERO && !self.symbol.trim().is_empty() && self.side != Side::Balance
    }

    /// Realized or floating P&L net of round-trip commission and swap.
    pub fn net_profit(&self) -> Decimal {
        self.profit_loss + self.commission * Decimal::TWO + self.swap
    }

    /// Holding time in seconds, only for closed trades.
    pub fn duration_secs(&self) -> Option<i64> {
        self.close_time
            .map(|close| (close - self.open_time).num_seconds())
    }
}

/// Where a resolved rule set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    GroupExact,
    GroupContains,
    AccountType,
    Default,
}

/// The effective risk rules for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRuleSet {
    pub max_total_loss_percent: Decimal,
    pub max_daily_loss_percent: Decimal,
    pub profit_target_percent: Decimal,
    pub allow_martingale: bool,
    pub allow_hedging: bool,
    pub min_trade_duration_seconds: i64,
    pub max_single_win_percent: Decimal,
    pub consistency_enabled: bool,
    /// Maximum loss of a single trade as percent of the initial balance. Zero disables.
    pub max_single_loss_percent: Decimal,
    pub source: RuleSource,
}

/// One row of the per-group rule table. `None` columns fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRule {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    DailyLoss,
    MaxDrawdown,
    Martingale,
    Hedging,
    TickScalping,
    LatencyArbitrage,
    TriangularArbitrage,
    Consistency,
    MaxRiskPerTrade,
    BridgeBreach,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::DailyLoss => "daily_loss",
            ViolationType::MaxDrawdown => "max_drawdown",
            ViolationType::Martingale => "martingale",
            ViolationType::Hedging => "hedging",
            ViolationType::TickScalping => "tick_scalping",
            ViolationType::LatencyArbitrage => "latency_arbitrage",
            ViolationType::TriangularArbitrage => "triangular_arbitrage",
            ViolationType::Consistency => "consistency",
            ViolationType::MaxRiskPerTrade => "max_risk_per_trade",
            ViolationType::BridgeBreach => "bridge_breach",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily_loss" => Ok(ViolationType::DailyLoss),
            "max_drawdown" => Ok(ViolationType::MaxDrawdown),
            "martingale" => Ok(ViolationType::Martingale),
            "hedging" => Ok(ViolationType::Hedging),
            "tick_scalping" => Ok(ViolationType::TickScalping),
            "latency_arbitrage" => Ok(ViolationType::LatencyArbitrage),
            "triangular_arbitrage" => Ok(ViolationType::TriangularArbitrage),
            "consistency" => Ok(ViolationType::Consistency),
            "max_risk_per_trade" => Ok(ViolationType::MaxRiskPerTrade),
            "bridge_breach" => Ok(ViolationType::BridgeBreach),
            other => Err(Error::UnknownViolationType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Monitor,
    Warning,
    Critical,
    Breach,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Monitor => "monitor",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Breach => "breach",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monitor" => Ok(Severity::Monitor),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            "breach" => Ok(Severity::Breach),
            other => Err(Error::UnknownSeverity(other.to_string())),
        }
    }
}

/// A flagged rule violation. Unique on `(account_id, trade_ticket, violation_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub account_id: Uuid,
    pub trade_ticket: Option<i64>,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub description: String,
    pub symbol: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
