// In crates/risk/src/types.rs

use crate::{Error, Result};
use app_config::types::RiskSettings;
use chrono::{DateTime, Duration, Utc};
use core_types::{Severity, Violation, ViolationType};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

/// Fallback values used when neither the group table nor the account type
/// provides a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefaults {
    pub total_loss_percent: Decimal,
    pub daily_loss_percent: Decimal,
    pub competition_total_loss_percent: Decimal,
    pub competition_daily_loss_percent: Decimal,
    pub min_trade_duration_seconds: i64,
    pub max_single_win_percent: Decimal,
    pub allow_martingale: bool,
    pub allow_hedging: bool,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            total_loss_percent: dec!(10),
            daily_loss_percent: dec!(5),
            competition_total_loss_percent: dec!(20),
            competition_daily_loss_percent: dec!(10),
            min_trade_duration_seconds: 120,
            max_single_win_percent: dec!(50),
            allow_martingale: true,
            allow_hedging: true,
        }
    }
}

impl RuleDefaults {
    pub fn from_settings(settings: &RiskSettings) -> Result<Self> {
        Ok(Self {
            total_loss_percent: percent(settings.default_total_loss_percent)?,
            daily_loss_percent: percent(settings.default_daily_loss_percent)?,
            competition_total_loss_percent: percent(settings.competition_total_loss_percent)?,
            competition_daily_loss_percent: percent(settings.competition_daily_loss_percent)?,
            min_trade_duration_seconds: settings.default_min_trade_duration_seconds,
            max_single_win_percent: percent(settings.default_max_single_win_percent)?,
            allow_martingale: settings.default_allow_martingale,
            allow_hedging: settings.default_allow_hedging,
        })
    }
}

fn percent(value: f64) -> Result<Decimal> {
    let d = Decimal::from_f64(value)
        .ok_or_else(|| Error::InvalidParameters(format!("{value} is not a valid percentage")))?;
    if d < Decimal::ZERO || d > Decimal::ONE_HUNDRED {
        return Err(Error::InvalidParameters(format!("{value} is outside 0..=100")));
    }
    Ok(d.normalize())
}

/// Time windows for the behavioral checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorParams {
    /// A larger trade opened this soon after a losing close is martingale.
    pub martingale_window: Duration,
    /// How far back closed trades are considered for martingale and hedging.
    pub session_lookback: Duration,
    /// Opposite positions overlapping by this much or less are not a hedge.
    pub hedging_tolerance: Duration,
}

impl Default for BehaviorParams {
    fn default() -> Self {
        Self {
            martingale_window: Duration::minutes(5),
            session_lookback: Duration::hours(24),
            hedging_tolerance: Duration::milliseconds(2_000),
        }
    }
}

impl From<&RiskSettings> for BehaviorParams {
    fn from(settings: &RiskSettings) -> Self {
        Self {
            martingale_window: Duration::seconds(settings.martingale_window_secs),
            session_lookback: Duration::hours(settings.session_lookback_hours),
            hedging_tolerance: Duration::milliseconds(settings.hedging_tolerance_ms),
        }
    }
}

/// Balance and equity recomputed from the trade ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EquitySnapshot {
    pub closed_profit: Decimal,
    pub floating_profit: Decimal,
    pub balance: Decimal,
    pub equity: Decimal,
}

/// The loss floors an account must stay above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrawdownLevels {
    pub total_floor: Decimal,
    pub daily_floor: Decimal,
    /// The stricter (higher) of the two floors.
    pub effective_floor: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DrawdownOutcome {
    /// Live figures look like a venue glitch; nothing may be written this cycle.
    Skipped,
    Within(DrawdownLevels),
    Breached {
        levels: DrawdownLevels,
        /// `MaxDrawdown` when the total floor is crossed, otherwise `DailyLoss`.
        violation_type: ViolationType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfitProgress {
    pub profit: Decimal,
    pub target_amount: Decimal,
    pub reached: bool,
}

/// A rule violation detected by a check, before it is tied to an account.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub trade_ticket: Option<i64>,
    pub symbol: Option<String>,
    pub description: String,
    pub details: serde_json::Value,
}

impl Finding {
    pub fn into_violation(self, account_id: Uuid, now: DateTime<Utc>) -> Violation {
        Violation {
            account_id,
            trade_ticket: self.trade_ticket,
            violation_type: self.violation_type,
            severity: self.severity,
            description: self.description,
            symbol: self.symbol,
            details: self.details,
            created_at: now,
        }
    }
}
