// In crates/risk/src/behavior.rs

use crate::types::{BehaviorParams, Finding};
use chrono::{DateTime, Duration, Utc};
use core_types::{RiskRuleSet, Severity, Trade, ViolationType};
use rust_decimal::Decimal;
use serde_json::json;

/// Everything a check may look at besides the trade under evaluation.
#[derive(Debug, Clone, Copy)]
pub struct TradeContext<'a> {
    pub rules: &'a RiskRuleSet,
    /// The account's full reconciled ledger, including the trade itself.
    pub ledger: &'a [Trade],
    pub initial_balance: Decimal,
    pub now: DateTime<Utc>,
}

/// A stateless behavioral rule over already-filled trades.
pub trait BehaviorCheck: Send + Sync {
    /// The name of the check, used in logs.
    fn name(&self) -> &'static str;

    /// Returns a finding when `trade` violates the rule.
    fn check(&self, trade: &Trade, ctx: &TradeContext<'_>) -> Option<Finding>;
}

/// Larger position opened shortly after a losing close.
#[derive(Debug, Clone)]
pub struct Martingale {
    pub window: Duration,
    pub lookback: Duration,
}

impl BehaviorCheck for Martingale {
    fn name(&self) -> &'static str {
        "martingale"
    }

    fn check(&self, trade: &Trade, ctx: &TradeContext<'_>) -> Option<Finding> {
        if ctx.rules.allow_martingale || !trade.is_market_trade() {
            return None;
        }

        let since = trade.open_time - self.lookback;
        let (previous, closed_at) = ctx
            .ledger
            .iter()
            .filter(|t| t.ticket != trade.ticket && t.is_market_trade())
            .filter_map(|t| t.close_time.map(|c| (t, c)))
            .filter(|(_, c)| *c <= trade.open_time && *c >= since)
            .max_by_key(|(t, c)| (*c, t.ticket))?;

        if previous.profit_loss >= Decimal::ZERO || trade.lots <= previous.lots {
            return None;
        }
        let gap = trade.open_time - closed_at;
        if gap >= self.window {
            return None;
        }

        Some(Finding {
            violation_type: ViolationType::Martingale,
            severity: Severity::Warning,
            trade_ticket: Some(trade.ticket),
            symbol: Some(trade.symbol.clone()),
            description: format!(
                "Lots increased from {} to {} {}s after losing trade #{}",
                previous.lots,
                trade.lots,
                gap.num_seconds(),
                previous.ticket
            ),
            details: json!({
                "previous_ticket": previous.ticket,
                "previous_lots": previous.lots,
                "previous_profit": previous.profit_loss,
                "lots": trade.lots,
                "gap_seconds": gap.num_seconds(),
            }),
        })
    }
}

/// Opposite position on the same symbol held at the same time.
#[derive(Debug, Clone)]
pub struct Hedging {
    /// Overlaps at or below this are sequential trades, not a hedge.
    pub tolerance: Duration,
    pub lookback: Duration,
}

impl BehaviorCheck for Hedging {
    fn name(&self) -> &'static str {
        "hedging"
    }

    fn check(&self, trade: &Trade, ctx: &TradeContext<'_>) -> Option<Finding> {
        if ctx.rules.allow_hedging || !trade.is_market_trade() {
            return None;
        }

        // Open positions are treated as running for another year.
        let horizon = ctx.now + Duration::days(365);
        let since = ctx.now - self.lookback;
        let end = trade.close_time.unwrap_or(horizon);

        ctx.ledger
            .iter()
            .filter(|o| {
                o.ticket != trade.ticket
                    && o.is_market_trade()
                    && o.side == trade.side.opposite()
                    && o.symbol.eq_ignore_ascii_case(&trade.symbol)
                    && o.close_time.is_none_or(|c| c >= since)
            })
            .find_map(|o| {
                let overlap = end.min(o.close_time.unwrap_or(horizon)) - trade.open_time.max(o.open_time);
                (overlap > self.tolerance).then(|| Finding {
                    violation_type: ViolationType::Hedging,
                    severity: Severity::Breach,
                    trade_ticket: Some(trade.ticket),
                    symbol: Some(trade.symbol.clone()),
                    description: format!(
                        "{} #{} overlaps opposite {} #{} on {}",
                        trade.side, trade.ticket, o.side, o.ticket, trade.symbol
                    ),
                    details: json!({
                        "opposite_ticket": o.ticket,
                        "overlap_ms": overlap.num_milliseconds(),
                    }),
                })
            })
    }
}

/// Trades closed faster than the minimum holding time.
#[derive(Debug, Clone, Default)]
pub struct TickScalping;

impl BehaviorCheck for TickScalping {
    fn name(&self) -> &'static str {
        "tick_scalping"
    }

    fn check(&self, trade: &Trade, ctx: &TradeContext<'_>) -> Option<Finding> {
        let min = ctx.rules.min_trade_duration_seconds;
        if min <= 0 || !trade.is_market_trade() {
            return None;
        }
        let held = trade.duration_secs().filter(|d| *d >= 0)?;
        if held >= min {
            return None;
        }

        Some(Finding {
            violation_type: ViolationType::TickScalping,
            severity: Severity::Breach,
            trade_ticket: Some(trade.ticket),
            symbol: Some(trade.symbol.clone()),
            description: format!("Trade held for {held}s, minimum is {min}s"),
            details: json!({ "duration_seconds": held, "min_duration_seconds": min }),
        })
    }
}

/// Extension point. No detection logic is active yet.
#[derive(Debug, Clone, Default)]
pub struct LatencyArbitrage;

impl BehaviorCheck for LatencyArbitrage {
    fn name(&self) -> &'static str {
        "latency_arbitrage"
    }

    fn check(&self, _trade: &Trade, _ctx: &TradeContext<'_>) -> Option<Finding> {
        None
    }
}

/// Extension point. No detection logic is active yet.
#[derive(Debug, Clone, Default)]
pub struct TriangularArbitrage;

impl BehaviorCheck for TriangularArbitrage {
    fn name(&self) -> &'static str {
        "triangular_arbitrage"
    }

    fn check(&self, _trade: &Trade, _ctx: &TradeContext<'_>) -> Option<Finding> {
        None
    }
}

/// A single closed trade losing more than the allowed share of the initial balance.
#[derive(Debug, Clone, Default)]
pub struct MaxRiskPerTrade;

impl BehaviorCheck for MaxRiskPerTrade {
    fn name(&self) -> &'static str {
        "max_risk_per_trade"
    }

    fn check(&self, trade: &Trade, ctx: &TradeContext<'_>) -> Option<Finding> {
        let percent = ctx.rules.max_single_loss_percent;
        if percent <= Decimal::ZERO || trade.is_open() || !trade.is_market_trade() {
            return None;
        }
        let limit = ctx.initial_balance * percent / Decimal::ONE_HUNDRED;
        let loss = -trade.profit_loss;
        if loss <= limit {
            return None;
        }

        Some(Finding {
            violation_type: ViolationType::MaxRiskPerTrade,
            severity: Severity::Breach,
            trade_ticket: Some(trade.ticket),
            symbol: Some(trade.symbol.clone()),
            description: format!("Loss of {loss} exceeds the single-trade limit of {limit}"),
            details: json!({ "loss": loss, "limit": limit, "limit_percent": percent }),
        })
    }
}

/// One winning trade making up too much of the total winning profit.
#[derive(Debug, Clone, Default)]
pub struct Consistency;

impl BehaviorCheck for Consistency {
    fn name(&self) -> &'static str {
        "consistency"
    }

    fn check(&self, trade: &Trade, ctx: &TradeContext<'_>) -> Option<Finding> {
        if !ctx.rules.consistency_enabled
            || trade.is_open()
            || !trade.is_market_trade()
            || trade.profit_loss <= Decimal::ZERO
        {
            return None;
        }

        let other_wins: Vec<Decimal> = ctx
            .ledger
            .iter()
            .filter(|t| {
                t.ticket != trade.ticket
                    && !t.is_open()
                    && t.is_market_trade()
                    && t.profit_loss > Decimal::ZERO
            })
            .map(|t| t.profit_loss)
            .collect();
        // A share is meaningless with a single win.
        if other_wins.is_empty() {
            return None;
        }

        let total: Decimal = other_wins.iter().copied().sum::<Decimal>() + trade.profit_loss;
        let share = trade.profit_loss / total * Decimal::ONE_HUNDRED;
        if share <= ctx.rules.max_single_win_percent {
            return None;
        }

        Some(Finding {
            violation_type: ViolationType::Consistency,
            severity: Severity::Warning,
            trade_ticket: Some(trade.ticket),
            symbol: Some(trade.symbol.clone()),
            description: format!(
                "Trade is {}% of total winning profit, limit is {}%",
                share.round_dp(2),
                ctx.rules.max_single_win_percent
            ),
            details: json!({
                "share_percent": share.round_dp(2),
                "total_winning_profit": total,
            }),
        })
    }
}

/// Runs every registered check over a trade.
pub struct BehaviorDetector {
    checks: Vec<Box<dyn BehaviorCheck>>,
}

impl BehaviorDetector {
    pub fn new(params: BehaviorParams) -> Self {
        Self {
            checks: vec![
                Box::new(Martingale {
                    window: params.martingale_window,
                    lookback: params.session_lookback,
                }),
                Box::new(Hedging {
                    tolerance: params.hedging_tolerance,
                    lookback: params.session_lookback,
                }),
                Box::new(TickScalping),
                Box::new(LatencyArbitrage),
                Box::new(TriangularArbitrage),
                Box::new(MaxRiskPerTrade),
                Box::new(Consistency),
            ],
        }
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// All findings for one trade, in check order.
    pub fn evaluate(&self, trade: &Trade, ctx: &TradeContext<'_>) -> Vec<Finding> {
        self.checks
            .iter()
            .filter_map(|check| {
                let finding = check.check(trade, ctx);
                if let Some(f) = &finding {
                    tracing::debug!(check = check.name(), ticket = trade.ticket, severity = f.severity.as_str(), "Behavioral check flagged trade.");
                }
                finding
            })
            .collect()
    }
}

impl Default for BehaviorDetector {
    fn default() -> Self {
        Self::new(BehaviorParams::default())
    }
}
