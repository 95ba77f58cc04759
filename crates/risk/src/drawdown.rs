// In crates/risk/src/drawdown.rs

use crate::types::{DrawdownLevels, DrawdownOutcome, ProfitProgress};
use core_types::{Account, RiskRuleSet, ViolationType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Equity within this distance of zero counts as "reported zero".
const ZERO_EQUITY_EPSILON: Decimal = dec!(0.01);

/// Computes the total and daily floors.
///
/// * total floor: `initial × (1 − max_total_loss_percent / 100)`
/// * daily floor: `start_of_day × (1 − max_daily_loss_percent / 100)`
///
/// The effective floor is the higher of the two.
pub fn breach_levels(initial_balance: Decimal, start_of_day_equity: Decimal, rules: &RiskRuleSet) -> DrawdownLevels {
    let total_floor =
        initial_balance * (Decimal::ONE - rules.max_total_loss_percent / Decimal::ONE_HUNDRED);
    let daily_floor =
        start_of_day_equity * (Decimal::ONE - rules.max_daily_loss_percent / Decimal::ONE_HUNDRED);

    DrawdownLevels {
        total_floor,
        daily_floor,
        effective_floor: total_floor.max(daily_floor),
    }
}

/// A venue that cannot reach an account reports equity 0 while the balance is
/// still intact. Such readings must never be written or acted upon.
pub fn is_equity_glitch(equity: Decimal, balance: Decimal, initial_balance: Decimal) -> bool {
    equity.abs() < ZERO_EQUITY_EPSILON && balance > initial_balance * dec!(0.01)
}

/// Evaluates `equity` against the account's floors.
pub fn evaluate(account: &Account, equity: Decimal, balance: Decimal, rules: &RiskRuleSet) -> DrawdownOutcome {
    if is_equity_glitch(equity, balance, account.initial_balance) {
        return DrawdownOutcome::Skipped;
    }

    let levels = breach_levels(account.initial_balance, account.start_of_day_or_current(), rules);
    if equity > levels.effective_floor {
        return DrawdownOutcome::Within(levels);
    }

    let violation_type = if equity <= levels.total_floor {
        ViolationType::MaxDrawdown
    } else {
        ViolationType::DailyLoss
    };
    DrawdownOutcome::Breached { levels, violation_type }
}

/// Informational progress towards the profit target. A zero target is never reached.
pub fn profit_progress(initial_balance: Decimal, equity: Decimal, rules: &RiskRuleSet) -> ProfitProgress {
    let profit = (equity - initial_balance).max(Decimal::ZERO);
    let target_amount = initial_balance * rules.profit_target_percent / Decimal::ONE_HUNDRED;
    ProfitProgress {
        profit,
        target_amount,
        reached: target_amount > Decimal::ZERO && profit >= target_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{AccountStatus, Login, RuleSource};
    use uuid::Uuid;

    fn rules(total: Decimal, daily: Decimal) -> RiskRuleSet {
        RiskRuleSet {
            max_total_loss_percent: total,
            max_daily_loss_percent: daily,
            profit_target_percent: dec!(8),
            allow_martingale: true,
            allow_hedging: true,
            min_trade_duration_seconds: 0,
            max_single_win_percent: dec!(50),
            consistency_enabled: false,
            max_single_loss_percent: Decimal::ZERO,
            source: RuleSource::Default,
        }
    }

    fn account(initial: Decimal, sod: Option<Decimal>) -> Account {
        Account {
            id: Uuid::new_v4(),
            login: Login(1),
            user_id: None,
            initial_balance: initial,
            current_balance: initial,
            current_equity: initial,
            start_of_day_equity: sod,
            status: AccountStatus::Active,
            risk_group: None,
            account_type: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stricter_floor_wins() {
        let levels = breach_levels(dec!(10000), dec!(10500), &rules(dec!(10), dec!(5)));
        assert_eq!(levels.total_floor, dec!(9000));
        assert_eq!(levels.daily_floor, dec!(9975));
        assert_eq!(levels.effective_floor, dec!(9975));
    }

    #[test]
    fn equity_at_the_floor_is_a_breach() {
        let acc = account(dec!(10000), Some(dec!(10500)));
        let r = rules(dec!(10), dec!(5));

        assert!(matches!(evaluate(&acc, dec!(9976), dec!(10000), &r), DrawdownOutcome::Within(_)));
        assert!(matches!(
            evaluate(&acc, dec!(9975), dec!(10000), &r),
            DrawdownOutcome::Breached { violation_type: ViolationType::DailyLoss, .. }
        ));
        assert!(matches!(
            evaluate(&acc, dec!(8999), dec!(9000), &r),
            DrawdownOutcome::Breached { violation_type: ViolationType::MaxDrawdown, .. }
        ));
    }

    #[test]
    fn zero_equity_with_intact_balance_is_skipped() {
        let acc = account(dec!(10000), None);
        let outcome = evaluate(&acc, Decimal::ZERO, dec!(5000), &rules(dec!(10), dec!(5)));
        assert_eq!(outcome, DrawdownOutcome::Skipped);
    }

    #[test]
    fn zero_equity_with_blown_balance_is_a_breach() {
        let acc = account(dec!(10000), None);
        let outcome = evaluate(&acc, Decimal::ZERO, dec!(50), &rules(dec!(10), dec!(5)));
        assert!(matches!(outcome, DrawdownOutcome::Breached { .. }));
    }

    #[test]
    fn missing_start_of_day_falls_back_to_current_equity() {
        let mut acc = account(dec!(10000), None);
        acc.current_equity = dec!(11000);
        let levels = breach_levels(acc.initial_balance, acc.start_of_day_or_current(), &rules(dec!(10), dec!(5)));
        assert_eq!(levels.daily_floor, dec!(10450));
    }

    #[test]
    fn profit_target_progress() {
        let r = rules(dec!(10), dec!(5));
        let progress = profit_progress(dec!(10000), dec!(10850), &r);
        assert_eq!(progress.target_amount, dec!(800));
        assert!(progress.reached);
        assert_eq!(profit_progress(dec!(10000), dec!(9000), &r).profit, Decimal::ZERO);
    }
}
