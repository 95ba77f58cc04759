// In crates/risk/src/equity.rs

use crate::types::EquitySnapshot;
use core_types::Trade;
use rust_decimal::Decimal;

/// Recomputes balance and equity from the reconciled ledger.
///
/// Only market trades count; balance operations and zero-lot rows are
/// ignored. Closed trades move the balance, open trades only the equity.
pub fn compute(initial_balance: Decimal, trades: &[Trade]) -> EquitySnapshot {
    let (closed_profit, floating_profit) = trades
        .iter()
        .filter(|t| t.is_market_trade())
        .fold((Decimal::ZERO, Decimal::ZERO), |(closed, floating), t| {
            if t.is_open() {
                (closed, floating + t.net_profit())
            } else {
                (closed + t.net_profit(), floating)
            }
        });

    let balance = initial_balance + closed_profit;
    EquitySnapshot {
        closed_profit,
        floating_profit,
        balance,
        equity: balance + floating_profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::Side;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn trade(ticket: i64, lots: Decimal, profit: Decimal, closed: bool) -> Trade {
        let open_time = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        Trade {
            account_id: Uuid::nil(),
            ticket,
            symbol: "EURUSD".into(),
            side: Side::Buy,
            lots,
            open_price: dec!(1.1),
            close_price: closed.then_some(dec!(1.2)),
            open_time,
            close_time: closed.then(|| open_time + chrono::Duration::hours(1)),
            profit_loss: profit,
            commission: Decimal::ZERO,
            swap: Decimal::ZERO,
        }
    }

    #[test]
    fn closed_and_floating_partition() {
        let trades = vec![
            trade(1, dec!(1), dec!(100), true),
            trade(2, dec!(0.5), dec!(-40), true),
            trade(3, dec!(0.2), dec!(15), false),
        ];
        let snapshot = compute(dec!(1000), &trades);
        assert_eq!(snapshot.balance, dec!(1060));
        assert_eq!(snapshot.equity, dec!(1075));
        assert_eq!(snapshot.floating_profit, dec!(15));
    }

    #[test]
    fn balance_operations_are_ignored() {
        let mut deposit = trade(9, Decimal::ZERO, dec!(5000), true);
        deposit.side = Side::Balance;
        let snapshot = compute(dec!(1000), &[deposit]);
        assert_eq!(snapshot.balance, dec!(1000));
        assert_eq!(snapshot.equity, dec!(1000));
    }

    #[test]
    fn commission_is_charged_for_both_sides() {
        let mut t = trade(1, dec!(1), dec!(50), true);
        t.commission = dec!(-3);
        t.swap = dec!(-1);
        assert_eq!(compute(dec!(1000), &[t]).balance, dec!(1043));
    }
}
