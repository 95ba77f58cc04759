// In crates/engine/tests/scenario_ingestion.rs

mod common;

use common::*;
use core_types::Login;
use engine::EventOutcome;
use futures::stream;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn scenario_equity_recomputed_from_ledger() {
    let h = Harness::new();
    let acc = h.add(account(1001, dec!(1000))).await;

    let batch = vec![
        trade(1, 10, Some(40), 100.0),
        trade(2, 50, Some(90), -40.0),
        trade(3, 95, None, 15.0),
    ];
    let outcome = h.worker().process(&event(1001, batch)).await.unwrap();

    assert!(matches!(
        outcome,
        EventOutcome::Evaluated { upserted: 3, breached: false, .. }
    ));
    let stored = h.store.account(acc.id).await.unwrap();
    assert_eq!(stored.current_balance, dec!(1060));
    assert_eq!(stored.current_equity, dec!(1075));
}

#[tokio::test]
async fn scenario_redelivery_is_idempotent() {
    let h = Harness::new();
    let acc = h.add(account(1002, dec!(1000))).await;
    let worker = h.worker();

    let batch = vec![trade(1, 10, Some(40), 20.0), trade(2, 60, None, -5.0)];
    worker.process(&event(1002, batch.clone())).await.unwrap();
    worker.process(&event(1002, batch)).await.unwrap();

    let trades = h.store.trades(acc.id).await;
    assert_eq!(trades.len(), 2);
    assert!(h.store.violations().await.is_empty());
    assert_eq!(h.store.account(acc.id).await.unwrap().current_equity, dec!(1015));
}

#[tokio::test]
async fn scenario_redelivery_without_timestamps_keeps_stored_times() {
    let h = Harness::new();
    let acc = h.add(account(1007, dec!(1000))).await;
    let worker = h.worker();

    let mut open = trade(3, 0, None, 5.0);
    open.time = None;
    let mut closed = trade(4, 0, None, 8.0);
    closed.time = None;
    closed.is_closed = Some(true);
    let batch = vec![open, closed];

    worker.process(&event(1007, batch.clone())).await.unwrap();
    let first = h.store.trades(acc.id).await;
    tokio::time::sleep(Duration::from_millis(25)).await;
    worker.process(&event(1007, batch)).await.unwrap();
    let second = h.store.trades(acc.id).await;

    assert_eq!(second.len(), 2);
    for (before, after) in first.iter().zip(&second) {
        assert_eq!(before.ticket, after.ticket);
        assert_eq!(before.open_time, after.open_time);
        assert_eq!(before.close_time, after.close_time);
    }
    assert!(second.iter().any(|t| t.ticket == 4 && t.close_time.is_some()));
}

#[tokio::test]
async fn scenario_ghost_trades_are_never_persisted() {
    let h = Harness::new();
    let acc = h.add(account(1003, dec!(1000))).await;

    let batch = vec![
        // Closed two minutes before the account existed.
        trade(1, -30, Some(-2), 500.0),
        // Within the 60s buffer.
        trade(2, 0, Some(10), 10.0),
    ];
    h.worker().process(&event(1003, batch)).await.unwrap();

    let trades = h.store.trades(acc.id).await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].ticket, 2);
    assert_eq!(h.store.account(acc.id).await.unwrap().current_balance, dec!(1010));
}

#[tokio::test]
async fn scenario_position_missing_from_feed_is_closed() {
    let h = Harness::new();
    let acc = h.add(account(1004, dec!(1000))).await;
    let worker = h.worker();

    worker
        .process(&event(1004, vec![trade(5, 10, None, 12.0), trade(6, 20, None, 3.0)]))
        .await
        .unwrap();
    let outcome = worker
        .process(&event(1004, vec![trade(6, 20, None, 4.0)]))
        .await
        .unwrap();

    assert!(matches!(outcome, EventOutcome::Evaluated { stale_closed: 1, .. }));
    let trades = h.store.trades(acc.id).await;
    let five = trades.iter().find(|t| t.ticket == 5).unwrap();
    assert!(five.close_time.is_some());
    // Ticket 5 now counts toward the balance.
    assert_eq!(h.store.account(acc.id).await.unwrap().current_balance, dec!(1012));
}

#[tokio::test]
async fn scenario_unknown_login_is_dropped() {
    let h = Harness::new();
    let outcome = h
        .worker()
        .process(&event(4040, vec![trade(1, 10, None, 1.0)]))
        .await
        .unwrap();
    assert_eq!(outcome, EventOutcome::UnknownAccount);
}

#[tokio::test]
async fn scenario_failing_account_does_not_block_others() {
    let h = Harness::new();
    h.add(account(2001, dec!(1000))).await;
    let healthy = h.add(account(2002, dec!(1000))).await;
    h.store.fail_login(Login(2001)).await;

    let events = stream::iter(vec![
        event(2001, vec![trade(1, 10, None, 1.0)]),
        event(2002, vec![trade(7, 10, Some(20), 30.0)]),
    ]);
    Arc::new(h.worker()).run(events).await;

    assert_eq!(h.store.trades(healthy.id).await.len(), 1);
    assert_eq!(h.store.account(healthy.id).await.unwrap().current_balance, dec!(1030));
}
