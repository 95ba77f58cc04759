// In crates/engine/tests/scenario_breach.rs

mod common;

use common::*;
use core_types::{AccountStatus, Login, ViolationType};
use engine::EventOutcome;
use engine::notify::Notification;
use database::Store;
use engine::sweep::{DrawdownSweep, SweepConfig};
use engine::worker::WorkerConfig;
use events::StatusEventKind;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn scenario_breach_is_a_one_way_ratchet() {
    let h = Harness::new();
    let acc = h.add(account(3001, dec!(10000))).await;
    let worker = h.worker();

    let outcome = worker
        .process(&event(3001, vec![trade(1, 10, None, -1100.0)]))
        .await
        .unwrap();
    settle().await;

    assert!(matches!(outcome, EventOutcome::Evaluated { breached: true, .. }));
    let stored = h.store.account(acc.id).await.unwrap();
    assert_eq!(stored.status, AccountStatus::Breached);
    assert_eq!(stored.current_equity, dec!(8900));

    let violations = h.store.violations().await;
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].violation_type, ViolationType::MaxDrawdown);
    assert!(matches!(
        h.notifier.sent().as_slice(),
        [Notification::AccountBreached { .. }]
    ));
    assert_eq!(h.bridge.disabled(), vec![Login(3001)]);

    // The position recovers. The account stays breached and nothing fires again.
    let outcome = worker
        .process(&event(3001, vec![trade(1, 10, None, 2000.0)]))
        .await
        .unwrap();
    settle().await;

    assert_eq!(outcome, EventOutcome::Inactive(AccountStatus::Breached));
    assert_eq!(h.store.account(acc.id).await.unwrap().status, AccountStatus::Breached);
    assert_eq!(h.store.violations().await.len(), 1);
    assert_eq!(h.bridge.disabled().len(), 1);
}

#[tokio::test]
async fn scenario_daily_floor_is_stricter_than_total() {
    let h = Harness::new();
    let mut acc = account(3002, dec!(10000));
    acc.start_of_day_equity = Some(dec!(10500));
    let acc = h.add(acc).await;

    h.worker()
        .process(&event(3002, vec![trade(1, 10, None, -30.0)]))
        .await
        .unwrap();

    // 9970 is above the 9000 total floor but below the 9975 daily floor.
    let stored = h.store.account(acc.id).await.unwrap();
    assert_eq!(stored.status, AccountStatus::Breached);
    assert_eq!(h.store.violations().await[0].violation_type, ViolationType::DailyLoss);
}

#[tokio::test]
async fn scenario_failed_breach_write_is_retried_on_redelivery() {
    let h = Harness::new();
    let acc = h.add(account(3008, dec!(1000))).await;
    let store = Arc::new(FlakyStore::new(h.store.clone(), 1));
    let worker = h.worker_on(store, WorkerConfig::default());
    let breaching = event(3008, vec![trade(1, 10, None, -200.0)]);

    assert!(worker.process(&breaching).await.is_err());
    settle().await;

    // Nothing of the breach was persisted, so the account is still evaluated.
    assert_eq!(h.store.account(acc.id).await.unwrap().status, AccountStatus::Active);
    assert!(h.store.violations().await.is_empty());
    assert!(h.notifier.sent().is_empty());
    assert!(h.bridge.disabled().is_empty());

    let outcome = worker.process(&breaching).await.unwrap();
    settle().await;

    assert!(matches!(outcome, EventOutcome::Evaluated { breached: true, .. }));
    assert_eq!(h.store.account(acc.id).await.unwrap().status, AccountStatus::Breached);
    assert_eq!(h.store.violations().await.len(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.bridge.disabled(), vec![Login(3008)]);
}

#[tokio::test]
async fn scenario_failed_venue_disable_is_retried_by_sweep() {
    let h = Harness::new();
    let acc = h.add(account(3009, dec!(10000))).await;
    h.bridge.fail_disables(1);

    h.worker()
        .process(&event(3009, vec![trade(1, 10, None, -1500.0)]))
        .await
        .unwrap();
    settle().await;

    assert!(h.bridge.disabled().is_empty());
    let pending = h.store.pending_venue_disables().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, acc.id);

    let sweep = DrawdownSweep::new(
        h.store.clone(),
        h.bridge.clone(),
        h.rules.clone(),
        SweepConfig::default(),
    );
    let report = sweep.run_once().await.unwrap().unwrap();
    assert_eq!(report.venue_disables, 1);
    assert_eq!(h.bridge.disabled(), vec![Login(3009)]);
    assert!(h.store.pending_venue_disables().await.unwrap().is_empty());

    let report = sweep.run_once().await.unwrap().unwrap();
    assert_eq!(report.venue_disables, 0);
    assert_eq!(h.bridge.disabled().len(), 1);
}

#[tokio::test]
async fn scenario_breach_without_venue_disable() {
    let h = Harness::new();
    h.add(account(3003, dec!(10000))).await;
    let worker = h.worker_with(WorkerConfig {
        disable_on_breach: false,
        ..Default::default()
    });

    worker
        .process(&event(3003, vec![trade(1, 10, None, -2000.0)]))
        .await
        .unwrap();
    settle().await;

    assert!(h.bridge.disabled().is_empty());
}

#[tokio::test]
async fn scenario_bridge_breach_event_goes_through_ratchet() {
    let h = Harness::new();
    let acc = h.add(account(3004, dec!(10000))).await;
    let worker = h.worker();

    let mut breach = event(3004, Vec::new());
    breach.event = Some(StatusEventKind::AccountBreached);
    breach.reason = Some("equity below limit".to_string());
    breach.equity = Some(8950.12);

    let first = worker.process(&breach).await.unwrap();
    let second = worker.process(&breach).await.unwrap();

    assert_eq!(first, EventOutcome::StatusApplied { transitioned: true });
    assert_eq!(second, EventOutcome::StatusApplied { transitioned: false });

    let stored = h.store.account(acc.id).await.unwrap();
    assert_eq!(stored.status, AccountStatus::Breached);
    assert_eq!(stored.current_equity, dec!(8950.12));

    let violations = h.store.violations().await;
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].violation_type, ViolationType::BridgeBreach);
    assert_eq!(h.notifier.sent().len(), 1);

    // The bridge already disabled it. Nothing is left for the sweep to retry.
    assert!(h.store.pending_venue_disables().await.unwrap().is_empty());
    assert!(h.bridge.disabled().is_empty());
}

#[tokio::test]
async fn scenario_pass_event_on_breached_account_is_ignored() {
    let h = Harness::new();
    let mut acc = account(3005, dec!(10000));
    acc.status = AccountStatus::Breached;
    let acc = h.add(acc).await;

    let mut passed = event(3005, Vec::new());
    passed.event = Some(StatusEventKind::AccountPassed);

    let outcome = h.worker().process(&passed).await.unwrap();
    assert_eq!(outcome, EventOutcome::StatusApplied { transitioned: false });
    assert_eq!(h.store.account(acc.id).await.unwrap().status, AccountStatus::Breached);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn scenario_profit_target_notifies_once_on_crossing() {
    let h = Harness::new();
    h.add(account(3006, dec!(10000))).await;
    let worker = h.worker();

    // 8% of 10000.
    worker
        .process(&event(3006, vec![trade(1, 10, Some(30), 850.0)]))
        .await
        .unwrap();
    worker
        .process(&event(3006, vec![trade(2, 40, None, 10.0)]))
        .await
        .unwrap();

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0],
        Notification::ProfitTargetReached { login: Login(3006), .. }
    ));
}

#[tokio::test]
async fn scenario_reinstated_account_is_active_and_enabled() {
    let h = Harness::new();
    let mut acc = account(3007, dec!(10000));
    acc.status = AccountStatus::Breached;
    let acc = h.add(acc).await;

    let admin = engine::AdminActions::new(h.store.clone(), h.bridge.clone());
    assert!(admin.reinstate(Login(3007)).await.unwrap());
    assert!(!admin.reinstate(Login(3007)).await.unwrap());

    assert_eq!(h.store.account(acc.id).await.unwrap().status, AccountStatus::Active);
    assert_eq!(*h.bridge.enabled.lock().unwrap(), vec![Login(3007)]);
}
