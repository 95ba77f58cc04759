// In crates/engine/src/reconciler.rs

use anyhow::Result;
use app_config::types::RiskSettings;
use chrono::{DateTime, Duration, Utc};
use core_types::{Account, Side, Trade};
use database::Store;
use events::RawTrade;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::sync::Arc;

/// Realized profit smaller than this carries no usable sign.
const PROFIT_SIGN_EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileParams {
    /// Trades older than `created_at - ghost_buffer` are discarded.
    pub ghost_buffer: Duration,
    /// Venue volume units per lot.
    pub volume_scale: Decimal,
}

impl Default for ReconcileParams {
    fn default() -> Self {
        Self {
            ghost_buffer: Duration::seconds(60),
            volume_scale: Decimal::from(10_000),
        }
    }
}

impl From<&RiskSettings> for ReconcileParams {
    fn from(settings: &RiskSettings) -> Self {
        let defaults = Self::default();
        Self {
            ghost_buffer: Duration::seconds(settings.ghost_trade_buffer_secs),
            volume_scale: Decimal::from_f64(settings.volume_scale)
                .filter(|s| *s > Decimal::ZERO)
                .unwrap_or(defaults.volume_scale),
        }
    }
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub received: usize,
    pub ghosts: usize,
    pub duplicates: usize,
    pub upserted: u64,
    pub stale_closed: u64,
    /// The trades written in this pass, after filtering and deduplication.
    pub trades: Vec<Trade>,
}

/// Resolves the trade direction.
///
/// The venue's flag is only a prior: when realized profit and the
/// open-to-close price move both have a sign, they decide. A rising price
/// with a profit, or a falling price with a loss, is a buy.
pub fn infer_side(prior: Side, open_price: f64, close_price: f64, profit: f64) -> Side {
    if prior == Side::Balance
        || open_price <= 0.0
        || close_price <= 0.0
        || profit.abs() <= PROFIT_SIGN_EPSILON
    {
        return prior;
    }

    let delta = close_price - open_price;
    if delta == 0.0 {
        return prior;
    }
    match (profit > 0.0, delta > 0.0) {
        (true, true) | (false, false) => Side::Buy,
        (true, false) | (false, true) => Side::Sell,
    }
}

fn money(value: Option<f64>) -> Decimal {
    value
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

fn price(value: Option<f64>) -> Option<Decimal> {
    value
        .filter(|p| *p > 0.0)
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp(8))
}

/// Converts a raw feed record into a ledger trade.
///
/// Missing open times fall back to `received_at`, as does the close time of a
/// record flagged closed without one.
pub fn normalize(raw: &RawTrade, account_id: uuid::Uuid, params: &ReconcileParams, received_at: DateTime<Utc>) -> Trade {
    let open_price = raw.price.unwrap_or(0.0);
    let close_price = raw.close_price.unwrap_or(0.0);
    let profit = raw.profit.unwrap_or(0.0);
    let side = infer_side(raw.side.normalize(), open_price, close_price, profit);

    let lots = match raw.lots {
        Some(lots) => Decimal::from_f64(lots).unwrap_or(Decimal::ZERO),
        None => Decimal::from_f64(raw.volume.unwrap_or(0.0)).unwrap_or(Decimal::ZERO) / params.volume_scale,
    }
    .round_dp(4);

    let close_time = match raw.close_time() {
        Some(t) => Some(t),
        None if raw.is_closed() => Some(received_at),
        None => None,
    };

    Trade {
        account_id,
        ticket: raw.ticket,
        symbol: raw.symbol.trim().to_string(),
        side,
        lots,
        open_price: price(raw.price).unwrap_or(Decimal::ZERO),
        close_price: price(raw.close_price),
        open_time: raw.open_time().unwrap_or(received_at),
        close_time,
        profit_loss: money(raw.profit),
        commission: money(raw.commission),
        swap: money(raw.swap),
    }
}

/// A record without its own timestamps keeps the ones already in the ledger,
/// so redelivering it never moves the trade in time.
pub fn keep_known_times(trade: &mut Trade, raw: &RawTrade, known: &Trade) {
    if raw.open_time().is_none() {
        trade.open_time = known.open_time;
    }
    if raw.close_time().is_none() && trade.close_time.is_some() {
        if let Some(closed) = known.close_time {
            trade.close_time = Some(closed);
        }
    }
}

/// A trade that predates the account belongs to an earlier owner of the login.
pub fn is_ghost(trade: &Trade, account_created_at: DateTime<Utc>, buffer: Duration) -> bool {
    let reference = trade.close_time.unwrap_or(trade.open_time);
    reference < account_created_at - buffer
}

/// Keeps the last record per ticket, in first-seen order.
pub fn dedup_last_wins(trades: Vec<Trade>) -> Vec<Trade> {
    let mut slots: HashMap<i64, usize> = HashMap::with_capacity(trades.len());
    let mut unique: Vec<Trade> = Vec::with_capacity(trades.len());
    for trade in trades {
        match slots.get(&trade.ticket) {
            Some(&i) => unique[i] = trade,
            None => {
                slots.insert(trade.ticket, unique.len());
                unique.push(trade);
            }
        }
    }
    unique
}

/// Brings the local ledger of one account in line with a venue batch.
pub struct LedgerReconciler {
    store: Arc<dyn Store>,
    params: ReconcileParams,
}

impl LedgerReconciler {
    pub fn new(store: Arc<dyn Store>, params: ReconcileParams) -> Self {
        Self { store, params }
    }

    /// Filters, deduplicates and upserts the batch, then closes local open
    /// trades the venue no longer reports as open.
    ///
    /// Every batch carries the venue's full set of open positions, so any
    /// locally open ticket missing from it was closed at the venue.
    pub async fn reconcile(
        &self,
        account: &Account,
        batch: &[RawTrade],
        received_at: DateTime<Utc>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport {
            received: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let missing_times = batch
            .iter()
            .any(|raw| raw.open_time().is_none() || (raw.is_closed() && raw.close_time().is_none()));
        let known: HashMap<i64, Trade> = if missing_times {
            self.store
                .ledger_trades(account.id)
                .await?
                .into_iter()
                .map(|t| (t.ticket, t))
                .collect()
        } else {
            HashMap::new()
        };

        let normalized: Vec<Trade> = batch
            .iter()
            .map(|raw| {
                let mut trade = normalize(raw, account.id, &self.params, received_at);
                if let Some(stored) = known.get(&raw.ticket) {
                    keep_known_times(&mut trade, raw, stored);
                }
                trade
            })
            .collect();

        let live_open: Vec<i64> = normalized
            .iter()
            .filter(|t| t.is_open())
            .map(|t| t.ticket)
            .collect();

        let (kept, ghosts): (Vec<Trade>, Vec<Trade>) = normalized
            .into_iter()
            .partition(|t| !is_ghost(t, account.created_at, self.params.ghost_buffer));
        report.ghosts = ghosts.len();
        if !ghosts.is_empty() {
            tracing::debug!(login = %account.login, ghosts = ghosts.len(), "Discarded trades that predate the account.");
        }

        let before = kept.len();
        let trades = dedup_last_wins(kept);
        report.duplicates = before - trades.len();

        report.upserted = self.store.upsert_trades(&trades).await?;
        report.stale_closed = self
            .store
            .close_stale_trades(account.id, &live_open, received_at)
            .await?;
        if report.stale_closed > 0 {
            tracing::info!(login = %account.login, closed = report.stale_closed, "Auto-closed trades missing from the venue's open set.");
        }

        report.trades = trades;
        Ok(report)
    }
}
