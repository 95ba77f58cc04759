// In crates/events/src/types.rs

use chrono::{DateTime, TimeZone, Utc};
use core_types::{Login, Side};
use serde::Deserialize;

/// Side as sent by the venue: a numeric deal code or a label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawSide {
    Code(i64),
    Label(String),
}

impl RawSide {
    /// `0`/`buy` and `1`/`sell` are market trades; every other code is a
    /// balance, credit or correction operation.
    pub fn normalize(&self) -> Side {
        match self {
            RawSide::Code(0) => Side::Buy,
            RawSide::Code(1) => Side::Sell,
            RawSide::Code(_) => Side::Balance,
            RawSide::Label(label) => match label.trim().to_ascii_lowercase().as_str() {
                "0" | "buy" => Side::Buy,
                "1" | "sell" => Side::Sell,
                _ => Side::Balance,
            },
        }
    }
}

impl Default for RawSide {
    fn default() -> Self {
        RawSide::Code(0)
    }
}

/// A trade or position exactly as the venue feed reports it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTrade {
    pub ticket: i64,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "type", default)]
    pub side: RawSide,
    /// Venue volume units (1 lot = `volume_scale` units).
    #[serde(default)]
    pub volume: Option<f64>,
    /// Some producers send lots directly instead of volume.
    #[serde(default)]
    pub lots: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, alias = "current_price")]
    pub close_price: Option<f64>,
    #[serde(default)]
    pub profit: Option<f64>,
    #[serde(default)]
    pub commission: Option<f64>,
    #[serde(default)]
    pub swap: Option<f64>,
    /// Open time, unix seconds.
    #[serde(default)]
    pub time: Option<i64>,
    /// Close time, unix seconds. Absent or zero while open.
    #[serde(default)]
    pub close_time: Option<i64>,
    #[serde(default)]
    pub is_closed: Option<bool>,
}

impl RawTrade {
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        self.time.filter(|t| *t > 0).and_then(unix_seconds)
    }

    pub fn close_time(&self) -> Option<DateTime<Utc>> {
        self.close_time.filter(|t| *t > 0).and_then(unix_seconds)
    }

    /// A trade is closed when the feed says so or carries a close time.
    pub fn is_closed(&self) -> bool {
        self.is_closed.unwrap_or(false) || self.close_time().is_some()
    }
}

fn unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Account lifecycle notices originating at the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEventKind {
    AccountPassed,
    AccountBreached,
}

/// One message on the trade event channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeEvent {
    pub login: Login,
    #[serde(default)]
    pub trades: Vec<RawTrade>,
    /// Publish time, unix milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub event: Option<StatusEventKind>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub equity: Option<f64>,
}

impl TradeEvent {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .filter(|ms| *ms > 0)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_feed_batch_with_mixed_side_encodings() {
        let payload = r#"{
            "login": 889225368,
            "timestamp": 1717000000000,
            "trades": [
                {"ticket": 11, "symbol": "XAUUSD", "type": 0, "volume": 10000, "price": 2300.5,
                 "close_price": null, "profit": 12.5, "commission": -3.5, "swap": 0,
                 "time": 1716990000, "close_time": null, "is_closed": false},
                {"ticket": 12, "symbol": "EURUSD", "type": "sell", "volume": 5000, "price": 1.08,
                 "close_price": 1.07, "profit": 50.0, "time": 1716980000, "close_time": 1716985000},
                {"ticket": 13, "symbol": "", "type": 2, "volume": 0, "profit": 5000, "time": 1716900000}
            ]
        }"#;

        let event: TradeEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.login, Login(889225368));
        assert_eq!(event.trades.len(), 3);
        assert!(event.published_at().is_some());

        let open = &event.trades[0];
        assert_eq!(open.side.normalize(), Side::Buy);
        assert!(!open.is_closed());

        let closed = &event.trades[1];
        assert_eq!(closed.side.normalize(), Side::Sell);
        assert!(closed.is_closed());

        assert_eq!(event.trades[2].side.normalize(), Side::Balance);
    }

    #[test]
    fn decodes_bridge_status_event() {
        let payload = r#"{"event": "account_breached", "login": 5001, "reason": "equity below limit", "equity": 8950.12}"#;
        let event: TradeEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.event, Some(StatusEventKind::AccountBreached));
        assert!(event.trades.is_empty());
        assert_eq!(event.equity, Some(8950.12));
    }

    #[test]
    fn zero_close_time_means_open() {
        let trade = RawTrade {
            ticket: 1,
            close_time: Some(0),
            ..Default::default()
        };
        assert!(!trade.is_closed());
        assert!(trade.open_time().is_none());
    }
}
