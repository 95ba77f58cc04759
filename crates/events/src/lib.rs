// In crates/events/src/lib.rs

pub mod error;
pub mod subscriber;
pub mod types;

pub use error::{Error, Result};
pub use subscriber::EventSubscriber;
pub use types::{RawSide, RawTrade, StatusEventKind, TradeEvent};
