// In crates/events/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Event channel error: {0}")]
    ChannelError(#[from] redis::RedisError),
    #[error("Malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
