// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown account status: {0}")]
    UnknownStatus(String),

    #[error("Unknown trade side: {0}")]
    UnknownSide(String),

    #[error("Unknown violation type: {0}")]
    UnknownViolationType(String),

    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),
}

pub type Result<T> = std::result::Result<T, Error>;
