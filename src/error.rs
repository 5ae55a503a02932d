use chrono::NaiveDate;
use std::result;
use thiserror::Error;

pub type Result<T> = result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid date range: start {start} is after end {end}")]
    Range { start: NaiveDate, end: NaiveDate },
    #[error("cannot go back {days} days from {end}")]
    RangeOverflow { end: NaiveDate, days: u32 },
    #[error("login rejected by {provider}: {cause}")]
    Auth { provider: String, cause: String },
    #[error("cannot reach {endpoint}: {cause}")]
    Network { endpoint: String, cause: String },
    #[error("a fetch is already in progress")]
    Busy,
    #[error("fetch cancelled")]
    Cancelled,
    #[error("invalid provider: {0}")]
    InvalidProvider(String),
    #[error("cannot start fetch worker")]
    Spawn(#[source] std::io::Error),
}

impl FetchError {
    pub fn network(endpoint: impl Into<String>, cause: impl ToString) -> Self {
        FetchError::Network {
            endpoint: endpoint.into(),
            cause: cause.to_string(),
        }
    }

    pub fn auth(provider: impl Into<String>, cause: impl ToString) -> Self {
        FetchError::Auth {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }
}
