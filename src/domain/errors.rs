//! Game error taxonomy
//!
//! Every failure a game operation can report. Validation and business-rule
//! failures are detected before any mutation is attempted; store failures
//! are always surfaced, never swallowed.

use thiserror::Error;

use crate::persistence::StoreError;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("company {0} not found in this session")]
    CompanyNotFound(i64),

    #[error("no price for company {company_id} in year {year}")]
    PriceNotFound { company_id: i64, year: i64 },

    #[error("no news for company {company_id} in year {year}")]
    NewsNotFound { company_id: i64, year: i64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient points: required {required:.2}, available {available:.2}")]
    InsufficientPoints { required: f64, available: f64 },

    #[error("insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: i64, held: i64 },

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("concurrent update conflict, retry the operation")]
    Conflict,

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl GameError {
    /// Stable machine-readable kind for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::SessionNotFound(_) => "session_not_found",
            GameError::CompanyNotFound(_) => "company_not_found",
            GameError::PriceNotFound { .. } => "price_not_found",
            GameError::NewsNotFound { .. } => "news_not_found",
            GameError::InvalidInput(_) => "invalid_input",
            GameError::InsufficientFunds { .. } => "insufficient_funds",
            GameError::InsufficientPoints { .. } => "insufficient_points",
            GameError::InsufficientHoldings { .. } => "insufficient_holdings",
            GameError::InvalidState(_) => "invalid_state",
            GameError::Conflict => "conflict",
            GameError::Store(_) => "store_failure",
        }
    }
}
