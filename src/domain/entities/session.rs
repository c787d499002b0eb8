//! Session entity - one playthrough belonging to one user
//!
//! The aggregate root of the game core. Invariants:
//! - current_balance stays non-negative while the session is active
//! - current_year is monotonically non-decreasing, advanced one year at a time
//! - completed_at is set exactly once, together with the status transition
//! - start_balance is immutable after creation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::GameError;
use crate::domain::services::valuation;

/// Session lifecycle status. There is no transition out of `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub status: SessionStatus,
    pub start_balance: f64,
    pub current_balance: f64,
    pub start_year: i64,
    pub current_year: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Reject operations on a session that has already finished.
    pub fn ensure_active(&self) -> Result<(), GameError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(GameError::InvalidState(format!(
                "session {} is already completed",
                self.id
            )))
        }
    }

    /// Percentage change from start to current balance. Only meaningful
    /// once the session has completed.
    pub fn profit_rate(&self) -> Option<f64> {
        match self.status {
            SessionStatus::Completed => Some(valuation::profit_rate(
                self.start_balance,
                self.current_balance,
            )),
            SessionStatus::Active => None,
        }
    }
}
