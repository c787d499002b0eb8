//! Database Models
//!
//! Row types for the game store plus conversions into domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::entities::company::Company;
use crate::domain::entities::holding::Holding;
use crate::domain::entities::session::{Session, SessionStatus};
use crate::persistence::StoreError;

/// Game session row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    pub session_id: i64,
    pub user_id: i64,
    pub status: String, // "active" or "completed"
    pub start_balance: f64,
    pub current_balance: f64,
    pub start_year: i64,
    pub current_year: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRecord> for Session {
    type Error = StoreError;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        let status = SessionStatus::parse(&record.status).ok_or_else(|| {
            StoreError::Integrity(format!(
                "session {} has unknown status '{}'",
                record.session_id, record.status
            ))
        })?;
        Ok(Session {
            id: record.session_id,
            user_id: record.user_id,
            status,
            start_balance: record.start_balance,
            current_balance: record.current_balance,
            start_year: record.start_year,
            current_year: record.current_year,
            created_at: record.created_at,
            completed_at: record.completed_at,
        })
    }
}

/// Holding (ledger) row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HoldingRecord {
    pub session_id: i64,
    pub company_id: i64,
    pub year: i64,
    pub quantity: i64,
    pub avg_price: f64,
}

impl From<HoldingRecord> for Holding {
    fn from(record: HoldingRecord) -> Self {
        Holding {
            session_id: record.session_id,
            company_id: record.company_id,
            year: record.year,
            quantity: record.quantity,
            avg_price: record.avg_price,
        }
    }
}

/// Company catalog row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyRecord {
    pub company_id: i64,
    pub name: String,
}

impl From<CompanyRecord> for Company {
    fn from(record: CompanyRecord) -> Self {
        Company::new(record.company_id, record.name)
    }
}

/// Stock price row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceRecord {
    pub company_id: i64,
    pub year: i64,
    pub price: f64,
}

/// News row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NewsRecord {
    pub company_id: i64,
    pub year: i64,
    pub headline: String,
    pub content: String,
}

/// Per-user aggregate stats row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserStatsRecord {
    pub user_id: i64,
    pub total_games: i64,
    pub best_profit_rate: Option<f64>,
    pub cumulative_profit_rate: f64,
    pub points: f64,
}

/// Completed-game history row for the profile view
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GameHistoryRecord {
    pub session_id: i64,
    pub start_balance: f64,
    pub final_balance: f64,
    pub profit_rate: f64,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Leaderboard row for the final-balance board
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BalanceRankRecord {
    pub session_id: i64,
    pub user_id: i64,
    pub final_balance: f64,
    pub completed_at: DateTime<Utc>,
}

/// Leaderboard row for the rate-based boards
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RateRankRecord {
    pub user_id: i64,
    pub profit_rate: f64,
    pub total_games: i64,
}

/// Attached-company + price join row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyPriceRecord {
    pub company_id: i64,
    pub name: String,
    pub price: f64,
}

/// Prior-year vs current-year price movement for one company
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceChangeRecord {
    pub company_id: i64,
    pub company_name: String,
    pub previous_price: f64,
    pub current_price: f64,
}
