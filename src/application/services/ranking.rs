//! Ranking service - read-only leaderboards
//!
//! Three boards over completed games: best final balance per session, best
//! single-game profit rate per user and cumulative (mean) profit rate per
//! user. Active sessions are never eligible.

use crate::domain::errors::GameError;
use crate::persistence::models::{BalanceRankRecord, RateRankRecord};
use crate::persistence::repository::RankingRepository;
use crate::persistence::DbPool;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

pub struct RankingService {
    ranking: RankingRepository,
}

impl RankingService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            ranking: RankingRepository::new(pool),
        }
    }

    fn clamp_limit(limit: Option<i64>) -> i64 {
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub async fn by_balance(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<BalanceRankRecord>, GameError> {
        Ok(self
            .ranking
            .top_sessions_by_balance(Self::clamp_limit(limit))
            .await?)
    }

    pub async fn by_best_rate(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<RateRankRecord>, GameError> {
        Ok(self
            .ranking
            .top_users_by_best_rate(Self::clamp_limit(limit))
            .await?)
    }

    pub async fn by_cumulative_rate(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<RateRankRecord>, GameError> {
        Ok(self
            .ranking
            .top_users_by_cumulative_rate(Self::clamp_limit(limit))
            .await?)
    }
}
