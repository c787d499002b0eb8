//! NewsGate - monetized information access
//!
//! Revealing a news item charges a fixed per-tier cost against either the
//! session's cash balance or the user's point balance, depending on
//! configuration. Pay-per-view: nothing is cached, re-invoking charges
//! again.

use serde::Serialize;
use tracing::info;

use crate::config::{GameConfig, NewsPayer};
use crate::domain::entities::news::{NewsItem, NewsTier};
use crate::domain::errors::GameError;
use crate::persistence::repository::{NewsRepository, SessionRepository, UserStatsRepository};
use crate::persistence::DbPool;

/// A paid reveal: the item plus whatever balance was charged.
#[derive(Debug, Clone, Serialize)]
pub struct NewsReveal {
    pub news: NewsItem,
    pub charged: f64,
    pub remaining_balance: f64,
}

pub struct NewsGate {
    sessions: SessionRepository,
    news: NewsRepository,
    stats: UserStatsRepository,
    config: GameConfig,
}

impl NewsGate {
    pub fn new(pool: DbPool, config: GameConfig) -> Self {
        Self {
            sessions: SessionRepository::new(pool.clone()),
            news: NewsRepository::new(pool.clone()),
            stats: UserStatsRepository::new(pool),
            config,
        }
    }

    /// Reveal the news item for (company, session's current year).
    pub async fn reveal(
        &self,
        user_id: i64,
        session_id: i64,
        company_id: i64,
        tier: NewsTier,
    ) -> Result<NewsReveal, GameError> {
        let session = self
            .sessions
            .get_owned(session_id, user_id)
            .await?
            .ok_or(GameError::SessionNotFound(session_id))?;
        session.ensure_active()?;

        if !self
            .sessions
            .is_company_attached(session_id, company_id)
            .await?
        {
            return Err(GameError::CompanyNotFound(company_id));
        }

        // Look the item up before charging anything.
        let record = self
            .news
            .get(company_id, session.current_year)
            .await?
            .ok_or(GameError::NewsNotFound {
                company_id,
                year: session.current_year,
            })?;

        let cost = self.config.news_cost(tier);
        let remaining = match self.config.news_payer {
            NewsPayer::SessionCash => {
                if session.current_balance < cost {
                    return Err(GameError::InsufficientFunds {
                        required: cost,
                        available: session.current_balance,
                    });
                }
                let new_balance = session.current_balance - cost;
                if !self
                    .sessions
                    .debit_balance(session_id, session.current_balance, new_balance)
                    .await?
                {
                    return Err(GameError::Conflict);
                }
                new_balance
            }
            NewsPayer::UserPoints => {
                let stats = self
                    .stats
                    .ensure(user_id, self.config.initial_points)
                    .await?;
                if stats.points < cost {
                    return Err(GameError::InsufficientPoints {
                        required: cost,
                        available: stats.points,
                    });
                }
                let new_points = stats.points - cost;
                if !self
                    .stats
                    .debit_points(user_id, stats.points, new_points)
                    .await?
                {
                    return Err(GameError::Conflict);
                }
                new_points
            }
        };

        info!(
            "Revealed {:?} news for company {} year {} on session {} (cost {:.2})",
            tier, company_id, session.current_year, session_id, cost
        );

        Ok(NewsReveal {
            news: NewsItem {
                company_id: record.company_id,
                year: record.year,
                headline: record.headline,
                content: match tier {
                    NewsTier::Basic => None,
                    NewsTier::Premium => Some(record.content),
                },
            },
            charged: cost,
            remaining_balance: remaining,
        })
    }
}
