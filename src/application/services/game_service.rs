//! GameService - session lifecycle and read views
//!
//! Starting a game picks a random company subset, materializes the start
//! year's prices and then creates the session, so a session is never
//! visible without prices for its current year. The read operations
//! assemble the views the client renders: state, portfolio, year-over-year
//! price movements and the user profile.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::GameConfig;
use crate::domain::entities::holding::Holding;
use crate::domain::entities::session::Session;
use crate::domain::errors::GameError;
use crate::persistence::models::{CompanyPriceRecord, GameHistoryRecord, UserStatsRecord};
use crate::persistence::repository::{CompanyRepository, SessionRepository, UserStatsRepository};
use crate::persistence::{DbPool, StoreError};

use super::price_timeline::PriceTimeline;

#[derive(Debug, Clone, Serialize)]
pub struct StartedGame {
    pub session_id: i64,
    pub year: i64,
    pub balance: f64,
    pub companies: Vec<CompanyPriceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    pub session: Session,
    pub companies: Vec<CompanyPriceRecord>,
    pub holdings: Vec<Holding>,
}

/// One valued position in the portfolio view.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioLine {
    pub company_id: i64,
    pub company_name: String,
    pub quantity: i64,
    pub avg_price: f64,
    pub current_price: f64,
    pub value: f64,
    pub profit_loss: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub session_id: i64,
    pub year: i64,
    pub balance: f64,
    pub positions: Vec<PortfolioLine>,
    /// Cash plus the value of every position at current prices.
    pub total_value: f64,
}

/// Year-over-year movement of one attached company.
#[derive(Debug, Clone, Serialize)]
pub struct StockChange {
    pub company_id: i64,
    pub company_name: String,
    pub previous_price: f64,
    pub current_price: f64,
    pub change_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: i64,
    pub stats: UserStatsRecord,
    pub best_final_balance: Option<f64>,
    pub history: Vec<GameHistoryRecord>,
}

pub struct GameService {
    companies: CompanyRepository,
    sessions: SessionRepository,
    stats: UserStatsRepository,
    timeline: Arc<PriceTimeline>,
    config: GameConfig,
}

impl GameService {
    pub fn new(pool: DbPool, timeline: Arc<PriceTimeline>, config: GameConfig) -> Self {
        Self {
            companies: CompanyRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            stats: UserStatsRepository::new(pool),
            timeline,
            config,
        }
    }

    /// Start a new session for `user_id`.
    pub async fn start_game(&self, user_id: i64) -> Result<StartedGame, GameError> {
        let picked = self
            .companies
            .pick_random(self.config.companies_per_session)
            .await?;
        if (picked.len() as i64) < self.config.companies_per_session {
            return Err(GameError::Store(StoreError::Integrity(format!(
                "company catalog holds {} companies, {} required per session",
                picked.len(),
                self.config.companies_per_session
            ))));
        }
        let company_ids: Vec<i64> = picked.iter().map(|c| c.company_id).collect();

        // Prices first, session second.
        self.timeline
            .materialize_year(&company_ids, self.config.start_year)
            .await?;

        let session_id = self
            .sessions
            .create(
                user_id,
                self.config.start_balance,
                self.config.start_year,
                &company_ids,
            )
            .await?;

        // First touch of the game also creates the user's stats row.
        self.stats
            .ensure(user_id, self.config.initial_points)
            .await?;

        let companies = self
            .sessions
            .companies_with_prices(session_id, self.config.start_year)
            .await?;

        info!(
            "Started session {} for user {} with {} companies",
            session_id,
            user_id,
            companies.len()
        );

        Ok(StartedGame {
            session_id,
            year: self.config.start_year,
            balance: self.config.start_balance,
            companies,
        })
    }

    /// Full state of a session: the session row, the attached companies
    /// priced at the current year, and the ledger.
    pub async fn game_state(&self, user_id: i64, session_id: i64) -> Result<GameState, GameError> {
        let session = self
            .sessions
            .get_owned(session_id, user_id)
            .await?
            .ok_or(GameError::SessionNotFound(session_id))?;

        let companies = self
            .sessions
            .companies_with_prices(session_id, session.current_year)
            .await?;
        let holdings = self.sessions.holdings(session_id).await?;

        Ok(GameState {
            session,
            companies,
            holdings,
        })
    }

    /// Holdings valued at the current year's prices.
    pub async fn portfolio(&self, user_id: i64, session_id: i64) -> Result<Portfolio, GameError> {
        let session = self
            .sessions
            .get_owned(session_id, user_id)
            .await?
            .ok_or(GameError::SessionNotFound(session_id))?;

        let priced = self
            .sessions
            .companies_with_prices(session_id, session.current_year)
            .await?;
        let holdings = self.sessions.holdings(session_id).await?;

        let mut positions = Vec::with_capacity(holdings.len());
        for holding in &holdings {
            let company = priced
                .iter()
                .find(|c| c.company_id == holding.company_id)
                .ok_or(GameError::PriceNotFound {
                    company_id: holding.company_id,
                    year: session.current_year,
                })?;
            let value = holding.value_at(company.price);
            positions.push(PortfolioLine {
                company_id: holding.company_id,
                company_name: company.name.clone(),
                quantity: holding.quantity,
                avg_price: holding.avg_price,
                current_price: company.price,
                value,
                profit_loss: value - holding.quantity as f64 * holding.avg_price,
            });
        }

        let total_value = session.current_balance + positions.iter().map(|p| p.value).sum::<f64>();
        Ok(Portfolio {
            session_id,
            year: session.current_year,
            balance: session.current_balance,
            positions,
            total_value,
        })
    }

    /// Price movement of every attached company from the previous year to
    /// the current one. Empty in the start year.
    pub async fn stock_changes(
        &self,
        user_id: i64,
        session_id: i64,
    ) -> Result<Vec<StockChange>, GameError> {
        let session = self
            .sessions
            .get_owned(session_id, user_id)
            .await?
            .ok_or(GameError::SessionNotFound(session_id))?;

        let changes = self
            .sessions
            .price_changes(session_id, session.current_year)
            .await?;

        Ok(changes
            .into_iter()
            .map(|c| StockChange {
                company_id: c.company_id,
                company_name: c.company_name,
                previous_price: c.previous_price,
                current_price: c.current_price,
                change_rate: (c.current_price - c.previous_price) / c.previous_price * 100.0,
            })
            .collect())
    }

    /// Aggregate stats plus the most recent completed games.
    pub async fn profile(&self, user_id: i64) -> Result<Profile, GameError> {
        let stats = self
            .stats
            .ensure(user_id, self.config.initial_points)
            .await?;
        let best_final_balance = self.sessions.best_final_balance(user_id).await?;
        let history = self.sessions.history_for_user(user_id, 10).await?;

        Ok(Profile {
            user_id,
            stats,
            best_final_balance,
            history,
        })
    }
}
