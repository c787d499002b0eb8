//! TurnController - advances a session to the next year
//!
//! Ending a turn values every holding at the next year's price (implicit
//! full liquidation), rolls the proceeds into the balance, clears the
//! ledger, and either advances the year or completes the game. State
//! machine: active -> active (year+1) while the next year is playable,
//! active -> completed once it is not; no transition out of completed and
//! no transition skips a year.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::GameConfig;
use crate::domain::errors::GameError;
use crate::domain::services::valuation;
use crate::persistence::repository::SessionRepository;
use crate::persistence::DbPool;

use super::price_timeline::PriceTimeline;

/// What ending a turn produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TurnOutcome {
    Advanced {
        year: i64,
        balance: f64,
    },
    Completed {
        year: i64,
        final_balance: f64,
        profit_rate: f64,
    },
}

pub struct TurnController {
    sessions: SessionRepository,
    timeline: Arc<PriceTimeline>,
    config: GameConfig,
}

impl TurnController {
    pub fn new(pool: DbPool, timeline: Arc<PriceTimeline>, config: GameConfig) -> Self {
        Self {
            sessions: SessionRepository::new(pool),
            timeline,
            config,
        }
    }

    /// End the current turn of a session.
    pub async fn end_turn(&self, user_id: i64, session_id: i64) -> Result<TurnOutcome, GameError> {
        let session = self
            .sessions
            .get_owned(session_id, user_id)
            .await?
            .ok_or(GameError::SessionNotFound(session_id))?;
        session.ensure_active()?;

        let next_year = session.current_year + 1;

        // Materialize next-year prices before valuing anything, so the
        // valuation-then-commit sequence only reads immutable data.
        let company_ids = self.sessions.company_ids(session_id).await?;
        self.timeline
            .materialize_year(&company_ids, next_year)
            .await?;

        let holdings = self.sessions.holdings(session_id).await?;
        let mut entries = Vec::with_capacity(holdings.len());
        for holding in &holdings {
            let price = self.timeline.price_of(holding.company_id, next_year).await?;
            entries.push((holding.quantity, price));
        }
        let new_balance = session.current_balance + valuation::ledger_value(&entries);

        if next_year > self.config.final_year {
            let profit_rate = valuation::profit_rate(session.start_balance, new_balance);
            let completed = self
                .sessions
                .complete(
                    session_id,
                    session.user_id,
                    session.current_year,
                    session.current_balance,
                    next_year,
                    new_balance,
                    Utc::now(),
                    profit_rate,
                    self.config.initial_points,
                )
                .await?;
            if !completed {
                return Err(GameError::Conflict);
            }

            info!(
                "Session {} completed: final balance {:.2}, profit rate {:.2}%",
                session_id, new_balance, profit_rate
            );
            Ok(TurnOutcome::Completed {
                year: next_year,
                final_balance: new_balance,
                profit_rate,
            })
        } else {
            let advanced = self
                .sessions
                .advance_turn(
                    session_id,
                    session.current_year,
                    session.current_balance,
                    next_year,
                    new_balance,
                )
                .await?;
            if !advanced {
                return Err(GameError::Conflict);
            }

            info!(
                "Session {} advanced to year {} with balance {:.2}",
                session_id, next_year, new_balance
            );
            Ok(TurnOutcome::Advanced {
                year: next_year,
                balance: new_balance,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::price_timeline::FixedPriceSource;
    use crate::application::services::trading_engine::{TradeSide, TradingEngine};
    use crate::persistence::init_database;
    use crate::persistence::repository::{
        CompanyRepository, PriceRepository, UserStatsRepository,
    };

    const USER: i64 = 7;

    struct Fixture {
        pool: crate::persistence::DbPool,
        controller: TurnController,
        sessions: SessionRepository,
        session_id: i64,
        company_ids: Vec<i64>,
    }

    /// Build a fixture with every price pinned to `price` and the session
    /// already sitting in `current_year`.
    async fn setup(current_year: i64, price: f64) -> Fixture {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let companies = CompanyRepository::new(pool.clone());
        let mut company_ids = Vec::new();
        for name in ["Aurora Semiconductors", "Blue Harbor Shipping"] {
            company_ids.push(companies.create(name).await.unwrap().company_id);
        }

        let sessions = SessionRepository::new(pool.clone());
        let session_id = sessions
            .create(USER, 1000.0, current_year, &company_ids)
            .await
            .unwrap();

        let mut config = GameConfig::default();
        config.start_year = 2014;
        config.final_year = 2023;

        let timeline = Arc::new(PriceTimeline::new(
            PriceRepository::new(pool.clone()),
            Arc::new(FixedPriceSource(price)),
            config.price_min,
            config.price_max,
        ));
        timeline
            .materialize_year(&company_ids, current_year)
            .await
            .unwrap();

        let controller = TurnController::new(pool.clone(), timeline, config);
        Fixture {
            pool,
            controller,
            sessions,
            session_id,
            company_ids,
        }
    }

    #[tokio::test]
    async fn test_valuation_rolls_holdings_into_balance() {
        // balance 1000, 10 shares bought at 50 leave 500 cash; next-year
        // price is also 50, so valuation returns to 1000
        let fixture = setup(2014, 50.0).await;
        let engine = TradingEngine::new(fixture.pool.clone());
        engine
            .trade(USER, fixture.session_id, fixture.company_ids[0], 10, TradeSide::Buy)
            .await
            .unwrap();

        let outcome = fixture
            .controller
            .end_turn(USER, fixture.session_id)
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Advanced { year, balance } => {
                assert_eq!(year, 2015);
                assert_eq!(balance, 1000.0); // 500 cash + 10 * 50
            }
            other => panic!("expected Advanced, got {:?}", other),
        }

        // ledger reset, year advanced exactly one
        let session = fixture
            .sessions
            .get(fixture.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.current_year, 2015);
        assert!(fixture
            .sessions
            .holdings(fixture.session_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_concrete_valuation_from_seeded_ledger() {
        // session with balance 1000 and a seeded holding of 10 shares;
        // next-year price 50 -> new balance 1500
        let fixture = setup(2014, 50.0).await;
        fixture
            .sessions
            .apply_trade(crate::persistence::repository::TradeUpdate {
                session_id: fixture.session_id,
                expected_balance: 1000.0,
                new_balance: 1000.0,
                company_id: fixture.company_ids[0],
                year: 2014,
                new_quantity: 10,
                avg_price: 40.0,
            })
            .await
            .unwrap();

        let outcome = fixture
            .controller
            .end_turn(USER, fixture.session_id)
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Advanced { year, balance } => {
                assert_eq!(year, 2015);
                assert_eq!(balance, 1500.0);
            }
            other => panic!("expected Advanced, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completion_in_final_year() {
        let fixture = setup(2023, 50.0).await;

        let outcome = fixture
            .controller
            .end_turn(USER, fixture.session_id)
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Completed {
                year,
                final_balance,
                profit_rate,
            } => {
                assert_eq!(year, 2024);
                assert_eq!(final_balance, 1000.0); // no holdings, cash carries over
                assert_eq!(profit_rate, 0.0);
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        let session = fixture
            .sessions
            .get(fixture.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!session.is_active());
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_completion_profit_rate_and_stats() {
        // start 1000; seeded holding of 10 shares valued at 50 at the final
        // boundary -> final balance 1500, profit rate 50%
        let fixture = setup(2023, 50.0).await;
        fixture
            .sessions
            .apply_trade(crate::persistence::repository::TradeUpdate {
                session_id: fixture.session_id,
                expected_balance: 1000.0,
                new_balance: 1000.0,
                company_id: fixture.company_ids[0],
                year: 2023,
                new_quantity: 10,
                avg_price: 40.0,
            })
            .await
            .unwrap();

        let outcome = fixture
            .controller
            .end_turn(USER, fixture.session_id)
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Completed {
                final_balance,
                profit_rate,
                ..
            } => {
                assert_eq!(final_balance, 1500.0);
                assert_eq!(profit_rate, 50.0);
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        let stats = UserStatsRepository::new(fixture.pool.clone());
        let record = stats.get(USER).await.unwrap().unwrap();
        assert_eq!(record.total_games, 1);
        assert_eq!(record.best_profit_rate, Some(50.0));
    }

    #[tokio::test]
    async fn test_completed_session_rejects_further_turns() {
        let fixture = setup(2023, 50.0).await;
        fixture
            .controller
            .end_turn(USER, fixture.session_id)
            .await
            .unwrap();

        let err = fixture
            .controller
            .end_turn(USER, fixture.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        // balance never changes again
        let session = fixture
            .sessions
            .get(fixture.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.current_balance, 1000.0);
    }

    #[tokio::test]
    async fn test_turn_advances_exactly_one_year() {
        let fixture = setup(2014, 50.0).await;

        for expected_year in [2015, 2016, 2017] {
            let outcome = fixture
                .controller
                .end_turn(USER, fixture.session_id)
                .await
                .unwrap();
            match outcome {
                TurnOutcome::Advanced { year, .. } => assert_eq!(year, expected_year),
                other => panic!("expected Advanced, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_end_turn_unknown_session() {
        let fixture = setup(2014, 50.0).await;
        let err = fixture.controller.end_turn(USER, 9999).await.unwrap_err();
        assert!(matches!(err, GameError::SessionNotFound(9999)));
    }
}
