//! TradingEngine - validates and applies buy/sell requests
//!
//! All checks run before any mutation; balance and ledger then move in one
//! atomic store operation. A buy that exceeds the balance or a sell that
//! exceeds the held quantity is rejected, never clamped.

use serde::Serialize;
use tracing::info;

use crate::domain::entities::holding::Holding;
use crate::domain::entities::session::Session;
use crate::domain::errors::GameError;
use crate::domain::services::valuation;
use crate::domain::value_objects::quantity::Quantity;
use crate::persistence::repository::{PriceRepository, SessionRepository, TradeUpdate};
use crate::persistence::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn parse(s: &str) -> Result<Self, GameError> {
        match s {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(GameError::InvalidInput(format!(
                "unknown trade side '{}', expected 'buy' or 'sell'",
                other
            ))),
        }
    }
}

/// Result of a successful trade: the refreshed session and ledger snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TradeOutcome {
    pub session: Session,
    pub holdings: Vec<Holding>,
}

pub struct TradingEngine {
    sessions: SessionRepository,
    prices: PriceRepository,
}

impl TradingEngine {
    pub fn new(pool: DbPool) -> Self {
        Self {
            sessions: SessionRepository::new(pool.clone()),
            prices: PriceRepository::new(pool),
        }
    }

    /// Execute one trade on behalf of `user_id`.
    pub async fn trade(
        &self,
        user_id: i64,
        session_id: i64,
        company_id: i64,
        quantity: i64,
        side: TradeSide,
    ) -> Result<TradeOutcome, GameError> {
        let quantity = Quantity::new(quantity)?;

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

        let price = self
            .prices
            .get(company_id, session.current_year)
            .await?
            .ok_or(GameError::PriceNotFound {
                company_id,
                year: session.current_year,
            })?;

        let held = self.sessions.holding_for(session_id, company_id).await?;
        let total = quantity.value() as f64 * price;

        let update = match side {
            TradeSide::Buy => {
                if total > session.current_balance {
                    return Err(GameError::InsufficientFunds {
                        required: total,
                        available: session.current_balance,
                    });
                }
                let (held_qty, held_avg) =
                    held.map(|h| (h.quantity, h.avg_price)).unwrap_or((0, 0.0));
                TradeUpdate {
                    session_id,
                    expected_balance: session.current_balance,
                    new_balance: session.current_balance - total,
                    company_id,
                    year: session.current_year,
                    new_quantity: held_qty + quantity.value(),
                    avg_price: valuation::weighted_average_cost(
                        held_qty,
                        held_avg,
                        quantity.value(),
                        price,
                    ),
                }
            }
            TradeSide::Sell => {
                let holding = held.ok_or(GameError::InsufficientHoldings {
                    requested: quantity.value(),
                    held: 0,
                })?;
                if holding.quantity < quantity.value() {
                    return Err(GameError::InsufficientHoldings {
                        requested: quantity.value(),
                        held: holding.quantity,
                    });
                }
                TradeUpdate {
                    session_id,
                    expected_balance: session.current_balance,
                    new_balance: session.current_balance + total,
                    company_id,
                    year: session.current_year,
                    new_quantity: holding.quantity - quantity.value(),
                    avg_price: holding.avg_price,
                }
            }
        };

        if !self.sessions.apply_trade(update).await? {
            return Err(GameError::Conflict);
        }

        info!(
            "Trade on session {}: {:?} {} of company {} at {:.2}",
            session_id,
            side,
            quantity.value(),
            company_id,
            price
        );

        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(GameError::SessionNotFound(session_id))?;
        let holdings = self.sessions.holdings(session_id).await?;

        Ok(TradeOutcome { session, holdings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use crate::persistence::repository::CompanyRepository;

    const USER: i64 = 7;

    async fn setup() -> (TradingEngine, SessionRepository, i64, Vec<i64>) {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let companies = CompanyRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["Aurora Semiconductors", "Blue Harbor Shipping"] {
            ids.push(companies.create(name).await.unwrap().company_id);
        }

        let sessions = SessionRepository::new(pool.clone());
        let session_id = sessions.create(USER, 1000.0, 2014, &ids).await.unwrap();

        let prices = PriceRepository::new(pool.clone());
        prices.set_if_absent(ids[0], 2014, 50.0).await.unwrap();
        prices.set_if_absent(ids[1], 2014, 25.0).await.unwrap();

        (TradingEngine::new(pool), sessions, session_id, ids)
    }

    #[tokio::test]
    async fn test_buy_conserves_money_and_shares() {
        let (engine, _, session_id, ids) = setup().await;

        let outcome = engine
            .trade(USER, session_id, ids[0], 10, TradeSide::Buy)
            .await
            .unwrap();

        // balance down by exactly 10 * 50, holding up by exactly 10
        assert_eq!(outcome.session.current_balance, 500.0);
        assert_eq!(outcome.holdings.len(), 1);
        assert_eq!(outcome.holdings[0].quantity, 10);
        assert_eq!(outcome.holdings[0].avg_price, 50.0);
    }

    #[tokio::test]
    async fn test_buy_insufficient_funds_is_rejected_not_clamped() {
        let (engine, sessions, session_id, ids) = setup().await;

        let err = engine
            .trade(USER, session_id, ids[0], 21, TradeSide::Buy) // 21 * 50 = 1050
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { .. }));

        // nothing moved
        let session = sessions.get(session_id).await.unwrap().unwrap();
        assert_eq!(session.current_balance, 1000.0);
        assert!(sessions.holdings(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sell_conserves_money_and_shares() {
        let (engine, _, session_id, ids) = setup().await;

        engine
            .trade(USER, session_id, ids[0], 10, TradeSide::Buy)
            .await
            .unwrap();
        let outcome = engine
            .trade(USER, session_id, ids[0], 4, TradeSide::Sell)
            .await
            .unwrap();

        assert_eq!(outcome.session.current_balance, 700.0); // 500 + 4 * 50
        assert_eq!(outcome.holdings[0].quantity, 6);
    }

    #[tokio::test]
    async fn test_sell_more_than_held_is_rejected() {
        let (engine, _, session_id, ids) = setup().await;

        engine
            .trade(USER, session_id, ids[0], 5, TradeSide::Buy)
            .await
            .unwrap();
        let err = engine
            .trade(USER, session_id, ids[0], 6, TradeSide::Sell)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientHoldings {
                requested: 6,
                held: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_sell_without_holding_is_rejected() {
        let (engine, _, session_id, ids) = setup().await;

        let err = engine
            .trade(USER, session_id, ids[1], 1, TradeSide::Sell)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientHoldings { held: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_buy_updates_weighted_average_price() {
        let (engine, sessions, session_id, ids) = setup().await;

        engine
            .trade(USER, session_id, ids[0], 10, TradeSide::Buy)
            .await
            .unwrap();

        // manually move the holding to a different average, then buy more
        sessions
            .apply_trade(TradeUpdate {
                session_id,
                expected_balance: 500.0,
                new_balance: 500.0,
                company_id: ids[0],
                year: 2014,
                new_quantity: 10,
                avg_price: 30.0,
            })
            .await
            .unwrap();

        let outcome = engine
            .trade(USER, session_id, ids[0], 10, TradeSide::Buy)
            .await
            .unwrap();
        // 10 at 30 plus 10 at 50 averages to 40
        assert_eq!(outcome.holdings[0].avg_price, 40.0);
        assert_eq!(outcome.holdings[0].quantity, 20);
    }

    #[tokio::test]
    async fn test_trade_rejects_non_positive_quantity() {
        let (engine, _, session_id, ids) = setup().await;

        for qty in [0, -3] {
            let err = engine
                .trade(USER, session_id, ids[0], qty, TradeSide::Buy)
                .await
                .unwrap_err();
            assert!(matches!(err, GameError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn test_trade_rejects_unattached_company() {
        let (engine, _, session_id, _) = setup().await;

        let err = engine
            .trade(USER, session_id, 9999, 1, TradeSide::Buy)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::CompanyNotFound(9999)));
    }

    #[tokio::test]
    async fn test_trade_rejects_foreign_session() {
        let (engine, _, session_id, ids) = setup().await;

        let err = engine
            .trade(USER + 1, session_id, ids[0], 1, TradeSide::Buy)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_trade_rejects_missing_price() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let company = CompanyRepository::new(pool.clone())
            .create("Cedar Peak Mining")
            .await
            .unwrap();
        let sessions = SessionRepository::new(pool.clone());
        let session_id = sessions
            .create(USER, 1000.0, 2014, &[company.company_id])
            .await
            .unwrap();

        let engine = TradingEngine::new(pool);
        let err = engine
            .trade(USER, session_id, company.company_id, 1, TradeSide::Buy)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PriceNotFound { .. }));
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(TradeSide::parse("buy").unwrap(), TradeSide::Buy);
        assert_eq!(TradeSide::parse("sell").unwrap(), TradeSide::Sell);
        assert!(TradeSide::parse("short").is_err());
    }
}
