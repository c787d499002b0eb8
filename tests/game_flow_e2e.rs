//! Full game-loop integration test: start, trade, reveal news, end turns
//! until completion, then verify the profile and the leaderboards.

use std::sync::Arc;

use stockrush::application::services::game_service::GameService;
use stockrush::application::services::news_gate::NewsGate;
use stockrush::application::services::price_timeline::{FixedPriceSource, PriceTimeline};
use stockrush::application::services::ranking::RankingService;
use stockrush::application::services::trading_engine::{TradeSide, TradingEngine};
use stockrush::application::services::turn_controller::{TurnController, TurnOutcome};
use stockrush::config::GameConfig;
use stockrush::domain::entities::news::NewsTier;
use stockrush::domain::errors::GameError;
use stockrush::persistence::init_database;
use stockrush::persistence::repository::{CompanyRepository, NewsRepository, PriceRepository};

const USER: i64 = 7;

struct App {
    game: GameService,
    trading: TradingEngine,
    news: NewsGate,
    turns: TurnController,
    ranking: RankingService,
    pool: stockrush::persistence::DbPool,
}

/// Three-company catalog, three-year game (2014-2016), every price pinned
/// to 50.
async fn app() -> App {
    let pool = init_database("sqlite::memory:").await.unwrap();
    CompanyRepository::new(pool.clone())
        .seed_if_empty(&[
            "Aurora Semiconductors",
            "Blue Harbor Shipping",
            "Cedar Peak Mining",
        ])
        .await
        .unwrap();

    let mut config = GameConfig::default();
    config.start_year = 2014;
    config.final_year = 2016;
    config.companies_per_session = 3;

    let timeline = Arc::new(PriceTimeline::new(
        PriceRepository::new(pool.clone()),
        Arc::new(FixedPriceSource(50.0)),
        config.price_min,
        config.price_max,
    ));

    App {
        game: GameService::new(pool.clone(), timeline.clone(), config.clone()),
        trading: TradingEngine::new(pool.clone()),
        news: NewsGate::new(pool.clone(), config.clone()),
        turns: TurnController::new(pool.clone(), timeline, config),
        ranking: RankingService::new(pool.clone()),
        pool,
    }
}

#[tokio::test]
async fn test_full_game_loop() {
    let app = app().await;

    // Start: balance 1000 in 2014, three priced companies.
    let started = app.game.start_game(USER).await.unwrap();
    assert_eq!(started.year, 2014);
    assert_eq!(started.balance, 1000.0);
    assert_eq!(started.companies.len(), 3);
    let company_id = started.companies[0].company_id;

    // Buy 10 shares at 50: cash drops to 500.
    let outcome = app
        .trading
        .trade(USER, started.session_id, company_id, 10, TradeSide::Buy)
        .await
        .unwrap();
    assert_eq!(outcome.session.current_balance, 500.0);

    // Reveal the basic news for this company: 50 off the session cash.
    NewsRepository::new(app.pool.clone())
        .create(
            company_id,
            2014,
            "Aurora Semiconductors lands a fab contract",
            "The new fab is expected to come online within two years.",
        )
        .await
        .unwrap();
    let reveal = app
        .news
        .reveal(USER, started.session_id, company_id, NewsTier::Basic)
        .await
        .unwrap();
    assert_eq!(reveal.charged, 50.0);
    assert_eq!(reveal.remaining_balance, 450.0);
    assert!(reveal.news.content.is_none());

    // Sell 2 back at 50: cash 550, position 8.
    let outcome = app
        .trading
        .trade(USER, started.session_id, company_id, 2, TradeSide::Sell)
        .await
        .unwrap();
    assert_eq!(outcome.session.current_balance, 550.0);
    assert_eq!(outcome.holdings[0].quantity, 8);

    let portfolio = app.game.portfolio(USER, started.session_id).await.unwrap();
    assert_eq!(portfolio.total_value, 950.0); // 550 cash + 8 * 50

    // End 2014: 8 shares liquidate at 50, balance 550 + 400 = 950.
    match app.turns.end_turn(USER, started.session_id).await.unwrap() {
        TurnOutcome::Advanced { year, balance } => {
            assert_eq!(year, 2015);
            assert_eq!(balance, 950.0);
        }
        other => panic!("expected Advanced, got {:?}", other),
    }

    // Holdings were reset and the price movement view shows flat prices.
    let state = app.game.game_state(USER, started.session_id).await.unwrap();
    assert!(state.holdings.is_empty());
    let changes = app
        .game
        .stock_changes(USER, started.session_id)
        .await
        .unwrap();
    assert_eq!(changes.len(), 3);
    assert!(changes.iter().all(|c| c.change_rate == 0.0));

    // End 2015, then 2016 completes the game.
    match app.turns.end_turn(USER, started.session_id).await.unwrap() {
        TurnOutcome::Advanced { year, .. } => assert_eq!(year, 2016),
        other => panic!("expected Advanced, got {:?}", other),
    }
    match app.turns.end_turn(USER, started.session_id).await.unwrap() {
        TurnOutcome::Completed {
            final_balance,
            profit_rate,
            ..
        } => {
            assert_eq!(final_balance, 950.0);
            assert_eq!(profit_rate, -5.0); // (950 - 1000) / 1000 * 100
        }
        other => panic!("expected Completed, got {:?}", other),
    }

    // Completed sessions reject both trades and further turns.
    let err = app
        .trading
        .trade(USER, started.session_id, company_id, 1, TradeSide::Buy)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidState(_)));
    let err = app
        .turns
        .end_turn(USER, started.session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidState(_)));

    // The profile reflects exactly one finished game.
    let profile = app.game.profile(USER).await.unwrap();
    assert_eq!(profile.stats.total_games, 1);
    assert_eq!(profile.stats.best_profit_rate, Some(-5.0));
    assert_eq!(profile.stats.cumulative_profit_rate, -5.0);
    assert_eq!(profile.best_final_balance, Some(950.0));
    assert_eq!(profile.history.len(), 1);

    // And the session now ranks on the balance board.
    let board = app.ranking.by_balance(None).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].session_id, started.session_id);
    assert_eq!(board[0].final_balance, 950.0);
}

#[tokio::test]
async fn test_two_users_are_isolated() {
    let app = app().await;

    let first = app.game.start_game(USER).await.unwrap();
    let second = app.game.start_game(USER + 1).await.unwrap();
    let company_id = first.companies[0].company_id;

    app.trading
        .trade(USER, first.session_id, company_id, 10, TradeSide::Buy)
        .await
        .unwrap();

    // The other user cannot see or drive the first session.
    let err = app
        .game
        .game_state(USER + 1, first.session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::SessionNotFound(_)));
    let err = app
        .turns
        .end_turn(USER + 1, first.session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::SessionNotFound(_)));

    // Their own session is untouched.
    let state = app.game.game_state(USER + 1, second.session_id).await.unwrap();
    assert_eq!(state.session.current_balance, 1000.0);
    assert!(state.holdings.is_empty());
}

#[tokio::test]
async fn test_prices_are_shared_across_sessions() {
    let app = app().await;

    // Both sessions see the same 2014 catalog prices: the timeline wrote
    // them once and every later reader gets the stored values.
    let first = app.game.start_game(USER).await.unwrap();
    let second = app.game.start_game(USER + 1).await.unwrap();

    for company in &first.companies {
        let other = second
            .companies
            .iter()
            .find(|c| c.company_id == company.company_id);
        if let Some(other) = other {
            assert_eq!(company.price, other.price);
        }
    }
}
