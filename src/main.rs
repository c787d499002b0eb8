use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockrush::application::services::game_service::GameService;
use stockrush::application::services::news_gate::NewsGate;
use stockrush::application::services::price_timeline::{PriceTimeline, UniformPriceSource};
use stockrush::application::services::ranking::RankingService;
use stockrush::application::services::trading_engine::{TradeSide, TradingEngine};
use stockrush::application::services::turn_controller::TurnController;
use stockrush::auth::{self, AuthUser};
use stockrush::config::{GameConfig, DEFAULT_CATALOG};
use stockrush::domain::entities::news::NewsTier;
use stockrush::domain::errors::GameError;
use stockrush::persistence::repository::{CompanyRepository, PriceRepository};
use stockrush::persistence::init_database;

struct AppState {
    game: GameService,
    trading: TradingEngine,
    news: NewsGate,
    turns: TurnController,
    ranking: RankingService,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockrush=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    auth::init_jwt_secret();

    let config = GameConfig::from_env();
    info!(
        "Stockrush game server starting: years {}-{}, start balance {:.2}",
        config.start_year, config.final_year, config.start_balance
    );

    let pool = init_database(&config.database_url).await?;

    let seeded = CompanyRepository::new(pool.clone())
        .seed_if_empty(DEFAULT_CATALOG)
        .await?;
    if seeded > 0 {
        info!("Seeded {} companies into an empty catalog", seeded);
    }

    let timeline = Arc::new(PriceTimeline::new(
        PriceRepository::new(pool.clone()),
        Arc::new(UniformPriceSource),
        config.price_min,
        config.price_max,
    ));

    let state = Arc::new(AppState {
        game: GameService::new(pool.clone(), timeline.clone(), config.clone()),
        trading: TradingEngine::new(pool.clone()),
        news: NewsGate::new(pool.clone(), config.clone()),
        turns: TurnController::new(pool.clone(), timeline, config.clone()),
        ranking: RankingService::new(pool),
    });

    let protected = Router::new()
        .route("/game/start", post(start_game))
        .route("/game/state/:session_id", get(game_state))
        .route("/game/trade", post(trade))
        .route("/game/portfolio/:session_id", get(portfolio))
        .route("/game/news/:session_id/:company_id/:tier", get(reveal_news))
        .route("/game/end-turn/:session_id", post(end_turn))
        .route("/game/stock-changes/:session_id", get(stock_changes))
        .route("/profile", get(profile))
        .route_layer(middleware::from_fn(auth::require_auth));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ranking/balance", get(ranking_balance))
        .route("/ranking/best-rate", get(ranking_best_rate))
        .route("/ranking/cumulative-rate", get(ranking_cumulative_rate))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(16 * 1024)),
        )
        .with_state(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shut down gracefully");
    Ok(())
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(err: GameError) -> ApiError {
    let status = match &err {
        GameError::SessionNotFound(_)
        | GameError::CompanyNotFound(_)
        | GameError::PriceNotFound { .. }
        | GameError::NewsNotFound { .. } => StatusCode::NOT_FOUND,
        GameError::InvalidInput(_)
        | GameError::InsufficientFunds { .. }
        | GameError::InsufficientPoints { .. }
        | GameError::InsufficientHoldings { .. } => StatusCode::BAD_REQUEST,
        GameError::InvalidState(_) | GameError::Conflict => StatusCode::CONFLICT,
        GameError::Store(e) => {
            error!("Store failure surfaced to the API: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(serde_json::json!({
            "error": err.kind(),
            "message": err.to_string(),
        })),
    )
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "running" }))
}

/// Start a new game session for the authenticated user
async fn start_game(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let started = state
        .game
        .start_game(user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!(started)))
}

/// Full state of one session
async fn game_state(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(session_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let game_state = state
        .game
        .game_state(user_id, session_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!(game_state)))
}

#[derive(Debug, Deserialize)]
struct TradeRequest {
    session_id: i64,
    company_id: i64,
    quantity: i64,
    side: String,
}

/// Execute a buy or sell on a session
async fn trade(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let side = TradeSide::parse(&request.side).map_err(error_response)?;
    let outcome = state
        .trading
        .trade(
            user_id,
            request.session_id,
            request.company_id,
            request.quantity,
            side,
        )
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!(outcome)))
}

/// Holdings valued at current prices
async fn portfolio(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(session_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let portfolio = state
        .game
        .portfolio(user_id, session_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!(portfolio)))
}

/// Paid news reveal for one company in the session's current year
async fn reveal_news(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path((session_id, company_id, tier)): Path<(i64, i64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tier = NewsTier::parse(&tier).map_err(error_response)?;
    let reveal = state
        .news
        .reveal(user_id, session_id, company_id, tier)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!(reveal)))
}

/// End the current turn: value holdings, advance or complete
async fn end_turn(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(session_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .turns
        .end_turn(user_id, session_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!(outcome)))
}

/// Year-over-year price movements for the session's companies
async fn stock_changes(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(session_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let changes = state
        .game
        .stock_changes(user_id, session_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "changes": changes })))
}

/// Aggregate stats and recent game history for the authenticated user
async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = state.game.profile(user_id).await.map_err(error_response)?;
    Ok(Json(serde_json::json!(profile)))
}

#[derive(Debug, Deserialize)]
struct RankQuery {
    limit: Option<i64>,
}

async fn ranking_balance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let board = state
        .ranking
        .by_balance(query.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "ranking": board })))
}

async fn ranking_best_rate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let board = state
        .ranking
        .by_best_rate(query.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "ranking": board })))
}

async fn ranking_cumulative_rate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let board = state
        .ranking
        .by_cumulative_rate(query.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "ranking": board })))
}
