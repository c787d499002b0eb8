//! Game configuration
//!
//! Tuning knobs for the session state machine. Values come from defaults
//! overridden by environment variables; invalid values are logged and
//! ignored rather than aborting startup.

use std::net::SocketAddr;

/// Which account pays for news reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsPayer {
    /// Charge the session's cash balance.
    SessionCash,
    /// Charge the user's separate point balance.
    UserPoints,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// First playable year of every session.
    pub start_year: i64,
    /// Last playable year; ending the turn in this year completes the game.
    pub final_year: i64,
    /// Cash every session starts with.
    pub start_balance: f64,
    /// Size of the random company subset attached to a session.
    pub companies_per_session: i64,
    /// Bounds for generated share prices.
    pub price_min: f64,
    pub price_max: f64,
    /// Per-tier news costs.
    pub news_cost_basic: f64,
    pub news_cost_premium: f64,
    pub news_payer: NewsPayer,
    /// Point balance granted when a user's stats row is first created.
    pub initial_points: f64,
    pub database_url: String,
    pub bind_addr: SocketAddr,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            start_year: 2014,
            final_year: 2023,
            start_balance: 1000.0,
            companies_per_session: 12,
            price_min: 10.0,
            price_max: 200.0,
            news_cost_basic: 50.0,
            news_cost_premium: 100.0,
            news_payer: NewsPayer::SessionCash,
            initial_points: 500.0,
            database_url: "sqlite://data/stockrush.db".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl GameConfig {
    /// Load configuration from environment variables on top of defaults.
    pub fn from_env() -> GameConfig {
        let mut config = GameConfig::default();

        if let Ok(year) = std::env::var("START_YEAR") {
            if let Ok(value) = year.parse::<i64>() {
                config.start_year = value;
            }
        }

        if let Ok(year) = std::env::var("FINAL_YEAR") {
            match year.parse::<i64>() {
                Ok(value) if value >= config.start_year => {
                    config.final_year = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid FINAL_YEAR {} (before start year {}), using default: {}",
                        value,
                        config.start_year,
                        config.final_year
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to parse FINAL_YEAR '{}': {}", year, e);
                }
            }
        }

        if let Ok(balance) = std::env::var("START_BALANCE") {
            if let Ok(value) = balance.parse::<f64>() {
                if value > 0.0 && value.is_finite() {
                    config.start_balance = value;
                }
            }
        }

        if let Ok(n) = std::env::var("COMPANIES_PER_SESSION") {
            if let Ok(value) = n.parse::<i64>() {
                if value > 0 {
                    config.companies_per_session = value;
                }
            }
        }

        if let Ok(min) = std::env::var("PRICE_MIN") {
            if let Ok(value) = min.parse::<f64>() {
                if value > 0.0 && value.is_finite() {
                    config.price_min = value;
                }
            }
        }

        if let Ok(max) = std::env::var("PRICE_MAX") {
            match max.parse::<f64>() {
                Ok(value) if value >= config.price_min => {
                    config.price_max = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid PRICE_MAX {} (below PRICE_MIN {}), using default: {}",
                        value,
                        config.price_min,
                        config.price_max
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to parse PRICE_MAX '{}': {}", max, e);
                }
            }
        }

        if let Ok(cost) = std::env::var("NEWS_COST_BASIC") {
            if let Ok(value) = cost.parse::<f64>() {
                if value >= 0.0 && value.is_finite() {
                    config.news_cost_basic = value;
                }
            }
        }

        if let Ok(cost) = std::env::var("NEWS_COST_PREMIUM") {
            if let Ok(value) = cost.parse::<f64>() {
                if value >= 0.0 && value.is_finite() {
                    config.news_cost_premium = value;
                }
            }
        }

        if let Ok(payer) = std::env::var("NEWS_PAYER") {
            match payer.to_lowercase().as_str() {
                "cash" => config.news_payer = NewsPayer::SessionCash,
                "points" => config.news_payer = NewsPayer::UserPoints,
                other => {
                    tracing::warn!(
                        "Unknown NEWS_PAYER '{}' (expected 'cash' or 'points'), using default",
                        other
                    );
                }
            }
        }

        if let Ok(points) = std::env::var("INITIAL_POINTS") {
            if let Ok(value) = points.parse::<f64>() {
                if value >= 0.0 && value.is_finite() {
                    config.initial_points = value;
                }
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(value) => config.bind_addr = value,
                Err(e) => {
                    tracing::warn!("Failed to parse BIND_ADDR '{}': {}", addr, e);
                }
            }
        }

        config
    }

    /// Cost of one news reveal for the given tier.
    pub fn news_cost(&self, tier: crate::domain::entities::news::NewsTier) -> f64 {
        match tier {
            crate::domain::entities::news::NewsTier::Basic => self.news_cost_basic,
            crate::domain::entities::news::NewsTier::Premium => self.news_cost_premium,
        }
    }
}

/// Default company catalog seeded into an empty database.
pub const DEFAULT_CATALOG: &[&str] = &[
    "Aurora Semiconductors",
    "Blue Harbor Shipping",
    "Cedar Peak Mining",
    "Daybreak Pharmaceuticals",
    "Eastgate Retail Group",
    "Falcon Aerospace",
    "Granite Bank Holdings",
    "Horizon Telecom",
    "Ironwood Motors",
    "Juniper Foods",
    "Kestrel Media",
    "Lighthouse Insurance",
    "Meridian Energy",
    "Northwind Logistics",
    "Opal Software",
    "Pinecrest Hotels",
    "Quarry Steelworks",
    "Riverbend Chemicals",
    "Summit Apparel",
    "Tidewater Fisheries",
];
