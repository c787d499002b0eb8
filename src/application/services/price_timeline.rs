//! PriceTimeline - materialize-once share prices
//!
//! Maps (company, year) to an immutable price. A year's prices are drawn
//! lazily the first time they are needed (session creation for the start
//! year, turn advance for the next year); once written they never change,
//! so any concurrent reader computes valuations against the same numbers.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::domain::errors::GameError;
use crate::domain::value_objects::price::Price;
use crate::persistence::repository::PriceRepository;

/// Source of random price draws. Injected so tests can pin prices.
pub trait PriceSource: Send + Sync {
    fn draw(&self, min: f64, max: f64) -> f64;
}

/// Uniform draw over [min, max], rounded to cents.
pub struct UniformPriceSource;

impl PriceSource for UniformPriceSource {
    fn draw(&self, min: f64, max: f64) -> f64 {
        let raw = rand::thread_rng().gen_range(min..=max);
        (raw * 100.0).round() / 100.0
    }
}

/// Fixed-value source for deterministic tests.
pub struct FixedPriceSource(pub f64);

impl PriceSource for FixedPriceSource {
    fn draw(&self, _min: f64, _max: f64) -> f64 {
        self.0
    }
}

pub struct PriceTimeline {
    prices: PriceRepository,
    source: Arc<dyn PriceSource>,
    price_min: f64,
    price_max: f64,
}

impl PriceTimeline {
    pub fn new(
        prices: PriceRepository,
        source: Arc<dyn PriceSource>,
        price_min: f64,
        price_max: f64,
    ) -> Self {
        Self {
            prices,
            source,
            price_min,
            price_max,
        }
    }

    /// Price of a company in a year. Absence is a hard error, never a
    /// default-to-zero.
    pub async fn price_of(&self, company_id: i64, year: i64) -> Result<f64, GameError> {
        self.prices
            .get(company_id, year)
            .await?
            .ok_or(GameError::PriceNotFound { company_id, year })
    }

    /// Materialize the price for one (company, year), drawing a fresh value
    /// only if none exists. First writer wins: racing callers converge on
    /// one immutable value.
    pub async fn materialize(&self, company_id: i64, year: i64) -> Result<f64, GameError> {
        if let Some(price) = self.prices.get(company_id, year).await? {
            return Ok(price);
        }

        let drawn = Price::new(self.source.draw(self.price_min, self.price_max))?;
        let price = self
            .prices
            .set_if_absent(company_id, year, drawn.value())
            .await?;
        debug!("Materialized price {:.2} for company {} year {}", price, company_id, year);
        Ok(price)
    }

    /// Materialize a whole year for the given companies.
    pub async fn materialize_year(
        &self,
        company_ids: &[i64],
        year: i64,
    ) -> Result<(), GameError> {
        for company_id in company_ids {
            self.materialize(*company_id, year).await?;
        }
        Ok(())
    }
}
