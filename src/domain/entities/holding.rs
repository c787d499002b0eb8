//! Holding entity - shares of one company owned within the current year
//!
//! Holdings are scoped to a session's current year and cleared on every
//! turn advance; the valuation step liquidates them implicitly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub session_id: i64,
    pub company_id: i64,
    pub year: i64,
    /// Never negative; a sell for more than held is rejected, not clamped.
    pub quantity: i64,
    /// Weighted average price paid across the buys in this year.
    pub avg_price: f64,
}

impl Holding {
    /// Value of this holding at the given per-share price.
    pub fn value_at(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }
}
