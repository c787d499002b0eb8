//! Valuation arithmetic
//!
//! Pure money math shared by the trading engine and the turn controller.
//! Keeping it free of store access makes the numeric invariants directly
//! testable.

/// Weighted average cost after buying `buy_qty` more shares at `buy_price`
/// on top of `held_qty` shares carried at `held_avg`.
pub fn weighted_average_cost(held_qty: i64, held_avg: f64, buy_qty: i64, buy_price: f64) -> f64 {
    let total_qty = held_qty + buy_qty;
    debug_assert!(total_qty > 0);
    (held_qty as f64 * held_avg + buy_qty as f64 * buy_price) / total_qty as f64
}

/// Total value of a ledger given (quantity, price) pairs.
pub fn ledger_value(entries: &[(i64, f64)]) -> f64 {
    entries.iter().map(|(qty, price)| *qty as f64 * price).sum()
}

/// Percentage change from start balance to final balance.
pub fn profit_rate(start_balance: f64, final_balance: f64) -> f64 {
    (final_balance - start_balance) / start_balance * 100.0
}

/// Running mean of profit rates after incorporating one more completed
/// game, without re-scanning history.
pub fn incorporate_profit_rate(cumulative: f64, total_games: i64, new_rate: f64) -> f64 {
    (cumulative * total_games as f64 + new_rate) / (total_games + 1) as f64
}
