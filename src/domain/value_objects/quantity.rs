use crate::domain::errors::GameError;

/// Share quantity value object. Always strictly positive: a trade for
/// zero or negative shares is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, GameError> {
        if value <= 0 {
            return Err(GameError::InvalidInput(
                "quantity must be positive".to_string(),
            ));
        }
        Ok(Quantity(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
