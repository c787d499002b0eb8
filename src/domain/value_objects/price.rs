use crate::domain::errors::GameError;

/// Share price value object. Always positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, GameError> {
        if !value.is_finite() {
            return Err(GameError::InvalidInput("price must be finite".to_string()));
        }
        if value <= 0.0 {
            return Err(GameError::InvalidInput(
                "price must be positive".to_string(),
            ));
        }
        Ok(Price(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(42.5).unwrap();
        assert_eq!(price.value(), 42.5);
    }

    #[test]
    fn test_price_rejects_zero() {
        assert!(Price::new(0.0).is_err());
    }

    #[test]
    fn test_price_rejects_negative() {
        assert!(Price::new(-10.0).is_err());
    }

    #[test]
    fn test_price_rejects_nan_and_infinity() {
        assert!(Price::new(f64::NAN).is_err());
        assert!(Price::new(f64::INFINITY).is_err());
    }
}
