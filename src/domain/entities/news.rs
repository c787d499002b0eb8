//! News entities - paid information access
//!
//! Each reveal is pay-per-view: re-invoking charges again. The basic tier
//! returns the headline only; the premium tier adds the full content.

use serde::{Deserialize, Serialize};

use crate::domain::errors::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsTier {
    Basic,
    Premium,
}

impl NewsTier {
    pub fn parse(s: &str) -> Result<Self, GameError> {
        match s {
            "basic" => Ok(NewsTier::Basic),
            "premium" => Ok(NewsTier::Premium),
            other => Err(GameError::InvalidInput(format!(
                "unknown news tier '{}', expected 'basic' or 'premium'",
                other
            ))),
        }
    }
}

/// A revealed news item. `content` is only populated for premium reveals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub company_id: i64,
    pub year: i64,
    pub headline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse() {
        assert_eq!(NewsTier::parse("basic").unwrap(), NewsTier::Basic);
        assert_eq!(NewsTier::parse("premium").unwrap(), NewsTier::Premium);
        assert!(matches!(
            NewsTier::parse("gold"),
            Err(GameError::InvalidInput(_))
        ));
    }
}
