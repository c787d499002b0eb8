//! Company entity - an immutable catalog entry

use serde::{Deserialize, Serialize};

/// A company listed in the game catalog. Created at seeding time and
/// never mutated by gameplay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

impl Company {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
