use serde::{Deserialize, Serialize};

pub type FoodId = i64;

/// Highest food id the catalog serves. Ids run from 1 through this value.
pub const MAX_FOOD_ID: FoodId = 100;

/// A catalog entry. `id` and `price` never change after load; `stock` is a
/// display mirror of the shared store's stock hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub id: FoodId,
    pub price: i64,
    pub stock: i64,
}

impl Food {
    pub fn new(id: FoodId, price: i64, stock: i64) -> Self {
        Self { id, price, stock }
    }

    pub fn is_known_id(id: FoodId) -> bool {
        (1..=MAX_FOOD_ID).contains(&id)
    }
}
