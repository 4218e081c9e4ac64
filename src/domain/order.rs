use serde::{Deserialize, Serialize};

use crate::domain::{FoodId, UserId};

/// One line of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub food_id: FoodId,
    pub count: i64,
}

impl Item {
    pub fn new(food_id: FoodId, count: i64) -> Self {
        Self { food_id, count }
    }
}

/// Priced view of a user's finalized cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: String,
    pub user_id: UserId,
    pub items: Vec<Item>,
    pub total: i64,
}
