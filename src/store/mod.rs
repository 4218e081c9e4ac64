//! The shared mutable store: cart hashes, order hashes and the stock hash.
//!
//! Both transitions are evaluated inside the store as one indivisible step, so
//! callers never need local locks around cart or order state.

pub mod memory;
pub mod redis_store;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{CartId, FoodId, Item, UserId};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Key layout shared by every backend.
pub mod keys {
    use crate::domain::{CartId, UserId};

    pub const STOCK: &str = "foodstock";
    pub const ORDER_PATTERN: &str = "user:*:order";

    pub fn cart(cart_id: &CartId) -> String {
        format!("cart:{cart_id}:foods")
    }

    pub fn order(user_id: UserId) -> String {
        format!("user:{user_id}:order")
    }

    pub fn order_owner(key: &str) -> Option<UserId> {
        key.strip_prefix("user:")?
            .strip_suffix(":order")?
            .parse()
            .ok()
    }
}

/// Result of one atomic transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Accepted,
    Rejected,
    Created,
    AlreadyOrdered,
    InsufficientStock,
}

impl TransitionOutcome {
    /// Wire code handed to the request layer: `1` success, `0` rejected,
    /// `-1` already ordered, `-2` insufficient stock.
    pub fn code(self) -> i64 {
        match self {
            TransitionOutcome::Accepted | TransitionOutcome::Created => 1,
            TransitionOutcome::Rejected => 0,
            TransitionOutcome::AlreadyOrdered => -1,
            TransitionOutcome::InsufficientStock => -2,
        }
    }

    pub fn from_add_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TransitionOutcome::Accepted),
            0 => Some(TransitionOutcome::Rejected),
            _ => None,
        }
    }

    pub fn from_finalize_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TransitionOutcome::Created),
            -1 => Some(TransitionOutcome::AlreadyOrdered),
            -2 => Some(TransitionOutcome::InsufficientStock),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self.code() == 1
    }
}

/// A store backend able to hand out connections.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;

    /// A connection for order reads. Backends that multiplex hand out a
    /// handle onto one shared connection instead of dialing again.
    async fn read_connection(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        self.connect().await
    }
}

/// One connection. Each dispatch worker owns exactly one for its lifetime.
#[async_trait]
pub trait StoreConnection: Send {
    /// Adds `count` units of `food_id` unless the cart total would exceed
    /// [`crate::domain::CART_CAPACITY`].
    async fn add_item_to_cart(
        &mut self,
        cart_id: &CartId,
        food_id: FoodId,
        count: i64,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Decrements stock for every cart line and turns the cart into the
    /// user's order, or changes nothing.
    async fn finalize_order(
        &mut self,
        user_id: UserId,
        cart_id: &CartId,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Lines of the user's order sorted by food id. `None` when the user has
    /// no order; an order placed from an empty cart is `Some` and empty.
    async fn order_items(&mut self, user_id: UserId) -> Result<Option<Vec<Item>>, StoreError>;

    /// Every user that holds an order, in no particular order.
    async fn order_owners(&mut self) -> Result<Vec<UserId>, StoreError>;

    async fn cart_items(&mut self, cart_id: &CartId) -> Result<Vec<Item>, StoreError>;

    async fn stock_levels(&mut self) -> Result<HashMap<FoodId, i64>, StoreError>;

    /// Sets the stock of a food only if the store has none yet. Returns
    /// whether the value was written.
    async fn seed_stock(&mut self, food_id: FoodId, stock: i64) -> Result<bool, StoreError>;
}

/// Turns a raw hash into sorted order lines, dropping empty markers.
pub(crate) fn sorted_items(lines: impl IntoIterator<Item = (FoodId, i64)>) -> Vec<Item> {
    let mut items: Vec<Item> = lines
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(food_id, count)| Item::new(food_id, count))
        .collect();
    items.sort_by_key(|item| item.food_id);
    items
}
