use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument};

use crate::dispatch::{Dispatcher, RetryPolicy};
use crate::domain::{CartId, FoodId, UserId};
use crate::error::DispatchError;

/// Client for cart transitions.
#[derive(Clone)]
pub struct CartClient {
    dispatcher: Dispatcher,
    retry: RetryPolicy,
    next_sequence: Arc<AtomicU64>,
}

impl CartClient {
    /// Cart sequences start from the boot time in milliseconds so that two
    /// instances sharing a store rarely hand out the same cart id.
    pub fn new(dispatcher: Dispatcher, retry: RetryPolicy) -> Self {
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as u64)
            .unwrap_or(1);
        Self::with_first_sequence(dispatcher, retry, start)
    }

    pub fn with_first_sequence(dispatcher: Dispatcher, retry: RetryPolicy, first: u64) -> Self {
        Self {
            dispatcher,
            retry,
            next_sequence: Arc::new(AtomicU64::new(first)),
        }
    }

    /// Mints a fresh cart id. Carts only exist in the store once something
    /// is added to them.
    pub fn create_cart(&self, owner: UserId) -> CartId {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        CartId::new(owner, sequence)
    }

    /// Returns `false` when the addition would push the cart past its
    /// capacity; the cart is then unchanged.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn add_food(
        &self,
        cart_id: &CartId,
        food_id: FoodId,
        count: i64,
    ) -> Result<bool, DispatchError> {
        debug!("Sending request");
        let outcome = self
            .dispatcher
            .add_item_to_cart(cart_id.clone(), food_id, count, &self.retry)
            .await?;
        Ok(outcome.is_success())
    }
}
