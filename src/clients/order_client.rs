use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::catalog::{CatalogCache, CatalogSnapshot};
use crate::dispatch::{Dispatcher, RetryPolicy};
use crate::domain::{CartId, Item, Order, UserId};
use crate::error::{DispatchError, StoreError};
use crate::store::{Store, StoreConnection, TransitionOutcome};

/// Client for order finalization and the order read path.
///
/// Finalization goes through the dispatch pipeline. Each read takes its own
/// read connection from the store, so concurrent reads never queue behind
/// one another.
#[derive(Clone)]
pub struct OrderClient {
    dispatcher: Dispatcher,
    retry: RetryPolicy,
    store: Arc<dyn Store>,
    catalog: CatalogCache,
}

impl OrderClient {
    pub fn new(
        dispatcher: Dispatcher,
        retry: RetryPolicy,
        store: Arc<dyn Store>,
        catalog: CatalogCache,
    ) -> Self {
        Self {
            dispatcher,
            retry,
            store,
            catalog,
        }
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn make_order(
        &self,
        user_id: UserId,
        cart_id: &CartId,
    ) -> Result<TransitionOutcome, DispatchError> {
        debug!("Sending request");
        let outcome = self
            .dispatcher
            .finalize_order(user_id, cart_id.clone(), &self.retry)
            .await?;
        info!(code = outcome.code(), "Finalize evaluated");
        Ok(outcome)
    }

    /// Lines of the user's order; `None` when the user has not ordered.
    #[instrument(skip(self))]
    pub async fn order_items(&self, user_id: UserId) -> Result<Option<Vec<Item>>, StoreError> {
        let mut connection = self.store.read_connection().await?;
        connection.order_items(user_id).await
    }

    pub fn generate_order(&self, user_id: UserId, items: Vec<Item>) -> Order {
        generate_order(&self.catalog.snapshot(), user_id, items)
    }

    /// Every order in the store, priced against the current catalog. The
    /// sequence has no particular order.
    #[instrument(skip(self))]
    pub async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut connection = self.store.read_connection().await?;
        let orders = collect_orders(connection.as_mut(), &self.catalog.snapshot()).await?;
        debug!(orders = orders.len(), "Collected orders");
        Ok(orders)
    }
}

/// Prices `items` against `catalog`. Foods the catalog no longer knows count
/// as free.
pub fn generate_order(catalog: &CatalogSnapshot, user_id: UserId, items: Vec<Item>) -> Order {
    let total = items
        .iter()
        .map(|item| catalog.price(item.food_id) * item.count)
        .sum();
    Order {
        id: user_id.to_string(),
        user_id,
        items,
        total,
    }
}

async fn collect_orders(
    connection: &mut dyn StoreConnection,
    catalog: &CatalogSnapshot,
) -> Result<Vec<Order>, StoreError> {
    let owners = connection.order_owners().await?;
    let mut orders = Vec::with_capacity(owners.len());
    for user_id in owners {
        if let Some(items) = connection.order_items(user_id).await? {
            orders.push(generate_order(catalog, user_id, items));
        }
    }
    Ok(orders)
}
