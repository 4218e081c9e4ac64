use std::collections::{BTreeMap, HashMap};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
#[cfg(test)]
use tokio::sync::watch;

use crate::domain::{CartId, FoodId, Item, UserId, CART_CAPACITY};
use crate::error::StoreError;
use crate::store::{sorted_items, Store, StoreConnection, TransitionOutcome};

type Lines = BTreeMap<FoodId, i64>;

#[derive(Debug, Default)]
struct Keyspace {
    carts: HashMap<CartId, Lines>,
    orders: HashMap<UserId, Lines>,
    stock: Lines,
}

#[derive(Debug)]
struct Shared {
    keyspace: Mutex<Keyspace>,
    #[cfg(test)]
    gate: watch::Sender<bool>,
    #[cfg(test)]
    faults: AtomicUsize,
}

/// In-process store with the same transition semantics as the Redis scripts.
///
/// Every script body runs under a single lock with no await point inside it,
/// which gives the same indivisibility a single-threaded store server does.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                keyspace: Mutex::new(Keyspace::default()),
                #[cfg(test)]
                gate: watch::channel(true).0,
                #[cfg(test)]
                faults: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_stock(levels: impl IntoIterator<Item = (FoodId, i64)>) -> Self {
        let store = Self::new();
        store.shared.lock().stock.extend(levels);
        store
    }

    /// Stalls every transition until [`MemoryStore::release`] is called.
    #[cfg(test)]
    pub fn hold(&self) {
        self.shared.gate.send_replace(false);
    }

    #[cfg(test)]
    pub fn release(&self) {
        self.shared.gate.send_replace(true);
    }

    /// Makes the next `count` transitions fail with a connection error.
    #[cfg(test)]
    pub fn fail_next_transitions(&self, count: usize) {
        self.shared.faults.store(count, Ordering::SeqCst);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Keyspace> {
        self.keyspace
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
        }))
    }
}

pub struct MemoryConnection {
    shared: Arc<Shared>,
}

impl MemoryConnection {
    #[cfg(not(test))]
    async fn enter_transition(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Test builds park here while the store is held and consume injected
    /// faults.
    #[cfg(test)]
    async fn enter_transition(&self) -> Result<(), StoreError> {
        let mut gate = self.shared.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(StoreError::Connection("store gate closed".to_string()));
        }

        let faulted = self
            .shared
            .faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if faulted {
            return Err(StoreError::Connection("injected connection fault".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn add_item_to_cart(
        &mut self,
        cart_id: &CartId,
        food_id: FoodId,
        count: i64,
    ) -> Result<TransitionOutcome, StoreError> {
        self.enter_transition().await?;
        if count <= 0 {
            return Ok(TransitionOutcome::Rejected);
        }

        let mut keyspace = self.shared.lock();
        let held: i64 = keyspace
            .carts
            .get(cart_id)
            .map(|lines| lines.values().sum())
            .unwrap_or(0);
        if held + count > CART_CAPACITY {
            return Ok(TransitionOutcome::Rejected);
        }
        *keyspace
            .carts
            .entry(cart_id.clone())
            .or_default()
            .entry(food_id)
            .or_insert(0) += count;
        Ok(TransitionOutcome::Accepted)
    }

    async fn finalize_order(
        &mut self,
        user_id: UserId,
        cart_id: &CartId,
    ) -> Result<TransitionOutcome, StoreError> {
        self.enter_transition().await?;

        let mut keyspace = self.shared.lock();
        if keyspace.orders.contains_key(&user_id) {
            return Ok(TransitionOutcome::AlreadyOrdered);
        }

        let lines = keyspace.carts.get(cart_id).cloned().unwrap_or_default();
        let affordable = lines
            .iter()
            .all(|(food_id, wanted)| keyspace.stock.get(food_id).copied().unwrap_or(0) >= *wanted);
        if !affordable {
            return Ok(TransitionOutcome::InsufficientStock);
        }

        for (food_id, wanted) in &lines {
            *keyspace.stock.entry(*food_id).or_insert(0) -= wanted;
        }
        keyspace.carts.remove(cart_id);
        keyspace.orders.insert(user_id, lines);
        Ok(TransitionOutcome::Created)
    }

    async fn order_items(&mut self, user_id: UserId) -> Result<Option<Vec<Item>>, StoreError> {
        let keyspace = self.shared.lock();
        Ok(keyspace
            .orders
            .get(&user_id)
            .map(|lines| sorted_items(lines.iter().map(|(f, c)| (*f, *c)))))
    }

    async fn order_owners(&mut self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.shared.lock().orders.keys().copied().collect())
    }

    async fn cart_items(&mut self, cart_id: &CartId) -> Result<Vec<Item>, StoreError> {
        let keyspace = self.shared.lock();
        Ok(keyspace
            .carts
            .get(cart_id)
            .map(|lines| sorted_items(lines.iter().map(|(f, c)| (*f, *c))))
            .unwrap_or_default())
    }

    async fn stock_levels(&mut self) -> Result<HashMap<FoodId, i64>, StoreError> {
        Ok(self
            .shared
            .lock()
            .stock
            .iter()
            .map(|(f, s)| (*f, *s))
            .collect())
    }

    async fn seed_stock(&mut self, food_id: FoodId, stock: i64) -> Result<bool, StoreError> {
        let mut keyspace = self.shared.lock();
        if keyspace.stock.contains_key(&food_id) {
            return Ok(false);
        }
        keyspace.stock.insert(food_id, stock);
        Ok(true)
    }
}
