use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, RedisError, Script};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::{CartId, FoodId, Item, UserId, CART_CAPACITY};
use crate::error::StoreError;
use crate::store::{keys, sorted_items, Store, StoreConnection, TransitionOutcome};

/// KEYS: cart. ARGV: food id, count, capacity.
const ADD_ITEM_TO_CART: &str = r#"
local total = tonumber(ARGV[2])
if total <= 0 then
    return 0
end
for _, held in ipairs(redis.call("HVALS", KEYS[1])) do
    total = total + tonumber(held)
end
if total > tonumber(ARGV[3]) then
    return 0
end
redis.call("HINCRBY", KEYS[1], ARGV[1], ARGV[2])
return 1
"#;

/// KEYS: order, cart, stock.
///
/// An empty cart has no hash in Redis, so its order is recorded with a single
/// zero-count marker line that readers drop.
const FINALIZE_ORDER: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 1 then
    return -1
end
local lines = redis.call("HGETALL", KEYS[2])
for i = 1, #lines, 2 do
    local left = tonumber(redis.call("HGET", KEYS[3], lines[i]) or "0")
    if left < tonumber(lines[i + 1]) then
        return -2
    end
end
if #lines == 0 then
    redis.call("HSET", KEYS[1], "0", "0")
    return 1
end
for i = 1, #lines, 2 do
    redis.call("HINCRBY", KEYS[3], lines[i], -tonumber(lines[i + 1]))
end
redis.call("RENAME", KEYS[2], KEYS[1])
return 1
"#;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Redis backend. Transitions run as Lua scripts, which Redis evaluates
/// without interleaving any other command.
///
/// Each [`Store::connect`] dials a dedicated connection for a worker. Order
/// reads share one reconnecting [`ConnectionManager`], cloned per read.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    reads: Arc<OnceCell<ConnectionManager>>,
    add_item: Arc<Script>,
    finalize: Arc<Script>,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            reads: Arc::new(OnceCell::new()),
            add_item: Arc::new(Script::new(ADD_ITEM_TO_CART)),
            finalize: Arc::new(Script::new(FINALIZE_ORDER)),
        })
    }

    fn wrap<C>(&self, conn: C) -> RedisConnection<C> {
        RedisConnection {
            conn,
            add_item: Arc::clone(&self.add_item),
            finalize: Arc::clone(&self.finalize),
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        debug!("Opened Redis connection");
        Ok(Box::new(self.wrap(conn)))
    }

    async fn read_connection(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let manager = self
            .reads
            .get_or_try_init(|| async {
                debug!("Opening shared Redis read connection");
                self.client
                    .get_connection_manager()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))
            })
            .await?;
        Ok(Box::new(self.wrap(manager.clone())))
    }
}

pub struct RedisConnection<C = MultiplexedConnection> {
    conn: C,
    add_item: Arc<Script>,
    finalize: Arc<Script>,
}

impl<C> RedisConnection<C>
where
    C: ConnectionLike + Send + 'static,
{
    async fn hash_lines(&mut self, key: String) -> Result<HashMap<FoodId, i64>, StoreError> {
        let lines: HashMap<FoodId, i64> = self.conn.hgetall(key).await?;
        Ok(lines)
    }
}

#[async_trait]
impl<C> StoreConnection for RedisConnection<C>
where
    C: ConnectionLike + Send + 'static,
{
    async fn add_item_to_cart(
        &mut self,
        cart_id: &CartId,
        food_id: FoodId,
        count: i64,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut invocation = self.add_item.prepare_invoke();
        invocation
            .key(keys::cart(cart_id))
            .arg(food_id)
            .arg(count)
            .arg(CART_CAPACITY);
        let code: i64 = invocation.invoke_async(&mut self.conn).await?;
        TransitionOutcome::from_add_code(code)
            .ok_or_else(|| StoreError::UnexpectedReply(format!("add-to-cart returned {code}")))
    }

    async fn finalize_order(
        &mut self,
        user_id: UserId,
        cart_id: &CartId,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut invocation = self.finalize.prepare_invoke();
        invocation
            .key(keys::order(user_id))
            .key(keys::cart(cart_id))
            .key(keys::STOCK);
        let code: i64 = invocation.invoke_async(&mut self.conn).await?;
        TransitionOutcome::from_finalize_code(code)
            .ok_or_else(|| StoreError::UnexpectedReply(format!("finalize-order returned {code}")))
    }

    /// Redis keeps no empty hashes, so an empty reply means the order key
    /// does not exist. Empty orders carry the marker line.
    async fn order_items(&mut self, user_id: UserId) -> Result<Option<Vec<Item>>, StoreError> {
        let lines = self.hash_lines(keys::order(user_id)).await?;
        if lines.is_empty() {
            return Ok(None);
        }
        Ok(Some(sorted_items(lines)))
    }

    async fn order_owners(&mut self) -> Result<Vec<UserId>, StoreError> {
        let found: Vec<String> = self.conn.keys(keys::ORDER_PATTERN).await?;
        Ok(found.iter().filter_map(|key| keys::order_owner(key)).collect())
    }

    async fn cart_items(&mut self, cart_id: &CartId) -> Result<Vec<Item>, StoreError> {
        let lines = self.hash_lines(keys::cart(cart_id)).await?;
        Ok(sorted_items(lines))
    }

    async fn stock_levels(&mut self) -> Result<HashMap<FoodId, i64>, StoreError> {
        let levels: HashMap<FoodId, i64> = self.conn.hgetall(keys::STOCK).await?;
        Ok(levels)
    }

    async fn seed_stock(&mut self, food_id: FoodId, stock: i64) -> Result<bool, StoreError> {
        let written: bool = self.conn.hset_nx(keys::STOCK, food_id, stock).await?;
        Ok(written)
    }
}
