use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::catalog::CatalogCache;
use crate::clients::{CartClient, OrderClient};
use crate::domain::{CartId, Food, FoodId, Order, UserId, CART_CAPACITY};
use crate::error::StoreError;
use crate::session::SessionError;
use crate::store::TransitionOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginReceipt {
    pub user_id: UserId,
    pub username: String,
    pub access_token: String,
}

/// What a request handler calls once the body has been parsed.
///
/// Every cart operation checks that the cart id's owner prefix matches the
/// acting user before anything is dispatched. The store transitions do not
/// repeat that check.
#[derive(Clone)]
pub struct SessionService {
    catalog: CatalogCache,
    carts: CartClient,
    orders: OrderClient,
    admin_user_id: UserId,
}

impl SessionService {
    pub fn new(
        catalog: CatalogCache,
        carts: CartClient,
        orders: OrderClient,
        admin_user_id: UserId,
    ) -> Self {
        Self {
            catalog,
            carts,
            orders,
            admin_user_id,
        }
    }

    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> Result<LoginReceipt, SessionError> {
        let snapshot = self.catalog.snapshot();
        let user = snapshot
            .user_by_name(username)
            .filter(|user| user.password == password)
            .ok_or(SessionError::UserAuthFail)?;
        let access_token = snapshot
            .token_for(user.id)
            .ok_or(SessionError::UserAuthFail)?
            .to_string();

        info!(user_id = user.id, "User logged in");
        Ok(LoginReceipt {
            user_id: user.id,
            username: user.name.clone(),
            access_token,
        })
    }

    pub fn authenticate(&self, token: &str) -> Result<UserId, SessionError> {
        self.catalog
            .snapshot()
            .lookup(token)
            .ok_or(SessionError::InvalidAccessToken)
    }

    /// The catalog exactly as last serialized.
    pub fn foods_json(&self) -> Arc<str> {
        Arc::from(self.catalog.snapshot().foods_json())
    }

    pub fn create_cart(&self, user_id: UserId) -> CartId {
        let cart_id = self.carts.create_cart(user_id);
        debug!(user_id, cart_id = %cart_id, "Cart created");
        cart_id
    }

    #[instrument(skip(self))]
    pub async fn add_food(
        &self,
        user_id: UserId,
        cart_id: &str,
        food_id: FoodId,
        count: i64,
    ) -> Result<(), SessionError> {
        if !Food::is_known_id(food_id) {
            return Err(SessionError::FoodNotFound(food_id));
        }
        if count < 0 {
            return Err(SessionError::MalformedRequest(format!(
                "negative food count {count}"
            )));
        }
        if count == 0 {
            return Ok(());
        }
        if count > CART_CAPACITY {
            return Err(SessionError::FoodOutOfLimit);
        }

        let cart_id = owned_cart(user_id, cart_id)?;
        if self.carts.add_food(&cart_id, food_id, count).await? {
            Ok(())
        } else {
            debug!("Cart capacity exceeded");
            Err(SessionError::FoodOutOfLimit)
        }
    }

    /// Returns the new order's id.
    #[instrument(skip(self))]
    pub async fn make_order(&self, user_id: UserId, cart_id: &str) -> Result<String, SessionError> {
        let cart_id = owned_cart(user_id, cart_id)?;
        match self.orders.make_order(user_id, &cart_id).await? {
            TransitionOutcome::Created => Ok(user_id.to_string()),
            TransitionOutcome::AlreadyOrdered => Err(SessionError::OrderOutOfLimit),
            TransitionOutcome::InsufficientStock => Err(SessionError::FoodOutOfStock),
            other => {
                warn!(outcome = ?other, "Unexpected finalize outcome");
                Err(SessionError::Store(StoreError::UnexpectedReply(format!(
                    "finalize-order returned {}",
                    other.code()
                ))))
            }
        }
    }

    /// The user's order as a list of zero or one entries. An order placed
    /// from an empty cart is listed with no items.
    #[instrument(skip(self))]
    pub async fn fetch_orders(&self, user_id: UserId) -> Result<Vec<Order>, SessionError> {
        let orders = self
            .orders
            .order_items(user_id)
            .await?
            .map(|items| self.orders.generate_order(user_id, items));
        Ok(orders.into_iter().collect())
    }

    /// All orders for the admin user, nothing for anyone else.
    #[instrument(skip(self))]
    pub async fn fetch_admin_orders(&self, user_id: UserId) -> Result<Vec<Order>, SessionError> {
        if user_id != self.admin_user_id {
            return Ok(Vec::new());
        }
        Ok(self.orders.all_orders().await?)
    }
}

fn owned_cart(user_id: UserId, raw: &str) -> Result<CartId, SessionError> {
    let cart_id = CartId::parse(raw).ok_or_else(|| SessionError::CartNotFound(raw.to_string()))?;
    if cart_id.owner() != Some(user_id) {
        return Err(SessionError::NotAuthorizedToAccessCart(raw.to_string()));
    }
    Ok(cart_id)
}
