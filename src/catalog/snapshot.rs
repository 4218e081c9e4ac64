use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::catalog::token;
use crate::domain::{Food, FoodId, User, UserId};
use crate::error::CatalogError;

/// Immutable view of the catalog at one point in time.
///
/// Users and tokens never change after load, so stock refreshes share them
/// with the previous snapshot instead of copying.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    foods: BTreeMap<FoodId, Food>,
    foods_json: Arc<str>,
    users: Arc<HashMap<String, User>>,
    tokens: Arc<HashMap<UserId, String>>,
}

impl CatalogSnapshot {
    pub fn build(
        foods: impl IntoIterator<Item = Food>,
        users: impl IntoIterator<Item = User>,
    ) -> Result<Self, CatalogError> {
        let mut by_id = BTreeMap::new();
        for food in foods {
            if !Food::is_known_id(food.id) {
                return Err(CatalogError::FoodIdOutOfRange(food.id));
            }
            by_id.insert(food.id, food);
        }

        let mut by_name = HashMap::new();
        let mut tokens = HashMap::new();
        for user in users {
            let token = token::derive_token(user.id, &user.password)
                .ok_or(CatalogError::UserIdOutOfRange(user.id))?;
            tokens.insert(user.id, token);
            by_name.insert(user.name.clone(), user);
        }

        Ok(Self {
            foods_json: serialize_foods(&by_id)?,
            foods: by_id,
            users: Arc::new(by_name),
            tokens: Arc::new(tokens),
        })
    }

    /// A copy with stock replaced by `levels`. Foods missing from `levels`
    /// keep their previous stock; ids outside the catalog are ignored.
    pub fn with_stock(&self, levels: &HashMap<FoodId, i64>) -> Result<Self, CatalogError> {
        let mut foods = self.foods.clone();
        for (id, food) in foods.iter_mut() {
            if let Some(stock) = levels.get(id) {
                food.stock = *stock;
            }
        }
        Ok(Self {
            foods_json: serialize_foods(&foods)?,
            foods,
            users: Arc::clone(&self.users),
            tokens: Arc::clone(&self.tokens),
        })
    }

    pub fn food(&self, id: FoodId) -> Option<&Food> {
        self.foods.get(&id)
    }

    /// Unit price, or zero for a food the catalog does not know.
    pub fn price(&self, id: FoodId) -> i64 {
        self.food(id).map(|food| food.price).unwrap_or(0)
    }

    pub fn foods(&self) -> impl Iterator<Item = &Food> {
        self.foods.values()
    }

    /// JSON array of every food ordered by id, serialized once per snapshot.
    pub fn foods_json(&self) -> &str {
        &self.foods_json
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn token_for(&self, user_id: UserId) -> Option<&str> {
        self.tokens.get(&user_id).map(String::as_str)
    }

    pub fn user_count(&self) -> usize {
        self.tokens.len()
    }

    /// Resolves a token to its user with a single map lookup.
    pub fn lookup(&self, token: &str) -> Option<UserId> {
        let user_id = token::claimed_user(token)?;
        (self.token_for(user_id)? == token).then_some(user_id)
    }
}

fn serialize_foods(foods: &BTreeMap<FoodId, Food>) -> Result<Arc<str>, CatalogError> {
    let list: Vec<&Food> = foods.values().collect();
    Ok(Arc::from(serde_json::to_string(&list)?))
}
