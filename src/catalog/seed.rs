use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::catalog::CatalogSnapshot;
use crate::domain::{Food, User};
use crate::error::CatalogError;
use crate::store::Store;

/// Boot-time snapshot of the relational catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub foods: Vec<Food>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl Seed {
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let mut seed: Seed = serde_json::from_str(raw)?;
        seed.users.sort_by_key(|user| user.id);
        Ok(seed)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

/// Validates the seed, writes its stock into the store where the store has
/// none yet, and builds the first snapshot from the store's stock.
///
/// Stock already present in the store wins over the seed, so a restarted
/// instance never resurrects sold units.
#[instrument(skip_all, fields(foods = seed.foods.len(), users = seed.users.len()))]
pub async fn load_catalog(seed: Seed, store: &dyn Store) -> Result<CatalogSnapshot, CatalogError> {
    let snapshot = CatalogSnapshot::build(seed.foods, seed.users)?;

    let mut connection = store.connect().await?;
    let mut seeded = 0;
    for food in snapshot.foods() {
        if connection.seed_stock(food.id, food.stock).await? {
            seeded += 1;
        }
    }
    let levels = connection.stock_levels().await?;

    info!(seeded, "Catalog loaded");
    snapshot.with_stock(&levels)
}
