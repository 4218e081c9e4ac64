//! Read-mostly mirror of foods, users and access tokens.
//!
//! One writer (startup load, then the stock refresh task) publishes whole
//! snapshots; request handlers read whichever snapshot is current.

mod cache;
mod refresh;
mod seed;
mod snapshot;
pub mod token;

pub use cache::{CatalogCache, CatalogWriter};
pub use refresh::refresh_stock;
pub use seed::{load_catalog, Seed};
pub use snapshot::CatalogSnapshot;
