//! Typed entry points over the dispatch pipeline and the order read path.

mod cart_client;
mod order_client;

pub use cart_client::CartClient;
pub use order_client::OrderClient;
