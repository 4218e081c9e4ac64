//! Limited-inventory ordering engine.
//!
//! Cart and order transitions are queued onto a fixed pool of store workers
//! and evaluated atomically inside the store. A read-mostly catalog mirror
//! serves foods, users and access tokens.

pub mod app_system;
pub mod catalog;
pub mod clients;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod session;
pub mod store;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod mock_framework;
