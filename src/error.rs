use std::time::Duration;

use thiserror::Error;

use crate::domain::{FoodId, UserId, MAX_FOOD_ID};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// No connection could be obtained. Nothing was sent to the store.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store connection error: {0}")]
    Connection(String),
    #[error("Store command error: {0}")]
    Command(String),
    #[error("Unexpected store reply: {0}")]
    UnexpectedReply(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("Store transport error: {0}")]
    Transport(#[from] StoreError),
    #[error("No reply within {0:?}")]
    Timeout(Duration),
    #[error("Dispatch queue closed")]
    Closed,
    #[error("Worker dropped the reply channel")]
    Dropped,
}

impl DispatchError {
    /// True when the job is known not to have reached the store, so
    /// resubmitting it cannot apply a transition twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Transport(StoreError::Unavailable(_)))
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Catalog serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Food id {0} outside catalog range 1..={MAX_FOOD_ID}")]
    FoodIdOutOfRange(FoodId),
    #[error("User id {0} cannot be encoded into an access token")]
    UserIdOutOfRange(UserId),
    #[error("Catalog store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("Failed to start dispatch pipeline: {0}")]
    Pipeline(#[from] StoreError),
}
