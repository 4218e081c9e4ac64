use thiserror::Error;

use crate::domain::FoodId;
use crate::error::{DispatchError, StoreError};

/// Every failure a request can end in, with the stable code and HTTP status
/// a front end reports for it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Invalid access token")]
    InvalidAccessToken,
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Wrong username or password")]
    UserAuthFail,
    #[error("Cart not found: {0}")]
    CartNotFound(String),
    #[error("Not authorized to access cart: {0}")]
    NotAuthorizedToAccessCart(String),
    #[error("Food not found: {0}")]
    FoodNotFound(FoodId),
    #[error("A cart holds at most three items")]
    FoodOutOfLimit,
    #[error("Each user may place only one order")]
    OrderOutOfLimit,
    #[error("Food out of stock")]
    FoodOutOfStock,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidAccessToken => "INVALID_ACCESS_TOKEN",
            SessionError::MalformedRequest(_) => "MALFORMED_JSON",
            SessionError::UserAuthFail => "USER_AUTH_FAIL",
            SessionError::CartNotFound(_) => "CART_NOT_FOUND",
            SessionError::NotAuthorizedToAccessCart(_) => "NOT_AUTHORIZED_TO_ACCESS_CART",
            SessionError::FoodNotFound(_) => "FOOD_NOT_FOUND",
            SessionError::FoodOutOfLimit => "FOOD_OUT_OF_LIMIT",
            SessionError::OrderOutOfLimit => "ORDER_OUT_OF_LIMIT",
            SessionError::FoodOutOfStock => "FOOD_OUT_OF_STOCK",
            SessionError::Dispatch(DispatchError::Timeout(_)) => "STORE_TIMEOUT",
            SessionError::Dispatch(_) | SessionError::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            SessionError::InvalidAccessToken | SessionError::NotAuthorizedToAccessCart(_) => 401,
            SessionError::MalformedRequest(_) => 400,
            SessionError::UserAuthFail
            | SessionError::FoodOutOfLimit
            | SessionError::OrderOutOfLimit
            | SessionError::FoodOutOfStock => 403,
            SessionError::CartNotFound(_) | SessionError::FoodNotFound(_) => 404,
            SessionError::Dispatch(DispatchError::Timeout(_)) => 504,
            SessionError::Dispatch(_) | SessionError::Store(_) => 503,
        }
    }
}
