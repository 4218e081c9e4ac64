//! Request-layer preconditions in front of the core: token checks, cart
//! ownership and input limits. Nothing here touches cart or order state
//! except through [`crate::clients`].

mod error;
mod service;

pub use error::SessionError;
pub use service::{LoginReceipt, SessionService};
