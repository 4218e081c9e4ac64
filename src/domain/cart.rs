use std::fmt;

use crate::domain::UserId;

/// Maximum number of units a single cart may hold, summed over all foods.
pub const CART_CAPACITY: i64 = 3;

/// Opaque cart identifier of the form `{owner}_{sequence}`.
///
/// The owner prefix is only a hint for the calling layer's ownership check;
/// nothing in the store validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartId(String);

impl CartId {
    pub fn new(owner: UserId, sequence: u64) -> Self {
        Self(format!("{owner}_{sequence}"))
    }

    /// Accepts any string with an `_` separator. Returns `None` otherwise.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.split_once('_').map(|_| Self(raw.to_string()))
    }

    /// The user id embedded in the prefix, if it is numeric.
    pub fn owner(&self) -> Option<UserId> {
        self.0.split_once('_').and_then(|(owner, _)| owner.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
