use serde::Deserialize;

pub type UserId = i64;

/// A registered user as loaded from the seed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub password: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            password: password.into(),
        }
    }
}
