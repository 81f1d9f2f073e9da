mod favorite;
mod repository;
mod service;

pub use favorite::*;
pub use repository::*;
pub use service::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::ProductId;

/// User identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random [`UserId`].
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// User as saved on the store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    /// Argon2id PHC string.
    #[serde(skip)]
    pub password: String,
    pub is_admin: bool,
    /// Favorited products, oldest first. May reference deleted products
    /// until the next favorites read.
    #[serde(skip)]
    pub favorites: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new [`User`] from an already hashed password.
    pub fn new(username: impl Into<String>, password_hash: String, is_admin: bool) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            password: password_hash,
            is_admin,
            favorites: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether `product` is in the favorites, compared on the canonical
    /// string form of the identifier.
    pub fn has_favorite(&self, product: &str) -> bool {
        self.favorites.iter().any(|id| id.to_string() == product)
    }
}
