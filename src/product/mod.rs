//! Product catalog.
mod repository;
mod service;

pub use repository::*;
pub use service::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::user::UserId;

/// Product identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub Uuid);

impl ProductId {
    /// Generate a new random [`ProductId`].
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Product as saved on the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub title: String,
    pub price: Decimal,
    pub description: String,
    pub image: String,
    pub category: String,
    /// Creator of the product, the only user allowed to change it.
    pub user: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Build a new [`Product`] owned by `owner`.
    pub fn new(owner: UserId, fields: NewProduct) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            title: fields.title,
            price: round_price(fields.price),
            description: fields.description,
            image: fields.image,
            category: fields.category.unwrap_or_default(),
            user: owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user` created this product.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user == *user
    }

    /// Apply provided fields, keep the others.
    pub fn apply(&mut self, changes: ProductChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(price) = changes.price {
            self.price = round_price(price);
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(image) = changes.image {
            self.image = image;
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        self.updated_at = Utc::now();
    }
}

/// Digits stored before the decimal point.
const PRICE_INTEGER_DIGITS: u32 = 10;

/// Prices are stored with cents precision, halves rounded away from zero.
fn round_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("price"));
    }
    if round_price(*price) >= Decimal::from(10_i64.pow(PRICE_INTEGER_DIGITS)) {
        return Err(ValidationError::new("price"));
    }

    Ok(())
}

/// Fields required to create a [`Product`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewProduct {
    #[serde(default)]
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(custom(
        function = "validate_price",
        message = "Price must be a positive number"
    ))]
    pub price: Decimal,
    #[serde(default)]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Image URL is required"))]
    pub image: String,
    pub category: Option<String>,
}

/// Fields of a [`Product`] update, omitted ones are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProductChanges {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: Option<String>,
    #[validate(custom(
        function = "validate_price",
        message = "Price must be a positive number"
    ))]
    pub price: Option<Decimal>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Image URL is required"))]
    pub image: Option<String>,
    pub category: Option<String>,
}

/// Filter applied before pagination.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductFilter {
    keyword: Option<String>,
}

impl ProductFilter {
    /// Filter on titles containing `keyword`, ignoring case.
    /// Empty keywords match everything.
    pub fn keyword(keyword: Option<&str>) -> Self {
        Self {
            keyword: keyword.filter(|k| !k.is_empty()).map(str::to_owned),
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Literal, case-insensitive substring match.
    pub fn matches(&self, product: &Product) -> bool {
        match &self.keyword {
            Some(keyword) => product
                .title
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            None => true,
        }
    }
}

/// One page of the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: u64,
    /// Total number of pages.
    pub pages: u64,
    /// Matching products before pagination.
    pub count: u64,
}
