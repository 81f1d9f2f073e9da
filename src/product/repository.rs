//! Handle product persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::product::{Product, ProductFilter, ProductId};
use crate::user::UserId;

/// Port for product persistence.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Count products matching `filter`.
    async fn count(&self, filter: &ProductFilter) -> Result<u64>;

    /// Products matching `filter` in creation order, skipping `skip` and
    /// returning at most `limit`.
    async fn find_page(
        &self,
        filter: &ProductFilter,
        limit: u64,
        skip: u64,
    ) -> Result<Vec<Product>>;

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Existing products among `ids`. Missing ones are silently absent.
    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    async fn insert(&self, product: &Product) -> Result<()>;

    async fn update(&self, product: &Product) -> Result<()>;

    /// Delete a product. Returns `false` when nothing was deleted.
    async fn delete(&self, id: &ProductId) -> Result<bool>;

    /// Remove every product.
    async fn clear(&self) -> Result<()>;
}

/// PostgreSQL product repository.
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    /// Create a new [`PgProductRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str =
    "id, title, price, description, image, category, user_id, created_at, updated_at";

// `strpos` keeps the keyword literal, no LIKE/regex escaping needed.
const KEYWORD_CLAUSE: &str =
    "($1::TEXT IS NULL OR strpos(lower(title), lower($1)) > 0)";

#[derive(sqlx::FromRow)]
struct ProductRecord {
    id: Uuid,
    title: String,
    price: Decimal,
    description: String,
    image: String,
    category: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        Self {
            id: ProductId(record.id),
            title: record.title,
            price: record.price,
            description: record.description,
            image: record.image,
            category: record.category,
            user: UserId(record.user_id),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn count(&self, filter: &ProductFilter) -> Result<u64> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS count FROM products WHERE {KEYWORD_CLAUSE}"
        ))
        .bind(filter.as_keyword())
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find_page(
        &self,
        filter: &ProductFilter,
        limit: u64,
        skip: u64,
    ) -> Result<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(&format!(
            r#"SELECT {COLUMNS} FROM products
                WHERE {KEYWORD_CLAUSE}
                ORDER BY created_at, id
                LIMIT $2 OFFSET $3"#
        ))
        .bind(filter.as_keyword())
        .bind(to_i64(limit))
        .bind(to_i64(skip))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Product::from).collect())
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>> {
        let record = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Product::from))
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids = ids.iter().map(|id| id.0).collect::<Vec<Uuid>>();
        let records = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Product::from).collect())
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO products (id, title, price, description, image, category, user_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(product.id.0)
        .bind(&product.title)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.image)
        .bind(&product.category)
        .bind(product.user.0)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"UPDATE products
                SET title = $2, price = $3, description = $4, image = $5, category = $6, updated_at = $7
                WHERE id = $1"#,
        )
        .bind(product.id.0)
        .bind(&product.title)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.image)
        .bind(&product.category)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM products")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
