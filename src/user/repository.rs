//! Handle user persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, ServerError, USER_EXISTS};
use crate::product::ProductId;
use crate::user::{User, UserId};

/// Port for user persistence.
///
/// Favorites are mutated through single-statement operations so concurrent
/// requests on the same user never overwrite each other's list.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Insert [`User`]. Fails with a conflict if the username is taken.
    async fn insert(&self, user: &User) -> Result<()>;

    /// Append `product` at the end of the favorites unless it is already
    /// there. Returns `false` when nothing was appended.
    async fn append_favorite(&self, user: &UserId, product: &ProductId) -> Result<bool>;

    /// Drop every occurrence of `product` from the favorites.
    async fn remove_favorite(&self, user: &UserId, product: &ProductId) -> Result<()>;

    /// Drop every occurrence of `stale` ids, keeping the order of the rest.
    async fn prune_favorites(&self, user: &UserId, stale: &[ProductId]) -> Result<()>;

    /// Remove every user.
    async fn clear(&self) -> Result<()>;
}

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    password: String,
    is_admin: bool,
    favorites: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: UserId(record.id),
            username: record.username,
            password: record.password,
            is_admin: record.is_admin,
            favorites: record.favorites.into_iter().map(ProductId).collect(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone)]
enum Field {
    Id,
    Username,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::Username => write!(f, "username"),
        }
    }
}

fn get_by_field_query(field: Field) -> String {
    format!(
        r#"SELECT id, username, password, is_admin, favorites, created_at
            FROM users
            WHERE {field} = $1"#
    )
}

fn uuids(ids: &[ProductId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.0).collect()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&get_by_field_query(Field::Id))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&get_by_field_query(Field::Username))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(User::from))
    }

    async fn insert(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"INSERT INTO users (id, username, password, is_admin, favorites, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.is_admin)
        .bind(uuids(&user.favorites))
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_database_error()
                    .is_some_and(|e| e.is_unique_violation()) =>
            {
                Err(ServerError::Conflict(USER_EXISTS))
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn append_favorite(&self, user: &UserId, product: &ProductId) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE users
                SET favorites = array_append(favorites, $2)
                WHERE id = $1 AND NOT ($2 = ANY(favorites))"#,
        )
        .bind(user.0)
        .bind(product.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_favorite(&self, user: &UserId, product: &ProductId) -> Result<()> {
        sqlx::query("UPDATE users SET favorites = array_remove(favorites, $2) WHERE id = $1")
            .bind(user.0)
            .bind(product.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn prune_favorites(&self, user: &UserId, stale: &[ProductId]) -> Result<()> {
        sqlx::query(
            r#"UPDATE users
                SET favorites = ARRAY(
                    SELECT f FROM unnest(favorites) WITH ORDINALITY AS t(f, n)
                    WHERE f <> ALL($2)
                    ORDER BY n
                )
                WHERE id = $1"#,
        )
        .bind(user.0)
        .bind(uuids(stale))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(())
    }
}
