//! Record store backends.
mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::product::{PgProductRepository, ProductRepository};
use crate::user::{PgUserRepository, UserRepository};

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "micromarket";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// PostgreSQL connection pool.
#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Init database connections.
    pub async fn new(
        hostname: &str,
        username: &str,
        password: &str,
        db: &str,
        pool: u32,
    ) -> Result<Self, sqlx::Error> {
        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let pool = PgPoolOptions::new().max_connections(pool);
        let postgres = pool.connect(&addr).await?;

        tracing::info!(%hostname, %db, "postgres connected");

        Ok(Self { postgres })
    }

    /// Execute migrations scripts.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.postgres).await
    }
}

/// Both repositories of the record store.
#[derive(Clone)]
pub struct Store {
    pub products: Arc<dyn ProductRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Store {
    /// Store backed by PostgreSQL.
    pub fn postgres(db: &Database) -> Self {
        Self {
            products: Arc::new(PgProductRepository::new(db.postgres.clone())),
            users: Arc::new(PgUserRepository::new(db.postgres.clone())),
        }
    }

    /// Store living in process memory. Lost on restart.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            products: Arc::clone(&store) as Arc<dyn ProductRepository>,
            users: store,
        }
    }
}
