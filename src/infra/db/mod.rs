//! Postgres-backed repository implementations.

mod api_keys;
mod comments;
mod files;
mod jobs;
mod nodes;
mod subjects;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use apalis_sql::postgres::PostgresStorage;
use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// One connection pool implementing every repository trait.
///
/// The server opens two of these: one for request handlers and one for the
/// render workers.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Apply the embedded schema, then create the worker queue's tables.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(self.pool()).await?;
        PostgresStorage::setup(self.pool()).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}
