use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod dto;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use repository::{MemoryScoreStore, ScoreRepository, ScoreStore};
pub use services::{LedgerSettings, ScoreLedger};

use error::Result;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Postgres-backed score store; waits for a triple at most `lock_timeout`.
    pub fn score_store(&self, lock_timeout: Duration) -> ScoreRepository {
        ScoreRepository::new(self.pool.clone(), lock_timeout)
    }
}
