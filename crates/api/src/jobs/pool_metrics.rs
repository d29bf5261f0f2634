//! Records SQLite pool gauges for the `/metrics` endpoint.

use sqlx::SqlitePool;

use super::scheduler::{Job, JobFrequency};

pub struct PoolMetricsJob {
    pool: SqlitePool,
}

impl PoolMetricsJob {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> Result<(), String> {
        persistence::metrics::record_pool_metrics(&self.pool);
        Ok(())
    }
}
