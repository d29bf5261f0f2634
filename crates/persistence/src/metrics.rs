//! Database metrics.
//!
//! Every repository query goes through a [`QueryTimer`], which records the
//! latency with an `outcome` label and counts failures per query name.

use metrics::{counter, gauge, histogram};
use sqlx::SqlitePool;
use std::time::Instant;

/// Outcome label for a query that returned a value.
pub const OUTCOME_OK: &str = "ok";
/// Outcome label for a query that returned an error.
pub const OUTCOME_ERROR: &str = "error";

fn record_query(query_name: &str, outcome: &'static str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string(),
        "outcome" => outcome
    )
    .record(duration_secs);

    if outcome == OUTCOME_ERROR {
        counter!("database_query_errors_total", "query" => query_name.to_string()).increment(1);
    }
}

/// Publish connection pool gauges.
pub fn record_pool_metrics(pool: &SqlitePool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("database_connections_active").set(active as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
}

/// Times one repository operation.
///
/// ```ignore
/// let timer = QueryTimer::new("find_geofence_by_id");
/// let result = sqlx::query_as::<_, GeofenceEntity>(..).fetch_optional(&pool).await;
/// timer.finish(result)
/// ```
///
/// Multi-statement operations wrap their body in an `async` block so an
/// early `?` still reaches `finish`.
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Record the elapsed time under the result's outcome and pass the
    /// result through.
    pub fn finish<T>(self, result: Result<T, sqlx::Error>) -> Result<T, sqlx::Error> {
        let outcome = outcome_of(&result);
        if let Err(e) = &result {
            tracing::debug!(query = self.query_name, error = %e, "Database query failed");
        }
        record_query(self.query_name, outcome, self.start.elapsed().as_secs_f64());
        result
    }
}

fn outcome_of<T>(result: &Result<T, sqlx::Error>) -> &'static str {
    if result.is_ok() {
        OUTCOME_OK
    } else {
        OUTCOME_ERROR
    }
}
