//! Pending dispatch repository.
//!
//! Data access for the durable deferred-dispatch queue. Rows move
//! `pending -> running -> delivered | skipped | failed`; a failed attempt
//! that may be retried goes back to `pending` with a later due time.

use sqlx::SqlitePool;

use crate::entities::pending_dispatch::{
    PendingDispatchEntity, STATUS_DELIVERED, STATUS_FAILED, STATUS_PENDING, STATUS_RUNNING,
    STATUS_SKIPPED,
};
use crate::metrics::QueryTimer;

/// Fields of a newly scheduled dispatch.
#[derive(Debug, Clone)]
pub struct NewPendingDispatch<'a> {
    pub job_id: &'a str,
    pub geofence_id: i64,
    pub geofication_id: i64,
    pub post_trigger_action: i64,
    pub payload: &'a str,
    pub due_at: i64,
    /// Delivery attempts already made before the row was queued.
    pub attempts: i64,
}

/// Repository for pending dispatch operations.
#[derive(Clone)]
pub struct PendingDispatchRepository {
    pool: SqlitePool,
}

impl PendingDispatchRepository {
    /// Create a new repository instance.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending dispatch.
    pub async fn enqueue(
        &self,
        input: &NewPendingDispatch<'_>,
        now: i64,
    ) -> Result<PendingDispatchEntity, sqlx::Error> {
        let timer = QueryTimer::new("enqueue_pending_dispatch");
        let result = sqlx::query_as::<_, PendingDispatchEntity>(
            r#"
            INSERT INTO pending_dispatches (job_id, geofence_id, geofication_id, post_trigger_action,
                                            payload, due_at, status, attempts, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            RETURNING *
            "#,
        )
        .bind(input.job_id)
        .bind(input.geofence_id)
        .bind(input.geofication_id)
        .bind(input.post_trigger_action)
        .bind(input.payload)
        .bind(input.due_at)
        .bind(STATUS_PENDING)
        .bind(input.attempts)
        .bind(now)
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Atomically claim up to `limit` due rows, moving them to `running`
    /// and counting the attempt. A row is handed to exactly one caller.
    pub async fn claim_due(
        &self,
        now: i64,
        limit: i64,
    ) -> Result<Vec<PendingDispatchEntity>, sqlx::Error> {
        let timer = QueryTimer::new("claim_due_dispatches");
        let result = sqlx::query_as::<_, PendingDispatchEntity>(
            r#"
            UPDATE pending_dispatches
            SET status = ?1, attempts = attempts + 1, updated_at = ?3
            WHERE id IN (
                SELECT id FROM pending_dispatches
                WHERE status = ?2 AND due_at <= ?3
                ORDER BY due_at ASC, id ASC
                LIMIT ?4
            )
            RETURNING *
            "#,
        )
        .bind(STATUS_RUNNING)
        .bind(STATUS_PENDING)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        let mut claimed = timer.finish(result)?;
        claimed.sort_by_key(|d| (d.due_at, d.id));
        Ok(claimed)
    }

    /// Mark a running dispatch as delivered.
    pub async fn mark_delivered(&self, id: i64, now: i64) -> Result<bool, sqlx::Error> {
        self.finish_running(id, STATUS_DELIVERED, None, now, "mark_dispatch_delivered")
            .await
    }

    /// Mark a running dispatch as skipped because its targets changed.
    pub async fn mark_skipped(&self, id: i64, reason: &str, now: i64) -> Result<bool, sqlx::Error> {
        self.finish_running(id, STATUS_SKIPPED, Some(reason), now, "mark_dispatch_skipped")
            .await
    }

    /// Mark a running dispatch as permanently failed.
    pub async fn mark_failed(&self, id: i64, error: &str, now: i64) -> Result<bool, sqlx::Error> {
        self.finish_running(id, STATUS_FAILED, Some(error), now, "mark_dispatch_failed")
            .await
    }

    async fn finish_running(
        &self,
        id: i64,
        status: &str,
        error: Option<&str>,
        now: i64,
        query_name: &'static str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new(query_name);
        let result = sqlx::query(
            r#"
            UPDATE pending_dispatches
            SET status = ?2, last_error = COALESCE(?3, last_error), updated_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .bind(now)
        .bind(STATUS_RUNNING)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected() == 1)
    }

    /// Put a running dispatch back in the queue after a failed attempt.
    pub async fn reschedule(
        &self,
        id: i64,
        error: &str,
        next_due_at: i64,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("reschedule_dispatch");
        let result = sqlx::query(
            r#"
            UPDATE pending_dispatches
            SET status = ?2, last_error = ?3, due_at = ?4, updated_at = ?5
            WHERE id = ?1 AND status = ?6
            "#,
        )
        .bind(id)
        .bind(STATUS_PENDING)
        .bind(error)
        .bind(next_due_at)
        .bind(now)
        .bind(STATUS_RUNNING)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected() == 1)
    }

    /// Return rows left `running` by a process that died mid-delivery to
    /// the queue. Returns the number of rows requeued.
    pub async fn requeue_running(&self, now: i64) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("requeue_running_dispatches");
        let result = sqlx::query(
            r#"
            UPDATE pending_dispatches
            SET status = ?1, updated_at = ?3
            WHERE status = ?2
            "#,
        )
        .bind(STATUS_PENDING)
        .bind(STATUS_RUNNING)
        .bind(now)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected())
    }

    /// Find a dispatch by its job id.
    pub async fn find_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Option<PendingDispatchEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_dispatch_by_job_id");
        let result = sqlx::query_as::<_, PendingDispatchEntity>(
            r#"
            SELECT * FROM pending_dispatches WHERE job_id = ?1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Count dispatches in one status.
    pub async fn count_by_status(&self, status: &str) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_dispatches_by_status");
        let count =
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM pending_dispatches WHERE status = ?1")
                .bind(status)
                .fetch_one(&self.pool)
                .await;
        let count = timer.finish(count)?;
        Ok(count.0)
    }

    /// Delete finished dispatches last touched before `cutoff`.
    /// Returns the number of deleted rows.
    pub async fn delete_finished_before(&self, cutoff: i64) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_finished_dispatches");
        let result = sqlx::query(
            r#"
            DELETE FROM pending_dispatches
            WHERE status IN (?1, ?2, ?3) AND updated_at < ?4
            "#,
        )
        .bind(STATUS_DELIVERED)
        .bind(STATUS_SKIPPED)
        .bind(STATUS_FAILED)
        .bind(cutoff)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected())
    }
}
