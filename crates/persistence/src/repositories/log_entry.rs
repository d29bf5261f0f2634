//! Diagnostic log repository.

use sqlx::SqlitePool;

use crate::entities::LogEntryEntity;
use crate::metrics::QueryTimer;

/// Repository for the append-only diagnostic log.
#[derive(Clone)]
pub struct LogEntryRepository {
    pool: SqlitePool,
}

impl LogEntryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one entry.
    pub async fn append(
        &self,
        timestamp: i64,
        message: &str,
        severity: i64,
    ) -> Result<LogEntryEntity, sqlx::Error> {
        let timer = QueryTimer::new("append_log_entry");
        let result = sqlx::query_as::<_, LogEntryEntity>(
            r#"
            INSERT INTO log_entries (timestamp, message, severity)
            VALUES (?1, ?2, ?3)
            RETURNING *
            "#,
        )
        .bind(timestamp)
        .bind(message)
        .bind(severity)
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// List entries newest first. `before_id` pages past already seen entries.
    pub async fn list(
        &self,
        limit: i64,
        before_id: Option<i64>,
    ) -> Result<Vec<LogEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_log_entries");
        let result = sqlx::query_as::<_, LogEntryEntity>(
            r#"
            SELECT * FROM log_entries
            WHERE ?1 IS NULL OR id < ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_log_entries");
        let count = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM log_entries")
            .fetch_one(&self.pool)
            .await;
        let count = timer.finish(count)?;
        Ok(count.0)
    }

    /// Delete every entry. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("clear_log_entries");
        let result = sqlx::query("DELETE FROM log_entries")
            .execute(&self.pool)
            .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use fake::faker::lorem::en::Sentence;
    use fake::Fake;

    #[tokio::test]
    async fn test_append_and_page_newest_first() {
        let repo = LogEntryRepository::new(create_memory_pool().await.unwrap());

        let mut ids = Vec::new();
        for i in 0..5 {
            let message: String = Sentence(3..6).fake();
            let entry = repo.append(i, &message, 1).await.unwrap();
            assert_eq!(entry.message, message);
            ids.push(entry.id);
        }

        let first_page = repo.list(2, None).await.unwrap();
        assert_eq!(
            first_page.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![ids[4], ids[3]]
        );

        let second_page = repo.list(2, Some(ids[3])).await.unwrap();
        assert_eq!(
            second_page.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1]]
        );

        assert_eq!(repo.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_clear() {
        let repo = LogEntryRepository::new(create_memory_pool().await.unwrap());
        repo.append(1, "one", 0).await.unwrap();
        repo.append(2, "two", 3).await.unwrap();

        assert_eq!(repo.clear().await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.list(10, None).await.unwrap().is_empty());
    }
}
