//! Setting repository for key/value blobs.

use sqlx::SqlitePool;

use crate::entities::SettingEntity;
use crate::metrics::QueryTimer;

/// Repository for the settings table.
#[derive(Clone)]
pub struct SettingRepository {
    pool: SqlitePool,
}

impl SettingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<SettingEntity>, sqlx::Error> {
        let timer = QueryTimer::new("get_setting");
        let result = sqlx::query_as::<_, SettingEntity>(
            r#"
            SELECT key, value FROM settings WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Insert or replace a value.
    pub async fn put(&self, key: &str, value: &[u8]) -> Result<SettingEntity, sqlx::Error> {
        let timer = QueryTimer::new("put_setting");
        let result = sqlx::query_as::<_, SettingEntity>(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            RETURNING key, value
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Insert a value only when the key is absent.
    /// Returns true if the value was written.
    pub async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("put_setting_if_absent");
        let result = sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns the number of rows deleted (0 or 1).
    pub async fn delete(&self, key: &str) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_setting");
        let result = sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected())
    }

    /// All stored keys, sorted.
    pub async fn list_keys(&self) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("list_setting_keys");
        let rows = sqlx::query_as::<_, (String,)>("SELECT key FROM settings ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await;
        let rows = timer.finish(rows)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
