//! Geofication repository for database operations.

use sqlx::{SqliteConnection, SqlitePool};

use crate::entities::GeoficationEntity;
use crate::metrics::QueryTimer;

/// Fields of a new geofication.
#[derive(Debug, Clone)]
pub struct GeoficationInput<'a> {
    pub message: &'a str,
    pub flags: i64,
    pub delay_minutes: i64,
    pub repeat: bool,
    pub active: bool,
    pub on_trigger: i64,
    pub link: Option<&'a str>,
    pub is_alarm: bool,
}

/// Partial update of a geofication. `None` fields are preserved;
/// `clear_link` removes the stored link.
#[derive(Debug, Clone, Default)]
pub struct GeoficationChanges<'a> {
    pub message: Option<&'a str>,
    pub flags: Option<i64>,
    pub delay_minutes: Option<i64>,
    pub repeat: Option<bool>,
    pub on_trigger: Option<i64>,
    pub link: Option<&'a str>,
    pub clear_link: bool,
    pub is_alarm: Option<bool>,
}

/// Inserts a geofication on an existing connection or transaction.
pub(crate) async fn insert_geofication(
    conn: &mut SqliteConnection,
    geofence_id: i64,
    input: &GeoficationInput<'_>,
    now: i64,
) -> Result<GeoficationEntity, sqlx::Error> {
    sqlx::query_as::<_, GeoficationEntity>(
        r#"
        INSERT INTO geofications (geofence_id, message, flags, delay_minutes, repeat, active,
                                  on_trigger, link, is_alarm, trigger_count, created_at, last_edit)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?10)
        RETURNING *
        "#,
    )
    .bind(geofence_id)
    .bind(input.message)
    .bind(input.flags)
    .bind(input.delay_minutes)
    .bind(input.repeat)
    .bind(input.active)
    .bind(input.on_trigger)
    .bind(input.link)
    .bind(input.is_alarm)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Repository for geofication-related database operations.
#[derive(Clone)]
pub struct GeoficationRepository {
    pool: SqlitePool,
}

impl GeoficationRepository {
    /// Creates a new GeoficationRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a geofication bound to an existing geofence.
    /// Fails with a foreign key violation if the geofence does not exist.
    pub async fn create(
        &self,
        geofence_id: i64,
        input: &GeoficationInput<'_>,
        now: i64,
    ) -> Result<GeoficationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_geofication");
        let result = async {
            let mut conn = self.pool.acquire().await?;
            insert_geofication(&mut *conn, geofence_id, input, now).await
        }
        .await;
        timer.finish(result)
    }

    /// Find geofication by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<GeoficationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofication_by_id");
        let result = sqlx::query_as::<_, GeoficationEntity>(
            r#"
            SELECT * FROM geofications WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Find all geofications bound to a geofence, in creation order.
    pub async fn find_by_geofence_id(
        &self,
        geofence_id: i64,
    ) -> Result<Vec<GeoficationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofications_by_geofence");
        let result = sqlx::query_as::<_, GeoficationEntity>(
            r#"
            SELECT * FROM geofications
            WHERE geofence_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(geofence_id)
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Update a geofication (partial update).
    pub async fn update(
        &self,
        id: i64,
        changes: &GeoficationChanges<'_>,
        now: i64,
    ) -> Result<Option<GeoficationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_geofication");
        let result = sqlx::query_as::<_, GeoficationEntity>(
            r#"
            UPDATE geofications SET
                message = COALESCE(?2, message),
                flags = COALESCE(?3, flags),
                delay_minutes = COALESCE(?4, delay_minutes),
                repeat = COALESCE(?5, repeat),
                on_trigger = COALESCE(?6, on_trigger),
                link = CASE WHEN ?8 THEN NULL ELSE COALESCE(?7, link) END,
                is_alarm = COALESCE(?9, is_alarm),
                last_edit = ?10
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.message)
        .bind(changes.flags)
        .bind(changes.delay_minutes)
        .bind(changes.repeat)
        .bind(changes.on_trigger)
        .bind(changes.link)
        .bind(changes.clear_link)
        .bind(changes.is_alarm)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Set the active flag. Returns the updated row, or None if it does not exist.
    pub async fn set_active(
        &self,
        id: i64,
        active: bool,
        now: i64,
    ) -> Result<Option<GeoficationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_geofication_active");
        let result = sqlx::query_as::<_, GeoficationEntity>(
            r#"
            UPDATE geofications SET active = ?2, last_edit = ?3
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Flip an active geofication to inactive.
    ///
    /// Returns true only for the caller whose update changed the row, so
    /// concurrent callers can use it as a claim.
    pub async fn deactivate_if_active(&self, id: i64, now: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("deactivate_geofication_if_active");
        let result = sqlx::query(
            r#"
            UPDATE geofications SET active = 0, last_edit = ?2
            WHERE id = ?1 AND active = 1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected() == 1)
    }

    /// Atomically increment the trigger count.
    /// Returns false if the geofication no longer exists.
    pub async fn increment_trigger_count(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("increment_geofication_trigger_count");
        let result = sqlx::query(
            r#"
            UPDATE geofications SET trigger_count = trigger_count + 1 WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a geofication.
    /// Returns the number of rows deleted (0 or 1).
    pub async fn delete(&self, id: i64) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_geofication");
        let result = sqlx::query(
            r#"
            DELETE FROM geofications WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected())
    }
}
