//! Geofence repository for database operations.

use sqlx::SqlitePool;

use crate::entities::{GeofenceEntity, GeoficationEntity};
use crate::metrics::QueryTimer;
use crate::repositories::geofication::{insert_geofication, GeoficationInput};

/// Fields of a new geofence.
#[derive(Debug, Clone)]
pub struct GeofenceInput<'a> {
    pub name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub color: i64,
    pub active: bool,
}

/// Partial update of a geofence. `None` fields are preserved.
#[derive(Debug, Clone, Default)]
pub struct GeofenceChanges<'a> {
    pub name: Option<&'a str>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<f64>,
    pub color: Option<i64>,
}

/// Repository for geofence-related database operations.
#[derive(Clone)]
pub struct GeofenceRepository {
    pool: SqlitePool,
}

impl GeofenceRepository {
    /// Creates a new GeofenceRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new geofence.
    pub async fn create(
        &self,
        input: &GeofenceInput<'_>,
        now: i64,
    ) -> Result<GeofenceEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_geofence");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            INSERT INTO geofences (name, latitude, longitude, radius_meters, color, active,
                                   trigger_count, created_at, last_edit)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)
            RETURNING *
            "#,
        )
        .bind(input.name)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.radius_meters)
        .bind(input.color)
        .bind(input.active)
        .bind(now)
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Create a geofence together with its first geofication in one
    /// transaction. Either both rows exist afterwards or neither does.
    pub async fn create_with_geofication(
        &self,
        fence: &GeofenceInput<'_>,
        geofication: &GeoficationInput<'_>,
        now: i64,
    ) -> Result<(GeofenceEntity, GeoficationEntity), sqlx::Error> {
        let timer = QueryTimer::new("create_geofence_with_geofication");
        let result = async {
            let mut tx = self.pool.begin().await?;

            let geofence = sqlx::query_as::<_, GeofenceEntity>(
                r#"
                INSERT INTO geofences (name, latitude, longitude, radius_meters, color, active,
                                       trigger_count, created_at, last_edit)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)
                RETURNING *
                "#,
            )
            .bind(fence.name)
            .bind(fence.latitude)
            .bind(fence.longitude)
            .bind(fence.radius_meters)
            .bind(fence.color)
            .bind(fence.active)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            let rule = insert_geofication(&mut *tx, geofence.id, geofication, now).await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>((geofence, rule))
        }
        .await;
        timer.finish(result)
    }

    /// Find geofence by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofence_by_id");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            SELECT * FROM geofences WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Find all geofences, newest first.
    pub async fn find_all(&self, include_inactive: bool) -> Result<Vec<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_all_geofences");
        let result = if include_inactive {
            sqlx::query_as::<_, GeofenceEntity>(
                r#"
                SELECT * FROM geofences
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, GeofenceEntity>(
                r#"
                SELECT * FROM geofences
                WHERE active = 1
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await
        };
        timer.finish(result)
    }

    /// Find every active geofence, oldest first. Used for boot re-registration.
    pub async fn find_active(&self) -> Result<Vec<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_geofences");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            SELECT * FROM geofences WHERE active = 1 ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Update a geofence (partial update).
    /// Only provided fields are updated; None values are preserved.
    pub async fn update(
        &self,
        id: i64,
        changes: &GeofenceChanges<'_>,
        now: i64,
    ) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_geofence");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            UPDATE geofences SET
                name = COALESCE(?2, name),
                latitude = COALESCE(?3, latitude),
                longitude = COALESCE(?4, longitude),
                radius_meters = COALESCE(?5, radius_meters),
                color = COALESCE(?6, color),
                last_edit = ?7
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.latitude)
        .bind(changes.longitude)
        .bind(changes.radius_meters)
        .bind(changes.color)
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
    ) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_geofence_active");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            UPDATE geofences SET active = ?2, last_edit = ?3
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

    /// Atomically increment the trigger count.
    /// Returns false if the geofence no longer exists.
    pub async fn increment_trigger_count(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("increment_geofence_trigger_count");
        let result = sqlx::query(
            r#"
            UPDATE geofences SET trigger_count = trigger_count + 1 WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a geofence; its geofications are removed by the cascade.
    /// Returns the number of rows deleted (0 or 1).
    pub async fn delete(&self, id: i64) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_geofence");
        let result = sqlx::query(
            r#"
            DELETE FROM geofences WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        let result = timer.finish(result)?;
        Ok(result.rows_affected())
    }
}
