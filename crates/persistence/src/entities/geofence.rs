//! Geofence entity (database row mapping).

use sqlx::FromRow;

use domain::models::geofence::{FenceColor, Geofence};

/// Database row mapping for the geofences table.
#[derive(Debug, Clone, FromRow)]
pub struct GeofenceEntity {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub color: i64,
    pub active: bool,
    pub trigger_count: i64,
    pub created_at: i64,
    pub last_edit: i64,
}

impl From<GeofenceEntity> for Geofence {
    fn from(entity: GeofenceEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            latitude: entity.latitude,
            longitude: entity.longitude,
            radius_meters: entity.radius_meters,
            color: FenceColor::from_i64(entity.color),
            active: entity.active,
            trigger_count: entity.trigger_count,
            created_at: entity.created_at,
            last_edit: entity.last_edit,
        }
    }
}
