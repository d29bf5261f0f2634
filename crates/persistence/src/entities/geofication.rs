//! Geofication entity (database row mapping).

use sqlx::FromRow;

use domain::models::geofication::{DirectionFlags, Geofication, PostTriggerAction};

/// Database row mapping for the geofications table.
#[derive(Debug, Clone, FromRow)]
pub struct GeoficationEntity {
    pub id: i64,
    pub geofence_id: i64,
    pub message: String,
    pub flags: i64,
    pub delay_minutes: i64,
    pub repeat: bool,
    pub active: bool,
    pub on_trigger: i64,
    pub link: Option<String>,
    pub is_alarm: bool,
    pub trigger_count: i64,
    pub created_at: i64,
    pub last_edit: i64,
}

impl From<GeoficationEntity> for Geofication {
    /// A row with out-of-range codes maps to an inactive rule so it never fires.
    fn from(entity: GeoficationEntity) -> Self {
        let flags = DirectionFlags::from_bits(entity.flags);
        let on_trigger = PostTriggerAction::from_i64(entity.on_trigger);
        let valid = flags.is_some() && on_trigger.is_some();
        if !valid {
            tracing::warn!(
                geofication_id = entity.id,
                flags = entity.flags,
                on_trigger = entity.on_trigger,
                "Geofication row has invalid codes, treating as inactive"
            );
        }

        Self {
            id: entity.id,
            geofence_id: entity.geofence_id,
            message: entity.message,
            flags: flags.unwrap_or(DirectionFlags::Both),
            delay_minutes: entity.delay_minutes,
            repeat: entity.repeat,
            active: entity.active && valid,
            on_trigger: on_trigger.unwrap_or_default(),
            link: entity.link,
            is_alarm: entity.is_alarm,
            trigger_count: entity.trigger_count,
            created_at: entity.created_at,
            last_edit: entity.last_edit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entity() -> GeoficationEntity {
        GeoficationEntity {
            id: 3,
            geofence_id: 1,
            message: "Water the plants".to_string(),
            flags: 2,
            delay_minutes: 10,
            repeat: true,
            active: true,
            on_trigger: 1,
            link: Some("https://example.com".to_string()),
            is_alarm: false,
            trigger_count: 0,
            created_at: 1_700_000_000_000,
            last_edit: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_geofication_entity_to_domain() {
        let geofication: Geofication = create_test_entity().into();

        assert_eq!(geofication.id, 3);
        assert_eq!(geofication.geofence_id, 1);
        assert_eq!(geofication.flags, DirectionFlags::Exit);
        assert_eq!(geofication.on_trigger, PostTriggerAction::Deactivate);
        assert_eq!(geofication.delay_minutes, 10);
        assert!(geofication.repeat);
        assert!(geofication.active);
        assert_eq!(geofication.link.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_invalid_codes_map_to_inactive() {
        let mut entity = create_test_entity();
        entity.flags = 9;
        let geofication: Geofication = entity.into();
        assert!(!geofication.active);

        let mut entity = create_test_entity();
        entity.on_trigger = 5;
        let geofication: Geofication = entity.into();
        assert!(!geofication.active);
        assert_eq!(geofication.on_trigger, PostTriggerAction::StayActive);
    }
}
