//! Setting entity (database row mapping).

use sqlx::FromRow;

use domain::models::setting::Setting;

/// Database row mapping for the settings table.
#[derive(Debug, Clone, FromRow)]
pub struct SettingEntity {
    pub key: String,
    pub value: Vec<u8>,
}

impl From<SettingEntity> for Setting {
    fn from(entity: SettingEntity) -> Self {
        Self {
            key: entity.key,
            value: entity.value,
        }
    }
}
