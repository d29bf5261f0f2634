//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod geofence;
pub mod geofication;
pub mod log_entry;
pub mod pending_dispatch;
pub mod setting;

pub use geofence::GeofenceEntity;
pub use geofication::GeoficationEntity;
pub use log_entry::LogEntryEntity;
pub use pending_dispatch::PendingDispatchEntity;
pub use setting::SettingEntity;
