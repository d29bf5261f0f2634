//! Repository implementations for database operations.

pub mod geofence;
pub mod geofication;
pub mod log_entry;
pub mod pending_dispatch;
pub mod setting;

pub use geofence::{GeofenceChanges, GeofenceInput, GeofenceRepository};
pub use geofication::{GeoficationChanges, GeoficationInput, GeoficationRepository};
pub use log_entry::LogEntryRepository;
pub use pending_dispatch::{NewPendingDispatch, PendingDispatchRepository};
pub use setting::SettingRepository;
