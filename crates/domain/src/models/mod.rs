//! Domain models for Geofication.

pub mod dispatch;
pub mod geofence;
pub mod geofication;
pub mod log_entry;
pub mod setting;
pub mod transition;

pub use dispatch::{DispatchPayload, NotificationAction, NotificationContent};
pub use geofence::{FenceColor, Geofence};
pub use geofication::{DirectionFlags, Geofication, PostTriggerAction};
pub use log_entry::{LogEntry, Severity};
pub use setting::Setting;
pub use transition::{RawTransitionEvent, TransitionEvent, TransitionType};
