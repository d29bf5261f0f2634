//! HTTP route handlers.

pub mod geofences;
pub mod geofications;
pub mod health;
pub mod logs;
pub mod settings;
pub mod transitions;
