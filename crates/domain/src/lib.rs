//! Domain layer for Geofication.
//!
//! This crate contains:
//! - Domain models (Geofence, Geofication, LogEntry, Setting, dispatch payloads)
//! - The trigger policy engine
//! - Boundary traits for the notification dispatcher and platform geofencing

pub mod models;
pub mod services;
