//! Persistence layer for Geofication.
//!
//! This crate contains:
//! - SQLite connection management and schema migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
