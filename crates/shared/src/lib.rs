//! Shared utilities and common types for Geofication.
//!
//! This crate provides common functionality used across all other crates:
//! - Common validation logic for regions and reminder rules
//! - Epoch-millisecond time helpers

pub mod time;
pub mod validation;
