//! Common validation utilities.

use validator::ValidationError;

/// Smallest radius the platform engine monitors reliably.
pub const MIN_RADIUS_METERS: f64 = 30.0;

/// Largest radius accepted for a region.
pub const MAX_RADIUS_METERS: f64 = 1_000_000.0;

/// Longest delay after a trigger, in minutes.
pub const MAX_DELAY_MINUTES: i64 = 60;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that a region radius is within 30 m to 1000 km.
pub fn validate_radius(radius_meters: f64) -> Result<(), ValidationError> {
    if (MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&radius_meters) {
        Ok(())
    } else {
        let mut err = ValidationError::new("radius_range");
        err.message = Some("Radius must be between 30 and 1000000 meters".into());
        Err(err)
    }
}

/// Validates that a trigger delay is within 0 to 60 minutes.
pub fn validate_delay_minutes(delay: i64) -> Result<(), ValidationError> {
    if (0..=MAX_DELAY_MINUTES).contains(&delay) {
        Ok(())
    } else {
        let mut err = ValidationError::new("delay_range");
        err.message = Some("Delay must be between 0 and 60 minutes".into());
        Err(err)
    }
}

/// Validates that a deep link uses an http or https scheme.
pub fn validate_link(link: &str) -> Result<(), ValidationError> {
    let lower = link.trim().to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => {
            let mut err = ValidationError::new("link_scheme");
            err.message = Some("Link must be an http or https URL".into());
            Err(err)
        }
    }
}

/// Validates the center and radius of a circular region together.
pub fn validate_region(lat: f64, lon: f64, radius_meters: f64) -> Result<(), ValidationError> {
    validate_latitude(lat)?;
    validate_longitude(lon)?;
    validate_radius(radius_meters)
}
