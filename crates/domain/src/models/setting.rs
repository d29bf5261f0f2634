//! Key/value settings.
//!
//! Settings are opaque byte blobs keyed by name. Only initialization reads
//! them; everything else treats values as uninterpreted bytes.

use serde::Serialize;

/// Selected color theme.
pub const SETTING_THEME: &str = "theme";
/// Distance unit used for display.
pub const SETTING_UNIT: &str = "unit";
/// Display locale override.
pub const SETTING_LOCALE: &str = "locale";
/// Present once the first-run initialization completed.
pub const SETTING_FIRST_RUN: &str = "first_run";
/// Present once the user dismissed the onboarding popup.
pub const SETTING_POPUP_DISMISSED: &str = "popup_dismissed";

/// Keys known to the application.
pub const KNOWN_SETTING_KEYS: [&str; 5] = [
    SETTING_THEME,
    SETTING_UNIT,
    SETTING_LOCALE,
    SETTING_FIRST_RUN,
    SETTING_POPUP_DISMISSED,
];

/// Maximum length of a setting key.
pub const MAX_SETTING_KEY_LENGTH: usize = 64;

/// Maximum size of a setting value in bytes.
pub const MAX_SETTING_VALUE_BYTES: usize = 16 * 1024;

/// A persisted setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: Vec<u8>,
}

/// Response listing stored setting keys.
#[derive(Debug, Clone, Serialize)]
pub struct ListSettingKeysResponse {
    pub keys: Vec<String>,
}

/// Whether `key` is an acceptable setting name.
///
/// Keys are lowercase ASCII letters, digits and underscores.
pub fn is_valid_setting_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_SETTING_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
