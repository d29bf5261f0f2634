//! Key/value settings.

use domain::models::setting::{
    is_valid_setting_key, ListSettingKeysResponse, Setting, MAX_SETTING_VALUE_BYTES,
    SETTING_FIRST_RUN, SETTING_THEME, SETTING_UNIT,
};
use persistence::repositories::SettingRepository;

use super::{DiagnosticLog, ServiceError};

/// Values written on first run when the key is still absent.
const DEFAULT_SETTINGS: [(&str, &str); 2] = [(SETTING_THEME, "system"), (SETTING_UNIT, "metric")];

#[derive(Clone)]
pub struct SettingsService {
    repo: SettingRepository,
    log: DiagnosticLog,
}

fn check_key(key: &str) -> Result<(), ServiceError> {
    if is_valid_setting_key(key) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "Invalid setting key '{}'",
            key
        )))
    }
}

impl SettingsService {
    pub fn new(repo: SettingRepository, log: DiagnosticLog) -> Self {
        Self { repo, log }
    }

    /// Write defaults that are missing, then mark first run complete.
    /// Returns true when this was the first run.
    pub async fn initialize(&self) -> Result<bool, ServiceError> {
        for (key, value) in DEFAULT_SETTINGS {
            self.repo.put_if_absent(key, value.as_bytes()).await?;
        }

        let first_run = self.repo.put_if_absent(SETTING_FIRST_RUN, b"1").await?;
        if first_run {
            self.log.info("First run, default settings written").await;
        }
        Ok(first_run)
    }

    pub async fn get(&self, key: &str) -> Result<Setting, ServiceError> {
        check_key(key)?;
        self.repo
            .get(key)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound(format!("Setting '{}'", key)))
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> Result<Setting, ServiceError> {
        check_key(key)?;
        if value.len() > MAX_SETTING_VALUE_BYTES {
            return Err(ServiceError::TooLarge(format!(
                "Setting values are limited to {} bytes",
                MAX_SETTING_VALUE_BYTES
            )));
        }

        let setting = self.repo.put(key, value).await?;
        tracing::debug!(key, bytes = value.len(), "Setting stored");
        Ok(setting.into())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        check_key(key)?;
        if self.repo.delete(key).await? == 0 {
            return Err(ServiceError::NotFound(format!("Setting '{}'", key)));
        }
        Ok(())
    }

    pub async fn list_keys(&self) -> Result<ListSettingKeysResponse, ServiceError> {
        Ok(ListSettingKeysResponse {
            keys: self.repo.list_keys().await?,
        })
    }
}
