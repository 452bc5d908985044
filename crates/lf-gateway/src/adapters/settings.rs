//! Typed access to the settings table.

use crate::domain::error::StoreError;
use crate::domain::settings::{parse_bool, parse_u64};
use crate::ports::outbound::SharedSettingStore;
use tracing::warn;

/// Reads settings and normalizes them into typed values.
///
/// Values that do not parse are logged and treated as absent, so a typo in
/// the admin panel falls back to the configured default.
#[derive(Clone)]
pub struct TypedSettings {
    store: SharedSettingStore,
}

impl TypedSettings {
    pub fn new(store: SharedSettingStore) -> Self {
        Self { store }
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.get_setting(key).await
    }

    pub async fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.get_string(key).await?.and_then(|raw| {
            let parsed = parse_bool(&raw);
            if parsed.is_none() {
                warn!(key, value = %raw, "Ignoring non-boolean setting");
            }
            parsed
        }))
    }

    pub async fn get_u64(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.get_string(key).await?.and_then(|raw| {
            let parsed = parse_u64(&raw);
            if parsed.is_none() {
                warn!(key, value = %raw, "Ignoring non-numeric setting");
            }
            parsed
        }))
    }
}
