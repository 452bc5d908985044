//! Outbound ports for the gateway.
//!
//! Persistence is owned by the host application (a shared SQL database in
//! production). The gateway only needs a settings table and a quota table, so
//! those are the only two storage traits here.

use crate::domain::error::StoreError;
use crate::domain::quota::QuotaRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Time source trait for testability
pub trait TimeSource: Send + Sync {
    /// Unix time in milliseconds
    fn now_millis(&self) -> u64;

    /// Unix time in seconds
    fn now_secs(&self) -> u64 {
        self.now_millis() / 1000
    }
}

/// System time implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        // Clock before Unix epoch - return 0 rather than panic
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now_ms: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_millis(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Key/value settings table
#[async_trait]
pub trait SettingStore: Send + Sync {
    /// Fetch a raw setting value
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a setting, replacing any previous value
    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write a setting only if it has no value yet.
    ///
    /// Returns the value that is stored afterwards: `value` if this call won,
    /// the existing value otherwise. Backends with a conditional insert
    /// (`INSERT .. ON CONFLICT DO NOTHING`) should override this default,
    /// which is only atomic within a single process.
    async fn put_setting_if_absent(&self, key: &str, value: &str) -> Result<String, StoreError> {
        if let Some(existing) = self.get_setting(key).await? {
            return Ok(existing);
        }
        self.put_setting(key, value).await?;
        Ok(value.to_string())
    }

    /// Replace `expected` with `value`, only if `expected` is still stored.
    ///
    /// Returns the value stored afterwards, like `put_setting_if_absent`. A
    /// missing key counts as a match. The default is only atomic within a
    /// single process; SQL backends should use `UPDATE .. WHERE value = ?`.
    async fn replace_setting_if(
        &self,
        key: &str,
        expected: &str,
        value: &str,
    ) -> Result<String, StoreError> {
        match self.get_setting(key).await? {
            Some(current) if current != expected => Ok(current),
            _ => {
                self.put_setting(key, value).await?;
                Ok(value.to_string())
            }
        }
    }
}

/// Per-identity counters shared by every server instance
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Count one hit for `key` and return the record after the update.
    ///
    /// The read-modify-write must be atomic per key: concurrent hits on the
    /// same key must each observe a distinct count.
    async fn hit(&self, key: &str, now_ms: u64, window: Duration)
        -> Result<QuotaRecord, StoreError>;

    /// Clear `key` to a zero count with a fresh window
    async fn reset(&self, key: &str, now_ms: u64, window: Duration) -> Result<(), StoreError>;

    /// Current record, if any
    async fn get(&self, key: &str) -> Result<Option<QuotaRecord>, StoreError>;
}

pub type SharedSettingStore = Arc<dyn SettingStore>;
pub type SharedQuotaStore = Arc<dyn QuotaStore>;
