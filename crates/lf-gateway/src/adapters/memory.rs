//! In-memory store adapters.
//!
//! Used by the standalone binary, by tests, and as the process-local fallback
//! for quota counting. Each store can be switched "unavailable" to exercise
//! the degraded paths.

use crate::domain::error::StoreError;
use crate::domain::quota::QuotaRecord;
use crate::ports::outbound::{QuotaStore, SettingStore};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;

/// Availability switch shared by the memory stores
#[derive(Debug)]
struct Availability(AtomicBool);

impl Default for Availability {
    fn default() -> Self {
        Self(AtomicBool::new(true))
    }
}

impl Availability {
    fn check(&self, store: &str) -> Result<(), StoreError> {
        if self.0.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("{store} is offline")))
        }
    }

    fn set(&self, available: bool) {
        self.0.store(available, Ordering::SeqCst);
    }
}

/// Settings table backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemorySettingStore {
    values: DashMap<String, String>,
    writes: AtomicUsize,
    availability: Availability,
}

impl InMemorySettingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write
    pub fn with_setting(self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// Number of successful writes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.availability.set(available);
    }

    /// Drop every stored value (simulates a wiped table)
    pub fn clear(&self) {
        self.values.clear();
    }
}

#[async_trait]
impl SettingStore for InMemorySettingStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.availability.check("setting store")?;
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.availability.check("setting store")?;
        self.values.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn put_setting_if_absent(&self, key: &str, value: &str) -> Result<String, StoreError> {
        self.availability.check("setting store")?;
        let entry = self.values.entry(key.to_string()).or_insert_with(|| {
            self.writes.fetch_add(1, Ordering::SeqCst);
            value.to_string()
        });
        Ok(entry.value().clone())
    }

    async fn replace_setting_if(
        &self,
        key: &str,
        expected: &str,
        value: &str,
    ) -> Result<String, StoreError> {
        self.availability.check("setting store")?;
        match self.values.entry(key.to_string()) {
            Entry::Occupied(entry) if entry.get() != expected => Ok(entry.get().clone()),
            Entry::Occupied(mut entry) => {
                entry.insert(value.to_string());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(value.to_string())
            }
            Entry::Vacant(entry) => {
                entry.insert(value.to_string());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(value.to_string())
            }
        }
    }
}

/// Quota table backed by a concurrent map.
///
/// `DashMap::entry` holds the shard write lock for the whole update, which
/// makes each hit an atomic read-modify-write for its key.
#[derive(Debug, Default)]
pub struct InMemoryQuotaStore {
    records: DashMap<String, QuotaRecord>,
    availability: Availability,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.availability.set(available);
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn hit(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
    ) -> Result<QuotaRecord, StoreError> {
        self.availability.check("quota store")?;
        let next = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next =
                    QuotaRecord::register_hit(Some(occupied.get().clone()), key, now_ms, window);
                occupied.insert(next.clone());
                next
            }
            Entry::Vacant(vacant) => vacant
                .insert(QuotaRecord::open(key, now_ms, window))
                .value()
                .clone(),
        };
        trace!(key, hit_count = next.hit_count, "Quota hit recorded");
        Ok(next)
    }

    async fn reset(&self, key: &str, now_ms: u64, window: Duration) -> Result<(), StoreError> {
        self.availability.check("quota store")?;
        self.records
            .insert(key.to_string(), QuotaRecord::reset(key, now_ms, window));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<QuotaRecord>, StoreError> {
        self.availability.check("quota store")?;
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }
}
