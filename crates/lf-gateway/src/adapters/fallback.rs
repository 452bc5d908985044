//! Quota store that degrades to process-local counting.
//!
//! Counters normally live in the shared store so every instance behind the
//! load balancer sees the same numbers. When that store errors, hits are
//! counted in this process instead: limits are then enforced per instance,
//! which is looser but keeps admission control from becoming an outage.

use crate::adapters::memory::InMemoryQuotaStore;
use crate::domain::error::StoreError;
use crate::domain::quota::QuotaRecord;
use crate::ports::outbound::{QuotaStore, SharedQuotaStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

pub struct FallbackQuotaStore {
    primary: SharedQuotaStore,
    local: InMemoryQuotaStore,
    /// Set while the primary is failing; used to log transitions once
    degraded: AtomicBool,
}

impl FallbackQuotaStore {
    pub fn new(primary: SharedQuotaStore) -> Self {
        Self {
            primary,
            local: InMemoryQuotaStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the last primary call failed
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn on_primary_error(&self, op: &str, key: &str, error: &StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(op, key, error = %error, "Shared quota store failed, counting locally");
        }
    }

    fn on_primary_ok(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            info!("Shared quota store recovered");
        }
    }
}

#[async_trait]
impl QuotaStore for FallbackQuotaStore {
    async fn hit(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
    ) -> Result<QuotaRecord, StoreError> {
        match self.primary.hit(key, now_ms, window).await {
            Ok(record) => {
                self.on_primary_ok();
                Ok(record)
            }
            Err(e) => {
                self.on_primary_error("hit", key, &e);
                self.local.hit(key, now_ms, window).await
            }
        }
    }

    async fn reset(&self, key: &str, now_ms: u64, window: Duration) -> Result<(), StoreError> {
        // Clear both so a caller counted locally during an outage is also unblocked
        self.local.reset(key, now_ms, window).await?;
        match self.primary.reset(key, now_ms, window).await {
            Ok(()) => {
                self.on_primary_ok();
                Ok(())
            }
            Err(e) => {
                self.on_primary_error("reset", key, &e);
                Ok(())
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<QuotaRecord>, StoreError> {
        match self.primary.get(key).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.on_primary_error("get", key, &e);
                self.local.get(key).await
            }
        }
    }
}
