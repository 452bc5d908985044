//! Fixed-window quota records.
//!
//! A record is `Active(hit_count, window_reset_at)`. Stores persist records and
//! call [`QuotaRecord::register_hit`] / [`QuotaRecord::reset`] inside whatever
//! per-key critical section they provide, so the arithmetic lives in one place.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Persisted counter for one identity key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    pub key: String,
    pub hit_count: u64,
    /// Unix milliseconds at which the current window ends
    pub window_reset_at: u64,
}

impl QuotaRecord {
    /// First hit of a new window
    pub fn open(key: impl Into<String>, now_ms: u64, window: Duration) -> Self {
        Self {
            key: key.into(),
            hit_count: 1,
            window_reset_at: window_end(now_ms, window),
        }
    }

    /// Apply one hit to an optional existing record.
    ///
    /// An expired window (`now >= window_reset_at`) restarts at 1.
    pub fn register_hit(
        existing: Option<QuotaRecord>,
        key: &str,
        now_ms: u64,
        window: Duration,
    ) -> QuotaRecord {
        match existing {
            Some(record) if now_ms < record.window_reset_at => QuotaRecord {
                hit_count: record.hit_count.saturating_add(1),
                ..record
            },
            _ => QuotaRecord::open(key, now_ms, window),
        }
    }

    /// Cleared record with a fresh window. Applying it twice yields the same state.
    pub fn reset(key: impl Into<String>, now_ms: u64, window: Duration) -> Self {
        Self {
            key: key.into(),
            hit_count: 0,
            window_reset_at: window_end(now_ms, window),
        }
    }
}

fn window_end(now_ms: u64, window: Duration) -> u64 {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    now_ms.saturating_add(window_ms)
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub hit_count: u64,
    /// Unix milliseconds at which the window ends
    pub reset_at: u64,
}

impl QuotaDecision {
    /// Any count above the limit rejects
    pub fn evaluate(record: &QuotaRecord, limit: u64) -> Self {
        Self {
            allowed: record.hit_count <= limit,
            limit,
            remaining: limit.saturating_sub(record.hit_count),
            hit_count: record.hit_count,
            reset_at: record.window_reset_at,
        }
    }

    /// Seconds until reset, rounded up (for `RateLimit-Reset` / `Retry-After`)
    pub fn reset_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at.saturating_sub(now_ms).div_ceil(1000)
    }
}
