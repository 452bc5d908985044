//! One-shot initialization with a degraded fallback slot.
//!
//! `InitOnce` wraps `tokio::sync::OnceCell`: the first caller runs the
//! initializer while every concurrent caller awaits the same attempt, so a
//! value is produced at most once. A failed attempt leaves the cell empty and
//! the next caller retries.
//!
//! The fallback slot holds a value served while initialization has not
//! succeeded (store unreachable, boot still in progress). It is created at
//! most once too, and is superseded as soon as the cell is filled.

use crate::ports::outbound::SettingStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub struct InitOnce<T> {
    cell: OnceCell<Arc<T>>,
    fallback: OnceCell<Arc<T>>,
}

impl<T> Default for InitOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InitOnce<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            fallback: OnceCell::new(),
        }
    }

    /// Run `init` unless a value exists or another caller is already running it.
    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell
            .get_or_try_init(|| async move { init().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// The initialized value, if initialization has completed
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// The initialized value, else the fallback (created with `make` on first use).
    ///
    /// Concurrent first callers await a single `make`.
    pub async fn get_or_try_fallback<E, F, Fut>(&self, make: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(Arc::clone(value));
        }
        self.fallback
            .get_or_try_init(|| async move { make().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// The initialized value, else the fallback if one was handed out
    pub fn peek(&self) -> Option<Arc<T>> {
        self.get().or_else(|| self.fallback.get().cloned())
    }

    /// Whether a fallback value has been handed out
    pub fn has_fallback(&self) -> bool {
        self.fallback.initialized()
    }
}

/// Persist a freshly generated secret, adopting one another instance stored first.
///
/// Returns the encoded value now in the store, or `None` when the write
/// failed and the caller must keep its value in memory only. `replacing` is
/// an unreadable value seen in the store: it is swapped out only if it is
/// still there, so racing instances that all saw it converge on one winner.
pub async fn persist_or_adopt(
    store: &dyn SettingStore,
    key: &str,
    encoded: &str,
    replacing: Option<&str>,
) -> Option<String> {
    let result = match replacing {
        Some(corrupt) => store.replace_setting_if(key, corrupt, encoded).await,
        None => store.put_setting_if_absent(key, encoded).await,
    };

    match result {
        Ok(stored) => {
            if stored != encoded {
                info!(key, "Another instance persisted this secret first, adopting it");
            }
            Some(stored)
        }
        Err(e) => {
            warn!(key, error = %e, "Failed to persist generated secret, serving it unpersisted");
            None
        }
    }
}
