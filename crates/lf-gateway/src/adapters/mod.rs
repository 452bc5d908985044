//! Adapters for the gateway.
//!
//! Infrastructure implementations of the outbound ports.

pub mod error_conversions;
pub mod fallback;
pub mod memory;
pub mod settings;

pub use fallback::FallbackQuotaStore;
pub use memory::{InMemoryQuotaStore, InMemorySettingStore};
pub use settings::TypedSettings;
