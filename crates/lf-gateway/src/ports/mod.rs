//! Ports: the seams between gateway logic and external collaborators.

pub mod outbound;

pub use outbound::{
    ManualTimeSource, QuotaStore, SettingStore, SharedQuotaStore, SharedSettingStore,
    SystemTimeSource, TimeSource,
};
