//! Domain types for the gateway.
//!
//! Pure types and rules: configuration, identities, quota arithmetic, the
//! proof-of-work format and settings normalization. Nothing here performs I/O.

pub mod challenge;
pub mod config;
pub mod error;
pub mod identity;
pub mod quota;
pub mod settings;

// Re-exports for convenience
pub use challenge::{Challenge, Solution};
pub use config::{GatewayConfig, RateLimitConfig};
pub use error::{ApiError, ApiResult, ChallengeError, GatewayError, KeyError, StoreError};
pub use identity::{AuthenticatedUser, Identity, Role};
pub use quota::{QuotaDecision, QuotaRecord};
