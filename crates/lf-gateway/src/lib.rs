//! Library Feedback gateway - admission control and credential bootstrap.
//!
//! Sits in front of every route of the feedback ticketing service. It decides
//! who may make a request right now and owns the secrets that let clients
//! send credentials safely.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         LF GATEWAY                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────────────────────────────────────────┐  │
//! │  │                    Middleware Stack                          │  │
//! │  │   Tracing → ClientIp → SoftAuth → Admission                  │  │
//! │  └──────────────────────────┬───────────────────────────────────┘  │
//! │                             │                                      │
//! │  ┌──────────────┐  ┌────────┴───────┐  ┌──────────────────────┐   │
//! │  │   /status    │  │ /captcha/*     │  │  host routes         │   │
//! │  │  KeyManager  │  │ ChallengeSvc   │  │  (feedback, auth..)  │   │
//! │  └──────┬───────┘  └────────┬───────┘  └──────────────────────┘   │
//! │         │                   │                                      │
//! │  ┌──────┴───────────────────┴──────────────────────────────────┐  │
//! │  │      Ports: SettingStore, QuotaStore, TimeSource            │  │
//! │  └──────────────────────────┬──────────────────────────────────┘  │
//! └─────────────────────────────┼──────────────────────────────────────┘
//!                               │
//!                     shared database (settings, quotas)
//! ```
//!
//! # Quotas
//!
//! Requests are counted per identity in fixed windows (15 minutes by
//! default): guests by IP, authenticated callers by user id with a larger
//! allowance per role. A caller over quota gets `429` with
//! `requiresVerification: true` and can solve a proof-of-work challenge to
//! have its counters reset.
//!
//! # Usage
//!
//! ```ignore
//! use lf_gateway::{GatewayConfig, GatewayService, InMemoryQuotaStore, InMemorySettingStore};
//!
//! let service = GatewayService::new(config, settings, quotas, Arc::new(SystemTimeSource)).await?;
//! service.bootstrap().await;
//! service.serve(app_routes, shutdown_signal).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod bootstrap;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod service;

pub use adapters::{FallbackQuotaStore, InMemoryQuotaStore, InMemorySettingStore, TypedSettings};
pub use bootstrap::{encrypt_with_public_key, ChallengeService, KeyManager, KeySource};
pub use domain::{
    ApiError, AuthenticatedUser, Challenge, ChallengeError, GatewayConfig, GatewayError,
    Identity, KeyError, QuotaDecision, RateLimitConfig, Role, Solution, StoreError,
};
pub use middleware::{AdmissionController, JwtIdentifier};
pub use ports::{QuotaStore, SettingStore, SystemTimeSource, TimeSource};
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
