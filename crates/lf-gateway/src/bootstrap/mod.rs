//! Process-wide secrets that must be created once and shared by every instance.
//!
//! Both the RSA key pair and the challenge HMAC secret follow the same
//! lifecycle: load from the settings table, else create and persist, with a
//! degraded in-memory value while the table is unreachable.

pub mod captcha;
pub mod key_manager;
pub mod once;

pub use captcha::ChallengeService;
pub use key_manager::{encrypt_with_public_key, KeyManager, KeySource};
pub use once::InitOnce;
