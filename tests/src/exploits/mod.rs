//! # Exploit Simulations
//!
//! Attacks against admission control: dodging the quota key, forging or
//! replaying proofs of work, and forging identities.

pub mod challenge_forgery;
pub mod quota_evasion;
pub mod token_forgery;
