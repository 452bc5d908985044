//! # Library Feedback Gateway Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Gateway wired to in-memory stores and a manual clock
//! │
//! ├── exploits/         # Attack simulations
//! │   ├── quota_evasion.rs
//! │   ├── challenge_forgery.rs
//! │   └── token_forgery.rs
//! │
//! └── integration/      # End-to-end flows through the HTTP router
//!     ├── admission.rs
//!     └── key_lifecycle.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p lf-tests
//!
//! # By category
//! cargo test -p lf-tests integration::
//! cargo test -p lf-tests exploits::
//! ```

#![allow(dead_code)]

pub mod exploits;
pub mod harness;
pub mod integration;
