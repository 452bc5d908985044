//! End-to-end flows through the full middleware stack.

pub mod key_lifecycle;
