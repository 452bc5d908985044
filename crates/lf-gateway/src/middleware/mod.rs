//! Middleware stack for the gateway.
//!
//! Layer order: Request → Tracing → ClientIp → SoftAuth → Admission → Handler
//!
//! Client IP and user resolution run before admission because the quota key
//! depends on both. Neither of them can reject a request.

pub mod client_ip;
pub mod rate_limit;
pub mod soft_auth;
pub mod tracing;

pub use client_ip::{ClientIp, ClientIpConfig, ClientIpLayer};
pub use rate_limit::{AdmissionController, AdmissionLayer};
pub use soft_auth::{JwtIdentifier, SoftAuthLayer};
pub use tracing::TracingLayer;

use crate::domain::config::GatewayConfig;
use std::sync::Arc;

/// Middleware stack builder
#[derive(Clone)]
pub struct MiddlewareStack {
    pub tracing: TracingLayer,
    pub client_ip: ClientIpLayer,
    pub soft_auth: SoftAuthLayer,
    pub admission: AdmissionLayer,
}

impl MiddlewareStack {
    pub fn new(
        config: &GatewayConfig,
        identifier: Arc<JwtIdentifier>,
        admission: Arc<AdmissionController>,
    ) -> Self {
        Self {
            tracing: TracingLayer::new(),
            client_ip: ClientIpLayer::new(ClientIpConfig {
                trust_proxy: config.http.trust_proxy,
            }),
            soft_auth: SoftAuthLayer::new(identifier),
            admission: AdmissionLayer::new(admission),
        }
    }

    /// Admission controller behind the stack
    pub fn admission(&self) -> Arc<AdmissionController> {
        self.admission.controller()
    }
}
