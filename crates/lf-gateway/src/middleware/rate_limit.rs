//! Identity-based admission control using fixed windows.
//!
//! Each caller is counted under one key: `user:<id>` when the soft auth layer
//! attached a user, `ip:<addr>` otherwise. Every counted request increments the
//! key's record, rejected ones included, and a count above the tier quota is
//! answered with 429 and `requiresVerification` so the client can solve a
//! challenge and have its counters reset.
//!
//! Layer order: ClientIp → SoftAuth → Admission → Handler

use crate::adapters::fallback::FallbackQuotaStore;
use crate::domain::config::RateLimitConfig;
use crate::domain::error::{ApiError, StoreError};
use crate::domain::identity::{guest_key, user_key, AuthenticatedUser, Identity};
use crate::domain::quota::QuotaDecision;
use crate::middleware::client_ip::{resolve_client_ip, ClientIp, ClientIpConfig};
use crate::ports::outbound::{SharedQuotaStore, TimeSource};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use std::net::IpAddr;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, info, warn};

pub const HEADER_LIMIT: &str = "ratelimit-limit";
pub const HEADER_REMAINING: &str = "ratelimit-remaining";
pub const HEADER_RESET: &str = "ratelimit-reset";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Quota bookkeeping shared across requests
pub struct AdmissionController {
    store: SharedQuotaStore,
    config: RateLimitConfig,
    time: Arc<dyn TimeSource>,
}

impl AdmissionController {
    /// Wraps `store` in a local fallback when `config.local_fallback` is set
    pub fn new(store: SharedQuotaStore, config: RateLimitConfig, time: Arc<dyn TimeSource>) -> Self {
        let store: SharedQuotaStore = if config.local_fallback {
            Arc::new(FallbackQuotaStore::new(store))
        } else {
            store
        };
        Self {
            store,
            config,
            time,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Whether a request path must be counted
    pub fn is_counted(&self, path: &str) -> bool {
        self.config.enabled && !self.config.is_bypassed(path)
    }

    /// Count one request for `identity` and decide whether it is admitted
    pub async fn check(&self, identity: &Identity) -> Result<QuotaDecision, StoreError> {
        let key = identity.quota_key();
        let record = self
            .store
            .hit(&key, self.time.now_millis(), self.config.window)
            .await?;
        let decision = QuotaDecision::evaluate(&record, self.config.quota_for(identity));

        if decision.allowed {
            debug!(key = %key, hits = decision.hit_count, limit = decision.limit, "Admitted");
        } else {
            warn!(key = %key, hits = decision.hit_count, limit = decision.limit, "Quota exceeded");
        }
        Ok(decision)
    }

    /// Clear the counter for `key` and start a fresh window. Idempotent.
    pub async fn reset_key(&self, key: &str) -> Result<(), StoreError> {
        self.store
            .reset(key, self.time.now_millis(), self.config.window)
            .await
    }

    /// Reset every bucket the caller can be counted under
    pub async fn reset_caller(
        &self,
        ip: IpAddr,
        user: Option<&AuthenticatedUser>,
    ) -> Result<(), StoreError> {
        self.reset_key(&guest_key(ip)).await?;
        if let Some(user) = user {
            self.reset_key(&user_key(&user.user_id)).await?;
        }
        info!(ip = %ip, user_id = user.map(|u| u.user_id.as_str()), "Quota reset after verification");
        Ok(())
    }

    fn now_ms(&self) -> u64 {
        self.time.now_millis()
    }
}

/// Admission layer
#[derive(Clone)]
pub struct AdmissionLayer {
    controller: Arc<AdmissionController>,
}

impl AdmissionLayer {
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> Arc<AdmissionController> {
        Arc::clone(&self.controller)
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            controller: Arc::clone(&self.controller),
        }
    }
}

/// Admission service
#[derive(Clone)]
pub struct AdmissionService<S> {
    inner: S,
    controller: Arc<AdmissionController>,
}

impl<S> Service<Request<Body>> for AdmissionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let controller = Arc::clone(&self.controller);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !controller.is_counted(req.uri().path()) {
                return inner.call(req).await;
            }

            let ip = req
                .extensions()
                .get::<ClientIp>()
                .map(|c| c.0)
                .unwrap_or_else(|| resolve_client_ip(&req, &ClientIpConfig::default()));
            let identity = Identity::resolve(ip, req.extensions().get::<AuthenticatedUser>());

            let decision = match controller.check(&identity).await {
                Ok(decision) => decision,
                // Only this request fails; the error is logged by the conversion
                Err(e) => return Ok(ApiError::from(e).into_response()),
            };

            let now_ms = controller.now_ms();
            if !decision.allowed {
                return Ok(rate_limit_response(&decision, now_ms));
            }

            let mut response = inner.call(req).await?;
            insert_quota_headers(response.headers_mut(), &decision, now_ms);
            Ok(response)
        })
    }
}

fn insert_quota_headers(headers: &mut HeaderMap, decision: &QuotaDecision, now_ms: u64) {
    headers.insert(HEADER_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(HEADER_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        HEADER_RESET,
        HeaderValue::from(decision.reset_after_secs(now_ms)),
    );
}

/// 429 with `requiresVerification` and retry hints
fn rate_limit_response(decision: &QuotaDecision, now_ms: u64) -> Response {
    let mut response = ApiError::rate_limited().into_response();
    let headers = response.headers_mut();
    insert_quota_headers(headers, decision, now_ms);
    headers.insert(
        HEADER_RETRY_AFTER,
        HeaderValue::from(decision.reset_after_secs(now_ms)),
    );
    response
}
