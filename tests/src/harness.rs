//! Shared fixtures: a gateway on in-memory stores with a controllable clock.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use lf_gateway::ports::ManualTimeSource;
use lf_gateway::{GatewayConfig, GatewayService, InMemoryQuotaStore, InMemorySettingStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-secret";
pub const START_MS: u64 = 1_700_000_000_000;
pub const PROTECTED_ROUTE: &str = "/feedback";

/// Production defaults with test-friendly key size and challenge difficulty
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.keys.key_bits = 1024;
    config.captcha.max_number = 5_000;
    config.auth.jwt_secret = Some(JWT_SECRET.to_string());
    config
}

pub struct Harness {
    pub service: GatewayService,
    pub router: Router,
    pub settings: Arc<InMemorySettingStore>,
    pub quotas: Arc<InMemoryQuotaStore>,
    pub clock: Arc<ManualTimeSource>,
}

impl Harness {
    pub async fn new(config: GatewayConfig) -> Self {
        Self::with_settings(config, InMemorySettingStore::new()).await
    }

    pub async fn with_settings(config: GatewayConfig, settings: InMemorySettingStore) -> Self {
        Self::with_shared_settings(config, Arc::new(settings)).await
    }

    /// Harness over a settings table other instances also use
    pub async fn with_shared_settings(
        config: GatewayConfig,
        settings: Arc<InMemorySettingStore>,
    ) -> Self {
        let quotas = Arc::new(InMemoryQuotaStore::new());
        let clock = Arc::new(ManualTimeSource::new(START_MS));
        let service = GatewayService::new(config, settings.clone(), quotas.clone(), clock.clone())
            .await
            .expect("valid test config");

        // Stand-in for the host application's ticket routes
        let app = Router::new().route(PROTECTED_ROUTE, get(|| async { "tickets" }));
        let router = service.router_with(app);

        Self {
            service,
            router,
            settings,
            quotas,
            clock,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.expect("infallible")
    }
}

/// Request builder with a fixed TCP peer
pub fn request(method: &str, uri: &str, peer: &str) -> axum::http::request::Builder {
    let peer: SocketAddr = format!("{peer}:40000").parse().expect("peer address");
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(peer))
}

pub fn get_from(uri: &str, peer: &str) -> Request<Body> {
    request("GET", uri, peer).body(Body::empty()).expect("request")
}

pub fn get_with_token(uri: &str, peer: &str, token: &str) -> Request<Body> {
    request("GET", uri, peer)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub fn verify_request(peer: &str, token: Option<&str>, payload: &str) -> Request<Body> {
    let mut builder = request("POST", "/captcha/verify-limit", peer)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::json!({ "payload": payload }).to_string()))
        .expect("request")
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn header_u64(response: &Response, name: &str) -> u64 {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| panic!("missing numeric header {name}"))
}

pub fn assert_limited(response: &Response) {
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
