//! Client IP resolution.
//!
//! Forwarding headers are only honored when `trust_proxy` is set. Otherwise
//! any caller could pick a fresh `X-Forwarded-For` per request and get a new
//! guest bucket each time.

use axum::{body::Body, extract::ConnectInfo, http::Request, response::Response};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, trace};

/// Resolved client address, stored in request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[derive(Debug, Clone, Default)]
pub struct ClientIpConfig {
    /// Take the client address from forwarding headers
    pub trust_proxy: bool,
}

/// Client IP layer
#[derive(Clone)]
pub struct ClientIpLayer {
    config: Arc<ClientIpConfig>,
}

impl ClientIpLayer {
    pub fn new(config: ClientIpConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Client IP service
#[derive(Clone)]
pub struct ClientIpService<S> {
    inner: S,
    config: Arc<ClientIpConfig>,
}

impl<S> Service<Request<Body>> for ClientIpService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let ip = resolve_client_ip(&req, &self.config);
        trace!(client_ip = %ip, "Resolved client address");
        req.extensions_mut().insert(ClientIp(ip));

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Determine the client address for a request
pub fn resolve_client_ip<B>(req: &Request<B>, config: &ClientIpConfig) -> IpAddr {
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !config.trust_proxy {
        if req.headers().contains_key("x-forwarded-for") {
            debug!(direct_ip = %direct_ip, "Ignoring X-Forwarded-For, proxy not trusted");
        }
        return direct_ip;
    }

    // First entry of X-Forwarded-For is the original client
    if let Some(ip) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    if let Some(ip) = req
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    direct_ip
}
