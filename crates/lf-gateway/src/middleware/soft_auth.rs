//! Soft bearer-token authentication.
//!
//! Decodes `Authorization: Bearer <jwt>` when present and attaches the
//! [`AuthenticatedUser`] to the request. A missing, malformed, expired, or
//! forged token is never an error here: the request simply continues as a
//! guest and routes that need a user enforce that themselves.

use crate::domain::config::AuthConfig;
use crate::domain::identity::{AuthenticatedUser, Role};
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request},
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service};
use tracing::{trace, warn};

/// User id claim, issued as a string or a number depending on the minting service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum UserIdClaim {
    Text(String),
    Number(i64),
}

impl UserIdClaim {
    fn into_string(self) -> String {
        match self {
            UserIdClaim::Text(s) => s,
            UserIdClaim::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<UserIdClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<UserIdClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    exp: u64,
}

/// HS256 token verifier and issuer
pub struct JwtIdentifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl JwtIdentifier {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = match config.jwt_secret.as_deref() {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                warn!("JWT_SECRET not set, using a random secret; tokens will not survive a restart");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        Self {
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            validation,
            default_ttl: config.token_ttl,
        }
    }

    /// Verify a raw token. Any failure yields `None`.
    pub fn identify(&self, token: &str) -> Option<AuthenticatedUser> {
        let claims = match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                trace!(error = %e, "Bearer token rejected, continuing as guest");
                return None;
            }
        };

        let user_id = claims.sub.or(claims.id)?.into_string();
        if user_id.is_empty() {
            return None;
        }
        Some(AuthenticatedUser {
            user_id,
            role: claims.role.unwrap_or(Role::User),
        })
    }

    /// Mint a token for a user, valid for `ttl`
    pub fn issue_token(
        &self,
        user_id: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        let claims = Claims {
            sub: Some(UserIdClaim::Text(user_id.to_string())),
            id: None,
            role: Some(role),
            exp: now + ttl.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Lifetime configured for tokens minted at login
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

/// Token from an `Authorization: Bearer` header, if any
pub fn bearer_token<B>(req: &Request<B>) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Soft authentication layer
#[derive(Clone)]
pub struct SoftAuthLayer {
    identifier: Arc<JwtIdentifier>,
}

impl SoftAuthLayer {
    pub fn new(identifier: Arc<JwtIdentifier>) -> Self {
        Self { identifier }
    }
}

impl<S> Layer<S> for SoftAuthLayer {
    type Service = SoftAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SoftAuthService {
            inner,
            identifier: Arc::clone(&self.identifier),
        }
    }
}

/// Soft authentication service
#[derive(Clone)]
pub struct SoftAuthService<S> {
    inner: S,
    identifier: Arc<JwtIdentifier>,
}

impl<S> Service<Request<Body>> for SoftAuthService<S>
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
        // A client-supplied extension must never survive
        req.extensions_mut().remove::<AuthenticatedUser>();

        if let Some(user) = bearer_token(&req).and_then(|t| self.identifier.identify(t)) {
            trace!(user_id = %user.user_id, role = %user.role, "Authenticated request");
            req.extensions_mut().insert(user);
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}
