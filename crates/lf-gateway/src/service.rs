//! Gateway service: wiring and the HTTP surface.
//!
//! Serves `/status`, `/health` and the two challenge endpoints, and wraps any
//! routes supplied by the host application in the same middleware stack.

use crate::adapters::settings::TypedSettings;
use crate::bootstrap::{ChallengeService, KeyManager};
use crate::domain::challenge::Challenge;
use crate::domain::config::{GatewayConfig, MAX_QUOTA_WINDOW};
use crate::domain::error::{ApiError, ApiResult, GatewayError};
use crate::domain::identity::AuthenticatedUser;
use crate::domain::settings::keys;
use crate::middleware::{AdmissionController, ClientIp, JwtIdentifier, MiddlewareStack};
use crate::ports::outbound::{SharedQuotaStore, SharedSettingStore, TimeSource};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::{debug, info, warn};

/// Gateway service state
pub struct GatewayService {
    config: GatewayConfig,
    keys: Arc<KeyManager>,
    challenges: Arc<ChallengeService>,
    identifier: Arc<JwtIdentifier>,
    settings: TypedSettings,
    middleware: MiddlewareStack,
}

impl GatewayService {
    /// Build the service.
    ///
    /// Operator overrides for quota enforcement are read from the settings
    /// table here, once. An unreachable table keeps the configured values.
    pub async fn new(
        mut config: GatewayConfig,
        setting_store: SharedSettingStore,
        quota_store: SharedQuotaStore,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, GatewayError> {
        let settings = TypedSettings::new(Arc::clone(&setting_store));
        apply_setting_overrides(&mut config, &settings).await;

        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let keys = Arc::new(KeyManager::new(
            Arc::clone(&setting_store),
            config.keys.clone(),
        ));
        let challenges = Arc::new(ChallengeService::new(
            setting_store,
            config.captcha.clone(),
            Arc::clone(&time),
        ));
        let identifier = Arc::new(JwtIdentifier::new(&config.auth));
        let admission = Arc::new(AdmissionController::new(
            quota_store,
            config.rate_limit.clone(),
            time,
        ));
        let middleware = MiddlewareStack::new(&config, Arc::clone(&identifier), admission);

        Ok(Self {
            config,
            keys,
            challenges,
            identifier,
            settings,
            middleware,
        })
    }

    /// Load the RSA key ahead of the first request.
    ///
    /// Failure is not fatal: every later `/status` or `decrypt` retries
    /// initialization and serves a just-in-time key while it keeps failing.
    pub async fn bootstrap(&self) {
        match self.keys.initialize().await {
            Ok(()) => info!(source = ?self.keys.key_source(), "RSA key initialized"),
            Err(e) => warn!(error = %e, "RSA key not initialized at boot, will retry on demand"),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn keys(&self) -> Arc<KeyManager> {
        Arc::clone(&self.keys)
    }

    pub fn challenges(&self) -> Arc<ChallengeService> {
        Arc::clone(&self.challenges)
    }

    pub fn identifier(&self) -> Arc<JwtIdentifier> {
        Arc::clone(&self.identifier)
    }

    pub fn admission(&self) -> Arc<AdmissionController> {
        self.middleware.admission()
    }

    /// Gateway routes only
    pub fn router(&self) -> Router {
        self.router_with(Router::new())
    }

    /// Gateway routes merged with the host application's routes, all behind
    /// the middleware stack
    pub fn router_with(&self, app: Router) -> Router {
        let state = AppState {
            keys: Arc::clone(&self.keys),
            challenges: Arc::clone(&self.challenges),
            admission: self.middleware.admission(),
            settings: self.settings.clone(),
        };

        let middleware = ServiceBuilder::new()
            .layer(self.middleware.tracing.clone())
            .layer(self.middleware.client_ip.clone())
            .layer(self.middleware.soft_auth.clone())
            .layer(self.middleware.admission.clone());

        Router::new()
            .route("/status", get(status))
            .route("/health", get(health_check))
            .route("/captcha/challenge", get(issue_challenge))
            .route("/captcha/verify-limit", post(verify_limit))
            .with_state(state)
            .merge(app)
            .layer(middleware)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, app: Router, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let router = self.router_with(app);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        info!(addr = %addr, "HTTP server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_setting_overrides(config: &mut GatewayConfig, settings: &TypedSettings) {
    match settings.get_bool(keys::RATE_LIMIT_ENABLED).await {
        Ok(Some(enabled)) => {
            if !enabled {
                warn!("Quota enforcement disabled by settings");
            }
            config.rate_limit.enabled = enabled;
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not read quota settings, using configured values"),
    }

    match settings.get_u64(keys::RATE_LIMIT_WINDOW_MINUTES).await {
        Ok(Some(minutes)) => match window_from_minutes(minutes) {
            Some(window) => config.rate_limit.window = window,
            None => warn!(minutes, "Ignoring out-of-range quota window from settings"),
        },
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not read quota window setting"),
    }
}

/// Stored window in minutes, if it is non-zero and within `MAX_QUOTA_WINDOW`
fn window_from_minutes(minutes: u64) -> Option<Duration> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .filter(|window| !window.is_zero() && *window <= MAX_QUOTA_WINDOW)
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    keys: Arc<KeyManager>,
    challenges: Arc<ChallengeService>,
    admission: Arc<AdmissionController>,
    settings: TypedSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    configured: bool,
    public_key: String,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    #[serde(default)]
    payload: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    success: bool,
}

/// Setup state and the key clients must encrypt credentials with
async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let configured = state
        .settings
        .get_bool(keys::SYSTEM_CONFIGURED)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Could not read setup state, reporting unconfigured");
            None
        })
        .unwrap_or(false);

    let public_key = state.keys.public_key_pem().await.map_err(|e| {
        warn!(error = %e, "No public key available");
        ApiError::internal()
    })?;

    Ok(Json(StatusResponse {
        configured,
        public_key,
    }))
}

async fn issue_challenge(State(state): State<AppState>) -> Json<Challenge> {
    Json(state.challenges.issue_challenge().await)
}

/// Accept a solved challenge and clear the caller's quota counters
async fn verify_limit(
    State(state): State<AppState>,
    Extension(client_ip): Extension<ClientIp>,
    user: Option<Extension<AuthenticatedUser>>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyResponse>> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let payload = request
        .payload
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("payload is required"))?;

    state.challenges.check(&payload).await.map_err(|e| {
        debug!(ip = %client_ip.0, error = %e, "Challenge verification failed");
        ApiError::from(e)
    })?;

    let user = user.map(|Extension(u)| u);
    state
        .admission
        .reset_caller(client_ip.0, user.as_ref())
        .await?;

    Ok(Json(VerifyResponse { success: true }))
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
