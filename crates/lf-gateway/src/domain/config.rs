//! Gateway configuration with validation.
//!
//! Defaults are production values; `apply_env` layers environment overrides
//! on top and `validate` is run once at boot.

use crate::domain::identity::{Identity, Role};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Environment variable holding a base64-encoded PEM RSA private key
pub const ENV_RSA_PRIVATE_KEY: &str = "RSA_PRIVATE_KEY";
/// Environment variable holding the JWT signing secret
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
pub const ENV_HTTP_HOST: &str = "LF_HTTP_HOST";
pub const ENV_HTTP_PORT: &str = "LF_HTTP_PORT";
pub const ENV_TRUST_PROXY: &str = "LF_TRUST_PROXY";

/// Longest quota window accepted from any source
pub const MAX_QUOTA_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Quota enforcement configuration
    pub rate_limit: RateLimitConfig,
    /// Proof-of-work challenge configuration
    pub captcha: CaptchaConfig,
    /// RSA key configuration
    pub keys: KeyConfig,
    /// Bearer token configuration
    pub auth: AuthConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rl = &self.rate_limit;
        if rl.window.is_zero() {
            return Err(ConfigError::InvalidRateLimit("window cannot be 0".into()));
        }
        if rl.window > MAX_QUOTA_WINDOW {
            return Err(ConfigError::InvalidRateLimit(format!(
                "window cannot exceed {}s",
                MAX_QUOTA_WINDOW.as_secs()
            )));
        }
        if rl.guest_quota == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "guest_quota cannot be 0".into(),
            ));
        }
        // Tiers must never demote a more privileged caller
        if !(rl.guest_quota <= rl.user_quota
            && rl.user_quota <= rl.admin_quota
            && rl.admin_quota <= rl.super_admin_quota)
        {
            return Err(ConfigError::InvalidRateLimit(
                "quotas must be non-decreasing: guest <= user <= admin <= super_admin".into(),
            ));
        }
        if let Some(path) = rl.bypass_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidRateLimit(format!(
                "bypass path must start with '/': {path}"
            )));
        }

        if self.captcha.expires.is_zero() {
            return Err(ConfigError::InvalidCaptcha("expires cannot be 0".into()));
        }
        if self.captcha.max_number == 0 {
            return Err(ConfigError::InvalidCaptcha(
                "max_number cannot be 0".into(),
            ));
        }

        if self.keys.key_bits < 1024 {
            return Err(ConfigError::InvalidKeys(format!(
                "key_bits must be at least 1024, got {}",
                self.keys.key_bits
            )));
        }

        if self.auth.token_ttl.is_zero() {
            return Err(ConfigError::Invalid("auth.token_ttl cannot be 0".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_RSA_PRIVATE_KEY).filter(|v| !v.trim().is_empty()) {
            self.keys.private_key_base64 = Some(key.trim().to_string());
        }
        if let Some(secret) = lookup(ENV_JWT_SECRET).filter(|v| !v.is_empty()) {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(host) = lookup(ENV_HTTP_HOST) {
            match host.parse() {
                Ok(h) => self.http.host = h,
                Err(_) => tracing::warn!(value = %host, "Ignoring invalid {}", ENV_HTTP_HOST),
            }
        }
        if let Some(port) = lookup(ENV_HTTP_PORT) {
            match port.parse() {
                Ok(p) => self.http.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid {}", ENV_HTTP_PORT),
            }
        }
        if let Some(trust) = lookup(ENV_TRUST_PROXY) {
            match crate::domain::settings::parse_bool(&trust) {
                Some(t) => self.http.trust_proxy = t,
                None => tracing::warn!(value = %trust, "Ignoring invalid {}", ENV_TRUST_PROXY),
            }
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 3000)
    pub port: u16,
    /// Honor X-Forwarded-For / X-Real-IP (only behind a trusted proxy)
    pub trust_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            trust_proxy: false, // Security-first default
        }
    }
}

/// Quota enforcement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable quota enforcement
    pub enabled: bool,
    /// Fixed window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Requests per window for unauthenticated callers
    pub guest_quota: u64,
    /// Requests per window for regular users
    pub user_quota: u64,
    /// Requests per window for admins
    pub admin_quota: u64,
    /// Requests per window for super admins
    pub super_admin_quota: u64,
    /// Paths that are never counted (the challenge endpoints)
    pub bypass_paths: Vec<String>,
    /// Count in process memory when the shared quota store fails
    pub local_fallback: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(15 * 60),
            guest_quota: 100,
            user_quota: 1_000,
            admin_quota: 5_000,
            super_admin_quota: 10_000,
            bypass_paths: vec![
                "/captcha/challenge".to_string(),
                "/captcha/verify-limit".to_string(),
            ],
            local_fallback: true,
        }
    }
}

impl RateLimitConfig {
    /// Requests allowed per window for an identity
    pub fn quota_for(&self, identity: &Identity) -> u64 {
        match identity.role() {
            None => self.guest_quota,
            Some(Role::User) => self.user_quota,
            Some(Role::Admin) => self.admin_quota,
            Some(Role::SuperAdmin) => self.super_admin_quota,
        }
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        self.bypass_paths
            .iter()
            .any(|p| p.trim_end_matches('/') == path)
    }
}

/// Proof-of-work challenge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// How long an issued challenge stays valid
    #[serde(with = "humantime_serde")]
    pub expires: Duration,
    /// Upper bound of the secret number (difficulty)
    pub max_number: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            expires: Duration::from_secs(60 * 60),
            max_number: 100_000,
        }
    }
}

/// RSA key configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Modulus size for generated keys
    pub key_bits: usize,
    /// Pre-provisioned base64-encoded PEM private key (from the environment)
    #[serde(skip)]
    pub private_key_base64: Option<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_bits: 2048,
            private_key_base64: None,
        }
    }
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("key_bits", &self.key_bits)
            .field(
                "private_key_base64",
                &self.private_key_base64.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Bearer token configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. None = random per-process secret.
    #[serde(skip)]
    pub jwt_secret: Option<String>,
    /// Lifetime of tokens minted by `issue_token`
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid quota configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid challenge configuration
    #[error("invalid captcha: {0}")]
    InvalidCaptcha(String),
    /// Invalid key configuration
    #[error("invalid keys: {0}")]
    InvalidKeys(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else if let Some(hours) = s.strip_suffix('h') {
            hours
                .trim()
                .parse::<u64>()
                .map(|h| Duration::from_secs(h * 3600))
                .map_err(|_| "invalid hours")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
