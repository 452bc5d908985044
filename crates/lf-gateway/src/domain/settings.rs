//! Normalization of stored setting values.
//!
//! Settings arrive as strings written by various admin tools (`"true"`,
//! `"1"`, `"yes"`, `" 15 "`). They are parsed here once so the rest of the
//! crate only sees typed values.

/// Well-known setting keys
pub mod keys {
    /// Base64-encoded PEM RSA private key
    pub const RSA_PRIVATE_KEY: &str = "rsa_private_key";
    /// Hex-encoded HMAC secret for proof-of-work challenges
    pub const CAPTCHA_HMAC_KEY: &str = "captcha_hmac_key";
    /// Whether initial setup has been completed
    pub const SYSTEM_CONFIGURED: &str = "system_configured";
    /// Operator switch for quota enforcement
    pub const RATE_LIMIT_ENABLED: &str = "rate_limit_enabled";
    /// Window length override in minutes
    pub const RATE_LIMIT_WINDOW_MINUTES: &str = "rate_limit_window_minutes";
}

/// Parse a loosely typed boolean
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Parse a non-negative integer, tolerating surrounding whitespace and quotes
pub fn parse_u64(raw: &str) -> Option<u64> {
    raw.trim().trim_matches('"').parse().ok()
}
