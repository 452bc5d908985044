//! # Identity Forgery
//!
//! ## Attack Vectors
//!
//! 1. **Privilege escalation**: a self-minted super-admin token to claim the
//!    largest quota
//! 2. **`alg: none`**: an unsigned token
//! 3. **Stale token**: an expired token from an earlier session
//!
//! None of these is rejected outright; each falls back to the guest quota.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use axum::http::StatusCode;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    const ATTACKER: &str = "203.0.113.7";

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    async fn limit_seen_with(harness: &Harness, token: &str) -> u64 {
        let response = harness
            .send(get_with_token(PROTECTED_ROUTE, ATTACKER, token))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        header_u64(&response, "ratelimit-limit")
    }

    #[tokio::test]
    async fn test_foreign_secret_super_admin_is_guest() {
        let harness = Harness::new(test_config()).await;
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "1", "role": "super_admin", "exp": future_exp() }),
            &EncodingKey::from_secret(b"guessed"),
        )
        .unwrap();
        assert_eq!(limit_seen_with(&harness, &forged).await, 100);
    }

    #[tokio::test]
    async fn test_unsigned_token_is_guest() {
        let harness = Harness::new(test_config()).await;
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::json!({ "sub": "1", "role": "super_admin", "exp": future_exp() })
                .to_string(),
        );
        let unsigned = format!("{header}.{claims}.");
        assert_eq!(limit_seen_with(&harness, &unsigned).await, 100);
    }

    #[tokio::test]
    async fn test_expired_token_is_guest() {
        let harness = Harness::new(test_config()).await;
        let stale = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "1", "role": "admin", "exp": 1_600_000_000 }),
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(limit_seen_with(&harness, &stale).await, 100);
    }

    #[tokio::test]
    async fn test_genuine_admin_token_gets_admin_quota() {
        let harness = Harness::new(test_config()).await;
        let genuine = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "id": 12, "role": "admin", "exp": future_exp() }),
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(limit_seen_with(&harness, &genuine).await, 5_000);
    }
}
