//! # Quota Evasion
//!
//! ## Attack Vectors
//!
//! 1. **Header spoofing**: rotate `X-Forwarded-For` per request to get a fresh
//!    guest bucket each time
//! 2. **Namespace collision**: pick a user id that renders to another caller's
//!    guest key
//! 3. **Bypass path abuse**: hide a counted route behind a bypass prefix

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use lf_gateway::{Identity, QuotaStore, Role};
    use std::net::IpAddr;

    const ATTACKER: &str = "203.0.113.66";

    #[tokio::test]
    async fn test_rotating_forwarded_for_ignored_without_trusted_proxy() {
        let harness = Harness::new(test_config()).await;

        for i in 0..101 {
            let req = request("GET", PROTECTED_ROUTE, ATTACKER)
                .header("x-forwarded-for", format!("10.1.{}.{}", i / 250, i % 250))
                .header("x-real-ip", format!("10.2.0.{}", i % 250))
                .body(Body::empty())
                .unwrap();
            let response = harness.send(req).await;
            if i < 100 {
                assert_eq!(response.status(), StatusCode::OK);
            } else {
                assert_limited(&response);
            }
        }
        assert_eq!(harness.quotas.len(), 1);
    }

    #[tokio::test]
    async fn test_forwarded_for_honored_behind_trusted_proxy() {
        let mut config = test_config();
        config.http.trust_proxy = true;
        let harness = Harness::new(config).await;

        let req = request("GET", PROTECTED_ROUTE, "10.0.0.2")
            .header("x-forwarded-for", format!("{ATTACKER}, 10.0.0.2"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(harness.send(req).await.status(), StatusCode::OK);

        let record = harness
            .quotas
            .get(&format!("ip:{ATTACKER}"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.hit_count, 1);
    }

    #[test]
    fn test_user_id_cannot_alias_guest_key() {
        let ip: IpAddr = ATTACKER.parse().unwrap();
        let guest = Identity::Guest { ip };
        for user_id in [ATTACKER.to_string(), format!("ip:{ATTACKER}"), String::new()] {
            let user = Identity::Authenticated {
                user_id,
                role: Role::User,
            };
            assert_ne!(user.quota_key(), guest.quota_key());
        }
    }

    #[tokio::test]
    async fn test_lookalike_paths_are_counted() {
        let harness = Harness::new(test_config()).await;
        let admission = harness.service.admission();

        for path in [
            "/captcha/challenge/../../feedback",
            "/captcha/challenge-x",
            "/captcha",
            "/CAPTCHA/CHALLENGE",
        ] {
            assert!(admission.is_counted(path), "{path}");
        }
        assert!(!admission.is_counted("/captcha/challenge/"));
        assert!(!admission.is_counted("/captcha/verify-limit"));
    }
}
