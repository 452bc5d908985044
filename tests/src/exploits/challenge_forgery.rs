//! # Proof-of-Work Forgery
//!
//! ## Attack Vectors
//!
//! 1. **Expired replay**: keep one solved challenge and reuse it after expiry
//! 2. **Expiry extension**: rewrite `expires=` inside the salt
//! 3. **Self-signed challenge**: mint an easy puzzle and sign it with a guessed key
//! 4. **Wrong answer**: submit the right challenge with another number
//!
//! A valid solution may be replayed until it expires; nothing is stored. The
//! expiry bounds that window.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use axum::http::StatusCode;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use lf_gateway::domain::challenge::{self, create_challenge};
    use lf_gateway::{Challenge, ChallengeError, Solution};
    use std::time::Duration;

    const ATTACKER: &str = "203.0.113.99";

    async fn issued(harness: &Harness) -> Challenge {
        let response = harness.send(get_from("/captcha/challenge", ATTACKER)).await;
        serde_json::from_value(json_body(response).await).expect("challenge json")
    }

    async fn submit(harness: &Harness, solution: &Solution) -> StatusCode {
        harness
            .send(verify_request(ATTACKER, None, &solution.encode()))
            .await
            .status()
    }

    #[tokio::test]
    async fn test_expired_solution_replay_rejected() {
        let harness = Harness::new(test_config()).await;
        let solution = challenge::solve(&issued(&harness).await).unwrap();
        assert_eq!(submit(&harness, &solution).await, StatusCode::OK);

        harness.clock.advance(Duration::from_secs(60 * 60));
        assert_eq!(submit(&harness, &solution).await, StatusCode::BAD_REQUEST);
        assert_eq!(
            harness.service.challenges().check(&solution.encode()).await,
            Err(ChallengeError::Expired)
        );
    }

    #[tokio::test]
    async fn test_rewritten_expiry_rejected() {
        let harness = Harness::new(test_config()).await;
        let issued = issued(&harness).await;
        let mut solution = challenge::solve(&issued).unwrap();
        solution.salt = solution
            .salt
            .replace(&issued.expires.to_string(), "4102444800");

        harness.clock.advance(Duration::from_secs(2 * 60 * 60));
        assert_eq!(submit(&harness, &solution).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_self_signed_challenge_rejected() {
        let harness = Harness::new(test_config()).await;
        let expires = START_MS / 1000 + 600;
        let forged = create_challenge(b"guessed-secret", "00ff", 1, 1, expires);
        let solution = challenge::solve(&forged).unwrap();

        assert_eq!(submit(&harness, &solution).await, StatusCode::BAD_REQUEST);
        assert_eq!(
            harness.service.challenges().check(&solution.encode()).await,
            Err(ChallengeError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_wrong_number_rejected() {
        let harness = Harness::new(test_config()).await;
        let mut solution = challenge::solve(&issued(&harness).await).unwrap();
        solution.number = solution.number.wrapping_add(1);
        assert_eq!(submit(&harness, &solution).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failure_reasons_not_disclosed() {
        let harness = Harness::new(test_config()).await;
        let mut wrong = challenge::solve(&issued(&harness).await).unwrap();
        wrong.number = wrong.number.wrapping_add(1);
        let garbage = STANDARD.encode(b"{\"algorithm\":\"SHA-256\"}");

        let a = harness.send(verify_request(ATTACKER, None, &wrong.encode())).await;
        let b = harness.send(verify_request(ATTACKER, None, &garbage)).await;
        assert_eq!(json_body(a).await, json_body(b).await);
    }
}
