//! Proof-of-work puzzle format and verification.
//!
//! The server picks a secret `number` and publishes
//! `challenge = hex(SHA-256(salt || number))` together with
//! `signature = hex(HMAC-SHA256(secret, challenge))`. The client brute-forces
//! `number` in `[0, maxnumber]` and echoes everything back. The expiry is
//! embedded in the salt (`<hex>?expires=<unix secs>`) so it is covered by the
//! challenge hash and cannot be extended by the client.

use crate::domain::error::ChallengeError;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The only supported hash
pub const ALGORITHM: &str = "SHA-256";

const EXPIRES_PARAM: &str = "expires=";

type HmacSha256 = Hmac<Sha256>;

/// Puzzle handed to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub algorithm: String,
    pub challenge: String,
    #[serde(rename = "maxnumber")]
    pub max_number: u64,
    pub salt: String,
    pub signature: String,
    /// Unix seconds after which the puzzle is rejected
    pub expires: u64,
}

/// Client submission, transported as base64-encoded JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub algorithm: String,
    pub challenge: String,
    pub number: u64,
    pub salt: String,
    pub signature: String,
}

impl Solution {
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and integers cannot fail
        STANDARD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(payload: &str) -> Result<Self, ChallengeError> {
        let raw = STANDARD
            .decode(payload.trim())
            .map_err(|e| ChallengeError::Malformed(format!("base64: {e}")))?;
        serde_json::from_slice(&raw).map_err(|e| ChallengeError::Malformed(format!("json: {e}")))
    }
}

/// `hex(SHA-256(salt || number))`
pub fn hash_challenge(salt: &str, number: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(number.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// `hex(HMAC-SHA256(secret, challenge))`
pub fn sign_challenge(secret: &[u8], challenge: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC key size is always valid");
    mac.update(challenge.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Build a signed puzzle from already chosen random parts
pub fn create_challenge(
    secret: &[u8],
    salt_prefix: &str,
    number: u64,
    max_number: u64,
    expires: u64,
) -> Challenge {
    let salt = format!("{salt_prefix}?{EXPIRES_PARAM}{expires}");
    let challenge = hash_challenge(&salt, number);
    let signature = sign_challenge(secret, &challenge);
    Challenge {
        algorithm: ALGORITHM.to_string(),
        challenge,
        max_number,
        salt,
        signature,
        expires,
    }
}

/// Read the expiry embedded in a salt
pub fn salt_expiry(salt: &str) -> Option<u64> {
    let (_, query) = salt.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(EXPIRES_PARAM))
        .and_then(|value| value.parse().ok())
}

/// Check a submission against the secret and the current time (unix seconds).
pub fn verify_solution(
    secret: &[u8],
    solution: &Solution,
    now_secs: u64,
) -> Result<(), ChallengeError> {
    if solution.algorithm != ALGORITHM {
        return Err(ChallengeError::UnsupportedAlgorithm(
            solution.algorithm.clone(),
        ));
    }

    // A salt without an expiry was not issued by us
    let expires = salt_expiry(&solution.salt)
        .ok_or_else(|| ChallengeError::Malformed("salt carries no expiry".into()))?;
    if now_secs >= expires {
        return Err(ChallengeError::Expired);
    }

    if hash_challenge(&solution.salt, solution.number) != solution.challenge {
        return Err(ChallengeError::Mismatch);
    }

    let expected = sign_challenge(secret, &solution.challenge);
    if !constant_time_compare(&expected, &solution.signature) {
        return Err(ChallengeError::InvalidSignature);
    }

    Ok(())
}

/// Brute-force a puzzle the way a client does
pub fn solve(challenge: &Challenge) -> Option<Solution> {
    (0..=challenge.max_number)
        .find(|n| hash_challenge(&challenge.salt, *n) == challenge.challenge)
        .map(|number| Solution {
            algorithm: challenge.algorithm.clone(),
            challenge: challenge.challenge.clone(),
            number,
            salt: challenge.salt.clone(),
            signature: challenge.signature.clone(),
        })
}

/// Constant-time string comparison.
///
/// Takes the same time regardless of how many leading characters match.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad bytes guarantee a mismatch when lengths differ
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
