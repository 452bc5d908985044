//! Proof-of-work challenge issuance and verification.
//!
//! The HMAC secret is shared by every instance through the settings table
//! (`captcha_hmac_key`, hex). It is loaded once per process the same way the
//! RSA key is: stored value, else a generated one persisted with
//! put-if-absent so racing instances converge on a single secret.

use crate::bootstrap::once::{persist_or_adopt, InitOnce};
use crate::domain::challenge::{self, Challenge, Solution};
use crate::domain::config::CaptchaConfig;
use crate::domain::error::{ChallengeError, StoreError};
use crate::domain::settings::keys;
use crate::ports::outbound::{SharedSettingStore, TimeSource};
use rand::{Rng, RngCore};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SECRET_LEN: usize = 32;
const SALT_LEN: usize = 16;

pub struct ChallengeService {
    store: SharedSettingStore,
    config: CaptchaConfig,
    time: Arc<dyn TimeSource>,
    secret: InitOnce<Vec<u8>>,
}

impl ChallengeService {
    pub fn new(
        store: SharedSettingStore,
        config: CaptchaConfig,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            config,
            time,
            secret: InitOnce::new(),
        }
    }

    /// Issue a fresh signed puzzle
    pub async fn issue_challenge(&self) -> Challenge {
        let secret = self.secret().await;

        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);
        let number = rng.gen_range(0..=self.config.max_number);
        let expires = self.time.now_secs() + self.config.expires.as_secs();

        debug!(expires, max_number = self.config.max_number, "Issued challenge");
        challenge::create_challenge(
            &secret,
            &hex::encode(salt),
            number,
            self.config.max_number,
            expires,
        )
    }

    /// Check a base64 solution payload, reporting why it was rejected
    pub async fn check(&self, payload: &str) -> Result<(), ChallengeError> {
        let solution = Solution::decode(payload)?;
        let secret = self.secret().await;
        challenge::verify_solution(&secret, &solution, self.time.now_secs())
    }

    /// Whether a solution payload is valid. Never errors.
    pub async fn verify(&self, payload: &str) -> bool {
        match self.check(payload).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Challenge solution rejected");
                false
            }
        }
    }

    /// Whether the shared secret has been loaded
    pub fn is_initialized(&self) -> bool {
        self.secret.is_initialized()
    }

    async fn secret(&self) -> Arc<Vec<u8>> {
        match self.secret.get_or_try_init(|| self.load_secret()).await {
            Ok(secret) => secret,
            Err(e) => {
                let fallback = self
                    .secret
                    .get_or_try_fallback(|| async move {
                        warn!(
                            error = %e,
                            "Settings unavailable, signing challenges with an ephemeral secret"
                        );
                        Ok::<_, Infallible>(random_secret())
                    })
                    .await;
                match fallback {
                    Ok(secret) => secret,
                    Err(never) => match never {},
                }
            }
        }
    }

    async fn load_secret(&self) -> Result<Vec<u8>, StoreError> {
        let stored = self.store.get_setting(keys::CAPTCHA_HMAC_KEY).await?;
        let mut corrupt = None;
        if let Some(encoded) = stored {
            match hex::decode(encoded.trim()) {
                Ok(secret) if !secret.is_empty() => return Ok(secret),
                _ => {
                    warn!("Stored challenge secret is unreadable, it will be replaced");
                    corrupt = Some(encoded);
                }
            }
        }

        let secret = random_secret();
        let encoded = hex::encode(&secret);
        match persist_or_adopt(
            self.store.as_ref(),
            keys::CAPTCHA_HMAC_KEY,
            &encoded,
            corrupt.as_deref(),
        )
        .await
        {
            Some(winner) if winner == encoded => {
                info!("Generated and persisted challenge secret");
                Ok(secret)
            }
            // Another instance's secret; fall back to ours if it is unreadable
            Some(winner) => Ok(hex::decode(winner.trim()).unwrap_or(secret)),
            None => Ok(secret),
        }
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}
