//! RSA key pair lifecycle.
//!
//! Clients encrypt sensitive fields (passwords on login and registration) with
//! the advertised public key; handlers decrypt them here. One key pair serves
//! the whole process and, through the settings table, every instance.
//!
//! Load order: settings table → `RSA_PRIVATE_KEY` → generate and persist.
//! Keys are stored as base64-encoded PEM. PKCS#8 and PKCS#1 are both accepted
//! on load; generated keys are written as PKCS#8.

use crate::bootstrap::once::{persist_or_adopt, InitOnce};
use crate::domain::config::KeyConfig;
use crate::domain::error::KeyError;
use crate::domain::settings::keys;
use crate::ports::outbound::SharedSettingStore;
use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the active key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Loaded from the settings table
    Store,
    /// Loaded from `RSA_PRIVATE_KEY`
    Environment,
    /// Generated at boot and persisted (or adopted from a racing instance)
    Generated,
    /// Generated at boot, persistence failed
    Unpersisted,
    /// Just-in-time key served before initialization succeeded
    Ephemeral,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeySource::Store => "store",
            KeySource::Environment => "environment",
            KeySource::Generated => "generated",
            KeySource::Unpersisted => "unpersisted",
            KeySource::Ephemeral => "ephemeral",
        };
        f.write_str(s)
    }
}

/// Private key plus its cached public PEM
pub struct KeyMaterial {
    private_key: RsaPrivateKey,
    public_pem: String,
    source: KeySource,
}

impl KeyMaterial {
    fn new(private_key: RsaPrivateKey, source: KeySource) -> Result<Self, KeyError> {
        let public_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidPem(e.to_string()))?;
        Ok(Self {
            private_key,
            public_pem,
            source,
        })
    }

    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    fn decrypt(&self, ciphertext_base64: &str) -> Result<String, KeyError> {
        let ciphertext = STANDARD
            .decode(ciphertext_base64.trim())
            .map_err(|e| KeyError::InvalidBase64(e.to_string()))?;
        let plaintext = self
            .private_key
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map_err(|e| KeyError::Decrypt(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|_| KeyError::InvalidUtf8)
    }
}

/// Owns the process-wide RSA key pair
pub struct KeyManager {
    store: SharedSettingStore,
    config: KeyConfig,
    material: InitOnce<KeyMaterial>,
}

impl KeyManager {
    pub fn new(store: SharedSettingStore, config: KeyConfig) -> Self {
        Self {
            store,
            config,
            material: InitOnce::new(),
        }
    }

    /// Load or create the key pair. Safe to call concurrently and repeatedly.
    ///
    /// Concurrent callers await a single attempt, so at most one key is
    /// generated and persisted per process. An error means the settings table
    /// could not be read; nothing is cached and a later call retries.
    pub async fn initialize(&self) -> Result<(), KeyError> {
        let material = self
            .material
            .get_or_try_init(|| self.load_chain())
            .await
            .inspect_err(|e| warn!(error = %e, "RSA key initialization failed"))?;
        debug!(source = %material.source(), "RSA key ready");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.material.is_initialized()
    }

    /// Source of the key currently being served, if any
    pub fn key_source(&self) -> Option<KeySource> {
        self.material.peek().map(|m| m.source())
    }

    /// SPKI PEM of the active public key.
    ///
    /// Until initialization succeeds every call retries it first. While the
    /// settings table stays unreachable a just-in-time key is served (the
    /// environment key, else a freshly generated ephemeral one). Payloads
    /// encrypted under an ephemeral key become undecryptable once the
    /// persisted key takes over.
    pub async fn public_key_pem(&self) -> Result<String, KeyError> {
        self.current().await.map(|m| m.public_pem().to_string())
    }

    /// Decrypt a base64 RSA-OAEP (SHA-256) ciphertext into UTF-8 text.
    ///
    /// Failures are logged and returned; they never panic.
    pub async fn decrypt(&self, ciphertext_base64: &str) -> Result<String, KeyError> {
        self.current()
            .await
            .and_then(|m| m.decrypt(ciphertext_base64))
            .inspect_err(|e| warn!(error = %e, "Failed to decrypt client payload"))
    }

    async fn current(&self) -> Result<Arc<KeyMaterial>, KeyError> {
        match self.material.get_or_try_init(|| self.load_chain()).await {
            Ok(material) => Ok(material),
            Err(e) => {
                debug!(error = %e, "RSA key still unavailable from settings");
                self.material
                    .get_or_try_fallback(|| async move {
                        warn!(error = %e, "Serving a just-in-time RSA key until settings recover");
                        self.just_in_time_material().await
                    })
                    .await
            }
        }
    }

    async fn just_in_time_material(&self) -> Result<KeyMaterial, KeyError> {
        if let Some(key) = self.environment_key() {
            return KeyMaterial::new(key, KeySource::Environment);
        }
        let key = generate_off_runtime(self.config.key_bits).await?;
        KeyMaterial::new(key, KeySource::Ephemeral)
    }

    fn environment_key(&self) -> Option<RsaPrivateKey> {
        let encoded = self.config.private_key_base64.as_deref()?;
        decode_private_key(encoded)
            .inspect_err(|e| warn!(error = %e, "Ignoring invalid RSA_PRIVATE_KEY"))
            .ok()
    }

    async fn load_chain(&self) -> Result<KeyMaterial, KeyError> {
        // 1. Settings table. A read failure aborts so the attempt can be retried.
        let stored = self.store.get_setting(keys::RSA_PRIVATE_KEY).await?;
        let mut corrupt = None;
        if let Some(encoded) = stored {
            match decode_private_key(&encoded) {
                Ok(key) => {
                    info!("Loaded RSA key from settings");
                    return KeyMaterial::new(key, KeySource::Store);
                }
                Err(e) => {
                    warn!(error = %e, "Stored RSA key is unreadable, it will be replaced");
                    corrupt = Some(encoded);
                }
            }
        }

        // 2. Environment
        if let Some(key) = self.environment_key() {
            info!("Loaded RSA key from environment");
            return KeyMaterial::new(key, KeySource::Environment);
        }

        // 3. Generate and persist
        warn!(
            bits = self.config.key_bits,
            "No RSA key found, generating one; payloads encrypted under any previous key are lost"
        );
        let key = generate_off_runtime(self.config.key_bits).await?;
        let encoded = encode_private_key(&key)?;

        match persist_or_adopt(
            self.store.as_ref(),
            keys::RSA_PRIVATE_KEY,
            &encoded,
            corrupt.as_deref(),
        )
        .await
        {
            Some(winner) if winner == encoded => {
                info!("Generated and persisted RSA key");
                KeyMaterial::new(key, KeySource::Generated)
            }
            Some(winner) => KeyMaterial::new(decode_private_key(&winner)?, KeySource::Generated),
            None => KeyMaterial::new(key, KeySource::Unpersisted),
        }
    }
}

/// Encrypt text for the holder of `public_pem` (RSA-OAEP, SHA-256), base64 output
pub fn encrypt_with_public_key(public_pem: &str, plaintext: &str) -> Result<String, KeyError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_pem)
        .map_err(|e| KeyError::InvalidPem(e.to_string()))?;
    let ciphertext = public_key
        .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), plaintext.as_bytes())
        .map_err(|e| KeyError::Encrypt(e.to_string()))?;
    Ok(STANDARD.encode(ciphertext))
}

/// Decode a base64-encoded PEM private key (PKCS#8 or PKCS#1)
pub fn decode_private_key(encoded: &str) -> Result<RsaPrivateKey, KeyError> {
    let pem_bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| KeyError::InvalidBase64(e.to_string()))?;
    let pem = String::from_utf8(pem_bytes).map_err(|_| KeyError::InvalidPem("not UTF-8".into()))?;
    RsaPrivateKey::from_pkcs8_pem(&pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
        .map_err(|e| KeyError::InvalidPem(e.to_string()))
}

/// Encode a private key as base64 of its PKCS#8 PEM
pub fn encode_private_key(key: &RsaPrivateKey) -> Result<String, KeyError> {
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyError::InvalidPem(e.to_string()))?;
    Ok(STANDARD.encode(pem.as_bytes()))
}

/// Key generation takes seconds; keep it off the async workers
async fn generate_off_runtime(bits: usize) -> Result<RsaPrivateKey, KeyError> {
    tokio::task::spawn_blocking(move || generate_private_key(bits))
        .await
        .map_err(|e| KeyError::Generation(e.to_string()))?
}

fn generate_private_key(bits: usize) -> Result<RsaPrivateKey, KeyError> {
    RsaPrivateKey::new(&mut rand::thread_rng(), bits).map_err(|e| KeyError::Generation(e.to_string()))
}
