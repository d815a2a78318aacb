use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, ParamsBuilder, Version,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::config::Argon2Settings;
use crate::error::{AppError, Result};

/// Hashes and verifies passwords with Argon2id.
///
/// Cloning is cheap. Hashing is CPU bound; the async wrappers move it onto
/// the blocking pool.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    /// Hash of a random password, verified against when the email is unknown
    /// so both login failures cost the same.
    dummy_hash: Arc<String>,
}

impl CredentialHasher {
    /// Builds a hasher with the given cost parameters.
    pub fn new(settings: Argon2Settings) -> Result<Self> {
        let params = ParamsBuilder::new()
            .m_cost(settings.memory_kib)
            .t_cost(settings.iterations)
            .p_cost(settings.parallelism)
            .build()
            .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?;

        let mut hasher = Self {
            params,
            dummy_hash: Arc::new(String::new()),
        };

        let mut filler = [0u8; 24];
        OsRng.fill_bytes(&mut filler);
        let dummy = hex::encode(filler);
        hasher.dummy_hash = Arc::new(hasher.hash(&dummy)?);

        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let password_bytes = Zeroizing::new(password.as_bytes().to_vec());

        let mut salt_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut salt_bytes);

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

        let password_hash = self
            .argon2()
            .hash_password(&password_bytes, &salt)
            .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
            .to_string();

        tracing::debug!("Password hashed successfully with Argon2");
        Ok(password_hash)
    }

    /// Verifies a password against a PHC hash string.
    ///
    /// The parameters are read from the hash itself, so hashes made with older
    /// cost settings keep verifying.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password_bytes = Zeroizing::new(password.as_bytes().to_vec());
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
        let result = Argon2::default()
            .verify_password(&password_bytes, &parsed_hash)
            .is_ok();

        Ok(result)
    }

    /// Burns one verification against the dummy hash.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// [`Self::hash`] on the blocking pool.
    pub async fn hash_blocking(&self, password: Zeroizing<String>) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
    }

    /// [`Self::verify`] on the blocking pool. `None` verifies against the
    /// dummy hash and always returns `false`.
    pub async fn verify_blocking(
        &self,
        password: Zeroizing<String>,
        hash: Option<String>,
    ) -> Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => {
                hasher.verify_dummy(&password);
                Ok(false)
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
    }
}
