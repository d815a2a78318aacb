use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};

/// The size of a session token in bytes.
const SESSION_TOKEN_SIZE: usize = 32;

/// Length of the base64url (unpadded) encoding of a token.
const ENCODED_TOKEN_LEN: usize = 43;

/// Generates a new random session token.
///
/// The token carries no claims; it is only meaningful as a lookup key.
pub fn generate_session_token() -> String {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);

    general_purpose::URL_SAFE_NO_PAD.encode(token)
}

/// Whether `token` has the shape of something [`generate_session_token`] made.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == ENCODED_TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Derives session store keys from client-held tokens.
///
/// Keys are a keyed BLAKE3 hash of the token, so a dump of the session store
/// cannot be replayed as cookies.
#[derive(Clone)]
pub struct SessionKeys {
    secret: Zeroizing<[u8; 32]>,
}

impl SessionKeys {
    /// Builds a deriver from a 32-byte secret.
    pub fn new(secret: &[u8]) -> Result<Self> {
        let secret: [u8; 32] = secret
            .try_into()
            .map_err(|_| AppError::Internal("Session secret must be 32 bytes".to_string()))?;
        Ok(Self {
            secret: Zeroizing::new(secret),
        })
    }

    /// The store key for `token`.
    pub fn store_key(&self, token: &str) -> String {
        blake3::keyed_hash(&self.secret, token.as_bytes())
            .to_hex()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_well_formed_and_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert!(is_well_formed(&a));
        assert!(is_well_formed(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"a".repeat(42).chars().chain(['/']).collect::<String>()));
    }

    #[test]
    fn store_key_depends_on_secret_and_token() {
        let keys = SessionKeys::new(&[7u8; 32]).unwrap();
        let other = SessionKeys::new(&[8u8; 32]).unwrap();
        let token = generate_session_token();

        assert_eq!(keys.store_key(&token), keys.store_key(&token));
        assert_ne!(keys.store_key(&token), other.store_key(&token));
        assert_ne!(keys.store_key(&token), token);
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(SessionKeys::new(&[0u8; 16]).is_err());
    }
}
