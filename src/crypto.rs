//! Password hashing and one-time code generation.

use argon2::password_hash::rand_core::OsRng as SaltRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::config::Argon2 as ArgonConfig;

/// Bytes of entropy behind every confirmation or reset code.
const CODE_LENGTH: usize = 32;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Argon2id password hasher configured from `config.yaml`.
pub struct PasswordManager {
    argon2: Argon2<'static>,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC string with a fresh random salt.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut SaltRng);

        self.argon2
            .hash_password(password.as_ref(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| CryptoError::Argon2(err.to_string()))
    }

    /// Check a password against a stored PHC string.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc: &str,
    ) -> Result<bool> {
        let parsed = PasswordHash::new(phc)
            .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(self
            .argon2
            .verify_password(password.as_ref(), &parsed)
            .is_ok())
    }
}

/// Generate a random hex-encoded code for email round trips.
pub fn generate_code() -> String {
    let mut bytes = [0u8; CODE_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
