//! Argon2id implementation of the `PasswordHasher` port.
//!
//! Hashing is deliberately slow, so both operations run on tokio's blocking
//! pool rather than on the async executor.

use argon2::password_hash::{self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use rand::rngs::OsRng;
use tokio::task;
use zeroize::Zeroizing;

use crate::domain::ports::{PasswordHasher, PasswordHasherError};

/// Argon2id hasher producing PHC strings (`$argon2id$v=19$...`).
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2PasswordHasher {
    /// Hasher with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters are outside Argon2's limits.
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, PasswordHasherError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|err| PasswordHasherError::hash(err.to_string()))?;
        Ok(Self { params })
    }

    /// Cheapest parameters Argon2 accepts. Only suitable for tests.
    pub fn insecure_fast() -> Self {
        Self {
            params: Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
                .unwrap_or_default(),
        }
    }

    fn engine(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }
}

fn hash_blocking(params: Params, password: &[u8]) -> Result<String, PasswordHasherError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2PasswordHasher::engine(params)
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHasherError::hash(err.to_string()))
}

fn verify_blocking(params: Params, password: &[u8], hash: &str) -> Result<bool, PasswordHasherError> {
    let parsed =
        PasswordHash::new(hash).map_err(|err| PasswordHasherError::malformed_hash(err.to_string()))?;
    // The PHC string carries its own cost parameters; ours only fill gaps.
    match Argon2PasswordHasher::engine(params).verify_password(password, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordHasherError::malformed_hash(err.to_string())),
    }
}

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    async fn hash(&self, password: &str) -> Result<String, PasswordHasherError> {
        let params = self.params.clone();
        let password = Zeroizing::new(password.as_bytes().to_vec());
        task::spawn_blocking(move || hash_blocking(params, &password))
            .await
            .map_err(|err| PasswordHasherError::hash(err.to_string()))?
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordHasherError> {
        let params = self.params.clone();
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let hash = hash.to_owned();
        task::spawn_blocking(move || verify_blocking(params, &password, &hash))
            .await
            .map_err(|err| PasswordHasherError::hash(err.to_string()))?
    }
}
