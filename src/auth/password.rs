use std::fmt;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::StoreError;

/// A user's password credential.
///
/// Only the Argon2 PHC string is kept. The type has no `Serialize` impl and
/// its `Debug` output is redacted, so the hash never reaches a response body
/// or a log line.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password {
    hash: Option<String>,
}

impl Password {
    /// Wraps a hash loaded from storage.
    pub fn from_hash(hash: String) -> Self {
        Self { hash: Some(hash) }
    }

    /// Hashes `plain` with a fresh salt, replacing any previous hash.
    pub fn set(&mut self, plain: &str) -> Result<(), StoreError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                StoreError::Hashing(e.to_string())
            })?
            .to_string();
        self.hash = Some(hash);
        Ok(())
    }

    /// Checks `candidate` against the stored hash. An unset or malformed
    /// credential verifies nothing.
    pub fn verify(&self, candidate: &str) -> bool {
        let Some(hash) = self.hash.as_deref() else {
            return false;
        };
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.hash.is_some()
    }

    /// The PHC string to persist. Storage adapters are the only callers.
    pub(crate) fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_set() {
            "Password(<redacted>)"
        } else {
            "Password(<unset>)"
        })
    }
}
