//! Passphrase-based protection using Argon2id and AES-GCM.
//!
//! Used to protect the payload of an Autocrypt Setup Message under the
//! setup code. The Argon2 cost parameters travel with the ciphertext so
//! a receiving device with a different configuration can still unprotect.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::config::CoreConfig;
use crate::error::{AutocryptError, Result};

/// Salt size for Argon2 (128 bits)
const SALT_SIZE: usize = 16;

/// Upper bound accepted for a stored memory cost (1 GiB)
const MAX_KDF_MEMORY_KIB: u32 = 1024 * 1024;

/// Upper bound accepted for a stored iteration count
const MAX_KDF_ITERATIONS: u32 = 64;

/// Upper bound accepted for a stored lane count
const MAX_KDF_PARALLELISM: u32 = 16;

/// Passphrase-protected data as it is serialized into a setup message
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProtectedData {
    /// Argon2 memory cost in KiB
    memory_kib: u32,
    /// Argon2 iterations
    iterations: u32,
    /// Argon2 lanes
    parallelism: u32,
    /// Argon2 salt
    salt: [u8; SALT_SIZE],
    /// AES-GCM nonce
    nonce: [u8; 12],
    /// Ciphertext including the authentication tag
    ciphertext: Vec<u8>,
}

/// Passphrase used to protect or unprotect data
#[derive(Clone)]
pub struct Password(String);

impl Password {
    /// Create a new password from a string
    pub fn new(password: String) -> Self {
        Self(password)
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Check if password is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Encrypts `data` under `password` with the configured Argon2id cost
pub fn protect(data: &[u8], password: &Password, config: &CoreConfig) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(AutocryptError::crypto("Passphrase cannot be empty"));
    }

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let mut derived_key = derive_key(
        password,
        &salt,
        config.kdf_memory_kib,
        config.kdf_iterations,
        config.kdf_parallelism,
    )?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived_key));
    derived_key.zeroize();

    let nonce = Aes256Gcm::generate_nonce(&mut AeadRng);
    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| AutocryptError::crypto(format!("Failed to protect data: {}", e)))?;

    let protected = ProtectedData {
        memory_kib: config.kdf_memory_kib,
        iterations: config.kdf_iterations,
        parallelism: config.kdf_parallelism,
        salt,
        nonce: nonce.into(),
        ciphertext,
    };

    bincode::serialize(&protected).map_err(|e| {
        AutocryptError::serialization(format!("Failed to serialize protected data: {}", e))
    })
}

/// Reverses [`protect`]. A failed authentication means a wrong passphrase.
pub fn unprotect(bytes: &[u8], password: &Password) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(AutocryptError::WrongSetupCode);
    }

    let protected: ProtectedData = bincode::deserialize(bytes).map_err(|e| {
        AutocryptError::serialization(format!("Failed to deserialize protected data: {}", e))
    })?;

    if protected.memory_kib > MAX_KDF_MEMORY_KIB
        || protected.iterations > MAX_KDF_ITERATIONS
        || protected.parallelism > MAX_KDF_PARALLELISM
    {
        return Err(AutocryptError::crypto(
            "Stored KDF parameters exceed accepted limits",
        ));
    }

    let mut derived_key = derive_key(
        password,
        &protected.salt,
        protected.memory_kib,
        protected.iterations,
        protected.parallelism,
    )?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived_key));
    derived_key.zeroize();

    let nonce = Nonce::from_slice(&protected.nonce);
    cipher
        .decrypt(nonce, protected.ciphertext.as_slice())
        .map_err(|_| AutocryptError::WrongSetupCode)
}

/// Derive a 256-bit key from a passphrase using Argon2id
fn derive_key(
    password: &Password,
    salt: &[u8; SALT_SIZE],
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<[u8; 32]> {
    let params = argon2::Params::new(memory_kib, iterations, parallelism, Some(32))
        .map_err(|e| AutocryptError::crypto(format!("Invalid Argon2 parameters: {}", e)))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| AutocryptError::crypto(format!("Passphrase hashing failed: {}", e)))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CoreConfig {
        CoreConfig {
            kdf_memory_kib: 64,
            kdf_iterations: 1,
            ..CoreConfig::default()
        }
    }

    #[test]
    fn test_protect_unprotect() {
        let password = Password::new("1234-5678".to_string());
        let data = b"private key bytes";

        let protected = protect(data, &password, &fast_config()).unwrap();
        assert!(!protected.windows(data.len()).any(|w| w == data));

        let recovered = unprotect(&protected, &password).unwrap();
        assert_eq!(recovered, data);
    }

    #[test]
    fn test_wrong_password() {
        let protected = protect(
            b"secret",
            &Password::new("correct".to_string()),
            &fast_config(),
        )
        .unwrap();

        let result = unprotect(&protected, &Password::new("wrong".to_string()));
        assert!(matches!(result, Err(AutocryptError::WrongSetupCode)));
    }

    #[test]
    fn test_empty_password_rejected() {
        let empty = Password::new(String::new());
        assert!(protect(b"data", &empty, &fast_config()).is_err());
    }

    #[test]
    fn test_fresh_salt_each_time() {
        let password = Password::new("same".to_string());
        let a = protect(b"data", &password, &fast_config()).unwrap();
        let b = protect(b"data", &password, &fast_config()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_rejected() {
        let password = Password::new("pw".to_string());
        assert!(unprotect(b"not a protected blob", &password).is_err());
    }

    #[test]
    fn test_password_debug_redacted() {
        let password = Password::new("hunter2".to_string());
        assert!(!format!("{:?}", password).contains("hunter2"));
    }
}
