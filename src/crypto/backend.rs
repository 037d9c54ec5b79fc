//! Default post-quantum [`CryptoBackend`].

use crate::config::CoreConfig;
use crate::crypto::keys::{self, KeyBlob, KeyKind, PrivateKeyParts, PublicKeyParts};
use crate::crypto::{encryption, password, CryptoBackend, Decrypted, Fingerprint, Password};
use crate::error::{AutocryptError, Result};

/// Backend built on ML-KEM-1024, ML-DSA-87, AES-256-GCM and Argon2id
#[derive(Debug, Clone, Default)]
pub struct PqBackend {
    config: CoreConfig,
}

impl PqBackend {
    /// Creates a backend with explicit tunables
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }

    /// The tunables in use
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

impl CryptoBackend for PqBackend {
    fn generate_keypair(&self, identity: &str) -> Result<(KeyBlob, KeyBlob)> {
        keys::generate_keypair(identity)
    }

    fn is_valid_key(&self, key: &KeyBlob) -> bool {
        match key.kind() {
            KeyKind::Public => PublicKeyParts::from_blob(key).is_ok(),
            KeyKind::Private => PrivateKeyParts::from_blob(key).is_ok(),
        }
    }

    fn split_key(&self, private_key: &KeyBlob) -> Result<KeyBlob> {
        let parts = PrivateKeyParts::from_blob(private_key)?;
        Ok(parts.public().to_blob())
    }

    fn fingerprint(&self, key: &KeyBlob) -> Result<Fingerprint> {
        match key.kind() {
            KeyKind::Public => Ok(PublicKeyParts::from_blob(key)?.fingerprint()),
            KeyKind::Private => Ok(PrivateKeyParts::from_blob(key)?.fingerprint()),
        }
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[&KeyBlob],
        signer: Option<&KeyBlob>,
    ) -> Result<Vec<u8>> {
        encryption::encrypt_message(plaintext, recipients, signer, &self.config)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        private_keys: &[&KeyBlob],
        expected_signer: Option<&KeyBlob>,
    ) -> Result<Decrypted> {
        encryption::decrypt_message(ciphertext, private_keys, expected_signer)
    }

    fn symmetric_protect(&self, data: &[u8], passphrase: &Password) -> Result<Vec<u8>> {
        password::protect(data, passphrase, &self.config)
    }

    fn symmetric_unprotect(&self, data: &[u8], passphrase: &Password) -> Result<Vec<u8>> {
        password::unprotect(data, passphrase).map_err(|e| match e {
            AutocryptError::WrongSetupCode => e,
            other => AutocryptError::crypto(format!("Setup payload is unreadable: {}", other)),
        })
    }
}
