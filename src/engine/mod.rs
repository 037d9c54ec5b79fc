//! Crypto engine facade.
//!
//! Orchestrates key generation, structural key validation, armored
//! encryption and decryption on top of a [`CryptoBackend`]. The three-way
//! [`crate::crypto::SignatureOutcome`] of a decryption is returned unchanged to callers.

use crate::armor::{self, ArmorType};
use crate::config::CoreConfig;
use crate::crypto::{CryptoBackend, Fingerprint, KeyBlob, PqBackend};
use crate::error::{AutocryptError, Result};
use crate::header::AutocryptHeader;
use crate::keyring::Keyring;
use crate::peerstate::PeerState;
use crate::validation::Validator;
use tracing::{debug, info, warn};

pub use crate::crypto::Decrypted;

/// Facade over a crypto backend
#[derive(Debug, Clone)]
pub struct CryptoEngine<B = PqBackend> {
    backend: B,
    config: CoreConfig,
}

impl CryptoEngine<PqBackend> {
    /// Engine with the post-quantum backend and default configuration
    pub fn new() -> Self {
        Self {
            backend: PqBackend::default(),
            config: CoreConfig::default(),
        }
    }

    /// Engine with the post-quantum backend and explicit configuration
    pub fn with_config(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend: PqBackend::new(config.clone()),
            config,
        })
    }
}

impl Default for CryptoEngine<PqBackend> {
    fn default() -> Self {
        Self::new()
    }
}

fn short_fingerprint(fingerprint: &Fingerprint) -> String {
    fingerprint.to_hex()[..16].to_string()
}

impl<B: CryptoBackend> CryptoEngine<B> {
    /// Engine over a custom backend
    pub fn with_backend(backend: B, config: CoreConfig) -> Self {
        Self { backend, config }
    }

    /// The backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The configuration in use
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Generates a key pair; both halves must pass structural validation
    pub fn create_keypair(&self, identity: &str) -> Result<(KeyBlob, KeyBlob)> {
        let (public, private) = self.backend.generate_keypair(identity)?;
        self.validate_key(&public)?;
        self.validate_key(&private)?;

        if let Ok(fingerprint) = self.backend.fingerprint(&public) {
            info!("Generated key {} for new identity", short_fingerprint(&fingerprint));
        }
        Ok((public, private))
    }

    /// Whether `key` parses as a genuine key of its declared kind
    pub fn is_structurally_valid(&self, key: &KeyBlob) -> bool {
        self.backend.is_valid_key(key)
    }

    /// Like [`Self::is_structurally_valid`] but returns an error for invalid keys
    pub fn validate_key(&self, key: &KeyBlob) -> Result<()> {
        if self.backend.is_valid_key(key) {
            Ok(())
        } else {
            Err(AutocryptError::key_validation(format!(
                "Not a valid {:?} key ({} bytes)",
                key.kind(),
                key.len()
            )))
        }
    }

    /// Derives the public key of a private key
    pub fn split_key(&self, private_key: &KeyBlob) -> Result<KeyBlob> {
        self.backend.split_key(private_key)
    }

    /// Fingerprint of a key's primary component
    pub fn fingerprint(&self, key: &KeyBlob) -> Result<Fingerprint> {
        self.backend.fingerprint(key)
    }

    /// Renders an outgoing header, folding `keydata` at the configured width
    pub fn render_header(&self, header: &AutocryptHeader) -> String {
        header.render_with_width(self.config.header_line_width)
    }

    /// Encrypts to every public key in `keyring` and returns armored bytes.
    ///
    /// The output is a sized buffer, not a terminated string.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        keyring: &Keyring,
        signer: Option<&KeyBlob>,
    ) -> Result<Vec<u8>> {
        Validator::validate_message_size(plaintext, self.config.max_message_size)?;
        let recipients = keyring.public_keys();
        if recipients.is_empty() {
            return Err(AutocryptError::validation(
                "Keyring holds no public keys to encrypt to",
            ));
        }
        if let Some(signer) = signer {
            if !signer.is_private() {
                return Err(AutocryptError::key_validation("Signer must be a private key"));
            }
        }

        let binary = self.backend.encrypt(plaintext, &recipients, signer)?;
        debug!(
            "Encrypted message for {} recipients, {} bytes before armor",
            recipients.len(),
            binary.len()
        );
        Ok(armor::encode(&binary, ArmorType::Message).into_bytes())
    }

    /// Decrypts armored ciphertext with whichever private key in `keyring` matches
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        keyring: &Keyring,
        expected_signer: Option<&KeyBlob>,
    ) -> Result<Decrypted> {
        Validator::validate_encrypted_size(ciphertext)?;
        // Armor is ASCII; surrounding mail text may be in any charset.
        let text = String::from_utf8_lossy(ciphertext);

        let block = armor::split(&text)?;
        if block.armor_type() != Some(ArmorType::Message) {
            return Err(AutocryptError::framing(format!(
                "Expected a PGP MESSAGE block, found '{}'",
                block.label()
            )));
        }
        let binary = block
            .decode_payload()
            .map_err(|e| AutocryptError::decryption(format!("Malformed ciphertext: {}", e)))?;

        let private_keys = keyring.private_keys();
        if private_keys.is_empty() {
            return Err(AutocryptError::decryption("Keyring holds no private keys"));
        }
        let expected_signer = expected_signer.filter(|key| {
            let public = key.is_public();
            if !public {
                warn!("Ignoring private key passed as expected signer");
            }
            public
        });

        let decrypted = self
            .backend
            .decrypt(&binary, &private_keys, expected_signer)
            .map_err(|e| match e {
                AutocryptError::Decryption(_) => e,
                other => AutocryptError::decryption(other),
            })?;
        debug!(
            "Decrypted {} bytes, signature: {}",
            decrypted.plaintext.len(),
            decrypted.signature
        );

        Ok(decrypted)
    }

    /// Builds the recipient keyring for an outgoing message.
    ///
    /// Takes each peer's encryption key plus `own_public`, so the sender
    /// can read the message later. Returns the addresses of peers that
    /// cannot be encrypted to.
    pub fn recipient_keyring(
        &self,
        peers: &[PeerState],
        own_public: Option<&KeyBlob>,
    ) -> (Keyring, Vec<String>) {
        let mut keyring = Keyring::new();
        let mut missing = Vec::new();

        for peer in peers {
            match peer.encryption_key() {
                Some(key) if self.backend.is_valid_key(key) => {
                    keyring.add(key.clone());
                }
                Some(_) => {
                    warn!("Stored key for {} failed validation", peer.address);
                    missing.push(peer.address.clone());
                }
                None => missing.push(peer.address.clone()),
            }
        }
        if let Some(own) = own_public {
            keyring.add(own.clone());
        }

        (keyring, missing)
    }
}
