//! Cryptographic collaborator for the Autocrypt core.
//!
//! The core talks to cryptography only through [`CryptoBackend`]. The
//! default implementation, [`PqBackend`], uses NIST post-quantum
//! algorithms:
//!
//! - **ML-DSA-87**: primary key, message signatures
//! - **ML-KEM-1024**: encryption subkey, per-recipient session key wrapping
//! - **AES-256-GCM**: message content and setup-message protection
//! - **Argon2id**: setup-code stretching
//! - **SHA3-256**: fingerprints and signature digests

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

pub mod backend;
pub mod encryption;
pub mod keys;
pub mod password;
pub mod signature;

pub use backend::PqBackend;
pub use keys::{KeyBlob, KeyKind};
pub use password::Password;

use crate::error::Result;

/// Algorithm identifiers carried in packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// ML-KEM-1024 for key encapsulation
    Mlkem1024 = 100,
    /// ML-DSA-87 for digital signatures
    Mldsa87 = 101,
    /// AES-256-GCM for symmetric encryption
    Aes256Gcm = 102,
    /// SHA3-256 for hashing
    Sha3_256 = 103,
}

impl Algorithm {
    /// Returns the algorithm name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Mlkem1024 => "ML-KEM-1024",
            Algorithm::Mldsa87 => "ML-DSA-87",
            Algorithm::Aes256Gcm => "AES-256-GCM",
            Algorithm::Sha3_256 => "SHA3-256",
        }
    }

    /// Parses a packet algorithm identifier
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            100 => Some(Algorithm::Mlkem1024),
            101 => Some(Algorithm::Mldsa87),
            102 => Some(Algorithm::Aes256Gcm),
            103 => Some(Algorithm::Sha3_256),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of checking the signature inside a decrypted message.
///
/// `Verified` and `UnknownSignature` are both successful decryptions,
/// but only `Verified` lets a caller trust the sender's key silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureOutcome {
    /// A signature is present and was made by the expected signer
    Verified,
    /// A signature is present but the expected signer is absent or differs
    UnknownSignature,
    /// The message carried no signature
    NoSignature,
}

impl SignatureOutcome {
    /// True only for [`SignatureOutcome::Verified`]
    pub fn is_verified(&self) -> bool {
        matches!(self, SignatureOutcome::Verified)
    }
}

impl fmt::Display for SignatureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignatureOutcome::Verified => "verified",
            SignatureOutcome::UnknownSignature => "unknown signature",
            SignatureOutcome::NoSignature => "no signature",
        };
        f.write_str(s)
    }
}

/// SHA3-256 key fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Raw fingerprint bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Uppercase hex rendering
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect()
    }

    /// Constant-time comparison against raw bytes
    pub fn matches(&self, other: &[u8]) -> bool {
        self.0[..].ct_eq(other).into()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

/// Result of a successful decryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// Recovered plaintext
    pub plaintext: Vec<u8>,
    /// What the signature check found
    pub signature: SignatureOutcome,
    /// Issuer fingerprint claimed by the signature, if one was present.
    ///
    /// Unauthenticated unless `signature` is `Verified`; use it to look the
    /// signer up, e.g. with [`crate::Keyring::find_by_fingerprint`].
    pub signer: Option<Fingerprint>,
}

/// Narrow interface to the cryptographic library.
///
/// Implementations receive borrowed, immutable inputs and return fresh
/// values, so calls on a shared backend may run on any thread.
pub trait CryptoBackend: Send + Sync {
    /// Generates a public/private key pair bound to `identity`
    fn generate_keypair(&self, identity: &str) -> Result<(KeyBlob, KeyBlob)>;

    /// Whether `key` parses as a genuine key of its declared kind
    fn is_valid_key(&self, key: &KeyBlob) -> bool;

    /// Derives the public key belonging to a private key
    fn split_key(&self, private_key: &KeyBlob) -> Result<KeyBlob>;

    /// Fingerprint of the key's primary component
    fn fingerprint(&self, key: &KeyBlob) -> Result<Fingerprint>;

    /// Encrypts to every recipient, optionally signing with `signer`
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[&KeyBlob],
        signer: Option<&KeyBlob>,
    ) -> Result<Vec<u8>>;

    /// Decrypts with whichever private key matches and classifies the signature
    fn decrypt(
        &self,
        ciphertext: &[u8],
        private_keys: &[&KeyBlob],
        expected_signer: Option<&KeyBlob>,
    ) -> Result<Decrypted>;

    /// Protects `data` under a passphrase
    fn symmetric_protect(&self, data: &[u8], passphrase: &Password) -> Result<Vec<u8>>;

    /// Reverses [`CryptoBackend::symmetric_protect`]
    fn symmetric_unprotect(&self, data: &[u8], passphrase: &Password) -> Result<Vec<u8>>;
}

/// Cryptographic hash function using SHA3-256
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Current Unix time in seconds, 0 if the clock is before the epoch
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_roundtrip() {
        for algorithm in [
            Algorithm::Mlkem1024,
            Algorithm::Mldsa87,
            Algorithm::Aes256Gcm,
            Algorithm::Sha3_256,
        ] {
            assert_eq!(Algorithm::from_byte(algorithm as u8), Some(algorithm));
        }
        assert_eq!(Algorithm::from_byte(99), None);
        assert_eq!(Algorithm::Mldsa87.to_string(), "ML-DSA-87");
    }

    #[test]
    fn test_hash_data() {
        let hash1 = hash_data(b"test data");
        let hash2 = hash_data(b"test data");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash_data(b"other data"));
    }

    #[test]
    fn test_fingerprint_rendering() {
        let fp = Fingerprint([0xAB; 32]);
        assert_eq!(fp.to_hex().len(), 64);
        assert!(fp.to_hex().starts_with("ABAB"));
        assert!(fp.matches(&[0xAB; 32]));
        assert!(!fp.matches(&[0xAB; 31]));
    }

    #[test]
    fn test_signature_outcome_is_not_collapsed() {
        assert!(SignatureOutcome::Verified.is_verified());
        assert!(!SignatureOutcome::UnknownSignature.is_verified());
        assert!(!SignatureOutcome::NoSignature.is_verified());
    }
}
