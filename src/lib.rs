//! # pqautocrypt
//!
//! End-to-end encryption core for an email-transport messenger, following
//! the Autocrypt model: peers discover each other's keys from a header on
//! ordinary mail, track them per correspondent, and encrypt opportunistically.
//! Keys and messages use post-quantum algorithms in PGP-shaped packets.
//!
//! ## Cryptographic Algorithms
//!
//! - **Signatures**: ML-DSA-87 (NIST FIPS 204)
//! - **Key Encapsulation**: ML-KEM-1024 (NIST FIPS 203)
//! - **Symmetric Encryption**: AES-256-GCM
//! - **Setup-code stretching**: Argon2id
//! - **Hashing**: SHA3-256
//!
//! ## Example
//!
//! ```rust,no_run
//! use pqautocrypt::{CryptoEngine, Identity, Keyring, SignatureOutcome};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CryptoEngine::new();
//! let alice = Identity::generate(&engine, "alice@example.org")?;
//! let bob = Identity::generate(&engine, "bob@example.org")?;
//!
//! let recipients: Keyring = [bob.public_key.clone(), alice.public_key.clone()]
//!     .into_iter()
//!     .collect();
//! let ciphertext = engine.encrypt(b"hi bob", &recipients, Some(&alice.private_key))?;
//!
//! let own: Keyring = [bob.private_key.clone()].into_iter().collect();
//! let decrypted = engine.decrypt(&ciphertext, &own, Some(&alice.public_key))?;
//! assert_eq!(decrypted.signature, SignatureOutcome::Verified);
//! # Ok(())
//! # }
//! ```

pub mod armor;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod header;
pub mod identity;
pub mod keyring;
pub mod packet;
pub mod peerstate;
pub mod setup;
pub mod validation;

pub use armor::{ArmorType, ArmoredBlock};
pub use config::CoreConfig;
pub use crypto::{CryptoBackend, Fingerprint, KeyBlob, KeyKind, PqBackend, SignatureOutcome};
pub use engine::{CryptoEngine, Decrypted};
pub use error::{AutocryptError, Result};
pub use header::{AutocryptHeader, PreferEncrypt};
pub use identity::Identity;
pub use keyring::Keyring;
pub use peerstate::{MemoryPeerStore, PeerState, PeerStore, PeerUpdate};
pub use setup::{generate_setup_code, ImportedKey, SetupCode};
