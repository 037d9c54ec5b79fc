//! Key blobs and their packet layout.
//!
//! A key blob is an opaque byte string to everything outside this
//! module. Inside, a public blob is three packets:
//!
//! ```text
//! PublicKey(ML-DSA-87) | UserId(address) | PublicSubkey(ML-KEM-1024)
//! ```
//!
//! and a private blob is the same shape with secret-key packets, each
//! carrying the public material, the secret material and a checksum.

use crate::crypto::{hash_data, unix_now, Algorithm, Fingerprint};
use crate::error::{AutocryptError, Result};
use crate::packet::{
    parse_packets, write_packets, Packet, PacketType, PublicKeyPacket, SecretKeyPacket,
    UserIdPacket,
};
use crate::validation::Validator;
use pqcrypto_mldsa::mldsa87;
use pqcrypto_mlkem::mlkem1024;
use pqcrypto_traits::kem::{PublicKey as KemPublicKey, SecretKey as KemSecretKey};
use pqcrypto_traits::sign::{PublicKey as SignPublicKey, SecretKey as SignSecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Unix timestamp for 2000-01-01; older creation times are rejected
const EARLIEST_KEY_CREATION: u64 = 946_684_800;

/// Allowed clock skew for creation times in the future
const CREATION_SKEW_SECS: u64 = 86_400;

/// Whether a key blob holds public or private material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// Public key: encryption recipient or signature verifier
    Public,
    /// Private key: decryption and signing
    Private,
}

/// Immutable, owned key material tagged with its kind.
///
/// Equality compares the raw bytes in constant time. The bytes are
/// wiped when the blob is dropped.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyBlob {
    kind: KeyKind,
    bytes: Vec<u8>,
}

impl KeyBlob {
    /// Wraps raw key bytes
    pub fn new(kind: KeyKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    /// Wraps raw public key bytes
    pub fn public(bytes: Vec<u8>) -> Self {
        Self::new(KeyKind::Public, bytes)
    }

    /// Wraps raw private key bytes
    pub fn private(bytes: Vec<u8>) -> Self {
        Self::new(KeyKind::Private, bytes)
    }

    /// The kind tag
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// True for public keys
    pub fn is_public(&self) -> bool {
        self.kind == KeyKind::Public
    }

    /// True for private keys
    pub fn is_private(&self) -> bool {
        self.kind == KeyKind::Private
    }

    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of raw bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the blob holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for KeyBlob {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

impl Eq for KeyBlob {}

impl fmt::Debug for KeyBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBlob")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Drop for KeyBlob {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

fn fingerprint_of(packet: &PublicKeyPacket) -> Fingerprint {
    Fingerprint(hash_data(&packet.to_bytes()))
}

fn check_creation_time(packet: &PublicKeyPacket) -> Result<()> {
    let created = packet.created as u64;
    if created < EARLIEST_KEY_CREATION {
        return Err(AutocryptError::key_validation(
            "Key creation time is unreasonably old (before 2000)",
        ));
    }
    if created > unix_now() + CREATION_SKEW_SECS {
        return Err(AutocryptError::key_validation(
            "Key creation time is too far in the future",
        ));
    }
    Ok(())
}

fn check_public_material(packet: &PublicKeyPacket, algorithm: Algorithm) -> Result<()> {
    if packet.algorithm != algorithm {
        return Err(AutocryptError::key_validation(format!(
            "Expected {} key, found {}",
            algorithm, packet.algorithm
        )));
    }
    let expected = match algorithm {
        Algorithm::Mldsa87 => mldsa87::public_key_bytes(),
        Algorithm::Mlkem1024 => mlkem1024::public_key_bytes(),
        other => {
            return Err(AutocryptError::key_validation(format!(
                "{} is not a key algorithm",
                other
            )))
        }
    };
    if packet.key_material.len() != expected {
        return Err(AutocryptError::key_validation(format!(
            "Invalid {} key material size: got {} bytes, expected {} bytes",
            algorithm,
            packet.key_material.len(),
            expected
        )));
    }
    check_creation_time(packet)
}

fn check_secret_material(packet: &SecretKeyPacket, algorithm: Algorithm) -> Result<()> {
    check_public_material(&packet.public, algorithm)?;
    let expected = match algorithm {
        Algorithm::Mldsa87 => mldsa87::secret_key_bytes(),
        _ => mlkem1024::secret_key_bytes(),
    };
    if packet.secret_key_material.len() != expected {
        return Err(AutocryptError::key_validation(format!(
            "Invalid {} secret material size: got {} bytes, expected {} bytes",
            algorithm,
            packet.secret_key_material.len(),
            expected
        )));
    }
    Ok(())
}

fn split_packets(key: &KeyBlob, expected: [PacketType; 3]) -> Result<Vec<Packet>> {
    Validator::validate_key_blob_size(key.as_bytes())
        .map_err(AutocryptError::key_validation)?;
    let packets = parse_packets(key.as_bytes()).map_err(AutocryptError::key_validation)?;

    if packets.len() != expected.len() {
        return Err(AutocryptError::key_validation(format!(
            "Expected {} key packets, found {}",
            expected.len(),
            packets.len()
        )));
    }
    for (packet, kind) in packets.iter().zip(expected) {
        if packet.packet_type() != kind {
            return Err(AutocryptError::key_validation(format!(
                "Unexpected {:?} packet where {:?} was expected",
                packet.packet_type(),
                kind
            )));
        }
    }
    Ok(packets)
}

fn parse_user_id(packet: &Packet) -> Result<String> {
    UserIdPacket::from_bytes(&packet.body)
        .map(|uid| uid.user_id)
        .map_err(AutocryptError::key_validation)
}

/// Parsed form of a public key blob
#[derive(Debug, Clone)]
pub(crate) struct PublicKeyParts {
    pub primary: PublicKeyPacket,
    pub user_id: String,
    pub subkey: PublicKeyPacket,
}

impl PublicKeyParts {
    /// Parses and structurally validates a public key blob
    pub fn from_blob(key: &KeyBlob) -> Result<Self> {
        if !key.is_public() {
            return Err(AutocryptError::key_validation("Expected a public key"));
        }
        let packets = split_packets(
            key,
            [
                PacketType::PublicKey,
                PacketType::UserId,
                PacketType::PublicSubkey,
            ],
        )?;

        let primary =
            PublicKeyPacket::from_bytes(&packets[0].body).map_err(AutocryptError::key_validation)?;
        check_public_material(&primary, Algorithm::Mldsa87)?;
        let user_id = parse_user_id(&packets[1])?;
        let subkey =
            PublicKeyPacket::from_bytes(&packets[2].body).map_err(AutocryptError::key_validation)?;
        check_public_material(&subkey, Algorithm::Mlkem1024)?;

        Ok(Self {
            primary,
            user_id,
            subkey,
        })
    }

    /// Serializes back into a public key blob
    pub fn to_blob(&self) -> KeyBlob {
        let packets = [
            Packet::new(PacketType::PublicKey, self.primary.to_bytes()),
            Packet::new(
                PacketType::UserId,
                UserIdPacket::new(self.user_id.clone()).to_bytes(),
            ),
            Packet::new(PacketType::PublicSubkey, self.subkey.to_bytes()),
        ];
        KeyBlob::public(write_packets(&packets))
    }

    /// Fingerprint of the primary (signing) key
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.primary)
    }

    /// Fingerprint of the encryption subkey
    pub fn subkey_fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.subkey)
    }

    /// ML-DSA-87 verifying key
    pub fn verifying_key(&self) -> Result<mldsa87::PublicKey> {
        <mldsa87::PublicKey as SignPublicKey>::from_bytes(&self.primary.key_material)
            .map_err(|_| AutocryptError::key_validation("Failed to reconstruct ML-DSA-87 public key"))
    }

    /// ML-KEM-1024 encapsulation key
    pub fn encryption_key(&self) -> Result<mlkem1024::PublicKey> {
        <mlkem1024::PublicKey as KemPublicKey>::from_bytes(&self.subkey.key_material).map_err(
            |_| AutocryptError::key_validation("Failed to reconstruct ML-KEM-1024 public key"),
        )
    }
}

/// Parsed form of a private key blob
#[derive(Debug, Clone)]
pub(crate) struct PrivateKeyParts {
    pub primary: SecretKeyPacket,
    pub user_id: String,
    pub subkey: SecretKeyPacket,
}

impl PrivateKeyParts {
    /// Parses and structurally validates a private key blob
    pub fn from_blob(key: &KeyBlob) -> Result<Self> {
        if !key.is_private() {
            return Err(AutocryptError::key_validation("Expected a private key"));
        }
        let packets = split_packets(
            key,
            [
                PacketType::SecretKey,
                PacketType::UserId,
                PacketType::SecretSubkey,
            ],
        )?;

        let primary =
            SecretKeyPacket::from_bytes(&packets[0].body).map_err(AutocryptError::key_validation)?;
        check_secret_material(&primary, Algorithm::Mldsa87)?;
        let user_id = parse_user_id(&packets[1])?;
        let subkey =
            SecretKeyPacket::from_bytes(&packets[2].body).map_err(AutocryptError::key_validation)?;
        check_secret_material(&subkey, Algorithm::Mlkem1024)?;

        Ok(Self {
            primary,
            user_id,
            subkey,
        })
    }

    /// Serializes back into a private key blob
    pub fn to_blob(&self) -> KeyBlob {
        let packets = [
            Packet::new(PacketType::SecretKey, self.primary.to_bytes()),
            Packet::new(
                PacketType::UserId,
                UserIdPacket::new(self.user_id.clone()).to_bytes(),
            ),
            Packet::new(PacketType::SecretSubkey, self.subkey.to_bytes()),
        ];
        KeyBlob::private(write_packets(&packets))
    }

    /// The matching public key
    pub fn public(&self) -> PublicKeyParts {
        PublicKeyParts {
            primary: self.primary.public.clone(),
            user_id: self.user_id.clone(),
            subkey: self.subkey.public.clone(),
        }
    }

    /// Fingerprint of the primary (signing) key
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.primary.public)
    }

    /// Fingerprint of the decryption subkey
    pub fn subkey_fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.subkey.public)
    }

    /// ML-DSA-87 signing key
    pub fn signing_key(&self) -> Result<mldsa87::SecretKey> {
        <mldsa87::SecretKey as SignSecretKey>::from_bytes(&self.primary.secret_key_material)
            .map_err(|_| AutocryptError::key_validation("Failed to reconstruct ML-DSA-87 secret key"))
    }

    /// ML-KEM-1024 decapsulation key
    pub fn decryption_key(&self) -> Result<mlkem1024::SecretKey> {
        <mlkem1024::SecretKey as KemSecretKey>::from_bytes(&self.subkey.secret_key_material)
            .map_err(|_| {
                AutocryptError::key_validation("Failed to reconstruct ML-KEM-1024 secret key")
            })
    }
}

/// Generates a signing primary key and an encryption subkey for `identity`.
///
/// Returns `(public, private)` blobs.
pub fn generate_keypair(identity: &str) -> Result<(KeyBlob, KeyBlob)> {
    Validator::validate_user_id(identity)?;
    let created = unix_now() as u32;

    // Both keypair() calls draw from the library's internal CSPRNG.
    let (sign_pk, sign_sk) = mldsa87::keypair();
    let (kem_pk, kem_sk) = mlkem1024::keypair();

    let primary = SecretKeyPacket::new(
        PublicKeyPacket::new(
            created,
            Algorithm::Mldsa87,
            SignPublicKey::as_bytes(&sign_pk).to_vec(),
        ),
        SignSecretKey::as_bytes(&sign_sk).to_vec(),
    );
    let subkey = SecretKeyPacket::new(
        PublicKeyPacket::new(
            created,
            Algorithm::Mlkem1024,
            KemPublicKey::as_bytes(&kem_pk).to_vec(),
        ),
        KemSecretKey::as_bytes(&kem_sk).to_vec(),
    );

    let private = PrivateKeyParts {
        primary,
        user_id: identity.to_string(),
        subkey,
    };
    Ok((private.public().to_blob(), private.to_blob()))
}
