//! ML-DSA-87 message signatures.
//!
//! A message signature covers the literal data packet body together with
//! the signature type and creation time, hashed with SHA3-256.

use crate::crypto::keys::{PrivateKeyParts, PublicKeyParts};
use crate::crypto::{hash_data, unix_now, Algorithm};
use crate::error::{AutocryptError, Result};
use crate::packet::SignaturePacket;
use pqcrypto_mldsa::mldsa87;
use pqcrypto_traits::sign::DetachedSignature;
use tracing::debug;

/// Signature over binary document content
pub const SIGNATURE_TYPE_BINARY: u8 = 0x00;

fn signature_digest(literal_body: &[u8], signature_type: u8, created: u32) -> [u8; 32] {
    let mut data = Vec::with_capacity(literal_body.len() + 5);
    data.extend_from_slice(literal_body);
    data.push(signature_type);
    data.extend_from_slice(&created.to_be_bytes());
    hash_data(&data)
}

/// Signs a serialized literal data packet body
pub(crate) fn sign_literal(signer: &PrivateKeyParts, literal_body: &[u8]) -> Result<SignaturePacket> {
    let secret_key = signer.signing_key()?;
    let created = unix_now() as u32;
    let digest = signature_digest(literal_body, SIGNATURE_TYPE_BINARY, created);
    let signature = mldsa87::detached_sign(&digest, &secret_key);

    Ok(SignaturePacket {
        signature_type: SIGNATURE_TYPE_BINARY,
        public_key_algorithm: Algorithm::Mldsa87,
        hash_algorithm: Algorithm::Sha3_256,
        issuer: signer.fingerprint().0,
        created,
        signature_material: signature.as_bytes().to_vec(),
    })
}

/// Checks `signature` against `literal_body` with the signer's public key.
///
/// Returns `Ok(false)` for any mismatch; errors are reserved for
/// unusable key material.
pub(crate) fn verify_literal(
    signer: &PublicKeyParts,
    signature: &SignaturePacket,
    literal_body: &[u8],
) -> Result<bool> {
    if signature.public_key_algorithm != Algorithm::Mldsa87
        || signature.hash_algorithm != Algorithm::Sha3_256
    {
        debug!(
            "Unsupported signature algorithms {} / {}",
            signature.public_key_algorithm, signature.hash_algorithm
        );
        return Ok(false);
    }
    if !signer.fingerprint().matches(&signature.issuer) {
        return Ok(false);
    }

    let public_key = signer.verifying_key()?;
    let detached = match mldsa87::DetachedSignature::from_bytes(&signature.signature_material) {
        Ok(sig) => sig,
        Err(_) => {
            debug!(
                "Malformed signature material ({} bytes)",
                signature.signature_material.len()
            );
            return Ok(false);
        }
    };

    let digest = signature_digest(literal_body, signature.signature_type, signature.created);
    Ok(mldsa87::verify_detached_signature(&detached, &digest, &public_key).is_ok())
}

/// Maps a failure to load the signer's key into a crypto error
pub(crate) fn signer_error(e: AutocryptError) -> AutocryptError {
    AutocryptError::crypto(format!("Unusable signing key: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_keypair;

    #[test]
    fn test_sign_and_verify() {
        let (public, private) = generate_keypair("alice@example.org").unwrap();
        let signer = PrivateKeyParts::from_blob(&private).unwrap();
        let verifier = PublicKeyParts::from_blob(&public).unwrap();

        let body = b"literal data body";
        let signature = sign_literal(&signer, body).unwrap();
        assert_eq!(signature.issuer, verifier.fingerprint().0);
        assert!(verify_literal(&verifier, &signature, body).unwrap());
        assert!(!verify_literal(&verifier, &signature, b"tampered body").unwrap());
    }

    #[test]
    fn test_other_key_does_not_verify() {
        let (_, private) = generate_keypair("alice@example.org").unwrap();
        let (other_public, _) = generate_keypair("bob@example.org").unwrap();
        let signer = PrivateKeyParts::from_blob(&private).unwrap();
        let other = PublicKeyParts::from_blob(&other_public).unwrap();

        let signature = sign_literal(&signer, b"body").unwrap();
        assert!(!verify_literal(&other, &signature, b"body").unwrap());
    }

    #[test]
    fn test_corrupted_signature_material() {
        let (public, private) = generate_keypair("alice@example.org").unwrap();
        let signer = PrivateKeyParts::from_blob(&private).unwrap();
        let verifier = PublicKeyParts::from_blob(&public).unwrap();

        let mut signature = sign_literal(&signer, b"body").unwrap();
        signature.signature_material[10] ^= 0xFF;
        assert!(!verify_literal(&verifier, &signature, b"body").unwrap());

        signature.signature_material.truncate(5);
        assert!(!verify_literal(&verifier, &signature, b"body").unwrap());
    }
}
