//! Hybrid multi-recipient encryption.
//!
//! A message is a packet sequence:
//!
//! ```text
//! Recipient* | EncryptedData( [Signature] | LiteralData )
//! ```
//!
//! A fresh 256-bit session key encrypts the content with AES-256-GCM.
//! For every recipient the session key is wrapped under a key derived
//! (HKDF-SHA3-256) from an ML-KEM-1024 shared secret with that
//! recipient's encryption subkey.

use crate::config::CoreConfig;
use crate::crypto::keys::{KeyBlob, PrivateKeyParts, PublicKeyParts};
use crate::crypto::signature::{sign_literal, signer_error, verify_literal};
use crate::crypto::{unix_now, Algorithm, Decrypted, Fingerprint, SignatureOutcome};
use crate::error::{AutocryptError, Result};
use crate::packet::{
    parse_packets, write_packets, EncryptedDataPacket, LiteralDataPacket, Packet, PacketType,
    RecipientPacket, SignaturePacket, NONCE_SIZE,
};
use crate::validation::Validator;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use hkdf::Hkdf;
use pqcrypto_mlkem::mlkem1024;
use pqcrypto_traits::kem::{Ciphertext, SharedSecret};
use rand::{rngs::OsRng, RngCore};
use sha3::Sha3_256;
use tracing::{debug, warn};
use zeroize::Zeroize;

/// HKDF info prefix for per-recipient key wrapping
const KEY_WRAP_INFO: &[u8] = b"pqautocrypt session key wrap v1";

/// Session key size (AES-256)
const SESSION_KEY_SIZE: usize = 32;

fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn derive_wrapping_key(shared_secret: &[u8], recipient: &Fingerprint) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha3_256>::new(None, shared_secret);
    let mut info = Vec::with_capacity(KEY_WRAP_INFO.len() + 32);
    info.extend_from_slice(KEY_WRAP_INFO);
    info.extend_from_slice(recipient.as_bytes());

    let mut okm = [0u8; 32];
    hk.expand(&info, &mut okm)
        .map_err(|_| AutocryptError::crypto("HKDF expansion failed"))?;
    Ok(okm)
}

fn wrap_session_key(session_key: &[u8; SESSION_KEY_SIZE], recipient: &PublicKeyParts) -> Result<RecipientPacket> {
    let public_key = recipient.encryption_key()?;
    let fingerprint = recipient.subkey_fingerprint();

    let (shared_secret, kem_ciphertext) = mlkem1024::encapsulate(&public_key);
    let mut kek = derive_wrapping_key(shared_secret.as_bytes(), &fingerprint)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&kek));
    kek.zeroize();

    let nonce = random_nonce();
    let wrapped_key = cipher
        .encrypt(Nonce::from_slice(&nonce), &session_key[..])
        .map_err(|e| AutocryptError::crypto(format!("Failed to wrap session key: {}", e)))?;

    Ok(RecipientPacket {
        recipient: fingerprint.0,
        algorithm: Algorithm::Mlkem1024,
        kem_ciphertext: kem_ciphertext.as_bytes().to_vec(),
        nonce,
        wrapped_key,
    })
}

fn unwrap_session_key(
    packet: &RecipientPacket,
    key: &PrivateKeyParts,
) -> Result<[u8; SESSION_KEY_SIZE]> {
    if packet.algorithm != Algorithm::Mlkem1024 {
        return Err(AutocryptError::decryption(format!(
            "Unsupported key encapsulation algorithm {}",
            packet.algorithm
        )));
    }

    let secret_key = key.decryption_key()?;
    let kem_ciphertext = mlkem1024::Ciphertext::from_bytes(&packet.kem_ciphertext)
        .map_err(|_| AutocryptError::decryption("Malformed KEM ciphertext"))?;
    let shared_secret = mlkem1024::decapsulate(&kem_ciphertext, &secret_key);

    let mut kek = derive_wrapping_key(shared_secret.as_bytes(), &key.subkey_fingerprint())?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&kek));
    kek.zeroize();

    let mut plain = cipher
        .decrypt(Nonce::from_slice(&packet.nonce), packet.wrapped_key.as_slice())
        .map_err(|_| AutocryptError::decryption("Failed to unwrap session key"))?;
    if plain.len() != SESSION_KEY_SIZE {
        plain.zeroize();
        return Err(AutocryptError::decryption("Unwrapped session key has wrong size"));
    }

    let mut session_key = [0u8; SESSION_KEY_SIZE];
    session_key.copy_from_slice(&plain);
    plain.zeroize();
    Ok(session_key)
}

/// Encrypts `plaintext` to every recipient, optionally signing first.
///
/// Returns the binary packet sequence; armoring is left to the caller.
pub fn encrypt_message(
    plaintext: &[u8],
    recipients: &[&KeyBlob],
    signer: Option<&KeyBlob>,
    config: &CoreConfig,
) -> Result<Vec<u8>> {
    Validator::validate_message_size(plaintext, config.max_message_size)?;
    Validator::validate_recipient_count(recipients.len())?;

    let recipients = recipients
        .iter()
        .map(|key| PublicKeyParts::from_blob(key))
        .collect::<Result<Vec<_>>>()?;
    let signer = signer
        .map(PrivateKeyParts::from_blob)
        .transpose()
        .map_err(signer_error)?;

    let literal = LiteralDataPacket {
        date: unix_now() as u32,
        data: plaintext.to_vec(),
    };
    let literal_body = literal.to_bytes();

    let mut inner = Vec::with_capacity(2);
    if let Some(signer) = &signer {
        let signature = sign_literal(signer, &literal_body)?;
        inner.push(Packet::new(PacketType::Signature, signature.to_bytes()));
    }
    inner.push(Packet::new(PacketType::LiteralData, literal_body));
    let mut inner_bytes = write_packets(&inner);

    let mut session_key = [0u8; SESSION_KEY_SIZE];
    OsRng.fill_bytes(&mut session_key);

    let mut packets = Vec::with_capacity(recipients.len() + 1);
    for recipient in &recipients {
        packets.push(Packet::new(
            PacketType::PublicKeyEncryptedSessionKey,
            wrap_session_key(&session_key, recipient)?.to_bytes(),
        ));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&session_key));
    session_key.zeroize();
    let nonce = random_nonce();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), inner_bytes.as_slice())
        .map_err(|e| AutocryptError::crypto(format!("Failed to encrypt content: {}", e)))?;
    inner_bytes.zeroize();

    let encrypted = EncryptedDataPacket {
        algorithm: Algorithm::Aes256Gcm,
        nonce,
        ciphertext,
    };
    packets.push(Packet::new(
        PacketType::SymEncryptedIntegrityProtectedData,
        encrypted.to_bytes(),
    ));

    debug!(
        "Encrypted {} bytes to {} recipients (signed: {})",
        plaintext.len(),
        recipients.len(),
        signer.is_some()
    );
    Ok(write_packets(&packets))
}

fn split_message(packets: &[Packet]) -> Result<(Vec<RecipientPacket>, EncryptedDataPacket)> {
    let (last, rest) = packets
        .split_last()
        .ok_or_else(|| AutocryptError::decryption("Empty message"))?;
    if last.packet_type() != PacketType::SymEncryptedIntegrityProtectedData {
        return Err(AutocryptError::decryption(
            "Message does not end with an encrypted data packet",
        ));
    }
    if rest.is_empty() {
        return Err(AutocryptError::decryption("Message has no recipients"));
    }

    let mut recipients = Vec::with_capacity(rest.len());
    for packet in rest {
        if packet.packet_type() != PacketType::PublicKeyEncryptedSessionKey {
            return Err(AutocryptError::decryption(format!(
                "Unexpected {:?} packet before encrypted data",
                packet.packet_type()
            )));
        }
        recipients.push(RecipientPacket::from_bytes(&packet.body).map_err(AutocryptError::decryption)?);
    }
    let encrypted = EncryptedDataPacket::from_bytes(&last.body).map_err(AutocryptError::decryption)?;
    Ok((recipients, encrypted))
}

fn split_content(inner: &[u8]) -> Result<(Option<SignaturePacket>, Vec<u8>)> {
    let packets = parse_packets(inner).map_err(AutocryptError::decryption)?;
    match packets.as_slice() {
        [literal] if literal.packet_type() == PacketType::LiteralData => {
            Ok((None, literal.body.clone()))
        }
        [signature, literal]
            if signature.packet_type() == PacketType::Signature
                && literal.packet_type() == PacketType::LiteralData =>
        {
            let signature =
                SignaturePacket::from_bytes(&signature.body).map_err(AutocryptError::decryption)?;
            Ok((Some(signature), literal.body.clone()))
        }
        _ => Err(AutocryptError::decryption("Unexpected encrypted content layout")),
    }
}

fn classify_signature(
    signature: Option<&SignaturePacket>,
    expected_signer: Option<&KeyBlob>,
    literal_body: &[u8],
) -> SignatureOutcome {
    let Some(signature) = signature else {
        return SignatureOutcome::NoSignature;
    };
    let Some(expected) = expected_signer else {
        return SignatureOutcome::UnknownSignature;
    };

    let verifier = match PublicKeyParts::from_blob(expected) {
        Ok(parts) => parts,
        Err(e) => {
            warn!("Expected signer key is unusable: {}", e);
            return SignatureOutcome::UnknownSignature;
        }
    };
    match verify_literal(&verifier, signature, literal_body) {
        Ok(true) => SignatureOutcome::Verified,
        Ok(false) => SignatureOutcome::UnknownSignature,
        Err(e) => {
            warn!("Signature check failed: {}", e);
            SignatureOutcome::UnknownSignature
        }
    }
}

/// Decrypts a binary packet sequence with whichever private key matches.
pub fn decrypt_message(
    ciphertext: &[u8],
    private_keys: &[&KeyBlob],
    expected_signer: Option<&KeyBlob>,
) -> Result<Decrypted> {
    Validator::validate_encrypted_size(ciphertext)?;
    let packets = parse_packets(ciphertext).map_err(AutocryptError::decryption)?;
    let (recipients, encrypted) = split_message(&packets)?;

    if encrypted.algorithm != Algorithm::Aes256Gcm {
        return Err(AutocryptError::decryption(format!(
            "Unsupported content algorithm {}",
            encrypted.algorithm
        )));
    }

    let keys: Vec<PrivateKeyParts> = private_keys
        .iter()
        .filter_map(|key| match PrivateKeyParts::from_blob(key) {
            Ok(parts) => Some(parts),
            Err(e) => {
                debug!("Skipping unusable private key: {}", e);
                None
            }
        })
        .collect();
    if keys.is_empty() {
        return Err(AutocryptError::decryption("No usable private key"));
    }

    let mut session_key = None;
    'outer: for recipient in &recipients {
        for key in &keys {
            if !key.subkey_fingerprint().matches(&recipient.recipient) {
                continue;
            }
            match unwrap_session_key(recipient, key) {
                Ok(sk) => {
                    debug!("Session key unwrapped for {}", key.fingerprint());
                    session_key = Some(sk);
                    break 'outer;
                }
                Err(e) => debug!("Recipient packet did not unwrap: {}", e),
            }
        }
    }
    let mut session_key = session_key
        .ok_or_else(|| AutocryptError::decryption("No matching private key for this message"))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&session_key));
    session_key.zeroize();
    let mut inner = cipher
        .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_slice())
        .map_err(|_| AutocryptError::decryption("Content authentication failed"))?;

    let result = split_content(&inner);
    inner.zeroize();
    let (signature, literal_body) = result?;

    let outcome = classify_signature(signature.as_ref(), expected_signer, &literal_body);
    let literal = LiteralDataPacket::from_bytes(&literal_body).map_err(AutocryptError::decryption)?;
    Ok(Decrypted {
        plaintext: literal.data,
        signature: outcome,
        signer: signature.map(|s| Fingerprint(s.issuer)),
    })
}
