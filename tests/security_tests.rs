//! Security-focused tests: tampering, malformed input, key confusion and
//! secret hygiene.

use pqautocrypt::{
    armor::{self, ArmorType},
    config::CoreConfig,
    crypto::{CryptoBackend, Password},
    setup::{export_private_key, import_private_key, SetupCode},
    AutocryptError, CryptoEngine, Identity, KeyBlob, Keyring, SignatureOutcome,
};

fn recipients(keys: &[&KeyBlob]) -> Keyring {
    keys.iter().map(|k| (*k).clone()).collect()
}

#[test]
fn test_tampered_ciphertext_is_rejected() {
    let engine = CryptoEngine::new();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();

    let ciphertext = engine
        .encrypt(b"authentic", &recipients(&[&alice.public_key]), None)
        .unwrap();
    let block = armor::split(std::str::from_utf8(&ciphertext).unwrap()).unwrap();
    let mut binary = block.decode_payload().unwrap();

    let own = recipients(&[&alice.private_key]);
    for offset in [binary.len() - 1, binary.len() / 2, 40] {
        binary[offset] ^= 0x80;
        let rearmored = armor::encode(&binary, ArmorType::Message);
        assert!(
            engine.decrypt(rearmored.as_bytes(), &own, None).is_err(),
            "tampering at {} went unnoticed",
            offset
        );
        binary[offset] ^= 0x80;
    }
}

#[test]
fn test_signature_from_other_key_is_never_verified() {
    let engine = CryptoEngine::new();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();
    let mallory = Identity::generate(&engine, "alice@example.org").unwrap();
    let bob = Identity::generate(&engine, "bob@example.org").unwrap();

    // Mallory signs with a key bearing Alice's address.
    let ciphertext = engine
        .encrypt(b"trust me", &recipients(&[&bob.public_key]), Some(&mallory.private_key))
        .unwrap();
    let decrypted = engine
        .decrypt(&ciphertext, &recipients(&[&bob.private_key]), Some(&alice.public_key))
        .unwrap();
    assert_eq!(decrypted.signature, SignatureOutcome::UnknownSignature);
    assert!(!decrypted.signature.is_verified());
}

#[test]
fn test_public_key_cannot_sign_or_decrypt() {
    let engine = CryptoEngine::new();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();
    let ring = recipients(&[&alice.public_key]);

    assert!(engine.encrypt(b"x", &ring, Some(&alice.public_key)).is_err());

    let ciphertext = engine.encrypt(b"x", &ring, None).unwrap();
    let result = engine.decrypt(&ciphertext, &ring, None);
    assert!(matches!(result, Err(AutocryptError::Decryption(_))));
}

#[test]
fn test_relabelled_key_is_invalid() {
    let engine = CryptoEngine::new();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();

    let as_private = KeyBlob::private(alice.public_key.as_bytes().to_vec());
    let as_public = KeyBlob::public(alice.private_key.as_bytes().to_vec());
    assert!(!engine.is_structurally_valid(&as_private));
    assert!(!engine.is_structurally_valid(&as_public));
}

#[test]
fn test_same_length_garbage_is_invalid() {
    let engine = CryptoEngine::new();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();

    // Keep the packet framing but corrupt the version byte of the first body.
    let mut bytes = alice.public_key.as_bytes().to_vec();
    let first_body = if bytes[1] == 0xFF { 6 } else if bytes[1] >= 192 { 3 } else { 2 };
    bytes[first_body] = 3;
    assert!(!engine.is_structurally_valid(&KeyBlob::public(bytes)));

    let zeros = KeyBlob::public(vec![0u8; alice.public_key.len()]);
    assert!(!engine.is_structurally_valid(&zeros));
}

#[test]
fn test_corrupted_secret_material_is_invalid() {
    let engine = CryptoEngine::new();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();

    let mut bytes = alice.private_key.as_bytes().to_vec();
    let len = bytes.len();
    bytes[len - 10] ^= 0x01;
    assert!(!engine.is_structurally_valid(&KeyBlob::private(bytes)));
}

#[test]
fn test_setup_message_does_not_leak_key() {
    let engine = CryptoEngine::with_config(CoreConfig {
        kdf_memory_kib: 64,
        kdf_iterations: 1,
        ..CoreConfig::default()
    })
    .unwrap();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();
    let code = SetupCode::parse("5512-3456-7890-1234-5678-9012-3456-7890-1234").unwrap();

    let message = export_private_key(&engine, &alice, &code).unwrap();
    let plain_armor = armor::encode(alice.private_key.as_bytes(), ArmorType::PrivateKey);
    let key_line = plain_armor.lines().nth(2).unwrap();
    assert!(!message.contains(key_line));
    assert!(!message.contains(code.as_str()));

    assert!(format!("{:?}", code).starts_with("SetupCode(55"));
    assert!(!format!("{:?}", code).contains("3456"));

    let result = import_private_key(&engine, &message, "5599-3456-7890-1234-5678-9012-3456-7890-1234");
    assert!(matches!(result, Err(AutocryptError::WrongSetupCode)));
}

#[test]
fn test_symmetric_unprotect_wrong_passphrase() {
    let engine = CryptoEngine::with_config(CoreConfig {
        kdf_memory_kib: 64,
        kdf_iterations: 1,
        ..CoreConfig::default()
    })
    .unwrap();
    let backend = engine.backend();

    let protected = backend
        .symmetric_protect(b"payload", &Password::new("right".to_string()))
        .unwrap();
    assert_eq!(
        backend
            .symmetric_unprotect(&protected, &Password::new("right".to_string()))
            .unwrap(),
        b"payload"
    );
    assert!(matches!(
        backend.symmetric_unprotect(&protected, &Password::new("wrong".to_string())),
        Err(AutocryptError::WrongSetupCode)
    ));
}

#[test]
fn test_oversized_plaintext_rejected() {
    let engine = CryptoEngine::with_config(CoreConfig {
        max_message_size: 16,
        ..CoreConfig::default()
    })
    .unwrap();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();
    let ring = recipients(&[&alice.public_key]);

    assert!(engine.encrypt(&[0u8; 16], &ring, None).is_ok());
    assert!(matches!(
        engine.encrypt(&[0u8; 17], &ring, None),
        Err(AutocryptError::Validation(_))
    ));
}
