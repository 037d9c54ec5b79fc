//! Autocrypt Setup Message: private key transfer between devices.
//!
//! The private key is armored as a `PGP PRIVATE KEY BLOCK` carrying the
//! owner's `Autocrypt-Prefer-Encrypt` setting, protected under a setup
//! code, and armored again as a `PGP MESSAGE` whose `Passphrase-Begin`
//! field shows the first two digits of the code.

use crate::armor::{self, ArmorType};
use crate::crypto::{CryptoBackend, KeyBlob, Password};
use crate::engine::CryptoEngine;
use crate::error::{AutocryptError, Result};
use crate::header::PreferEncrypt;
use crate::identity::Identity;
use rand::{rngs::OsRng, Rng};
use std::fmt;
use tracing::{debug, info};
use zeroize::Zeroize;

/// Number of digit groups in a setup code
pub const SETUP_CODE_GROUPS: usize = 9;

/// Digits per group
pub const SETUP_CODE_GROUP_LEN: usize = 4;

/// Formatted length including dashes
pub const SETUP_CODE_LEN: usize = SETUP_CODE_GROUPS * (SETUP_CODE_GROUP_LEN + 1) - 1;

/// Value of the `Passphrase-Format` field
pub const PASSPHRASE_FORMAT: &str = "numeric9x4";

const FIELD_PASSPHRASE_FORMAT: &str = "Passphrase-Format";
const FIELD_PASSPHRASE_BEGIN: &str = "Passphrase-Begin";
const FIELD_PREFER_ENCRYPT: &str = "Autocrypt-Prefer-Encrypt";

/// Length of the non-secret hint
const HINT_LEN: usize = 2;

/// A 36-digit setup code formatted as nine dash-separated groups
#[derive(Clone, PartialEq, Eq)]
pub struct SetupCode(String);

impl SetupCode {
    /// Parses user input; anything but digits is ignored, 36 digits are required
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = normalize_setup_code(input);
        if normalized.len() != SETUP_CODE_LEN {
            return Err(AutocryptError::validation(format!(
                "Setup code must have {} digits",
                SETUP_CODE_GROUPS * SETUP_CODE_GROUP_LEN
            )));
        }
        Ok(Self(normalized))
    }

    /// The formatted code
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first two digits, shown to the user to pick the right code
    pub fn hint(&self) -> &str {
        &self.0[..HINT_LEN]
    }

    fn password(&self) -> Password {
        Password::new(self.0.clone())
    }
}

impl fmt::Debug for SetupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetupCode({}..)", self.hint())
    }
}

impl Drop for SetupCode {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Generates a fresh setup code from the OS random source
pub fn generate_setup_code() -> SetupCode {
    let mut rng = OsRng;
    let groups: Vec<String> = (0..SETUP_CODE_GROUPS)
        .map(|_| format!("{:04}", rng.gen_range(0..10_000u32)))
        .collect();
    SetupCode(groups.join("-"))
}

/// Keeps only the decimal digits of `input` and inserts a dash after
/// every complete group of four that is followed by more digits.
pub fn normalize_setup_code(input: &str) -> String {
    let mut out = String::with_capacity(SETUP_CODE_LEN);
    let mut digits = 0;
    for c in input.chars().filter(|c| c.is_ascii_digit()) {
        if digits > 0 && digits % SETUP_CODE_GROUP_LEN == 0 {
            out.push('-');
        }
        out.push(c);
        digits += 1;
    }
    out
}

/// A private key recovered from a setup message
#[derive(Clone)]
pub struct ImportedKey {
    /// The transferred private key
    pub private_key: KeyBlob,
    /// Its public half
    pub public_key: KeyBlob,
    /// Preference the exporting device announced
    pub prefer_encrypt: PreferEncrypt,
}

impl fmt::Debug for ImportedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedKey")
            .field("public_key", &self.public_key)
            .field("prefer_encrypt", &self.prefer_encrypt)
            .finish_non_exhaustive()
    }
}

fn prefer_encrypt_field(prefer: PreferEncrypt) -> &'static str {
    prefer.as_attribute().unwrap_or("nopreference")
}

/// Builds the armored setup message for `identity` protected by `code`
pub fn export_private_key<B: CryptoBackend>(
    engine: &CryptoEngine<B>,
    identity: &Identity,
    code: &SetupCode,
) -> Result<String> {
    engine.validate_key(&identity.private_key)?;

    let mut inner = armor::encode_with_headers(
        identity.private_key.as_bytes(),
        ArmorType::PrivateKey,
        &[(FIELD_PREFER_ENCRYPT, prefer_encrypt_field(identity.prefer_encrypt))],
    );
    let protected = engine
        .backend()
        .symmetric_protect(inner.as_bytes(), &code.password());
    inner.zeroize();
    let protected = protected?;

    let message = armor::encode_with_headers(
        &protected,
        ArmorType::Message,
        &[
            (FIELD_PASSPHRASE_FORMAT, PASSPHRASE_FORMAT),
            (FIELD_PASSPHRASE_BEGIN, code.hint()),
        ],
    );
    info!("Exported setup message for {}", identity.address);
    Ok(message)
}

/// Checks the setup message's hint against `code` without decrypting anything
fn check_hint(block: &armor::ArmoredBlock, code: &SetupCode) -> Result<()> {
    if let Some(format) = block.field(FIELD_PASSPHRASE_FORMAT) {
        if format != PASSPHRASE_FORMAT {
            return Err(AutocryptError::framing(format!(
                "Unsupported passphrase format '{}'",
                format
            )));
        }
    }

    let hint = block
        .field(FIELD_PASSPHRASE_BEGIN)
        .ok_or_else(|| AutocryptError::framing("Setup message has no Passphrase-Begin field"))?;
    let prefix = hint
        .get(..HINT_LEN)
        .filter(|p| p.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| AutocryptError::framing("Malformed Passphrase-Begin field"))?;

    if prefix != code.hint() {
        debug!("Setup code does not match the message's passphrase hint");
        return Err(AutocryptError::WrongSetupCode);
    }
    Ok(())
}

/// Reads only the `Passphrase-Begin` hint of a setup message
pub fn setup_message_hint(armored: &str) -> Result<String> {
    let block = armor::split_headers(armored)?;
    block
        .field(FIELD_PASSPHRASE_BEGIN)
        .map(str::to_string)
        .ok_or_else(|| AutocryptError::framing("Setup message has no Passphrase-Begin field"))
}

/// Recovers the private key from a setup message.
///
/// `code` may contain any separators; only its digits count. A code that
/// is malformed, contradicts the hint or fails to decrypt yields
/// [`AutocryptError::WrongSetupCode`].
pub fn import_private_key<B: CryptoBackend>(
    engine: &CryptoEngine<B>,
    armored: &str,
    code: &str,
) -> Result<ImportedKey> {
    let code = SetupCode::parse(code).map_err(|_| AutocryptError::WrongSetupCode)?;

    let block = armor::split(armored)?;
    if block.armor_type() != Some(ArmorType::Message) {
        return Err(AutocryptError::framing(format!(
            "Expected a PGP MESSAGE setup block, found '{}'",
            block.label()
        )));
    }
    check_hint(&block, &code)?;

    let protected = block.decode_payload()?;
    let plain = engine
        .backend()
        .symmetric_unprotect(&protected, &code.password())?;
    let mut inner = String::from_utf8(plain)
        .map_err(|_| AutocryptError::crypto("Setup payload is not text"))?;

    let parsed = armor::split(&inner).and_then(|key_block| {
        if key_block.armor_type() != Some(ArmorType::PrivateKey) {
            return Err(AutocryptError::framing(format!(
                "Expected a PGP PRIVATE KEY BLOCK, found '{}'",
                key_block.label()
            )));
        }
        let prefer = key_block
            .field(FIELD_PREFER_ENCRYPT)
            .map(PreferEncrypt::from_attribute)
            .unwrap_or_default();
        Ok((key_block.decode_payload()?, prefer))
    });
    inner.zeroize();
    let (key_bytes, prefer_encrypt) = parsed?;

    let private_key = KeyBlob::private(key_bytes);
    engine.validate_key(&private_key)?;
    let public_key = engine.split_key(&private_key)?;
    info!("Imported private key from setup message");

    Ok(ImportedKey {
        private_key,
        public_key,
        prefer_encrypt,
    })
}

/// Wraps an armored setup message in the HTML attachment sent to oneself
pub fn render_setup_file(armored: &str) -> String {
    let mut html = String::with_capacity(armored.len() + 512);
    html.push_str("<!DOCTYPE html>\r\n");
    html.push_str("<html>\r\n");
    html.push_str("<head>\r\n");
    html.push_str("<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" />\r\n");
    html.push_str("<title>Autocrypt Setup Message</title>\r\n");
    html.push_str("</head>\r\n");
    html.push_str("<body>\r\n");
    html.push_str("<h1>Autocrypt Setup Message</h1>\r\n");
    html.push_str(
        "<p>This is the Autocrypt Setup Message used to transfer your key between clients. \
         To decrypt and use your key, open the message in an Autocrypt-compliant client \
         and enter the setup code presented on the generating device.</p>\r\n",
    );
    html.push_str("<pre>\r\n");
    for line in armored.lines() {
        html.push_str(line);
        html.push_str("\r\n");
    }
    html.push_str("</pre>\r\n");
    html.push_str("</body>\r\n");
    html.push_str("</html>\r\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    fn fast_engine() -> CryptoEngine {
        CryptoEngine::with_config(CoreConfig {
            kdf_memory_kib: 64,
            kdf_iterations: 1,
            ..CoreConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_setup_code_format() {
        let code = generate_setup_code();
        let s = code.as_str();
        assert_eq!(s.len(), SETUP_CODE_LEN);
        assert_eq!(SETUP_CODE_LEN, 44);
        for (i, c) in s.chars().enumerate() {
            if i % 5 == 4 {
                assert_eq!(c, '-', "position {}", i);
            } else {
                assert!(c.is_ascii_digit(), "position {}", i);
            }
        }
        assert_eq!(code.hint(), &s[..2]);
    }

    #[test]
    fn test_normalize_setup_code() {
        assert_eq!(normalize_setup_code("123422343234423452346234723482349234"),
            "1234-2234-3234-4234-5234-6234-7234-8234-9234");
        assert_eq!(normalize_setup_code("  1234 5678\n-90"), "1234-5678-90");
        assert_eq!(normalize_setup_code("abc"), "");
        assert!(SetupCode::parse("1234-5678").is_err());
        assert!(SetupCode::parse("1234 2234 3234 4234 5234 6234 7234 8234 9234").is_ok());
    }

    #[test]
    fn test_export_import() {
        let engine = fast_engine();
        let identity = Identity::generate(&engine, "alice@example.org").unwrap();
        let code = generate_setup_code();

        let message = export_private_key(&engine, &identity, &code).unwrap();
        let block = armor::split(&message).unwrap();
        assert_eq!(block.header_line(), "-----BEGIN PGP MESSAGE-----");
        assert_eq!(block.field("passphrase-begin"), Some(code.hint()));
        assert_eq!(block.field("passphrase-format"), Some(PASSPHRASE_FORMAT));
        assert_eq!(setup_message_hint(&message).unwrap(), code.hint());

        let imported = import_private_key(&engine, &message, code.as_str()).unwrap();
        assert_eq!(imported.private_key, identity.private_key);
        assert_eq!(imported.public_key, identity.public_key);
        assert_eq!(imported.prefer_encrypt, PreferEncrypt::Mutual);
    }

    #[test]
    fn test_import_with_other_code_fails() {
        let engine = fast_engine();
        let identity = Identity::generate(&engine, "alice@example.org").unwrap();
        let code = SetupCode::parse("1111-2222-3333-4444-5555-6666-7777-8888-9999").unwrap();
        let message = export_private_key(&engine, &identity, &code).unwrap();

        // Same hint, different code: decryption fails.
        let result = import_private_key(&engine, &message, "1111-2222-3333-4444-5555-6666-7777-8888-9990");
        assert!(matches!(result, Err(AutocryptError::WrongSetupCode)));

        // Different hint: rejected before decryption.
        let result = import_private_key(&engine, &message, "2111-2222-3333-4444-5555-6666-7777-8888-9999");
        assert!(matches!(result, Err(AutocryptError::WrongSetupCode)));

        let result = import_private_key(&engine, &message, "1111");
        assert!(matches!(result, Err(AutocryptError::WrongSetupCode)));
    }

    #[test]
    fn test_missing_hint_rejected() {
        let engine = fast_engine();
        let message = armor::encode(b"whatever", ArmorType::Message);
        let result = import_private_key(&engine, &message, generate_setup_code().as_str());
        assert!(matches!(result, Err(AutocryptError::Framing(_))));
    }

    #[test]
    fn test_setup_file_is_importable() {
        let engine = fast_engine();
        let mut identity = Identity::generate(&engine, "alice@example.org").unwrap();
        identity.prefer_encrypt = PreferEncrypt::NoPreference;
        let code = generate_setup_code();

        let html = render_setup_file(&export_private_key(&engine, &identity, &code).unwrap());
        assert!(html.starts_with("<!DOCTYPE html>"));

        let block = armor::split(&html).unwrap();
        assert_eq!(block.header_line(), "-----BEGIN PGP MESSAGE-----");
        assert_eq!(block.field("Passphrase-Begin").map(str::len), Some(2));

        let imported = import_private_key(&engine, &html, code.as_str()).unwrap();
        assert_eq!(imported.private_key, identity.private_key);
        assert_eq!(imported.prefer_encrypt, PreferEncrypt::NoPreference);
    }
}
