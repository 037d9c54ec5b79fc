//! Autocrypt header codec.
//!
//! Wire form:
//!
//! ```text
//! addr=alice@example.org; prefer-encrypt=mutual; keydata= <base64>
//! ```
//!
//! Parsing fails closed: an attribute that is neither known nor marked
//! non-critical with a leading `_` invalidates the whole header.

use crate::config::DEFAULT_HEADER_LINE_WIDTH;
use crate::crypto::KeyBlob;
use crate::error::{AutocryptError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encryption preference announced by a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PreferEncrypt {
    /// No explicit preference
    #[default]
    NoPreference,
    /// The peer wants encryption whenever both sides agree
    Mutual,
}

impl PreferEncrypt {
    /// Maps any attribute value; everything except `mutual` means no preference
    pub fn from_attribute(value: &str) -> Self {
        if value == "mutual" {
            PreferEncrypt::Mutual
        } else {
            PreferEncrypt::NoPreference
        }
    }

    /// Attribute value as rendered, `None` when the attribute is omitted
    pub fn as_attribute(&self) -> Option<&'static str> {
        match self {
            PreferEncrypt::Mutual => Some("mutual"),
            PreferEncrypt::NoPreference => None,
        }
    }
}

/// A parsed Autocrypt header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocryptHeader {
    /// Declared sender address, trimmed
    pub address: String,
    /// Announced encryption preference
    pub prefer_encrypt: PreferEncrypt,
    /// Sender's public key
    pub public_key: KeyBlob,
}

impl AutocryptHeader {
    /// Creates a header for rendering
    pub fn new(address: impl Into<String>, prefer_encrypt: PreferEncrypt, public_key: KeyBlob) -> Self {
        Self {
            address: address.into(),
            prefer_encrypt,
            public_key,
        }
    }

    /// Parses a raw header value
    pub fn parse(raw: &str) -> Result<Self> {
        let mut address: Option<String> = None;
        let mut prefer_encrypt = PreferEncrypt::NoPreference;
        let mut keydata: Option<&str> = None;

        for attribute in raw.split(';') {
            let attribute = attribute.trim();
            if attribute.is_empty() {
                continue;
            }
            let (name, value) = match attribute.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => (attribute, ""),
            };

            if name.starts_with('_') {
                continue;
            }
            match name.to_ascii_lowercase().as_str() {
                "addr" => address = Some(value.to_string()),
                "prefer-encrypt" => prefer_encrypt = PreferEncrypt::from_attribute(value),
                "keydata" => keydata = Some(value),
                _ => {
                    return Err(AutocryptError::parse(format!(
                        "Unknown critical attribute '{}'",
                        name
                    )))
                }
            }
        }

        let address = address
            .filter(|addr| !addr.is_empty())
            .ok_or_else(|| AutocryptError::parse("Missing addr attribute"))?;
        let keydata = keydata.ok_or_else(|| AutocryptError::parse("Missing keydata attribute"))?;

        let stripped: String = keydata.chars().filter(|c| !c.is_whitespace()).collect();
        let key_bytes = STANDARD
            .decode(stripped.as_bytes())
            .map_err(|e| AutocryptError::parse(format!("Invalid keydata: {}", e)))?;
        if key_bytes.is_empty() {
            return Err(AutocryptError::parse("Empty keydata"));
        }

        Ok(Self {
            address,
            prefer_encrypt,
            public_key: KeyBlob::public(key_bytes),
        })
    }

    /// Renders with the default keydata line width
    pub fn render(&self) -> String {
        self.render_with_width(DEFAULT_HEADER_LINE_WIDTH)
    }

    /// Renders with a space inserted into the keydata every `width` characters
    pub fn render_with_width(&self, width: usize) -> String {
        let encoded = STANDARD.encode(self.public_key.as_bytes());
        let width = width.max(1);

        let mut rendered = format!("addr={}; ", self.address);
        if let Some(value) = self.prefer_encrypt.as_attribute() {
            rendered.push_str("prefer-encrypt=");
            rendered.push_str(value);
            rendered.push_str("; ");
        }
        rendered.push_str("keydata=");

        let mut rest = encoded.as_str();
        while !rest.is_empty() {
            let (chunk, tail) = rest.split_at(rest.len().min(width));
            rendered.push(' ');
            rendered.push_str(chunk);
            rest = tail;
        }
        rendered
    }

    /// Whether the header was issued for `address`, ignoring ASCII case
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.trim().eq_ignore_ascii_case(address.trim())
    }
}

impl FromStr for AutocryptHeader {
    type Err = AutocryptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AutocryptHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render_simple() {
        let header: AutocryptHeader = "addr=a@b.example.org; prefer-encrypt=mutual; keydata=RGVsdGEgQ2hhdA=="
            .parse()
            .unwrap();
        assert_eq!(header.address, "a@b.example.org");
        assert_eq!(header.prefer_encrypt, PreferEncrypt::Mutual);
        assert_eq!(header.public_key.as_bytes(), b"Delta Chat");
        assert_eq!(header.public_key.len(), 10);
        assert_eq!(
            header.render(),
            "addr=a@b.example.org; prefer-encrypt=mutual; keydata= RGVsdGEgQ2hhdA=="
        );
    }

    #[test]
    fn test_parse_tolerates_noise() {
        let header = AutocryptHeader::parse(
            " _foo; __FOO=BAR ;;; addr = a@b.example.org ;\r\n   prefer-encrypt = mutual ; keydata = RG VsdGEgQ\r\n2hhdA==",
        )
        .unwrap();
        assert_eq!(header.address, "a@b.example.org");
        assert_eq!(header.prefer_encrypt, PreferEncrypt::Mutual);
        assert_eq!(header.public_key.as_bytes(), b"Delta Chat");
    }

    #[test]
    fn test_nonstandard_prefer_encrypt() {
        let header = AutocryptHeader::parse(
            "addr=a@b.example.org; prefer-encrypt=ignoreUnknownValues; keydata=RGVsdGEgQ2hhdA==",
        )
        .unwrap();
        assert_eq!(header.prefer_encrypt, PreferEncrypt::NoPreference);

        let header =
            AutocryptHeader::parse("addr=a@b.example.org; keydata=RGVsdGEgQ2hhdA==").unwrap();
        assert_eq!(header.prefer_encrypt, PreferEncrypt::NoPreference);
        assert_eq!(
            header.render(),
            "addr=a@b.example.org; keydata= RGVsdGEgQ2hhdA=="
        );
    }

    #[test]
    fn test_parse_failures() {
        for raw in [
            "",
            ";",
            "foo",
            "\n\n\n",
            " ;;",
            "addr=a@t.de; unknwon=1; keydata=jau",
            "addr=; keydata=RGVsdGEgQ2hhdA==",
            "addr=a@t.de",
            "addr=a@t.de; keydata=",
            "addr=a@t.de; keydata=!!!!",
            "keydata=RGVsdGEgQ2hhdA==",
        ] {
            assert!(AutocryptHeader::parse(raw).is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_attribute_names_case_insensitive() {
        let header =
            AutocryptHeader::parse("ADDR=A@B.example.org; Prefer-Encrypt=mutual; KeyData=RGVsdGEgQ2hhdA==")
                .unwrap();
        assert_eq!(header.address, "A@B.example.org");
        assert_eq!(header.prefer_encrypt, PreferEncrypt::Mutual);
        assert!(header.matches_address("a@b.example.org"));
        assert!(!header.matches_address("c@b.example.org"));
    }

    #[test]
    fn test_render_breaks_long_keydata() {
        let header = AutocryptHeader::new(
            "a@b.example.org",
            PreferEncrypt::Mutual,
            KeyBlob::public(vec![0x5A; 200]),
        );
        let rendered = header.render_with_width(10);
        let keydata = rendered.split("keydata=").nth(1).unwrap();
        assert!(keydata.split(' ').skip(1).all(|chunk| chunk.len() <= 10));

        let reparsed = AutocryptHeader::parse(&rendered).unwrap();
        assert_eq!(reparsed, header);
    }
}
