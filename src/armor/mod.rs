//! ASCII armor framing.
//!
//! Encoding follows RFC 4880: a begin line, `Name: value` fields, a
//! blank line, 64-column base64, an `=XXXX` CRC-24 line and an end line.
//!
//! Splitting is deliberately lenient because the input comes from mail
//! bodies and attachments of varying quality. [`split`] accepts leading
//! and trailing garbage, CRLF line endings, indented lines and blank
//! lines inside the payload. It rejects a begin marker that does not
//! start its own line.

use crate::error::{AutocryptError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// CRC-24 polynomial used for PGP armor checksums
const CRC24_POLY: u32 = 0x1864CFB;
const CRC24_INIT: u32 = 0xB704CE;

const BEGIN_PREFIX: &str = "-----BEGIN ";
const END_PREFIX: &str = "-----END ";
const MARKER_SUFFIX: &str = "-----";

/// Width of armored base64 lines
const LINE_WIDTH: usize = 64;

/// Armor block labels used by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorType {
    /// Encrypted message or setup message
    Message,
    /// Private key block
    PrivateKey,
}

impl ArmorType {
    /// The label between `-----BEGIN ` and `-----`
    pub fn label(&self) -> &'static str {
        match self {
            ArmorType::Message => "PGP MESSAGE",
            ArmorType::PrivateKey => "PGP PRIVATE KEY BLOCK",
        }
    }

    /// Parses a block label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "PGP MESSAGE" => Some(ArmorType::Message),
            "PGP PRIVATE KEY BLOCK" => Some(ArmorType::PrivateKey),
            _ => None,
        }
    }

    /// The complete begin line
    pub fn begin_line(&self) -> String {
        format!("{}{}{}", BEGIN_PREFIX, self.label(), MARKER_SUFFIX)
    }
}

/// Calculate CRC-24 checksum used in PGP armor
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;

    for &byte in data {
        crc ^= (byte as u32) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if (crc & 0x1000000) != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }

    crc & 0xFFFFFF
}

fn checksum_line(data: &[u8]) -> String {
    let crc = crc24(data);
    let bytes = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];
    format!("={}", STANDARD.encode(bytes))
}

/// Encode binary data as an armored block
pub fn encode(data: &[u8], armor_type: ArmorType) -> String {
    encode_with_headers(data, armor_type, &[])
}

/// Encode binary data as an armored block with ordered `Name: value` fields
pub fn encode_with_headers(data: &[u8], armor_type: ArmorType, headers: &[(&str, &str)]) -> String {
    let encoded = STANDARD.encode(data);
    let mut output = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH + 128);

    output.push_str(&armor_type.begin_line());
    output.push('\n');
    for (name, value) in headers {
        output.push_str(name);
        output.push_str(": ");
        output.push_str(value);
        output.push('\n');
    }
    output.push('\n');

    // base64 output is ASCII, so byte offsets are char boundaries.
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(LINE_WIDTH));
        output.push_str(line);
        output.push('\n');
        rest = tail;
    }

    output.push_str(&checksum_line(data));
    output.push('\n');
    output.push_str(END_PREFIX);
    output.push_str(armor_type.label());
    output.push_str(MARKER_SUFFIX);
    output.push('\n');
    output
}

/// One armored block as found in free-form text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmoredBlock {
    header_line: String,
    label: String,
    fields: Vec<(String, String)>,
    payload: String,
}

impl ArmoredBlock {
    /// The trimmed begin line, e.g. `-----BEGIN PGP MESSAGE-----`
    pub fn header_line(&self) -> &str {
        &self.header_line
    }

    /// The label inside the begin line
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The block's armor type, if it is one this crate produces
    pub fn armor_type(&self) -> Option<ArmorType> {
        ArmorType::from_label(&self.label)
    }

    /// Looks up an optional field, ignoring case
    pub fn field(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All optional fields in order, names lowercased
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Payload lines, trimmed and joined with `\n`
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Base64-decodes the payload, verifying a trailing CRC-24 line if present
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        let mut lines: Vec<&str> = self.payload.lines().collect();
        let checksum = match lines.last() {
            Some(last) if last.starts_with('=') && last.len() == 5 => {
                let line = last[1..].to_string();
                lines.pop();
                Some(line)
            }
            _ => None,
        };

        let body: String = lines.concat();
        let data = STANDARD
            .decode(body.as_bytes())
            .map_err(|e| AutocryptError::framing(format!("Invalid base64 payload: {}", e)))?;

        if let Some(checksum) = checksum {
            let expected = STANDARD
                .decode(checksum.as_bytes())
                .map_err(|_| AutocryptError::framing("Invalid armor checksum encoding"))?;
            let [a, b, c] = expected.as_slice() else {
                return Err(AutocryptError::framing("Invalid armor checksum length"));
            };
            let expected = ((*a as u32) << 16) | ((*b as u32) << 8) | (*c as u32);
            let actual = crc24(&data);
            if expected != actual {
                return Err(AutocryptError::framing(format!(
                    "Checksum mismatch: expected {:06X}, got {:06X}",
                    expected, actual
                )));
            }
        }

        Ok(data)
    }
}

/// Splits the first armored block out of `raw`. The end marker is required.
pub fn split(raw: &str) -> Result<ArmoredBlock> {
    scan(raw, true)
}

/// Reads the begin line and optional fields only. No end marker is needed
/// and the returned payload is empty.
pub fn split_headers(raw: &str) -> Result<ArmoredBlock> {
    scan(raw, false)
}

fn parse_begin_line(line: &str) -> Option<&str> {
    line.strip_prefix(BEGIN_PREFIX)?.strip_suffix(MARKER_SUFFIX)
}

fn scan(raw: &str, want_payload: bool) -> Result<ArmoredBlock> {
    let mut lines = raw.split('\n').map(str::trim);

    let (header_line, label) = lines
        .by_ref()
        .find_map(|line| parse_begin_line(line).map(|label| (line.to_string(), label.to_string())))
        .ok_or_else(|| AutocryptError::framing("No armor begin marker found"))?;

    let end_marker = format!("{}{}{}", END_PREFIX, label, MARKER_SUFFIX);
    let mut fields = Vec::new();
    let mut payload_lines = Vec::new();
    let mut in_fields = true;
    let mut found_end = false;

    for line in lines {
        if in_fields {
            if line.is_empty() {
                in_fields = false;
                if !want_payload {
                    break;
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                if !line.contains(END_PREFIX) {
                    fields.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
                    continue;
                }
            }
            in_fields = false;
            if !want_payload {
                break;
            }
        }

        if let Some(pos) = line.find(&end_marker) {
            let before = line[..pos].trim();
            if !before.is_empty() {
                payload_lines.push(before);
            }
            found_end = true;
            break;
        }
        if !line.is_empty() {
            payload_lines.push(line);
        }
    }

    if want_payload && !found_end {
        return Err(AutocryptError::framing(format!(
            "No '{}' marker after the begin marker",
            end_marker
        )));
    }

    Ok(ArmoredBlock {
        header_line,
        label,
        fields,
        payload: if want_payload {
            payload_lines.join("\n")
        } else {
            String::new()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc24_calculation() {
        assert_eq!(crc24(b""), CRC24_INIT);
        // Known test vector
        assert_eq!(crc24(b"123456789"), 0x21CF02);
    }

    #[test]
    fn test_split_with_empty_field() {
        let block =
            split("-----BEGIN PGP MESSAGE-----\nNoVal:\n\ndata\n-----END PGP MESSAGE-----").unwrap();
        assert_eq!(block.header_line(), "-----BEGIN PGP MESSAGE-----");
        assert_eq!(block.payload(), "data");
        assert_eq!(block.field("noval"), Some(""));
        assert_eq!(block.fields().len(), 1);
    }

    #[test]
    fn test_split_tolerates_garbage_and_indentation() {
        let block = split(
            "foo \n -----BEGIN PGP MESSAGE----- \n base64-123 \n  -----END PGP MESSAGE-----",
        )
        .unwrap();
        assert_eq!(block.header_line(), "-----BEGIN PGP MESSAGE-----");
        assert_eq!(block.field("passphrase-begin"), None);
        assert_eq!(block.payload(), "base64-123");
    }

    #[test]
    fn test_split_rejects_glued_begin_marker() {
        assert!(split("foo-----BEGIN PGP MESSAGE-----").is_err());
        assert!(split_headers("foo-----BEGIN PGP MESSAGE-----").is_err());
        assert!(split("no armor here").is_err());
    }

    #[test]
    fn test_split_fields_are_case_insensitive() {
        let raw = "foo \n -----BEGIN PGP MESSAGE-----\n  Passphrase-BeGIN  :  23 \n  \n base64-567 \r\n abc \n  -----END PGP MESSAGE-----\n\n\n";
        let block = split(raw).unwrap();
        assert_eq!(block.header_line(), "-----BEGIN PGP MESSAGE-----");
        assert_eq!(block.field("Passphrase-Begin"), Some("23"));
        assert_eq!(block.payload(), "base64-567\nabc");
    }

    #[test]
    fn test_split_requires_end_marker() {
        let raw = "-----BEGIN PGP MESSAGE-----\nPassphrase-Begin: 12\n\nAAAA\n";
        assert!(split(raw).is_err());

        let headers = split_headers(raw).unwrap();
        assert_eq!(headers.field("passphrase-begin"), Some("12"));
        assert_eq!(headers.payload(), "");
    }

    #[test]
    fn test_blank_lines_inside_payload() {
        let block = split("-----BEGIN PGP MESSAGE-----\r\n\r\nAB\r\n\r\nCD\r\n\r\n-----END PGP MESSAGE-----\r\n")
            .unwrap();
        assert_eq!(block.payload(), "AB\nCD");
    }

    #[test]
    fn test_encode_then_split() {
        let data: Vec<u8> = (0..200u16).map(|i| (i * 7) as u8).collect();
        let armored = encode_with_headers(
            &data,
            ArmorType::Message,
            &[("Passphrase-Format", "numeric9x4"), ("Passphrase-Begin", "12")],
        );

        assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----\n"));
        assert!(armored.lines().all(|line| line.len() <= LINE_WIDTH + 1 || line.starts_with("-----")));

        let block = split(&armored).unwrap();
        assert_eq!(block.armor_type(), Some(ArmorType::Message));
        assert_eq!(block.field("passphrase-format"), Some("numeric9x4"));
        assert_eq!(block.decode_payload().unwrap(), data);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let armored = encode(b"hello armor", ArmorType::Message);
        let tampered = armored.replacen("aGVsbG8", "aGVsbG9", 1);
        assert_ne!(armored, tampered);

        let block = split(&tampered).unwrap();
        assert!(block.decode_payload().is_err());
    }

    #[test]
    fn test_payload_without_checksum() {
        let block = split("-----BEGIN PGP MESSAGE-----\n\naGVs\nbG8=\n-----END PGP MESSAGE-----").unwrap();
        assert_eq!(block.decode_payload().unwrap(), b"hello");
    }
}
