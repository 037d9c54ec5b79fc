//! Binary packet framing for keys and messages.
//!
//! Keys and ciphertexts are sequences of RFC 4880 new-format packets.
//! The packet kinds follow OpenPGP, the bodies carry post-quantum
//! algorithm identifiers and are therefore not interoperable with
//! classical OpenPGP implementations.

use crate::crypto::Algorithm;
use crate::error::{AutocryptError, Result};
use crate::validation::Validator;

/// Size of a key fingerprint (SHA3-256)
pub const FINGERPRINT_SIZE: usize = 32;

/// AES-GCM nonce size
pub const NONCE_SIZE: usize = 12;

/// Key packet version written and accepted
pub const KEY_PACKET_VERSION: u8 = 4;

/// Recipient packet version written and accepted
pub const RECIPIENT_PACKET_VERSION: u8 = 3;

/// Signature packet version written and accepted
pub const SIGNATURE_PACKET_VERSION: u8 = 4;

/// Encrypted data packet version written and accepted
pub const ENCRYPTED_DATA_VERSION: u8 = 1;

/// PGP packet types defined in RFC 4880
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Public-Key Encrypted Session Key Packet
    PublicKeyEncryptedSessionKey = 1,
    /// Signature Packet
    Signature = 2,
    /// Secret-Key Packet
    SecretKey = 5,
    /// Public-Key Packet
    PublicKey = 6,
    /// Secret-Subkey Packet
    SecretSubkey = 7,
    /// Literal Data Packet
    LiteralData = 11,
    /// User ID Packet
    UserId = 13,
    /// Public-Subkey Packet
    PublicSubkey = 14,
    /// Sym. Encrypted and Integrity Protected Data Packet
    SymEncryptedIntegrityProtectedData = 18,
}

impl PacketType {
    /// Convert packet type to byte value
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Convert byte value to packet type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::PublicKeyEncryptedSessionKey),
            2 => Some(Self::Signature),
            5 => Some(Self::SecretKey),
            6 => Some(Self::PublicKey),
            7 => Some(Self::SecretSubkey),
            11 => Some(Self::LiteralData),
            13 => Some(Self::UserId),
            14 => Some(Self::PublicSubkey),
            18 => Some(Self::SymEncryptedIntegrityProtectedData),
            _ => None,
        }
    }
}

/// New-format packet header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Packet type
    pub packet_type: PacketType,
    /// Packet body length
    pub length: usize,
}

/// A complete packet with header and body
#[derive(Debug, Clone)]
pub struct Packet {
    /// Packet header
    pub header: PacketHeader,
    /// Packet body data
    pub body: Vec<u8>,
}

impl PacketHeader {
    /// Create a new packet header
    pub fn new(packet_type: PacketType, length: usize) -> Self {
        Self {
            packet_type,
            length,
        }
    }

    /// Serialize packet header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6);
        bytes.push(0xC0 | self.packet_type.to_byte());

        if self.length < 192 {
            bytes.push(self.length as u8);
        } else if self.length < 8384 {
            let encoded = self.length - 192;
            bytes.push(192 + (encoded >> 8) as u8);
            bytes.push((encoded & 0xFF) as u8);
        } else {
            bytes.push(0xFF);
            bytes.extend_from_slice(&(self.length as u32).to_be_bytes());
        }

        bytes
    }

    /// Parse a packet header, returning it with the number of bytes consumed
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        let first_byte = *data
            .first()
            .ok_or_else(|| AutocryptError::validation("Empty packet header"))?;

        if (first_byte & 0x80) == 0 {
            return Err(AutocryptError::validation("Invalid packet header: MSB not set"));
        }
        if (first_byte & 0x40) == 0 {
            return Err(AutocryptError::validation("Old packet format not supported"));
        }

        let packet_type_byte = first_byte & 0x3F;
        let packet_type = PacketType::from_byte(packet_type_byte).ok_or_else(|| {
            AutocryptError::packet(format!("Unknown packet type: {}", packet_type_byte))
        })?;

        let length_octet = *data
            .get(1)
            .ok_or_else(|| AutocryptError::validation("Incomplete packet header"))?;

        let (length, length_bytes) = if length_octet < 192 {
            (length_octet as usize, 1)
        } else if length_octet < 224 {
            let second = *data
                .get(2)
                .ok_or_else(|| AutocryptError::validation("Incomplete two-byte length"))?;
            (((length_octet as usize - 192) << 8) + second as usize + 192, 2)
        } else if length_octet == 255 {
            let len = Validator::validate_u32_from_bytes(data, 2)? as usize;
            Validator::validate_packet_size(len)?;
            (len, 5)
        } else {
            return Err(AutocryptError::validation(
                "Partial body length not supported",
            ));
        };

        Ok((
            Self {
                packet_type,
                length,
            },
            1 + length_bytes,
        ))
    }
}

impl Packet {
    /// Create a new packet
    pub fn new(packet_type: PacketType, body: Vec<u8>) -> Self {
        let header = PacketHeader::new(packet_type, body.len());
        Self { header, body }
    }

    /// Returns the packet type
    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    /// Serialize packet to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header.to_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Parse one packet, returning it with the number of bytes consumed
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        let (header, header_len) = PacketHeader::from_bytes(data)?;
        let body = Validator::validate_slice_extraction(data, header_len, header.length)
            .map_err(|_| AutocryptError::packet("Incomplete packet body"))?
            .to_vec();
        let consumed = header_len + header.length;
        Ok((Self { header, body }, consumed))
    }
}

/// Parses a complete packet sequence; trailing garbage is an error.
pub fn parse_packets(data: &[u8]) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (packet, consumed) = Packet::from_bytes(&data[offset..])?;
        offset += consumed;
        packets.push(packet);
        Validator::validate_packet_count(packets.len())?;
    }

    Ok(packets)
}

/// Serializes a packet sequence.
pub fn write_packets(packets: &[Packet]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for packet in packets {
        bytes.extend_from_slice(&packet.to_bytes());
    }
    bytes
}

/// Reads an MPI-style field (16-bit bit count followed by the bytes).
fn read_mpi(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize)> {
    let bit_len = Validator::validate_u16_from_bytes(data, offset)? as usize;
    let byte_len = bit_len.div_ceil(8);
    let material = Validator::validate_slice_extraction(data, offset + 2, byte_len)?;
    Validator::validate_key_size(material)?;
    Ok((material.to_vec(), offset + 2 + byte_len))
}

fn write_mpi(bytes: &mut Vec<u8>, material: &[u8]) {
    bytes.extend_from_slice(&((material.len() * 8) as u16).to_be_bytes());
    bytes.extend_from_slice(material);
}

/// Reads a field prefixed with a 16-bit byte count.
fn read_sized(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize)> {
    let len = Validator::validate_u16_from_bytes(data, offset)? as usize;
    let field = Validator::validate_slice_extraction(data, offset + 2, len)?.to_vec();
    Ok((field, offset + 2 + len))
}

fn write_sized(bytes: &mut Vec<u8>, field: &[u8]) {
    bytes.extend_from_slice(&(field.len() as u16).to_be_bytes());
    bytes.extend_from_slice(field);
}

fn read_fingerprint(data: &[u8], offset: usize) -> Result<[u8; FINGERPRINT_SIZE]> {
    let slice = Validator::validate_slice_extraction(data, offset, FINGERPRINT_SIZE)?;
    let mut fingerprint = [0u8; FINGERPRINT_SIZE];
    fingerprint.copy_from_slice(slice);
    Ok(fingerprint)
}

fn read_nonce(data: &[u8], offset: usize) -> Result<[u8; NONCE_SIZE]> {
    let slice = Validator::validate_slice_extraction(data, offset, NONCE_SIZE)?;
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(slice);
    Ok(nonce)
}

fn read_algorithm(data: &[u8], offset: usize) -> Result<Algorithm> {
    let byte = *data
        .get(offset)
        .ok_or_else(|| AutocryptError::validation("Missing algorithm identifier"))?;
    Algorithm::from_byte(byte)
        .ok_or_else(|| AutocryptError::validation(format!("Unsupported algorithm ID: {}", byte)))
}

fn ensure_consumed(data: &[u8], offset: usize, what: &str) -> Result<()> {
    if offset != data.len() {
        return Err(AutocryptError::validation(format!(
            "{} packet has {} trailing bytes",
            what,
            data.len().saturating_sub(offset)
        )));
    }
    Ok(())
}

/// Public key (or public subkey) packet body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyPacket {
    /// Version (always 4)
    pub version: u8,
    /// Key creation time (Unix timestamp)
    pub created: u32,
    /// Public key algorithm
    pub algorithm: Algorithm,
    /// Public key material
    pub key_material: Vec<u8>,
}

impl PublicKeyPacket {
    /// Create a new version 4 public key packet
    pub fn new(created: u32, algorithm: Algorithm, key_material: Vec<u8>) -> Self {
        Self {
            version: KEY_PACKET_VERSION,
            created,
            algorithm,
            key_material,
        }
    }

    /// Serialize to packet body bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.key_material.len());
        bytes.push(self.version);
        bytes.extend_from_slice(&self.created.to_be_bytes());
        bytes.push(self.algorithm as u8);
        write_mpi(&mut bytes, &self.key_material);
        bytes
    }

    /// Parse from packet body bytes; the body must be consumed exactly
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(AutocryptError::validation("Public key packet too short"));
        }

        let version = data[0];
        if version != KEY_PACKET_VERSION {
            return Err(AutocryptError::validation(format!(
                "Unsupported key version: {}",
                version
            )));
        }

        let created = Validator::validate_u32_from_bytes(data, 1)?;
        let algorithm = read_algorithm(data, 5)?;
        let (key_material, offset) = read_mpi(data, 6)?;
        ensure_consumed(data, offset, "Public key")?;

        Ok(Self {
            version,
            created,
            algorithm,
            key_material,
        })
    }
}

/// Secret key (or secret subkey) packet body
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKeyPacket {
    /// The public part of the key
    pub public: PublicKeyPacket,
    /// String-to-key usage (0 = unencrypted, the only value written)
    pub s2k_usage: u8,
    /// Secret key material
    pub secret_key_material: Vec<u8>,
    /// Checksum of secret key material
    pub checksum: u16,
}

impl std::fmt::Debug for SecretKeyPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKeyPacket")
            .field("public", &self.public)
            .field("secret_key_material", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SecretKeyPacket {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.secret_key_material.zeroize();
    }
}

/// RFC 4880 two-octet checksum: sum of all octets mod 65536
pub fn secret_checksum(material: &[u8]) -> u16 {
    material
        .iter()
        .fold(0u16, |acc, &byte| acc.wrapping_add(byte as u16))
}

impl SecretKeyPacket {
    /// Create a new unencrypted secret key packet
    pub fn new(public: PublicKeyPacket, secret_key_material: Vec<u8>) -> Self {
        let checksum = secret_checksum(&secret_key_material);
        Self {
            public,
            s2k_usage: 0,
            secret_key_material,
            checksum,
        }
    }

    /// Serialize to packet body bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.public.to_bytes();
        bytes.push(self.s2k_usage);
        write_mpi(&mut bytes, &self.secret_key_material);
        bytes.extend_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    /// Parse from packet body bytes, verifying the checksum
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(AutocryptError::validation("Secret key packet too short"));
        }

        let version = data[0];
        if version != KEY_PACKET_VERSION {
            return Err(AutocryptError::validation(format!(
                "Unsupported key version: {}",
                version
            )));
        }
        let created = Validator::validate_u32_from_bytes(data, 1)?;
        let algorithm = read_algorithm(data, 5)?;
        let (key_material, offset) = read_mpi(data, 6)?;

        let s2k_usage = *data
            .get(offset)
            .ok_or_else(|| AutocryptError::validation("Missing string-to-key usage"))?;
        if s2k_usage != 0 {
            return Err(AutocryptError::validation(
                "Passphrase-protected secret key packets are not supported",
            ));
        }

        let (secret_key_material, offset) = read_mpi(data, offset + 1)?;
        let checksum = Validator::validate_u16_from_bytes(data, offset)?;
        ensure_consumed(data, offset + 2, "Secret key")?;

        if checksum != secret_checksum(&secret_key_material) {
            return Err(AutocryptError::validation("Secret key checksum mismatch"));
        }

        Ok(Self {
            public: PublicKeyPacket {
                version,
                created,
                algorithm,
                key_material,
            },
            s2k_usage,
            secret_key_material,
            checksum,
        })
    }
}

/// User ID packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdPacket {
    /// User ID string (the identity's email address)
    pub user_id: String,
}

impl UserIdPacket {
    /// Create a new User ID packet
    pub fn new(user_id: String) -> Self {
        Self { user_id }
    }

    /// Serialize to packet body bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.user_id.as_bytes().to_vec()
    }

    /// Parse from packet body bytes with validation
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(AutocryptError::validation("Empty User ID packet"));
        }

        let user_id = String::from_utf8(data.to_vec())
            .map_err(|_| AutocryptError::validation("Invalid UTF-8 in User ID"))?;
        Validator::validate_user_id(&user_id)?;

        Ok(Self { user_id })
    }
}

/// Per-recipient session key packet: the session key wrapped under a
/// KEM shared secret for one encryption subkey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientPacket {
    /// Fingerprint of the recipient's encryption subkey
    pub recipient: [u8; FINGERPRINT_SIZE],
    /// Key encapsulation algorithm
    pub algorithm: Algorithm,
    /// KEM ciphertext
    pub kem_ciphertext: Vec<u8>,
    /// Nonce used to wrap the session key
    pub nonce: [u8; NONCE_SIZE],
    /// Wrapped session key including the authentication tag
    pub wrapped_key: Vec<u8>,
}

impl RecipientPacket {
    /// Serialize to packet body bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            2 + FINGERPRINT_SIZE + 4 + self.kem_ciphertext.len() + NONCE_SIZE + self.wrapped_key.len(),
        );
        bytes.push(RECIPIENT_PACKET_VERSION);
        bytes.extend_from_slice(&self.recipient);
        bytes.push(self.algorithm as u8);
        write_sized(&mut bytes, &self.kem_ciphertext);
        bytes.extend_from_slice(&self.nonce);
        write_sized(&mut bytes, &self.wrapped_key);
        bytes
    }

    /// Parse from packet body bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let version = *data
            .first()
            .ok_or_else(|| AutocryptError::validation("Empty recipient packet"))?;
        if version != RECIPIENT_PACKET_VERSION {
            return Err(AutocryptError::validation(format!(
                "Unsupported recipient packet version: {}",
                version
            )));
        }

        let recipient = read_fingerprint(data, 1)?;
        let algorithm = read_algorithm(data, 1 + FINGERPRINT_SIZE)?;
        let (kem_ciphertext, offset) = read_sized(data, 2 + FINGERPRINT_SIZE)?;
        let nonce = read_nonce(data, offset)?;
        let (wrapped_key, offset) = read_sized(data, offset + NONCE_SIZE)?;
        ensure_consumed(data, offset, "Recipient")?;

        Ok(Self {
            recipient,
            algorithm,
            kem_ciphertext,
            nonce,
            wrapped_key,
        })
    }
}

/// Signature packet over the literal data of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePacket {
    /// Signature type (0x00 = binary document)
    pub signature_type: u8,
    /// Public key algorithm used for the signature
    pub public_key_algorithm: Algorithm,
    /// Hash algorithm used
    pub hash_algorithm: Algorithm,
    /// Fingerprint of the signing primary key
    pub issuer: [u8; FINGERPRINT_SIZE],
    /// Signature creation time
    pub created: u32,
    /// Signature material
    pub signature_material: Vec<u8>,
}

impl SignaturePacket {
    /// Serialize to packet body bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(10 + FINGERPRINT_SIZE + self.signature_material.len());
        bytes.push(SIGNATURE_PACKET_VERSION);
        bytes.push(self.signature_type);
        bytes.push(self.public_key_algorithm as u8);
        bytes.push(self.hash_algorithm as u8);
        bytes.extend_from_slice(&self.issuer);
        bytes.extend_from_slice(&self.created.to_be_bytes());
        write_sized(&mut bytes, &self.signature_material);
        bytes
    }

    /// Parse from packet body bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let version = *data
            .first()
            .ok_or_else(|| AutocryptError::validation("Empty signature packet"))?;
        if version != SIGNATURE_PACKET_VERSION {
            return Err(AutocryptError::validation(format!(
                "Unsupported signature version: {}",
                version
            )));
        }

        let signature_type = *data
            .get(1)
            .ok_or_else(|| AutocryptError::validation("Missing signature type"))?;
        let public_key_algorithm = read_algorithm(data, 2)?;
        let hash_algorithm = read_algorithm(data, 3)?;
        let issuer = read_fingerprint(data, 4)?;
        let created = Validator::validate_u32_from_bytes(data, 4 + FINGERPRINT_SIZE)?;
        let (signature_material, offset) = read_sized(data, 8 + FINGERPRINT_SIZE)?;
        ensure_consumed(data, offset, "Signature")?;

        Ok(Self {
            signature_type,
            public_key_algorithm,
            hash_algorithm,
            issuer,
            created,
            signature_material,
        })
    }
}

/// Literal data packet carrying the plaintext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralDataPacket {
    /// Modification date of the content
    pub date: u32,
    /// The plaintext
    pub data: Vec<u8>,
}

impl LiteralDataPacket {
    /// Serialize to packet body bytes (binary format, empty file name)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.data.len());
        bytes.push(b'b');
        bytes.push(0);
        bytes.extend_from_slice(&self.date.to_be_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// Parse from packet body bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let format = *data
            .first()
            .ok_or_else(|| AutocryptError::validation("Empty literal data packet"))?;
        if !matches!(format, b'b' | b't' | b'u') {
            return Err(AutocryptError::validation(format!(
                "Unknown literal data format: {}",
                format
            )));
        }
        let name_len = *data
            .get(1)
            .ok_or_else(|| AutocryptError::validation("Missing file name length"))?
            as usize;
        let date = Validator::validate_u32_from_bytes(data, 2 + name_len)?;
        let content_start = 6 + name_len;

        Ok(Self {
            date,
            data: data[content_start..].to_vec(),
        })
    }
}

/// Integrity-protected encrypted data packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDataPacket {
    /// Symmetric algorithm
    pub algorithm: Algorithm,
    /// AEAD nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including the authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedDataPacket {
    /// Serialize to packet body bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + NONCE_SIZE + self.ciphertext.len());
        bytes.push(ENCRYPTED_DATA_VERSION);
        bytes.push(self.algorithm as u8);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse from packet body bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let version = *data
            .first()
            .ok_or_else(|| AutocryptError::validation("Empty encrypted data packet"))?;
        if version != ENCRYPTED_DATA_VERSION {
            return Err(AutocryptError::validation(format!(
                "Unsupported encrypted data version: {}",
                version
            )));
        }
        let algorithm = read_algorithm(data, 1)?;
        let nonce = read_nonce(data, 2)?;

        Ok(Self {
            algorithm,
            nonce,
            ciphertext: data[2 + NONCE_SIZE..].to_vec(),
        })
    }
}
