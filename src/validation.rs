//! Input validation and size limits.
//!
//! Everything in this crate that reads attacker-controlled bytes (key
//! data from headers, received ciphertext, setup messages) goes through
//! these bounds-checked readers instead of indexing slices directly.

use crate::error::{AutocryptError, Result};

/// Maximum allowed plaintext size (100MB)
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Maximum allowed encrypted message size (armored, so a third larger plus overhead)
pub const MAX_ENCRYPTED_SIZE: usize = 140 * 1024 * 1024;

/// Maximum allowed key material inside a single key packet (10KB)
pub const MAX_KEY_SIZE: usize = 10 * 1024;

/// Maximum allowed size of a complete key blob (32KB)
pub const MAX_KEY_BLOB_SIZE: usize = 32 * 1024;

/// Maximum allowed packet size (110MB, literal data of a maximal message)
pub const MAX_PACKET_SIZE: usize = 110 * 1024 * 1024;

/// Maximum allowed User ID length (1KB)
pub const MAX_USER_ID_LENGTH: usize = 1024;

/// Maximum allowed number of packets in a message
pub const MAX_PACKETS_PER_MESSAGE: usize = 1000;

/// Maximum allowed number of recipients of one message
pub const MAX_RECIPIENTS: usize = 500;

/// Validation functions for input data
pub struct Validator;

impl Validator {
    /// Validate plaintext size against a configured limit
    pub fn validate_message_size(data: &[u8], limit: usize) -> Result<()> {
        if data.len() > limit {
            return Err(AutocryptError::validation(format!(
                "Message too large: {} bytes exceeds maximum of {} bytes",
                data.len(),
                limit
            )));
        }
        Ok(())
    }

    /// Validate encrypted message size
    pub fn validate_encrypted_size(data: &[u8]) -> Result<()> {
        if data.len() > MAX_ENCRYPTED_SIZE {
            return Err(AutocryptError::validation(format!(
                "Encrypted message too large: {} bytes exceeds maximum of {} bytes",
                data.len(),
                MAX_ENCRYPTED_SIZE
            )));
        }
        Ok(())
    }

    /// Validate key material size
    pub fn validate_key_size(data: &[u8]) -> Result<()> {
        if data.len() > MAX_KEY_SIZE {
            return Err(AutocryptError::validation(format!(
                "Key material too large: {} bytes exceeds maximum of {} bytes",
                data.len(),
                MAX_KEY_SIZE
            )));
        }
        Ok(())
    }

    /// Validate the size of a whole key blob
    pub fn validate_key_blob_size(data: &[u8]) -> Result<()> {
        if data.len() > MAX_KEY_BLOB_SIZE {
            return Err(AutocryptError::validation(format!(
                "Key blob too large: {} bytes exceeds maximum of {} bytes",
                data.len(),
                MAX_KEY_BLOB_SIZE
            )));
        }
        Ok(())
    }

    /// Validate packet size
    pub fn validate_packet_size(size: usize) -> Result<()> {
        if size > MAX_PACKET_SIZE {
            return Err(AutocryptError::validation(format!(
                "Packet too large: {} bytes exceeds maximum of {} bytes",
                size, MAX_PACKET_SIZE
            )));
        }
        Ok(())
    }

    /// Validate User ID string
    pub fn validate_user_id(user_id: &str) -> Result<()> {
        if user_id.len() > MAX_USER_ID_LENGTH {
            return Err(AutocryptError::validation(format!(
                "User ID too long: {} bytes exceeds maximum of {} bytes",
                user_id.len(),
                MAX_USER_ID_LENGTH
            )));
        }

        if user_id.contains('\0') {
            return Err(AutocryptError::validation("User ID contains null bytes"));
        }

        if user_id.chars().any(|c| c.is_control()) {
            return Err(AutocryptError::validation(
                "User ID contains invalid control characters",
            ));
        }

        if user_id.trim().is_empty() {
            return Err(AutocryptError::validation("User ID cannot be empty"));
        }

        Ok(())
    }

    /// Validate packet count in a message
    pub fn validate_packet_count(count: usize) -> Result<()> {
        if count > MAX_PACKETS_PER_MESSAGE {
            return Err(AutocryptError::validation(format!(
                "Too many packets: {} exceeds maximum of {}",
                count, MAX_PACKETS_PER_MESSAGE
            )));
        }
        Ok(())
    }

    /// Validate recipient count of an outgoing message
    pub fn validate_recipient_count(count: usize) -> Result<()> {
        if count == 0 {
            return Err(AutocryptError::validation("No recipients given"));
        }
        if count > MAX_RECIPIENTS {
            return Err(AutocryptError::validation(format!(
                "Too many recipients: {} exceeds maximum of {}",
                count, MAX_RECIPIENTS
            )));
        }
        Ok(())
    }

    /// Read a big-endian u32 with bounds checking
    pub fn validate_u32_from_bytes(data: &[u8], offset: usize) -> Result<u32> {
        let bytes = Self::validate_slice_extraction(data, offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a big-endian u16 with bounds checking
    pub fn validate_u16_from_bytes(data: &[u8], offset: usize) -> Result<u16> {
        let bytes = Self::validate_slice_extraction(data, offset, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Validate slice extraction with bounds checking
    pub fn validate_slice_extraction(data: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(length)
            .ok_or_else(|| AutocryptError::validation("Slice bounds overflow"))?;
        data.get(offset..end).ok_or_else(|| {
            AutocryptError::validation(format!(
                "Slice out of bounds: trying to extract {} bytes at offset {} from {} byte array",
                length,
                offset,
                data.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_size_validation() {
        let small_message = vec![0u8; 1000];
        assert!(Validator::validate_message_size(&small_message, MAX_MESSAGE_SIZE).is_ok());
        assert!(Validator::validate_message_size(&small_message, 999).is_err());
    }

    #[test]
    fn test_user_id_validation() {
        assert!(Validator::validate_user_id("alice@example.org").is_ok());

        assert!(Validator::validate_user_id("").is_err());
        assert!(Validator::validate_user_id("   ").is_err());
        assert!(Validator::validate_user_id("alice\0@example.org").is_err());
        assert!(Validator::validate_user_id("alice\n@example.org").is_err());

        let long_user_id = "A".repeat(MAX_USER_ID_LENGTH + 1);
        assert!(Validator::validate_user_id(&long_user_id).is_err());
    }

    #[test]
    fn test_bounds_checking() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];

        assert_eq!(
            Validator::validate_u32_from_bytes(&data, 0).unwrap(),
            0x01020304
        );
        assert_eq!(Validator::validate_u16_from_bytes(&data, 6).unwrap(), 0x0708);
        assert_eq!(
            Validator::validate_slice_extraction(&data, 2, 3).unwrap(),
            &[3, 4, 5]
        );

        assert!(Validator::validate_u32_from_bytes(&data, 6).is_err());
        assert!(Validator::validate_u16_from_bytes(&data, 8).is_err());
        assert!(Validator::validate_slice_extraction(&data, 5, 5).is_err());
        assert!(Validator::validate_slice_extraction(&data, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_key_size_validation() {
        assert!(Validator::validate_key_size(&vec![0u8; MAX_KEY_SIZE]).is_ok());
        assert!(Validator::validate_key_size(&vec![0u8; MAX_KEY_SIZE + 1]).is_err());
    }

    #[test]
    fn test_recipient_count() {
        assert!(Validator::validate_recipient_count(0).is_err());
        assert!(Validator::validate_recipient_count(2).is_ok());
        assert!(Validator::validate_recipient_count(MAX_RECIPIENTS + 1).is_err());
    }
}
