//! Runtime configuration for the Autocrypt core.
//!
//! Defaults are usable as-is; deployments can override them through
//! `PQAUTOCRYPT_*` environment variables.

use crate::error::{AutocryptError, Result};
use crate::validation::MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Argon2id memory cost in KiB (19 MiB)
pub const DEFAULT_KDF_MEMORY_KIB: u32 = 19 * 1024;

/// Argon2id iteration count
pub const DEFAULT_KDF_ITERATIONS: u32 = 2;

/// Argon2id lane count
pub const DEFAULT_KDF_PARALLELISM: u32 = 1;

/// Column at which rendered keydata gets a folding space
pub const DEFAULT_HEADER_LINE_WIDTH: usize = 78;

/// Tunables shared by the crypto engine, header codec and setup transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Argon2id memory cost used to protect setup messages
    pub kdf_memory_kib: u32,
    /// Argon2id iterations used to protect setup messages
    pub kdf_iterations: u32,
    /// Argon2id parallelism used to protect setup messages
    pub kdf_parallelism: u32,
    /// Largest plaintext accepted for encryption
    pub max_message_size: usize,
    /// Base64 column width of the rendered `keydata` attribute
    pub header_line_width: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kdf_memory_kib: DEFAULT_KDF_MEMORY_KIB,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            kdf_parallelism: DEFAULT_KDF_PARALLELISM,
            max_message_size: MAX_MESSAGE_SIZE,
            header_line_width: DEFAULT_HEADER_LINE_WIDTH,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl CoreConfig {
    /// Builds a configuration from `PQAUTOCRYPT_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            kdf_memory_kib: env_or("PQAUTOCRYPT_KDF_MEMORY_KIB", defaults.kdf_memory_kib),
            kdf_iterations: env_or("PQAUTOCRYPT_KDF_ITERATIONS", defaults.kdf_iterations),
            kdf_parallelism: env_or("PQAUTOCRYPT_KDF_PARALLELISM", defaults.kdf_parallelism),
            max_message_size: env_or("PQAUTOCRYPT_MAX_MESSAGE_SIZE", defaults.max_message_size),
            header_line_width: env_or(
                "PQAUTOCRYPT_HEADER_LINE_WIDTH",
                defaults.header_line_width,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the primitives cannot work with.
    pub fn validate(&self) -> Result<()> {
        // Argon2 requires at least 8 KiB per lane.
        if self.kdf_parallelism == 0 || self.kdf_memory_kib < 8 * self.kdf_parallelism {
            return Err(AutocryptError::config(format!(
                "KDF memory {} KiB is too small for {} lanes",
                self.kdf_memory_kib, self.kdf_parallelism
            )));
        }
        if self.kdf_iterations == 0 {
            return Err(AutocryptError::config("KDF iterations must be positive"));
        }
        if self.max_message_size == 0 || self.max_message_size > MAX_MESSAGE_SIZE {
            return Err(AutocryptError::config(format!(
                "max_message_size must be between 1 and {}",
                MAX_MESSAGE_SIZE
            )));
        }
        if self.header_line_width < 4 {
            return Err(AutocryptError::config(
                "header_line_width must be at least 4",
            ));
        }
        Ok(())
    }
}
