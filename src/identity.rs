//! The local user's own Autocrypt identity.

use crate::crypto::{CryptoBackend, KeyBlob};
use crate::engine::CryptoEngine;
use crate::error::Result;
use crate::header::{AutocryptHeader, PreferEncrypt};
use crate::peerstate::normalize_address;
use std::fmt;

/// Own address, key pair and announced preference
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Normalized own address
    pub address: String,
    /// Own public key, announced in outgoing headers
    pub public_key: KeyBlob,
    /// Own private key
    pub private_key: KeyBlob,
    /// Preference announced in outgoing headers
    pub prefer_encrypt: PreferEncrypt,
}

impl Identity {
    /// Generates a fresh key pair for `address`
    pub fn generate<B: CryptoBackend>(engine: &CryptoEngine<B>, address: &str) -> Result<Self> {
        let address = normalize_address(address);
        let (public_key, private_key) = engine.create_keypair(&address)?;
        Ok(Self {
            address,
            public_key,
            private_key,
            prefer_encrypt: PreferEncrypt::Mutual,
        })
    }

    /// Rebuilds an identity from an imported private key
    pub fn from_private_key<B: CryptoBackend>(
        engine: &CryptoEngine<B>,
        address: &str,
        private_key: KeyBlob,
        prefer_encrypt: PreferEncrypt,
    ) -> Result<Self> {
        engine.validate_key(&private_key)?;
        let public_key = engine.split_key(&private_key)?;
        Ok(Self {
            address: normalize_address(address),
            public_key,
            private_key,
            prefer_encrypt,
        })
    }

    /// Header to attach to outgoing mail
    pub fn autocrypt_header(&self) -> AutocryptHeader {
        AutocryptHeader::new(
            self.address.clone(),
            self.prefer_encrypt,
            self.public_key.clone(),
        )
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("prefer_encrypt", &self.prefer_encrypt)
            .finish()
    }
}
