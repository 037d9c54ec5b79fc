//! Per-operation keyring.
//!
//! A keyring is an ordered set of key blobs built fresh for one encrypt
//! or decrypt call. It performs no cryptographic validation itself.

use crate::crypto::{CryptoBackend, Fingerprint, KeyBlob};

/// Ordered, duplicate-free collection of keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyring {
    keys: Vec<KeyBlob>,
}

impl Keyring {
    /// Creates an empty keyring
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key` unless a key with identical bytes is already present.
    ///
    /// Returns whether the key was inserted.
    pub fn add(&mut self, key: KeyBlob) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if the keyring holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether a key with identical bytes is present
    pub fn contains(&self, key: &KeyBlob) -> bool {
        self.position(key).is_some()
    }

    /// Insertion index of `key`
    pub fn position(&self, key: &KeyBlob) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| k.as_bytes() == key.as_bytes())
    }

    /// Key at insertion index `index`
    pub fn get(&self, index: usize) -> Option<&KeyBlob> {
        self.keys.get(index)
    }

    /// Iterates in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &KeyBlob> {
        self.keys.iter()
    }

    /// Public keys in insertion order
    pub fn public_keys(&self) -> Vec<&KeyBlob> {
        self.keys.iter().filter(|k| k.is_public()).collect()
    }

    /// Private keys in insertion order
    pub fn private_keys(&self) -> Vec<&KeyBlob> {
        self.keys.iter().filter(|k| k.is_private()).collect()
    }

    /// Finds the key whose primary fingerprint is `fingerprint`.
    ///
    /// Keys the backend cannot parse are skipped.
    pub fn find_by_fingerprint<B: CryptoBackend + ?Sized>(
        &self,
        backend: &B,
        fingerprint: &Fingerprint,
    ) -> Option<&KeyBlob> {
        self.keys.iter().find(|key| {
            backend
                .fingerprint(key)
                .map(|fp| fp == *fingerprint)
                .unwrap_or(false)
        })
    }
}

impl FromIterator<KeyBlob> for Keyring {
    fn from_iter<I: IntoIterator<Item = KeyBlob>>(iter: I) -> Self {
        let mut keyring = Keyring::new();
        for key in iter {
            keyring.add(key);
        }
        keyring
    }
}

impl<'a> IntoIterator for &'a Keyring {
    type Item = &'a KeyBlob;
    type IntoIter = std::slice::Iter<'a, KeyBlob>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}
