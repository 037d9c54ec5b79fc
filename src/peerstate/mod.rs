//! Per-peer Autocrypt state.
//!
//! One [`PeerState`] per correspondent, keyed by normalized address.
//! Header keys only replace the stored key when the header's message
//! timestamp is strictly newer, so reordered or duplicated delivery can
//! never roll a peer's key back. Gossip keys are tracked separately and
//! never promoted to the directly-seen key.

use crate::crypto::{CryptoBackend, Fingerprint, KeyBlob};
use crate::engine::CryptoEngine;
use crate::error::{AutocryptError, Result};
use crate::header::{AutocryptHeader, PreferEncrypt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Canonical form of an address used as record key
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// What applying a header or gossip header did to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerUpdate {
    /// A key was stored where none was before
    Created,
    /// Newer header with a different key
    KeyChanged,
    /// Newer header with the same key
    Refreshed,
    /// Header not newer than the stored one; nothing changed
    Stale,
    /// Header names a different peer; nothing changed
    AddressMismatch,
}

impl PeerUpdate {
    /// True if the state was modified
    pub fn changed(&self) -> bool {
        matches!(
            self,
            PeerUpdate::Created | PeerUpdate::KeyChanged | PeerUpdate::Refreshed
        )
    }
}

/// Receiver-side record of one correspondent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerState {
    /// Normalized peer address
    pub address: String,
    /// Time of the latest message seen from the peer, of any kind
    pub last_seen: i64,
    /// Key from the peer's own most recent header
    pub last_seen_key: Option<KeyBlob>,
    /// Message time of the header that set `last_seen_key`
    pub last_seen_timestamp: i64,
    /// Preference from the peer's most recent header
    pub prefer_encrypt: PreferEncrypt,
    /// Lower-trust key learned from a third party
    pub gossip_key: Option<KeyBlob>,
    /// Message time of the gossip header that set `gossip_key`
    pub gossip_timestamp: i64,
}

impl PeerState {
    /// Empty state for `address`
    pub fn new(address: &str) -> Self {
        Self {
            address: normalize_address(address),
            last_seen: 0,
            last_seen_key: None,
            last_seen_timestamp: 0,
            prefer_encrypt: PreferEncrypt::NoPreference,
            gossip_key: None,
            gossip_timestamp: 0,
        }
    }

    /// State seeded from a first header
    pub fn from_header(header: &AutocryptHeader, timestamp: i64) -> Self {
        let mut state = Self::new(&header.address);
        state.last_seen = timestamp;
        state.last_seen_key = Some(header.public_key.clone());
        state.last_seen_timestamp = timestamp;
        state.prefer_encrypt = header.prefer_encrypt;
        state
    }

    /// State seeded from a first gossip header
    pub fn from_gossip(header: &AutocryptHeader, timestamp: i64) -> Self {
        let mut state = Self::new(&header.address);
        state.gossip_key = Some(header.public_key.clone());
        state.gossip_timestamp = timestamp;
        state
    }

    fn is_for(&self, header: &AutocryptHeader) -> bool {
        self.address == normalize_address(&header.address)
    }

    /// Applies a header seen at `timestamp`
    pub fn update_from_header(&mut self, header: &AutocryptHeader, timestamp: i64) -> PeerUpdate {
        if !self.is_for(header) {
            warn!(
                "Header for {} not applied to state of {}",
                header.address, self.address
            );
            return PeerUpdate::AddressMismatch;
        }
        self.note_message(timestamp);
        if timestamp <= self.last_seen_timestamp {
            return PeerUpdate::Stale;
        }

        let update = match &self.last_seen_key {
            None => PeerUpdate::Created,
            Some(key) if *key == header.public_key => PeerUpdate::Refreshed,
            Some(_) => PeerUpdate::KeyChanged,
        };
        self.last_seen_key = Some(header.public_key.clone());
        self.last_seen_timestamp = timestamp;
        self.prefer_encrypt = header.prefer_encrypt;
        update
    }

    /// Applies a gossip header seen at `timestamp`; the directly-seen key is untouched
    pub fn update_from_gossip(&mut self, header: &AutocryptHeader, timestamp: i64) -> PeerUpdate {
        if !self.is_for(header) {
            warn!(
                "Gossip for {} not applied to state of {}",
                header.address, self.address
            );
            return PeerUpdate::AddressMismatch;
        }
        if timestamp <= self.gossip_timestamp {
            return PeerUpdate::Stale;
        }

        let update = match &self.gossip_key {
            None => PeerUpdate::Created,
            Some(key) if *key == header.public_key => PeerUpdate::Refreshed,
            Some(_) => PeerUpdate::KeyChanged,
        };
        self.gossip_key = Some(header.public_key.clone());
        self.gossip_timestamp = timestamp;
        update
    }

    /// Records that a message from this peer arrived at `timestamp`
    pub fn note_message(&mut self, timestamp: i64) {
        self.last_seen = self.last_seen.max(timestamp);
    }

    /// True iff a directly-seen key is present
    pub fn can_encrypt(&self) -> bool {
        self.last_seen_key.is_some()
    }

    /// Key to encrypt to; gossip keys are never used here
    pub fn encryption_key(&self) -> Option<&KeyBlob> {
        self.last_seen_key.as_ref()
    }

    /// Keys that may have signed a message from this peer, most trusted first
    pub fn verification_keys(&self) -> Vec<&KeyBlob> {
        let mut keys: Vec<&KeyBlob> = Vec::with_capacity(2);
        keys.extend(self.last_seen_key.as_ref());
        if let Some(gossip) = &self.gossip_key {
            if !keys.contains(&gossip) {
                keys.push(gossip);
            }
        }
        keys
    }

    /// Fingerprint of the encryption key, falling back to the gossip key
    pub fn fingerprint<B: CryptoBackend + ?Sized>(&self, backend: &B) -> Option<Fingerprint> {
        self.last_seen_key
            .as_ref()
            .or(self.gossip_key.as_ref())
            .and_then(|key| backend.fingerprint(key).ok())
    }
}

/// Applies a header to an optional prior state, creating one if needed
pub fn apply_header(state: Option<PeerState>, header: &AutocryptHeader, timestamp: i64) -> PeerState {
    match state {
        None => PeerState::from_header(header, timestamp),
        Some(mut state) => {
            state.update_from_header(header, timestamp);
            state
        }
    }
}

/// Applies a gossip header to an optional prior state, creating one if needed
pub fn apply_gossip(state: Option<PeerState>, header: &AutocryptHeader, timestamp: i64) -> PeerState {
    match state {
        None => PeerState::from_gossip(header, timestamp),
        Some(mut state) => {
            state.update_from_gossip(header, timestamp);
            state
        }
    }
}

/// Persistence collaborator for peer states.
///
/// Callers serialize access per address; implementations need no locking
/// beyond what `&mut self` already gives.
pub trait PeerStore {
    /// Loads the state for a normalized address
    fn load(&self, address: &str) -> Result<Option<PeerState>>;

    /// Inserts or replaces a state
    fn save(&mut self, state: &PeerState) -> Result<()>;
}

/// In-memory [`PeerStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryPeerStore {
    states: HashMap<String, PeerState>,
}

impl MemoryPeerStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored peers
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if no peers are stored
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Removes a peer; deletion is always an explicit caller decision
    pub fn remove(&mut self, address: &str) -> Option<PeerState> {
        self.states.remove(&normalize_address(address))
    }
}

impl PeerStore for MemoryPeerStore {
    fn load(&self, address: &str) -> Result<Option<PeerState>> {
        Ok(self.states.get(&normalize_address(address)).cloned())
    }

    fn save(&mut self, state: &PeerState) -> Result<()> {
        if state.address.is_empty() {
            return Err(AutocryptError::persistence("Peer state without address"));
        }
        self.states.insert(state.address.clone(), state.clone());
        Ok(())
    }
}

/// Handles the Autocrypt header of an inbound message from `from`.
///
/// The header must name the sender and carry a structurally valid key;
/// otherwise an error is returned and the stored state is left alone.
pub fn process_header<B: CryptoBackend, S: PeerStore + ?Sized>(
    engine: &CryptoEngine<B>,
    store: &mut S,
    from: &str,
    raw_header: &str,
    timestamp: i64,
) -> Result<PeerState> {
    let header = AutocryptHeader::parse(raw_header)?;
    if !header.matches_address(from) {
        return Err(AutocryptError::parse(format!(
            "Header address {} does not match sender {}",
            header.address, from
        )));
    }
    engine.validate_key(&header.public_key)?;

    let address = normalize_address(from);
    let state = match store.load(&address)? {
        None => {
            info!("First Autocrypt header from {}", address);
            PeerState::from_header(&header, timestamp)
        }
        Some(mut state) => {
            let update = state.update_from_header(&header, timestamp);
            if update == PeerUpdate::KeyChanged {
                info!("Peer {} announced a new key", address);
            } else {
                debug!("Header from {}: {:?}", address, update);
            }
            state
        }
    };

    store.save(&state)?;
    Ok(state)
}

/// Handles a gossip header found in a message sent to `recipients`.
///
/// Gossip is only accepted for addresses the message was actually sent to.
pub fn process_gossip<B: CryptoBackend, S: PeerStore + ?Sized>(
    engine: &CryptoEngine<B>,
    store: &mut S,
    recipients: &[&str],
    raw_header: &str,
    timestamp: i64,
) -> Result<PeerState> {
    let header = AutocryptHeader::parse(raw_header)?;
    if !recipients.iter().any(|r| header.matches_address(r)) {
        return Err(AutocryptError::parse(format!(
            "Gossip for {} does not name a recipient",
            header.address
        )));
    }
    engine.validate_key(&header.public_key)?;

    let address = normalize_address(&header.address);
    let state = apply_gossip(store.load(&address)?, &header, timestamp);
    debug!("Gossip for {} recorded", address);

    store.save(&state)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(address: &str, key: u8, prefer: PreferEncrypt) -> AutocryptHeader {
        AutocryptHeader::new(address, prefer, KeyBlob::public(vec![key; 16]))
    }

    #[test]
    fn test_first_header_creates_state() {
        let state = apply_header(None, &header("Alice@Example.org ", 1, PreferEncrypt::Mutual), 100);
        assert_eq!(state.address, "alice@example.org");
        assert_eq!(state.last_seen_timestamp, 100);
        assert_eq!(state.last_seen, 100);
        assert_eq!(state.prefer_encrypt, PreferEncrypt::Mutual);
        assert!(state.can_encrypt());
    }

    #[test]
    fn test_only_strictly_newer_headers_replace_key() {
        let mut state = PeerState::from_header(&header("a@x.org", 1, PreferEncrypt::Mutual), 100);

        assert_eq!(
            state.update_from_header(&header("a@x.org", 2, PreferEncrypt::NoPreference), 100),
            PeerUpdate::Stale
        );
        assert_eq!(
            state.update_from_header(&header("a@x.org", 2, PreferEncrypt::NoPreference), 50),
            PeerUpdate::Stale
        );
        assert_eq!(state.last_seen_key, Some(KeyBlob::public(vec![1; 16])));
        assert_eq!(state.prefer_encrypt, PreferEncrypt::Mutual);

        assert_eq!(
            state.update_from_header(&header("a@x.org", 1, PreferEncrypt::Mutual), 150),
            PeerUpdate::Refreshed
        );
        assert_eq!(
            state.update_from_header(&header("a@x.org", 2, PreferEncrypt::NoPreference), 200),
            PeerUpdate::KeyChanged
        );
        assert_eq!(state.last_seen_key, Some(KeyBlob::public(vec![2; 16])));
        assert_eq!(state.last_seen_timestamp, 200);
        assert_eq!(state.prefer_encrypt, PreferEncrypt::NoPreference);
    }

    #[test]
    fn test_stale_header_keeps_last_seen() {
        let mut state = PeerState::from_header(&header("a@x.org", 1, PreferEncrypt::Mutual), 100);
        state.update_from_header(&header("a@x.org", 2, PreferEncrypt::Mutual), 90);
        assert_eq!(state.last_seen, 100);
        state.note_message(300);
        assert_eq!(state.last_seen, 300);
        assert_eq!(state.last_seen_timestamp, 100);
    }

    #[test]
    fn test_gossip_never_promoted() {
        let state = apply_gossip(None, &header("b@x.org", 7, PreferEncrypt::Mutual), 100);
        assert!(!state.can_encrypt());
        assert!(state.encryption_key().is_none());
        assert_eq!(state.verification_keys().len(), 1);
        assert_eq!(state.prefer_encrypt, PreferEncrypt::NoPreference);

        let state = apply_header(Some(state), &header("b@x.org", 8, PreferEncrypt::Mutual), 200);
        let state = apply_gossip(Some(state), &header("b@x.org", 9, PreferEncrypt::Mutual), 300);
        assert_eq!(state.last_seen_key, Some(KeyBlob::public(vec![8; 16])));
        assert_eq!(state.gossip_key, Some(KeyBlob::public(vec![9; 16])));
        assert_eq!(
            state.verification_keys(),
            vec![&KeyBlob::public(vec![8; 16]), &KeyBlob::public(vec![9; 16])]
        );

        let unchanged = apply_gossip(Some(state.clone()), &header("b@x.org", 10, PreferEncrypt::Mutual), 300);
        assert_eq!(unchanged, state);
    }

    #[test]
    fn test_address_mismatch_leaves_state_alone() {
        let mut state = PeerState::from_header(&header("a@x.org", 1, PreferEncrypt::Mutual), 100);
        let before = state.clone();
        assert_eq!(
            state.update_from_header(&header("mallory@x.org", 2, PreferEncrypt::Mutual), 200),
            PeerUpdate::AddressMismatch
        );
        assert_eq!(state, before);
        assert!(!PeerUpdate::AddressMismatch.changed());
    }

    #[test]
    fn test_memory_store_normalizes_keys() {
        let mut store = MemoryPeerStore::new();
        let state = PeerState::from_header(&header("a@x.org", 1, PreferEncrypt::Mutual), 100);
        store.save(&state).unwrap();

        assert_eq!(store.load("A@X.ORG").unwrap(), Some(state));
        assert!(store.load("b@x.org").unwrap().is_none());
        assert!(store.remove(" a@x.org").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_peer_state_serde() {
        let state = PeerState::from_header(&header("a@x.org", 1, PreferEncrypt::Mutual), 100);
        let bytes = bincode::serialize(&state).unwrap();
        let restored: PeerState = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, state);
    }
}
